use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tantivy::tokenizer::{Token, TokenStream, Tokenizer};

/// Synonym dictionary: every member of a group is a synonym of every other
/// member.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SynonymConfig {
    #[serde(default)]
    pub groups: Vec<Vec<String>>,
}

#[derive(thiserror::Error, Debug)]
pub enum SynonymError {
    #[error("could not read synonym dictionary {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse synonym dictionary: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SynonymConfig {
    pub fn load(path: &Path) -> Result<Self, SynonymError> {
        let bytes = std::fs::read(path).map_err(|source| SynonymError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Missing dictionaries degrade to an empty one; only the
    /// reindex-with-synonyms path insists the file exists.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

/// Tokenizes the way the default analyzer does (alphanumeric runs,
/// lowercased) and additionally emits every other member of a matching
/// synonym group at the same position, so any member matches at query time.
#[derive(Clone, Default)]
pub struct SynonymTokenizer {
    expansions: Arc<HashMap<String, Vec<String>>>,
}

impl SynonymTokenizer {
    pub fn new(config: &SynonymConfig) -> Self {
        let mut expansions: HashMap<String, Vec<String>> = HashMap::new();
        for group in &config.groups {
            for member in group {
                let member = member.to_lowercase();
                let others = group
                    .iter()
                    .map(|m| m.to_lowercase())
                    .filter(|m| *m != member)
                    .collect::<Vec<_>>();
                expansions.entry(member).or_default().extend(others);
            }
        }
        Self {
            expansions: Arc::new(expansions),
        }
    }
}

pub struct SynonymTokenStream<'a> {
    /// input
    _text: &'a str,
    tokens: Vec<Token>,
    index: usize,
}

impl Tokenizer for SynonymTokenizer {
    type TokenStream<'a> = SynonymTokenStream<'a>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        let mut tokens = Vec::new();
        let mut position = 0;
        for (offset, word) in alphanumeric_runs(text) {
            let lowered = word.to_lowercase();
            tokens.push(Token {
                offset_from: offset,
                offset_to: offset + word.len(),
                position,
                text: lowered.clone(),
                position_length: 1,
            });
            if let Some(synonyms) = self.expansions.get(&lowered) {
                for synonym in synonyms {
                    tokens.push(Token {
                        offset_from: offset,
                        offset_to: offset + word.len(),
                        position,
                        text: synonym.clone(),
                        position_length: 1,
                    });
                }
            }
            position += 1;
        }
        SynonymTokenStream {
            _text: text,
            tokens,
            index: 0,
        }
    }
}

impl<'a> TokenStream for SynonymTokenStream<'a> {
    fn advance(&mut self) -> bool {
        if self.index < self.tokens.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.index - 1]
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.tokens[self.index - 1]
    }
}

fn alphanumeric_runs(text: &str) -> Vec<(usize, &str)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            start.get_or_insert(idx);
        } else if let Some(from) = start.take() {
            runs.push((from, &text[from..idx]));
        }
    }
    if let Some(from) = start {
        runs.push((from, &text[from..]));
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> SynonymConfig {
        SynonymConfig {
            groups: vec![vec![
                "кепка".to_owned(),
                "шапка".to_owned(),
                "бейсболка".to_owned(),
                "панама".to_owned(),
            ]],
        }
    }

    fn collect(tokenizer: &mut SynonymTokenizer, text: &str) -> Vec<(String, usize)> {
        let mut stream = tokenizer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            let token = stream.token();
            out.push((token.text.clone(), token.position));
        }
        out
    }

    #[test]
    fn expands_group_members_at_the_same_position() {
        let mut tokenizer = SynonymTokenizer::new(&dictionary());
        let tokens = collect(&mut tokenizer, "синяя Кепка");
        assert_eq!(tokens[0], ("синяя".to_owned(), 0));
        assert_eq!(tokens[1], ("кепка".to_owned(), 1));
        let expansions: Vec<_> = tokens[2..].iter().map(|(t, p)| (t.as_str(), *p)).collect();
        assert!(expansions.contains(&("шапка", 1)));
        assert!(expansions.contains(&("бейсболка", 1)));
        assert!(expansions.contains(&("панама", 1)));
    }

    #[test]
    fn plain_words_pass_through_lowercased() {
        let mut tokenizer = SynonymTokenizer::new(&SynonymConfig::default());
        let tokens = collect(&mut tokenizer, "Red  hat, v2");
        let texts: Vec<_> = tokens.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["red", "hat", "v2"]);
    }

    #[test]
    fn missing_dictionary_defaults_to_empty() {
        let cfg = SynonymConfig::load_or_default(Path::new("/nonexistent/synonyms.json"));
        assert!(cfg.groups.is_empty());
    }
}

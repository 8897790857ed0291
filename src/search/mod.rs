pub mod filter;
pub mod rank;

use std::sync::Arc;

use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query};
use tantivy::Term;

use crate::indexes::indexer::{DocIndex, EngineError};
use crate::indexes::query::{Hit, QueryError, SearchRequest};
use crate::indexes::schema::Mapping;

use self::filter::{FilterClient, FilterRequest};
use self::rank::RankingClient;

/// Hits returned per search, after sorting.
pub const SEARCH_RESULT_LIMIT: usize = 100;

/// Maximum edit distance for free-text term matching.
const FUZZY_DISTANCE: u8 = 1;

/// One search request as the HTTP surface hands it over.
#[derive(Debug, Default)]
pub struct SearchOptions<'a> {
    pub query: &'a str,
    pub filters: Option<FilterRequest>,
    pub sort_field: Option<&'a str>,
    pub sort_order: Option<&'a str>,
}

/// Compiles free text and filters into one boolean query, projects the sort,
/// and runs the result against the engine.
pub struct SearchClient {
    index: Arc<DocIndex>,
    filters: Arc<FilterClient>,
    ranking: Arc<RankingClient>,
}

impl SearchClient {
    pub fn new(
        index: Arc<DocIndex>,
        filters: Arc<FilterClient>,
        ranking: Arc<RankingClient>,
    ) -> Self {
        Self {
            index,
            filters,
            ranking,
        }
    }

    pub async fn search(&self, opts: SearchOptions<'_>) -> Result<Vec<Hit>, EngineError> {
        self.index
            .search_with(|mapping, schema| {
                let text = compile_text_query(mapping, opts.query);
                let filter = match &opts.filters {
                    Some(filters) => self.filters.compile(mapping, filters)?,
                    None => None,
                };
                let query = match (text, filter) {
                    (None, None) => return Err(QueryError::EmptyQuery),
                    (Some(text), None) => text,
                    (None, Some(filter)) => filter,
                    (Some(text), Some(filter)) => Box::new(BooleanQuery::from(vec![
                        (Occur::Must, text),
                        (Occur::Must, filter),
                    ])),
                };
                let sort = self
                    .ranking
                    .project(schema, opts.sort_field, opts.sort_order)?;
                Ok(SearchRequest {
                    query,
                    sort,
                    limit: SEARCH_RESULT_LIMIT,
                })
            })
            .await
    }

    /// Free text only, default ranking.
    pub async fn simple_search(&self, query: &str) -> Result<Vec<Hit>, EngineError> {
        self.search(SearchOptions {
            query,
            ..Default::default()
        })
        .await
    }
}

/// Whitespace-tokenizes the text and fans each token out as a fuzzy term
/// over every searchable field; any term match qualifies a hit.
fn compile_text_query(mapping: &Mapping, text: &str) -> Option<Box<dyn Query>> {
    let mut parts: Vec<(Occur, Box<dyn Query>)> = Vec::new();
    for token in text.split_whitespace() {
        let token = token.to_lowercase();
        for field in mapping.searchable_fields() {
            parts.push((
                Occur::Should,
                Box::new(FuzzyTermQuery::new(
                    Term::from_field_text(field, &token),
                    FUZZY_DISTANCE,
                    true,
                )),
            ));
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(Box::new(BooleanQuery::from(parts)))
    }
}

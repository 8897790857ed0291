use std::cmp::Ordering;

use serde::Serialize;
use tantivy::query::Query;

use crate::model::{Document, Value};

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("empty query: no search text and no filters")]
    EmptyQuery,
    #[error("filter '{name}' is invalid: {reason}")]
    InvalidFilter { name: String, reason: String },
    #[error("unknown filter field '{0}'")]
    UnknownField(String),
    #[error("field '{0}' is not sortable")]
    InvalidSortField(String),
    #[error("invalid sort order '{0}': expected 'asc' or 'desc'")]
    InvalidSortOrder(String),
}

/// A compiled search: the boolean query tree plus the projected sort keys.
pub struct SearchRequest {
    pub query: Box<dyn Query>,
    pub sort: Vec<SortKey>,
    pub limit: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        match raw {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(QueryError::InvalidSortOrder(other.to_owned())),
        }
    }
}

/// Value transform applied before comparison. All of these are monotonic
/// for positive inputs; they exist so that a profile with mixed weights
/// still orders the way the boost formulas dictate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SortTransform {
    None,
    /// `field^weight`
    Weight(f64),
    /// `field*weight`
    Product(f64),
    /// `log(field)`
    Log,
}

impl SortTransform {
    fn apply(&self, value: f64) -> f64 {
        match self {
            SortTransform::None => value,
            SortTransform::Weight(w) => {
                if value < 0.0 {
                    -(-value).powf(*w)
                } else {
                    value.powf(*w)
                }
            }
            SortTransform::Product(w) => value * w,
            SortTransform::Log => {
                if value > 0.0 {
                    value.ln()
                } else {
                    f64::MIN
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SortBy {
    /// Relevance score of the hit.
    Score,
    /// A stored field value.
    Field(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub by: SortBy,
    pub order: SortOrder,
    pub transform: SortTransform,
}

impl SortKey {
    pub fn score_desc() -> Self {
        SortKey {
            by: SortBy::Score,
            order: SortOrder::Desc,
            transform: SortTransform::None,
        }
    }

    pub fn field(name: impl Into<String>, order: SortOrder, transform: SortTransform) -> Self {
        SortKey {
            by: SortBy::Field(name.into()),
            order,
            transform,
        }
    }
}

/// One search result: id, relevance score, and the stored field set.
#[derive(Serialize, Clone, Debug)]
pub struct Hit {
    pub id: String,
    pub score: f32,
    pub fields: Document,
}

/// Orders hits by the projected key list; ties after every key break on id
/// so identical inputs give identical output order.
pub fn sort_hits(hits: &mut [Hit], keys: &[SortKey]) {
    hits.sort_by(|a, b| {
        for key in keys {
            let ordering = match &key.by {
                SortBy::Score => a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal),
                SortBy::Field(name) => {
                    compare_values(a.fields.get(name), b.fields.get(name), key.transform)
                }
            };
            let ordering = match key.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id.cmp(&b.id)
    });
}

fn compare_values(a: Option<&Value>, b: Option<&Value>, transform: SortTransform) -> Ordering {
    match (a, b) {
        (Some(Value::Num(x)), Some(Value::Num(y))) => transform
            .apply(*x)
            .partial_cmp(&transform.apply(*y))
            .unwrap_or(Ordering::Equal),
        (Some(Value::Str(x)), Some(Value::Str(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        // Mixed types cannot be ordered meaningfully; keep them stable.
        (Some(_), Some(_)) => Ordering::Equal,
        // Missing values sort before present ones.
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32, price: f64) -> Hit {
        let mut fields = Document::new();
        fields.insert("price".to_owned(), Value::Num(price));
        Hit {
            id: id.to_owned(),
            score,
            fields,
        }
    }

    #[test]
    fn score_descending_is_the_primary_key() {
        let mut hits = vec![hit("a", 0.5, 1.0), hit("b", 2.0, 2.0), hit("c", 1.0, 3.0)];
        sort_hits(&mut hits, &[SortKey::score_desc()]);
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn field_keys_break_score_ties() {
        let mut hits = vec![hit("a", 1.0, 5.0), hit("b", 1.0, 9.0), hit("c", 1.0, 1.0)];
        sort_hits(
            &mut hits,
            &[
                SortKey::score_desc(),
                SortKey::field("price", SortOrder::Desc, SortTransform::Weight(2.0)),
            ],
        );
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn identical_inputs_sort_identically() {
        let keys = vec![SortKey::score_desc()];
        let mut first = vec![hit("b", 1.0, 1.0), hit("a", 1.0, 1.0), hit("c", 1.0, 1.0)];
        let mut second = vec![hit("c", 1.0, 1.0), hit("b", 1.0, 1.0), hit("a", 1.0, 1.0)];
        sort_hits(&mut first, &keys);
        sort_hits(&mut second, &keys);
        let first_ids: Vec<_> = first.iter().map(|h| h.id.as_str()).collect();
        let second_ids: Vec<_> = second.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(first_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_values_sort_first_ascending() {
        let with_missing = Hit {
            id: "m".to_owned(),
            score: 1.0,
            fields: Document::new(),
        };
        let mut hits = vec![hit("a", 1.0, 2.0), with_missing];
        sort_hits(
            &mut hits,
            &[SortKey::field("price", SortOrder::Asc, SortTransform::None)],
        );
        assert_eq!(hits[0].id, "m");
    }
}

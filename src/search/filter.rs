use std::collections::HashMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use tantivy::query::{BooleanQuery, Occur, Query, RangeQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::Term;

use crate::config::schema::{
    BoolSelectFilter, FilterConfig, MultiSelectFilter, OneSelectFilter, RangeFilter,
};
use crate::indexes::query::QueryError;
use crate::indexes::schema::{parse_timestamp, FieldKind, MappedField, Mapping};

/// The structured filter half of a search request.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct FilterRequest {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub range: Vec<RangeFilter>,
    #[serde(rename = "multi-select", default)]
    pub multi_select: Vec<MultiSelectFilter>,
    #[serde(rename = "one-select", default)]
    pub one_select: Vec<OneSelectFilter>,
    #[serde(rename = "bool-select", default)]
    pub bool_select: Vec<BoolSelectFilter>,
}

impl FilterRequest {
    pub fn is_empty(&self) -> bool {
        self.category.is_empty()
            && self.range.is_empty()
            && self.multi_select.is_empty()
            && self.one_select.is_empty()
            && self.bool_select.is_empty()
    }
}

/// Holds the filter catalogue and compiles filter requests into boolean
/// query nodes.
pub struct FilterClient {
    catalog: HashMap<String, FilterConfig>,
    date_layout: Option<String>,
}

impl FilterClient {
    pub fn new(entries: Vec<FilterConfig>, date_layout: Option<String>) -> Self {
        let catalog = entries
            .into_iter()
            .map(|entry| (entry.category.clone(), entry))
            .collect();
        Self {
            catalog,
            date_layout,
        }
    }

    pub fn by_category(&self, category: &str) -> Option<&FilterConfig> {
        self.catalog.get(category)
    }

    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<_> = self.catalog.keys().cloned().collect();
        categories.sort();
        categories
    }

    /// Compiles a filter request into one boolean node, or nothing when the
    /// request carries no filters at all. Unparsable bounds fail the whole
    /// request; nothing is silently dropped.
    pub fn compile(
        &self,
        mapping: &Mapping,
        request: &FilterRequest,
    ) -> Result<Option<Box<dyn Query>>, QueryError> {
        if request.is_empty() {
            return Ok(None);
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if !request.category.is_empty() {
            let mapped = lookup(mapping, "category")?;
            let term = Term::from_field_text(mapped.field, &request.category.to_lowercase());
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        if !request.range.is_empty() {
            let mut ranges: Vec<Box<dyn Query>> = Vec::with_capacity(request.range.len());
            for range in &request.range {
                ranges.push(self.compile_range(mapping, range)?);
            }
            // Range clauses describe disjoint facets; matching any of them
            // qualifies the document.
            clauses.push((Occur::Must, Box::new(BooleanQuery::union(ranges))));
        }

        for select in &request.multi_select {
            let mapped = lookup(mapping, &select.name)?;
            let terms = select
                .value
                .iter()
                .map(|value| term_query(mapped, value))
                .collect::<Result<Vec<_>, _>>()?;
            clauses.push((Occur::Must, Box::new(BooleanQuery::union(terms))));
        }

        for select in &request.one_select {
            let mapped = lookup(mapping, &select.name)?;
            clauses.push((Occur::Must, term_query(mapped, &select.value)?));
        }

        for select in &request.bool_select {
            let mapped = lookup(mapping, &select.name)?;
            if mapped.kind != FieldKind::Bool {
                return Err(QueryError::InvalidFilter {
                    name: select.name.clone(),
                    reason: format!("'{}' is not a bool field", select.name),
                });
            }
            let term = Term::from_field_bool(mapped.field, select.value);
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        Ok(Some(Box::new(BooleanQuery::from(clauses))))
    }

    fn compile_range(
        &self,
        mapping: &Mapping,
        range: &RangeFilter,
    ) -> Result<Box<dyn Query>, QueryError> {
        let mapped = lookup(mapping, &range.name)?;
        let invalid = |reason: String| QueryError::InvalidFilter {
            name: range.name.clone(),
            reason,
        };
        match range.range_type.as_str() {
            // "date" is the historical wire name for timestamp ranges.
            "timestamp" | "date" => {
                if mapped.kind != FieldKind::Timestamp {
                    return Err(invalid(format!("'{}' is not a timestamp field", range.name)));
                }
                let layout = self.date_layout.as_deref();
                let from = parse_timestamp(&range.from_value, layout).map_err(invalid)?;
                let to = parse_timestamp(&range.to_value, layout)
                    .map_err(|reason| QueryError::InvalidFilter {
                        name: range.name.clone(),
                        reason,
                    })?;
                Ok(Box::new(RangeQuery::new_date_bounds(
                    mapped.name.clone(),
                    Bound::Included(from),
                    Bound::Excluded(to),
                )))
            }
            "number" => {
                if mapped.kind != FieldKind::Number {
                    return Err(invalid(format!("'{}' is not a number field", range.name)));
                }
                let from: f64 = range
                    .from_value
                    .parse()
                    .map_err(|_| invalid(format!("'{}' is not a number", range.from_value)))?;
                let to: f64 = range
                    .to_value
                    .parse()
                    .map_err(|e| {
                        QueryError::InvalidFilter {
                            name: range.name.clone(),
                            reason: format!("'{}' is not a number: {e}", range.to_value),
                        }
                    })?;
                Ok(Box::new(RangeQuery::new_f64_bounds(
                    mapped.name.clone(),
                    Bound::Included(from),
                    Bound::Included(to),
                )))
            }
            other => Err(invalid(format!("unknown range type '{other}'"))),
        }
    }
}

fn lookup<'m>(mapping: &'m Mapping, name: &str) -> Result<&'m MappedField, QueryError> {
    mapping
        .field(name)
        .ok_or_else(|| QueryError::UnknownField(name.to_owned()))
}

fn term_query(mapped: &MappedField, value: &str) -> Result<Box<dyn Query>, QueryError> {
    let term = match mapped.kind {
        FieldKind::Str => Term::from_field_text(mapped.field, value),
        FieldKind::Number => {
            let parsed: f64 = value.parse().map_err(|_| QueryError::InvalidFilter {
                name: mapped.name.clone(),
                reason: format!("'{value}' is not a number"),
            })?;
            Term::from_field_f64(mapped.field, parsed)
        }
        FieldKind::Bool => {
            let parsed: bool = value.parse().map_err(|_| QueryError::InvalidFilter {
                name: mapped.name.clone(),
                reason: format!("'{value}' is not a bool"),
            })?;
            Term::from_field_bool(mapped.field, parsed)
        }
        FieldKind::Timestamp => {
            return Err(QueryError::InvalidFilter {
                name: mapped.name.clone(),
                reason: "select filters are not supported on timestamp fields".to_owned(),
            })
        }
    };
    Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::IndexConfig;

    fn mapping() -> Mapping {
        let cfg: IndexConfig = serde_json::from_str(
            r#"{
                "indexName": "products",
                "fields": [
                    {"name": "title", "type": "string", "searchable": true, "filterable": true},
                    {"name": "category", "type": "string", "searchable": true, "filterable": true},
                    {"name": "price", "type": "number", "filterable": true, "sortable": true},
                    {"name": "added_at", "type": "timestamp", "filterable": true},
                    {"name": "in_stock", "type": "bool", "filterable": true}
                ]
            }"#,
        )
        .unwrap();
        Mapping::from_config(&cfg, false)
    }

    fn client() -> FilterClient {
        FilterClient::new(Vec::new(), None)
    }

    #[test]
    fn empty_request_compiles_to_nothing() {
        let compiled = client().compile(&mapping(), &FilterRequest::default()).unwrap();
        assert!(compiled.is_none());
    }

    #[test]
    fn category_alone_compiles() {
        let request = FilterRequest {
            category: "Apparel".to_owned(),
            ..Default::default()
        };
        let compiled = client().compile(&mapping(), &request).unwrap();
        assert!(compiled.is_some());
    }

    #[test]
    fn unparsable_number_bound_fails_the_request() {
        let request: FilterRequest = serde_json::from_str(
            r#"{"range": [{"name": "price", "type": "number", "from_value": "abc", "to_value": "10"}]}"#,
        )
        .unwrap();
        let err = client().compile(&mapping(), &request).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter { .. }));
    }

    #[test]
    fn unknown_range_type_fails_the_request() {
        let request: FilterRequest = serde_json::from_str(
            r#"{"range": [{"name": "price", "type": "decimal", "from_value": "1", "to_value": "2"}]}"#,
        )
        .unwrap();
        let err = client().compile(&mapping(), &request).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter { .. }));
    }

    #[test]
    fn unknown_field_fails_the_request() {
        let request: FilterRequest =
            serde_json::from_str(r#"{"one-select": [{"name": "ghost", "value": "x"}]}"#).unwrap();
        let err = client().compile(&mapping(), &request).unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(_)));
    }

    #[test]
    fn timestamp_range_accepts_both_wire_names() {
        for range_type in ["timestamp", "date"] {
            let raw = format!(
                r#"{{"range": [{{"name": "added_at", "type": "{range_type}",
                    "from_value": "2024-01-01T00:00:00Z", "to_value": "2024-02-01T00:00:00Z"}}]}}"#
            );
            let request: FilterRequest = serde_json::from_str(&raw).unwrap();
            assert!(client().compile(&mapping(), &request).unwrap().is_some());
        }
    }

    #[test]
    fn bad_date_bound_fails_the_request() {
        let request: FilterRequest = serde_json::from_str(
            r#"{"range": [{"name": "added_at", "type": "timestamp", "from_value": "not-a-date", "to_value": "2024-02-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        assert!(client().compile(&mapping(), &request).is_err());
    }

    #[test]
    fn select_filters_compile_per_kind() {
        let request: FilterRequest = serde_json::from_str(
            r#"{
                "multi-select": [{"name": "title", "value": ["red", "blue"]}],
                "one-select": [{"name": "price", "value": "9.5"}],
                "bool-select": [{"name": "in_stock", "value": true}]
            }"#,
        )
        .unwrap();
        assert!(client().compile(&mapping(), &request).unwrap().is_some());
    }

    #[test]
    fn bool_select_on_non_bool_field_fails() {
        let request: FilterRequest =
            serde_json::from_str(r#"{"bool-select": [{"name": "title", "value": true}]}"#).unwrap();
        assert!(client().compile(&mapping(), &request).is_err());
    }

    #[test]
    fn catalogue_lookup() {
        let entries: Vec<FilterConfig> = serde_json::from_str(
            r#"[
                {"category": "apparel", "range": [{"name": "price", "type": "number"}]},
                {"category": "books"}
            ]"#,
        )
        .unwrap();
        let client = FilterClient::new(entries, None);
        assert!(client.by_category("apparel").is_some());
        assert!(client.by_category("missing").is_none());
        assert_eq!(client.categories(), vec!["apparel", "books"]);
    }
}

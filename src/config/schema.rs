use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::Value;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config file i/o failed at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("index name must not be empty")]
    EmptyIndexName,
    #[error("field name '{0}' is empty or reserved")]
    ReservedFieldName(String),
    #[error("field '{0}' is declared twice")]
    DuplicateField(String),
}

/// Declared type of a schema field.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Timestamp,
    Number,
    Bool,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Timestamp => "timestamp",
            FieldType::Number => "number",
            FieldType::Bool => "bool",
        }
    }

    /// Zero value used by the index-struct template.
    pub fn zero_value(&self) -> Value {
        match self {
            FieldType::String | FieldType::Timestamp => Value::Str(String::new()),
            FieldType::Number => Value::Num(0.0),
            FieldType::Bool => Value::Bool(false),
        }
    }
}

/// One declared field with its capability flags.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub synonym: bool,
}

/// The index schema. Immutable for the lifetime of one physical index;
/// replacement goes through the config lifecycle.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    pub index_name: String,
    #[serde(default)]
    pub category: Vec<String>,
    pub fields: Vec<FieldSpec>,
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_name.is_empty() {
            return Err(ConfigError::EmptyIndexName);
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() || field.name.starts_with('_') {
                return Err(ConfigError::ReservedFieldName(field.name.clone()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateField(field.name.clone()));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Range filter shape, shared by the catalogue and search requests.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RangeFilter {
    pub name: String,
    #[serde(rename = "type")]
    pub range_type: String,
    #[serde(default)]
    pub from_value: String,
    #[serde(default)]
    pub to_value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MultiSelectFilter {
    pub name: String,
    #[serde(default)]
    pub value: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OneSelectFilter {
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BoolSelectFilter {
    pub name: String,
    pub value: bool,
}

/// One filter-catalogue entry: the filters that are valid in a category.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FilterConfig {
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

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoostType {
    Custom,
    Value,
    Logarithmic,
    #[serde(rename = "catboostV2")]
    CatboostV2,
    /// Anything the profile names that we do not know; sorts by the bare
    /// field.
    Unspecified,
}

impl<'de> Deserialize<'de> for BoostType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "custom" => BoostType::Custom,
            "value" => BoostType::Value,
            "logarithmic" => BoostType::Logarithmic,
            "catboostV2" => BoostType::CatboostV2,
            _ => BoostType::Unspecified,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Boost {
    pub field: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(rename = "boostType", default = "default_boost_type")]
    pub boost_type: BoostType,
}

fn default_boost_type() -> BoostType {
    BoostType::Unspecified
}

/// The ranking profile. Boost order defines tie-break priority.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RankConfig {
    #[serde(default)]
    pub boosts: Vec<Boost>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_json() -> &'static str {
        r#"{
            "indexName": "products",
            "category": ["apparel"],
            "fields": [
                {"name": "title", "type": "string", "searchable": true, "filterable": true},
                {"name": "price", "type": "number", "filterable": true, "sortable": true}
            ]
        }"#
    }

    #[test]
    fn parses_schema() {
        let cfg: IndexConfig = serde_json::from_str(schema_json()).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.index_name, "products");
        assert_eq!(cfg.fields.len(), 2);
        assert!(cfg.field("title").unwrap().searchable);
        assert!(cfg.field("price").unwrap().sortable);
    }

    #[test]
    fn unknown_field_type_is_a_parse_error() {
        let raw = r#"{"indexName": "x", "fields": [{"name": "a", "type": "decimal"}]}"#;
        assert!(serde_json::from_str::<IndexConfig>(raw).is_err());
    }

    #[test]
    fn duplicate_and_reserved_field_names_rejected() {
        let mut cfg: IndexConfig = serde_json::from_str(schema_json()).unwrap();
        cfg.fields[1].name = "title".to_owned();
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateField(_))));

        let mut cfg: IndexConfig = serde_json::from_str(schema_json()).unwrap();
        cfg.fields[0].name = "_id".to_owned();
        assert!(matches!(cfg.validate(), Err(ConfigError::ReservedFieldName(_))));
    }

    #[test]
    fn boost_types_parse_with_fallback() {
        let raw = r#"{"boosts": [
            {"field": "a", "weight": 2.0, "boostType": "value"},
            {"field": "b", "boostType": "catboostV2"},
            {"field": "c", "boostType": "something-new"},
            {"field": "d"}
        ]}"#;
        let cfg: RankConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.boosts[0].boost_type, BoostType::Value);
        assert_eq!(cfg.boosts[1].boost_type, BoostType::CatboostV2);
        assert_eq!(cfg.boosts[2].boost_type, BoostType::Unspecified);
        assert_eq!(cfg.boosts[3].boost_type, BoostType::Unspecified);
    }

    #[test]
    fn filter_catalogue_uses_wire_names() {
        let raw = r#"{
            "category": "apparel",
            "range": [{"name": "price", "type": "number", "from_value": "0", "to_value": "100"}],
            "multi-select": [{"name": "color", "value": ["red", "blue"]}],
            "one-select": [{"name": "brand", "value": "acme"}],
            "bool-select": [{"name": "in_stock", "value": true}]
        }"#;
        let cfg: FilterConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.range[0].range_type, "number");
        assert_eq!(cfg.multi_select[0].value, vec!["red", "blue"]);
        assert!(cfg.bool_select[0].value);
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single field value as it arrives from JSON. Timestamps travel as
/// strings; they are only parsed once the engine writes them into a date
/// column.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// A document is a flat map from field name to value. The id travels
/// separately.
pub type Document = BTreeMap<String, Value>;

/// Message shape shared by both bus subscribers.
#[derive(Serialize, Deserialize, Debug)]
pub struct DocMsg {
    pub doc_id: String,
    #[serde(rename = "doc")]
    pub document: Document,
    #[serde(rename = "delete", default)]
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_deserialize_by_tag() {
        let doc: Document =
            serde_json::from_str(r#"{"title":"red hat","price":9.5,"in_stock":true}"#).unwrap();
        assert_eq!(doc["title"], Value::Str("red hat".to_owned()));
        assert_eq!(doc["price"], Value::Num(9.5));
        assert_eq!(doc["in_stock"], Value::Bool(true));
    }

    #[test]
    fn doc_msg_uses_bus_field_names() {
        let msg: DocMsg =
            serde_json::from_str(r#"{"doc_id":"a","doc":{"title":"x"},"delete":true}"#).unwrap();
        assert_eq!(msg.doc_id, "a");
        assert!(msg.deleted);

        let msg: DocMsg = serde_json::from_str(r#"{"doc_id":"b","doc":{}}"#).unwrap();
        assert!(!msg.deleted);
    }
}

use thiserror::Error;

use crate::config::schema::{FieldType, IndexConfig};
use crate::model::{Document, Value};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("field '{0}' is missing from the document")]
    FieldMissing(String),
    #[error("field '{name}' has the wrong type: expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Checks a candidate document against the schema: every declared field must
/// be present with a value of the declared type. Fields the schema does not
/// know about are allowed and ignored.
pub fn validate_document(schema: &IndexConfig, doc: &Document) -> Result<(), ValidationError> {
    for field in &schema.fields {
        let value = doc
            .get(&field.name)
            .ok_or_else(|| ValidationError::FieldMissing(field.name.clone()))?;
        if !type_matches(field.field_type, value) {
            return Err(ValidationError::TypeMismatch {
                name: field.name.clone(),
                expected: field.field_type.as_str(),
                actual: value.type_name(),
            });
        }
    }
    Ok(())
}

fn type_matches(expected: FieldType, value: &Value) -> bool {
    match expected {
        // Timestamps are carried as strings; their content is parsed later,
        // when the engine writes the date column.
        FieldType::String | FieldType::Timestamp => matches!(value, Value::Str(_)),
        FieldType::Number => matches!(value, Value::Num(_)),
        FieldType::Bool => matches!(value, Value::Bool(_)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::FieldSpec;

    fn schema() -> IndexConfig {
        serde_json::from_str(
            r#"{
                "indexName": "products",
                "fields": [
                    {"name": "title", "type": "string", "searchable": true},
                    {"name": "price", "type": "number", "sortable": true},
                    {"name": "added_at", "type": "timestamp", "filterable": true},
                    {"name": "in_stock", "type": "bool", "filterable": true}
                ]
            }"#,
        )
        .unwrap()
    }

    fn valid_doc() -> Document {
        serde_json::from_str(
            r#"{
                "title": "red hat",
                "price": 9.5,
                "added_at": "2024-01-02T10:00:00Z",
                "in_stock": true
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_document() {
        assert_eq!(validate_document(&schema(), &valid_doc()), Ok(()));
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let mut doc = valid_doc();
        doc.remove("price");
        assert_eq!(
            validate_document(&schema(), &doc),
            Err(ValidationError::FieldMissing("price".to_owned()))
        );
    }

    #[test]
    fn wrong_type_names_both_types() {
        let mut doc = valid_doc();
        doc.insert("price".to_owned(), Value::Str("9.5".to_owned()));
        assert_eq!(
            validate_document(&schema(), &doc),
            Err(ValidationError::TypeMismatch {
                name: "price".to_owned(),
                expected: "number",
                actual: "string",
            })
        );
    }

    #[test]
    fn timestamp_content_is_not_parsed_here() {
        let mut doc = valid_doc();
        doc.insert("added_at".to_owned(), Value::Str("not a date".to_owned()));
        assert_eq!(validate_document(&schema(), &doc), Ok(()));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let mut doc = valid_doc();
        doc.insert("undeclared".to_owned(), Value::Num(1.0));
        assert_eq!(validate_document(&schema(), &doc), Ok(()));
    }

    #[test]
    fn empty_schema_accepts_anything() {
        let empty = IndexConfig {
            index_name: "t".to_owned(),
            category: vec![],
            fields: Vec::<FieldSpec>::new(),
        };
        assert_eq!(validate_document(&empty, &valid_doc()), Ok(()));
    }
}

use chrono::SecondsFormat;
use tantivy::schema::{
    DateOptions, Field, FieldType as TantivyFieldType, IndexRecordOption, NumericOptions, Schema,
    TextFieldIndexing, TextOptions, STORED, STRING,
};

use crate::config::schema::{FieldType, IndexConfig};
use crate::model::{Document, Value};

/// Raw keyword column holding the caller-facing document id. The leading
/// underscore is reserved; schema validation rejects user fields named this
/// way.
pub const DOC_ID_FIELD: &str = "_id";

/// Tokenizer registered for synonym-flagged fields. Only armed (wired into
/// the field mappings) by a reindex-with-synonyms.
pub const SYNONYM_TOKENIZER: &str = "synonyms";

const DEFAULT_TOKENIZER: &str = "default";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Number,
    Timestamp,
    Bool,
}

impl From<FieldType> for FieldKind {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::String => FieldKind::Str,
            FieldType::Number => FieldKind::Number,
            FieldType::Timestamp => FieldKind::Timestamp,
            FieldType::Bool => FieldKind::Bool,
        }
    }
}

/// One field of the live index: its tantivy handle plus the capabilities the
/// index was built with.
#[derive(Clone, Debug)]
pub struct MappedField {
    pub name: String,
    pub field: Field,
    pub kind: FieldKind,
    pub searchable: bool,
    pub stored: bool,
}

/// The field-mapping table derived from a schema. This is what the engine
/// consults when storing a document or compiling a query; it always mirrors
/// the tantivy schema of the index it belongs to.
#[derive(Clone)]
pub struct Mapping {
    schema: Schema,
    doc_id: Field,
    fields: Vec<MappedField>,
}

impl Mapping {
    /// Builds a fresh mapping from the index schema, used when creating an
    /// index. `with_synonyms` switches synonym-flagged searchable string
    /// fields onto the synonym analyzer.
    pub fn from_config(cfg: &IndexConfig, with_synonyms: bool) -> Self {
        let mut builder = Schema::builder();
        let doc_id = builder.add_text_field(DOC_ID_FIELD, STRING | STORED);

        let mut fields = Vec::with_capacity(cfg.fields.len());
        for spec in &cfg.fields {
            let stored = spec.filterable || spec.sortable;
            let field = match spec.field_type {
                FieldType::String => {
                    let mut opts = TextOptions::default();
                    if spec.searchable {
                        let tokenizer = if with_synonyms && spec.synonym {
                            SYNONYM_TOKENIZER
                        } else {
                            DEFAULT_TOKENIZER
                        };
                        opts = opts.set_indexing_options(
                            TextFieldIndexing::default()
                                .set_tokenizer(tokenizer)
                                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
                        );
                    }
                    if stored {
                        opts = opts.set_stored();
                    }
                    builder.add_text_field(&spec.name, opts)
                }
                FieldType::Number => {
                    let mut opts = NumericOptions::default().set_indexed();
                    if stored {
                        opts = opts.set_stored();
                    }
                    if spec.sortable {
                        opts = opts.set_fast();
                    }
                    builder.add_f64_field(&spec.name, opts)
                }
                FieldType::Timestamp => {
                    let mut opts = DateOptions::default().set_indexed();
                    if stored {
                        opts = opts.set_stored();
                    }
                    if spec.sortable {
                        opts = opts.set_fast();
                    }
                    builder.add_date_field(&spec.name, opts)
                }
                FieldType::Bool => {
                    let mut opts = NumericOptions::default().set_indexed();
                    if stored {
                        opts = opts.set_stored();
                    }
                    if spec.sortable {
                        opts = opts.set_fast();
                    }
                    builder.add_bool_field(&spec.name, opts)
                }
            };
            fields.push(MappedField {
                name: spec.name.clone(),
                field,
                kind: spec.field_type.into(),
                searchable: spec.searchable && spec.field_type == FieldType::String,
                stored,
            });
        }

        Mapping {
            schema: builder.build(),
            doc_id,
            fields,
        }
    }

    /// Re-derives the mapping from the tantivy schema of an index that
    /// already exists on disk. The on-disk index is authoritative: after a
    /// schema update and before the rebuild, the live index still carries
    /// the previous mapping.
    pub fn from_index(schema: &Schema) -> Option<Self> {
        let mut doc_id = None;
        let mut fields = Vec::new();
        for (field, entry) in schema.fields() {
            if entry.name() == DOC_ID_FIELD {
                doc_id = Some(field);
                continue;
            }
            let kind = match entry.field_type() {
                TantivyFieldType::Str(_) => FieldKind::Str,
                TantivyFieldType::F64(_) => FieldKind::Number,
                TantivyFieldType::Date(_) => FieldKind::Timestamp,
                TantivyFieldType::Bool(_) => FieldKind::Bool,
                _ => continue,
            };
            fields.push(MappedField {
                name: entry.name().to_owned(),
                field,
                kind,
                searchable: kind == FieldKind::Str && entry.is_indexed(),
                stored: entry.is_stored(),
            });
        }
        Some(Mapping {
            schema: schema.clone(),
            doc_id: doc_id?,
            fields,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn doc_id(&self) -> Field {
        self.doc_id
    }

    pub fn fields(&self) -> &[MappedField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&MappedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Text fields that contribute postings; the free-text query fans out
    /// over these.
    pub fn searchable_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields
            .iter()
            .filter(|f| f.searchable)
            .map(|f| f.field)
    }

    /// Converts a validated document into a tantivy document. Declared
    /// fields missing from the index mapping (schema updated, rebuild
    /// pending) and undeclared extras are skipped.
    pub fn to_tantivy_doc(
        &self,
        id: &str,
        doc: &Document,
        date_layout: Option<&str>,
    ) -> Result<tantivy::Document, FieldWriteError> {
        let mut out = tantivy::Document::default();
        out.add_text(self.doc_id, id);
        for mapped in &self.fields {
            let Some(value) = doc.get(&mapped.name) else {
                continue;
            };
            match (mapped.kind, value) {
                (FieldKind::Str, Value::Str(s)) => out.add_text(mapped.field, s),
                (FieldKind::Number, Value::Num(n)) => out.add_f64(mapped.field, *n),
                (FieldKind::Bool, Value::Bool(b)) => out.add_bool(mapped.field, *b),
                (FieldKind::Timestamp, Value::Str(s)) => {
                    let ts = parse_timestamp(s, date_layout).map_err(|reason| FieldWriteError {
                        field: mapped.name.clone(),
                        reason,
                    })?;
                    out.add_date(mapped.field, ts)
                }
                (_, other) => {
                    return Err(FieldWriteError {
                        field: mapped.name.clone(),
                        reason: format!("cannot index a {} value here", other.type_name()),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Reconstructs the stored field set of a hit, plus its id.
    pub fn doc_to_document(&self, doc: &tantivy::Document) -> (Option<String>, Document) {
        let id = doc
            .get_first(self.doc_id)
            .and_then(|v| v.as_text())
            .map(str::to_owned);
        let mut fields = Document::new();
        for mapped in self.fields.iter().filter(|f| f.stored) {
            let Some(value) = doc.get_first(mapped.field) else {
                continue;
            };
            let value = match mapped.kind {
                FieldKind::Str => value.as_text().map(|s| Value::Str(s.to_owned())),
                FieldKind::Number => value.as_f64().map(Value::Num),
                FieldKind::Bool => value.as_bool().map(Value::Bool),
                FieldKind::Timestamp => value.as_date().map(|d| {
                    let secs = d.into_timestamp_secs();
                    let rendered = chrono::DateTime::from_timestamp(secs, 0)
                        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
                        .unwrap_or_default();
                    Value::Str(rendered)
                }),
            };
            if let Some(value) = value {
                fields.insert(mapped.name.clone(), value);
            }
        }
        (id, fields)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("field '{field}': {reason}")]
pub struct FieldWriteError {
    pub field: String,
    pub reason: String,
}

/// Parses a timestamp string, honoring the configured layout when one is
/// set and falling back to strict RFC3339.
pub fn parse_timestamp(raw: &str, date_layout: Option<&str>) -> Result<tantivy::DateTime, String> {
    let parsed = match date_layout {
        Some(layout) => chrono::DateTime::parse_from_str(raw, layout),
        None => chrono::DateTime::parse_from_rfc3339(raw),
    }
    .map_err(|err| format!("'{raw}' is not a valid timestamp: {err}"))?;
    Ok(tantivy::DateTime::from_timestamp_micros(
        parsed.timestamp_micros(),
    ))
}

pub mod indexer;
pub mod query;
pub mod schema;
pub mod synonyms;

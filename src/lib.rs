pub mod application;
pub mod config;
pub mod indexes;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod search;
pub mod subscriber;
pub mod validate;
pub mod webserver;

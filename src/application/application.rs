// This is where we define the core application and how it starts up: config
// files are loaded, the engine is opened, and the clients are wired together.

use std::sync::Arc;

use anyhow::Context;
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::config::lifecycle::ConfigStore;
use crate::indexes::indexer::DocIndex;
use crate::ingest::{IngestJob, IngestQueue};
use crate::search::filter::FilterClient;
use crate::search::rank::RankingClient;
use crate::search::SearchClient;

use super::{config::configuration::Configuration, logging::tracing::tracing_subscribe};

static LOGGER_INSTALLED: OnceCell<bool> = OnceCell::new();

#[derive(Clone)]
pub struct Application {
    pub config: Arc<Configuration>,
    pub store: ConfigStore,
    pub index: Arc<DocIndex>,
    pub filters: Arc<FilterClient>,
    pub search: Arc<SearchClient>,
    pub ingest: IngestQueue,
}

impl Application {
    /// Loads the three config files, opens (or creates) the index, and
    /// wires the filter/rank/search clients plus the ingest queue. The
    /// receiver half of the queue goes to the single writer task.
    pub async fn initialize(
        config: Configuration,
    ) -> anyhow::Result<(Self, flume::Receiver<IngestJob>)> {
        let config = Arc::new(config);
        let store = ConfigStore::new(
            config.index_config_path(),
            config.filter_config_path(),
            config.rank_config_path(),
        );

        let index_config = store
            .load_index_config()
            .context("loading the index schema")?;
        let filter_config = store
            .load_filter_config()
            .context("loading the filter catalogue")?;
        let rank_config = store
            .load_rank_config()
            .context("loading the ranking profile")?;

        let index = Arc::new(DocIndex::open(
            &config.index_path,
            index_config,
            store.clone(),
            config.date_layout.clone(),
            config.synonym_config_path(),
        )?);

        let filters = Arc::new(FilterClient::new(filter_config, config.date_layout.clone()));
        let ranking = Arc::new(RankingClient::new(rank_config));
        let search = Arc::new(SearchClient::new(
            index.clone(),
            filters.clone(),
            ranking,
        ));
        let (ingest, ingest_jobs) = IngestQueue::new();

        Ok((
            Self {
                config,
                store,
                index,
                filters,
                search,
                ingest,
            },
            ingest_jobs,
        ))
    }

    pub fn install_logging(config: &Configuration) {
        if let Some(true) = LOGGER_INSTALLED.get() {
            return;
        }

        if !tracing_subscribe(config) {
            warn!("Failed to install tracing_subscriber. There's probably one already...");
        };

        if color_eyre::install().is_err() {
            warn!("Failed to install color-eyre. Oh well...");
        };

        LOGGER_INSTALLED.set(true).unwrap();
    }
}

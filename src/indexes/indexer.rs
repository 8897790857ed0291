use std::fs;
use std::path::{Path, PathBuf};

use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, TantivyError, Term};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::lifecycle::ConfigStore;
use crate::config::schema::{ConfigError, IndexConfig};
use crate::indexes::query::{Hit, QueryError, SearchRequest};
use crate::indexes::schema::{FieldWriteError, Mapping, SYNONYM_TOKENIZER};
use crate::indexes::synonyms::{SynonymConfig, SynonymError, SynonymTokenizer};
use crate::model::Document;
use crate::validate::{self, ValidationError};

use super::query::sort_hits;

/// Page size used when streaming the whole index (get-all, rebuild).
pub const PAGE_SIZE: usize = 10_000;

const WRITER_BUFFER_BYTES: usize = 50_000_000;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("document '{0}' not found")]
    NotFound(String),
    #[error("document failed validation: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot revert the index config after a rebuild")]
    CannotRevertWhenBuilt,
    #[error(transparent)]
    FieldWrite(#[from] FieldWriteError),
    #[error(transparent)]
    Synonyms(#[from] SynonymError),
    #[error(transparent)]
    Tantivy(#[from] TantivyError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

struct EngineState {
    /// The live schema: drives validation and sort checks. After a config
    /// update and before the rebuild it is ahead of `mapping`.
    schema: IndexConfig,
    /// Mapping of the on-disk index. Only replaced by open and rebuild.
    mapping: Mapping,
    index: Index,
    reader: IndexReader,
    is_built: bool,
}

/// The indexed document store. One writer at a time, any number of readers;
/// the writer lease is the state lock held in write mode for the whole
/// operation.
pub struct DocIndex {
    index_dir: PathBuf,
    date_layout: Option<String>,
    synonym_config_path: PathBuf,
    store: ConfigStore,
    state: RwLock<EngineState>,
}

impl DocIndex {
    /// Opens `index_path/<indexName>`, creating a fresh index from the
    /// schema when the directory is missing or unreadable. Failure to
    /// create is fatal to the caller.
    pub fn open(
        index_path: &Path,
        schema: IndexConfig,
        store: ConfigStore,
        date_layout: Option<String>,
        synonym_config_path: PathBuf,
    ) -> Result<Self, EngineError> {
        fs::create_dir_all(index_path)?;
        let index_dir = index_path.join(&schema.index_name);

        let (index, mapping) = match Self::try_open(&index_dir) {
            Ok(index) => match Mapping::from_index(&index.schema()) {
                Some(mapping) => (index, mapping),
                None => {
                    warn!(path = %index_dir.display(), "index has no id column, recreating");
                    Self::create_fresh(&index_dir, &schema)?
                }
            },
            Err(err) => {
                warn!(?err, path = %index_dir.display(), "could not open index, creating a fresh one");
                Self::create_fresh(&index_dir, &schema)?
            }
        };

        let synonyms = SynonymConfig::load_or_default(&synonym_config_path);
        index
            .tokenizers()
            .register(SYNONYM_TOKENIZER, SynonymTokenizer::new(&synonyms));
        let reader = index.reader()?;

        // The sidecar exists exactly while a config update awaits its
        // rebuild.
        let is_built = !store.sidecar_exists();

        Ok(Self {
            index_dir,
            date_layout,
            synonym_config_path,
            store,
            state: RwLock::new(EngineState {
                schema,
                mapping,
                index,
                reader,
                is_built,
            }),
        })
    }

    fn try_open(dir: &Path) -> Result<Index, EngineError> {
        if !dir.exists() {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", dir.display()),
            )));
        }
        Ok(Index::open_in_dir(dir)?)
    }

    fn create_fresh(dir: &Path, schema: &IndexConfig) -> Result<(Index, Mapping), EngineError> {
        let _ = fs::remove_dir_all(dir);
        fs::create_dir_all(dir)?;
        let mapping = Mapping::from_config(schema, false);
        let index = Index::create_in_dir(dir, mapping.schema().clone())?;
        Ok((index, mapping))
    }

    pub async fn add(&self, id: &str, doc: &Document) -> Result<(), EngineError> {
        let state = self.state.write().await;
        validate::validate_document(&state.schema, doc)?;
        let tdoc = state
            .mapping
            .to_tantivy_doc(id, doc, self.date_layout.as_deref())?;
        let mut writer = state
            .index
            .writer_with_num_threads(1, WRITER_BUFFER_BYTES)?;
        writer.add_document(tdoc)?;
        writer.commit()?;
        state.reader.reload()?;
        debug!(%id, "document added");
        Ok(())
    }

    /// Delete-then-insert. A stale or missing previous version does not
    /// abort the insert.
    pub async fn update(&self, id: &str, doc: &Document) -> Result<(), EngineError> {
        let state = self.state.write().await;
        validate::validate_document(&state.schema, doc)?;
        let tdoc = state
            .mapping
            .to_tantivy_doc(id, doc, self.date_layout.as_deref())?;
        let mut writer = state
            .index
            .writer_with_num_threads(1, WRITER_BUFFER_BYTES)?;
        writer.delete_term(Term::from_field_text(state.mapping.doc_id(), id));
        writer.add_document(tdoc)?;
        writer.commit()?;
        state.reader.reload()?;
        debug!(%id, "document updated");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), EngineError> {
        let state = self.state.write().await;
        let mut writer = state
            .index
            .writer_with_num_threads(1, WRITER_BUFFER_BYTES)?;
        writer.delete_term(Term::from_field_text(state.mapping.doc_id(), id));
        writer.commit()?;
        state.reader.reload()?;
        debug!(%id, "document deleted");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>, EngineError> {
        let state = self.state.read().await;
        let searcher = state.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(state.mapping.doc_id(), id),
            IndexRecordOption::Basic,
        );
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.first() {
            None => Ok(None),
            Some((_, addr)) => {
                let doc = searcher.doc(*addr)?;
                Ok(Some(state.mapping.doc_to_document(&doc).1))
            }
        }
    }

    /// Streams every document, paging until the total is covered.
    pub async fn get_all(&self) -> Result<Vec<(String, Document)>, EngineError> {
        let state = self.state.read().await;
        let searcher = state.reader.searcher();
        let mut results = Vec::new();
        let mut from = 0usize;
        loop {
            let (page, total) = searcher.search(
                &AllQuery,
                &(TopDocs::with_limit(PAGE_SIZE).and_offset(from), Count),
            )?;
            for (_, addr) in page {
                let doc = searcher.doc(addr)?;
                let (id, fields) = state.mapping.doc_to_document(&doc);
                if let Some(id) = id {
                    results.push((id, fields));
                }
            }
            if total <= from + PAGE_SIZE {
                break;
            }
            from += PAGE_SIZE;
        }
        Ok(results)
    }

    /// Compiles a request against the live mapping and schema, executes it,
    /// and returns hits ordered by the request's sort keys. Compilation and
    /// execution happen under one reader lease so a concurrent rebuild
    /// cannot swap the mapping in between.
    pub async fn search_with<F>(&self, build: F) -> Result<Vec<Hit>, EngineError>
    where
        F: FnOnce(&Mapping, &IndexConfig) -> Result<SearchRequest, QueryError>,
    {
        let state = self.state.read().await;
        let request = build(&state.mapping, &state.schema)?;
        let searcher = state.reader.searcher();
        let top = searcher.search(&*request.query, &TopDocs::with_limit(PAGE_SIZE))?;
        let mut hits = Vec::with_capacity(top.len());
        for (score, addr) in top {
            let doc = searcher.doc(addr)?;
            let (id, fields) = state.mapping.doc_to_document(&doc);
            let Some(id) = id else { continue };
            hits.push(Hit { id, score, fields });
        }
        sort_hits(&mut hits, &request.sort);
        hits.truncate(request.limit);
        Ok(hits)
    }

    /// Regenerates the on-disk index from the current schema using the
    /// existing documents.
    pub async fn rebuild(&self) -> Result<(), EngineError> {
        self.rebuild_index(false).await
    }

    /// Rebuild variant that additionally installs the synonym dictionary:
    /// synonym-flagged fields are re-analyzed through the synonym source.
    pub async fn reindex_with_synonyms(&self) -> Result<(), EngineError> {
        self.rebuild_index(true).await
    }

    async fn rebuild_index(&self, with_synonyms: bool) -> Result<(), EngineError> {
        let tmp_dir = self.tmp_dir();
        let shadow = match self.build_shadow(&tmp_dir, with_synonyms).await {
            Ok(shadow) => shadow,
            Err(err) => {
                // Any failure before the swap leaves the live directory
                // untouched; the engine stays dirty and the caller may retry.
                let _ = fs::remove_dir_all(&tmp_dir);
                return Err(err);
            }
        };

        let id: u64 = rand::random();
        debug!(id, "waiting for the writer lease to swap the index in");
        let mut state = self.state.write().await;
        debug!(id, "lease acquired");
        match self.swap_in(&tmp_dir, &state.schema, shadow.tokenizer) {
            Ok((index, mapping, reader)) => {
                state.index = index;
                state.mapping = mapping;
                state.reader = reader;
                state.is_built = true;
                self.store.remove_sidecar()?;
                info!(count = shadow.documents, "index rebuilt");
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_dir_all(&tmp_dir);
                Err(err)
            }
        }
    }

    fn tmp_dir(&self) -> PathBuf {
        let mut path = self.index_dir.clone().into_os_string();
        path.push("_tmp");
        PathBuf::from(path)
    }

    /// Builds the shadow index under `…_tmp`. The reader lease is held only
    /// long enough to grab a searcher; the searcher pins its segments, so
    /// documents stream from a consistent snapshot while reads and writes
    /// keep flowing against the live index.
    async fn build_shadow(
        &self,
        tmp_dir: &Path,
        with_synonyms: bool,
    ) -> Result<ShadowIndex, EngineError> {
        let _ = fs::remove_dir_all(tmp_dir);

        let tokenizer = if with_synonyms {
            SynonymTokenizer::new(&SynonymConfig::load(&self.synonym_config_path)?)
        } else {
            SynonymTokenizer::new(&SynonymConfig::load_or_default(&self.synonym_config_path))
        };

        let (old_mapping, schema, searcher) = {
            let state = self.state.read().await;
            (
                state.mapping.clone(),
                state.schema.clone(),
                state.reader.searcher(),
            )
        };
        let new_mapping = Mapping::from_config(&schema, with_synonyms);

        fs::create_dir_all(tmp_dir)?;
        let new_index = Index::create_in_dir(tmp_dir, new_mapping.schema().clone())?;
        new_index
            .tokenizers()
            .register(SYNONYM_TOKENIZER, tokenizer.clone());
        let mut writer = new_index.writer_with_num_threads(1, WRITER_BUFFER_BYTES)?;

        let mut from = 0usize;
        let mut count = 0u64;
        loop {
            let (page, total) = searcher.search(
                &AllQuery,
                &(TopDocs::with_limit(PAGE_SIZE).and_offset(from), Count),
            )?;
            for (_, addr) in page {
                let doc = searcher.doc(addr)?;
                let (id, fields) = old_mapping.doc_to_document(&doc);
                let Some(id) = id else { continue };
                match new_mapping.to_tantivy_doc(&id, &fields, self.date_layout.as_deref()) {
                    Ok(tdoc) => {
                        writer.add_document(tdoc)?;
                        count += 1;
                        if count % 1000 == 0 {
                            info!(count, "reindexed documents");
                        }
                    }
                    Err(err) => warn!(%id, ?err, "skipping document during rebuild"),
                }
            }
            if total <= from + PAGE_SIZE {
                break;
            }
            from += PAGE_SIZE;
        }

        writer.commit()?;
        writer.wait_merging_threads()?;
        debug!(count, path = %tmp_dir.display(), "shadow index ready");
        Ok(ShadowIndex {
            documents: count,
            tokenizer,
        })
    }

    /// The atomic part: drop the live directory, move the shadow into its
    /// place, reopen. Called under the writer lease with no readers left.
    fn swap_in(
        &self,
        tmp_dir: &Path,
        schema: &IndexConfig,
        tokenizer: SynonymTokenizer,
    ) -> Result<(Index, Mapping, IndexReader), EngineError> {
        fs::remove_dir_all(&self.index_dir)?;
        fs::rename(tmp_dir, &self.index_dir)?;
        let index = Index::open_in_dir(&self.index_dir)?;
        index.tokenizers().register(SYNONYM_TOKENIZER, tokenizer);
        let mapping = Mapping::from_index(&index.schema())
            .unwrap_or_else(|| Mapping::from_config(schema, false));
        let reader = index.reader()?;
        Ok((index, mapping, reader))
    }

    /// Accepts new schema bytes, keeps the previous schema as the revert
    /// sidecar, and arms the needs-rebuild flag. The live index keeps its
    /// current mapping until the rebuild runs.
    pub async fn update_schema(&self, bytes: &[u8]) -> Result<(), EngineError> {
        let new_schema: IndexConfig = serde_json::from_slice(bytes).map_err(ConfigError::Parse)?;
        new_schema.validate()?;

        let mut state = self.state.write().await;
        if state.is_built {
            self.store.save_sidecar()?;
        }
        self.store.write_index_config(bytes)?;
        state.schema = new_schema;
        state.is_built = false;
        info!("index config updated, rebuild required");
        Ok(())
    }

    /// Puts the sidecar schema back. Only permitted while no rebuild has
    /// consumed the pending config change.
    pub async fn revert_schema(&self) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        if state.is_built {
            return Err(EngineError::CannotRevertWhenBuilt);
        }
        let (previous, bytes) = self.store.read_sidecar()?;
        self.store.write_index_config(&bytes)?;
        self.store.remove_sidecar()?;
        state.schema = previous;
        state.is_built = true;
        info!("index config reverted");
        Ok(())
    }

    pub async fn is_built(&self) -> bool {
        self.state.read().await.is_built
    }

    pub async fn set_needs_rebuild(&self) {
        self.state.write().await.is_built = false;
    }

    pub async fn mark_built(&self) {
        self.state.write().await.is_built = true;
    }

    pub async fn schema(&self) -> IndexConfig {
        self.state.read().await.schema.clone()
    }

    /// Field-name → zero-value template for the live schema.
    pub async fn index_struct(&self) -> Document {
        let state = self.state.read().await;
        state
            .schema
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type.zero_value()))
            .collect()
    }
}

struct ShadowIndex {
    documents: u64,
    tokenizer: SynonymTokenizer,
}

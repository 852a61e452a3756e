//! Application context wiring

use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::{Result, StashError};
use crate::search::store::VectorStorage;
use crate::search::{ConsistencyManager, EmbeddingStore, SearchOrchestrator, build_embedder};
use crate::storage::Database;

/// Shared services, constructed once per process
pub struct AppContext {
    pub data_root: PathBuf,
    pub config: Config,
    pub db: Arc<Database>,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub consistency: ConsistencyManager,
    pub json_output: bool,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Config::load(cli.config.as_deref())?;
        if let Some(dir) = &cli.data_dir {
            config.storage.data_dir = Some(dir.clone());
        }

        let data_root = resolve_data_root(&config)?;
        let db = Arc::new(Database::open(data_root.join("pagestash.db"))?);

        let embedder = Arc::from(build_embedder(&config.embedding)?);
        let store = Arc::new(EmbeddingStore::new(
            Arc::clone(&db) as Arc<dyn VectorStorage>
        ));
        store.load_all();

        let orchestrator = Arc::new(SearchOrchestrator::new(
            embedder,
            store,
            config.search.clone(),
        ));
        let consistency = ConsistencyManager::new(Arc::clone(&orchestrator));

        Ok(Self {
            data_root,
            config,
            db,
            orchestrator,
            consistency,
            json_output: cli.json,
        })
    }
}

fn resolve_data_root(config: &Config) -> Result<PathBuf> {
    if let Some(dir) = &config.storage.data_dir {
        return Ok(dir.clone());
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| StashError::MissingConfig("data directory not found".to_string()))?;
    Ok(data_dir.join("pagestash"))
}

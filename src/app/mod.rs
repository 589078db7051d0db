pub mod desk;

pub use desk::{DeskResponse, RegistrationDesk};

use crate::adapters::{QueuedSink, SqliteStore, TracingSink, TtlCache};
use crate::config::toml_config::AppConfig;
use crate::domain::ports::NotificationSink;
use crate::domain::services::{CatalogService, RegistrationService};
use crate::utils::error::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub type SharedCache = Arc<TtlCache>;
pub type SharedSink = Arc<dyn NotificationSink>;

/// Everything wired together at startup. Holds the only cache and sink
/// instances; services receive shared handles to them.
pub struct App {
    pub store: SqliteStore,
    pub cache: SharedCache,
    pub catalog: CatalogService<SqliteStore, SharedCache, SharedSink>,
    pub desk: RegistrationDesk<SqliteStore, SharedCache, SharedSink>,
    notifier: Option<JoinHandle<()>>,
    sweeper: Option<JoinHandle<()>>,
}

impl App {
    /// Opens the store and starts the notification worker and cache sweeper.
    /// Needs a running tokio runtime.
    pub async fn build(config: &AppConfig) -> Result<Self> {
        let store = if config.is_in_memory() {
            SqliteStore::open_in_memory()?
        } else {
            SqliteStore::open(&config.database.path, config.busy_timeout())?
        };

        let cache: SharedCache = Arc::new(TtlCache::with_capacity(
            config.cache_ttl(),
            config.cache.max_entries,
        ));
        let sweeper = TtlCache::spawn_sweeper(&cache, config.cache_sweep_interval());

        let mut notifier = None;
        let sink: SharedSink = if config.notifications.queued {
            let (queued, worker) =
                QueuedSink::spawn(TracingSink, config.notifications.queue_capacity);
            notifier = Some(worker);
            Arc::new(queued)
        } else {
            Arc::new(TracingSink)
        };

        tracing::debug!(
            database = %config.database.path,
            cache_ttl_secs = config.cache.ttl_seconds,
            cache_max_entries = config.cache.max_entries,
            queued_notifications = config.notifications.queued,
            "Registry wired"
        );

        let mut app = Self::assemble(store, cache, sink, notifier);
        app.sweeper = Some(sweeper);
        Ok(app)
    }

    /// Wires services around components built elsewhere, e.g. a custom sink.
    pub fn with_components(store: SqliteStore, cache: SharedCache, sink: SharedSink) -> Self {
        Self::assemble(store, cache, sink, None)
    }

    fn assemble(
        store: SqliteStore,
        cache: SharedCache,
        sink: SharedSink,
        notifier: Option<JoinHandle<()>>,
    ) -> Self {
        let catalog = CatalogService::new(store.clone(), Arc::clone(&cache), Arc::clone(&sink));
        let service = RegistrationService::new(store.clone(), Arc::clone(&cache), sink);
        Self {
            store,
            cache,
            catalog,
            desk: RegistrationDesk::new(service),
            notifier,
            sweeper: None,
        }
    }

    /// Stops the cache sweeper, drops the services' sink handles and waits
    /// for queued notifications to drain.
    pub async fn shutdown(self) {
        let Self {
            catalog,
            desk,
            notifier,
            sweeper,
            ..
        } = self;
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        drop(catalog);
        drop(desk);
        if let Some(worker) = notifier {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Notification worker ended abnormally");
            }
        }
    }
}

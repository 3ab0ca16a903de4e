//! Wires the record store, change notifier, cache and services together.

use std::sync::Arc;

use dictsync_cache::{
    DictCache, DictDataService, DictRefreshService, DynChangeNotifier, LocalChangeNotifier,
    SnapshotBuilder,
};
use dictsync_db_memory::{InMemoryDictStore, InMemoryDictTypeStore};
use dictsync_db_postgres::{
    PgChangeNotifier, PostgresDictStore, PostgresDictTypeStore, PostgresError,
};
use dictsync_storage::{DynDictDataStore, DynDictTypeStore, StorageError};
use tokio::task::JoinHandle;

use crate::config::{AppConfig, StorageBackend};

/// Errors that can occur while starting the runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Postgres(#[from] PostgresError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

struct Backend {
    store: DynDictDataStore,
    types: DynDictTypeStore,
    notifier: DynChangeNotifier,
    listener: Option<JoinHandle<()>>,
}

/// Running dictionary components of one process.
pub struct DictRuntime {
    cache: DictCache,
    service: Arc<DictDataService>,
    refresh: Arc<DictRefreshService>,
    scheduler: JoinHandle<()>,
    listener: Option<JoinHandle<()>>,
}

impl DictRuntime {
    /// Builds every component for the configured backend, loads the cache
    /// and starts the background tasks.
    ///
    /// The initial load never fails the start: an unreachable store leaves
    /// the cache empty until the next trigger.
    ///
    /// # Errors
    ///
    /// Returns an error if the postgres pool cannot be created or migrated,
    /// or if seeding dictionary types fails.
    pub async fn start(config: &AppConfig) -> Result<Self, RuntimeError> {
        let backend = match config.storage.backend {
            StorageBackend::Memory => memory_backend(config),
            StorageBackend::Postgres => postgres_backend(config).await?,
        };
        tracing::info!(
            backend = backend.store.backend_name(),
            label_scope = ?config.dict.label_scope,
            refresh_interval_secs = config.dict.refresh_interval_secs,
            "Starting dictionary runtime"
        );

        let cache = DictCache::new();
        let refresh = Arc::new(DictRefreshService::new(
            SnapshotBuilder::new(backend.store.clone()),
            cache.clone(),
            backend.notifier.clone(),
            config.dict.refresh_config(),
        ));
        let service = Arc::new(
            DictDataService::new(
                backend.store,
                backend.types,
                cache.clone(),
                backend.notifier,
            )
            .with_label_scope(config.dict.label_scope),
        );

        refresh.init().await;
        let scheduler = refresh.clone().spawn();

        Ok(Self {
            cache,
            service,
            refresh,
            scheduler,
            listener: backend.listener,
        })
    }

    pub fn cache(&self) -> &DictCache {
        &self.cache
    }

    pub fn service(&self) -> &Arc<DictDataService> {
        &self.service
    }

    pub fn refresh(&self) -> &Arc<DictRefreshService> {
        &self.refresh
    }

    /// Stops the scheduler and the change listener.
    pub async fn shutdown(self) {
        self.refresh.shutdown();
        if let Err(e) = self.scheduler.await {
            tracing::warn!(error = %e, "Dictionary refresh task ended abnormally");
        }
        if let Some(listener) = self.listener {
            listener.abort();
        }
        tracing::info!(stats = ?self.refresh.stats(), "Dictionary runtime stopped");
    }
}

fn memory_backend(config: &AppConfig) -> Backend {
    let types = InMemoryDictTypeStore::with_types(config.dict.seed_types.iter().cloned());
    Backend {
        store: Arc::new(InMemoryDictStore::new()),
        types: Arc::new(types),
        notifier: Arc::new(LocalChangeNotifier::new()),
        listener: None,
    }
}

async fn postgres_backend(config: &AppConfig) -> Result<Backend, RuntimeError> {
    let pool = dictsync_db_postgres::connect(&config.storage.postgres).await?;

    let types = PostgresDictTypeStore::new(pool.clone());
    for info in &config.dict.seed_types {
        types.upsert_type(info).await?;
    }

    let notifier = Arc::new(PgChangeNotifier::new(
        pool.clone(),
        config.dict.notify_channel.clone(),
    ));
    let listener = notifier.clone().start();

    Ok(Backend {
        store: Arc::new(PostgresDictStore::new(pool)),
        types: Arc::new(types),
        notifier,
        listener: Some(listener),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dictsync_storage::{CommonStatus, DictTypeInfo, NewDictData};
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_runtime_round_trip() {
        let mut config = AppConfig::default();
        config
            .dict
            .seed_types
            .push(DictTypeInfo::new("gender", CommonStatus::Enabled));

        let runtime = DictRuntime::start(&config).await.unwrap();
        assert!(!runtime.cache().is_ready());

        runtime
            .service()
            .create_dict_data(NewDictData::new("gender", "Male", "1"))
            .await
            .unwrap();

        for _ in 0..100 {
            if runtime.cache().is_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            runtime
                .service()
                .get_dict_data_from_cache("gender", "1")
                .unwrap()
                .label,
            "Male"
        );
        assert_eq!(runtime.refresh().stats().published, 1);

        runtime.shutdown().await;
    }
}

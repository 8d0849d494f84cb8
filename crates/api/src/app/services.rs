use std::sync::Arc;

use idlink_contacts::{ClusterView, IdentifyRequest};
use idlink_infra::{
    AppConfig, ContactStore, ContactStoreError, IdentityResolver, InMemoryContactStore,
    MergeStrategy, PostgresContactStore, ResolveError,
};

/// Type-erased store so in-memory and Postgres deployments share one resolver type.
pub type SharedContactStore = Arc<dyn ContactStore>;

pub type Resolver = IdentityResolver<SharedContactStore>;

/// Everything the handlers need, shared through an `Extension`.
pub struct AppServices {
    resolver: Resolver,
    store_kind: &'static str,
}

impl AppServices {
    pub fn new(store: SharedContactStore, store_kind: &'static str, strategy: MergeStrategy) -> Self {
        Self {
            resolver: IdentityResolver::new(store).with_merge_strategy(strategy),
            store_kind,
        }
    }

    /// In-memory store, default merge strategy.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryContactStore::new()),
            "in_memory",
            MergeStrategy::default(),
        )
    }

    pub async fn identify(&self, request: &IdentifyRequest) -> Result<ClusterView, ResolveError> {
        self.resolver.resolve(request).await
    }

    pub fn store_kind(&self) -> &'static str {
        self.store_kind
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        self.resolver.merge_strategy()
    }
}

/// Build services from configuration: Postgres when `DATABASE_URL` is set,
/// in-memory otherwise.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, ContactStoreError> {
    let services = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresContactStore::connect(url).await?;
            AppServices::new(Arc::new(store), "postgres", config.merge_strategy)
        }
        None => AppServices::new(
            Arc::new(InMemoryContactStore::new()),
            "in_memory",
            config.merge_strategy,
        ),
    };

    tracing::info!(
        store = services.store_kind(),
        merge_strategy = services.merge_strategy().as_str(),
        "services ready"
    );
    Ok(services)
}

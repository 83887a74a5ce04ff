//! Service wiring: token service, revocation store, and the in-memory
//! account and ownership collaborators.

use std::sync::Arc;

use scribe_auth::{Authenticator, KeyStore, TokenConfig, TokenConfigError, TokenService};
use scribe_infra::directory::{DirectoryError, InMemoryOwnerRegistry, InMemoryUserDirectory, NewUser};
use scribe_infra::key_store::InMemoryKeyStore;
use scribe_infra::{AdminAccount, Settings};

pub type SharedKeyStore = Arc<dyn KeyStore>;

pub struct AppServices {
    pub tokens: Arc<TokenService<SharedKeyStore>>,
    pub authenticator: Authenticator<SharedKeyStore>,
    pub users: Arc<InMemoryUserDirectory>,
    pub owners: Arc<InMemoryOwnerRegistry>,
}

impl AppServices {
    pub fn new(config: &TokenConfig, store: SharedKeyStore) -> Result<Self, TokenConfigError> {
        let tokens = Arc::new(TokenService::new(config, store)?);
        let users = Arc::new(InMemoryUserDirectory::new());
        let authenticator = Authenticator::new(tokens.clone(), users.clone());

        Ok(Self {
            tokens,
            authenticator,
            users,
            owners: Arc::new(InMemoryOwnerRegistry::new()),
        })
    }

    /// Everything in process memory, revocations included.
    pub fn in_memory(config: &TokenConfig) -> Result<Self, TokenConfigError> {
        Self::new(config, Arc::new(InMemoryKeyStore::new()))
    }

    pub fn seed_admin(&self, account: &AdminAccount) -> Result<(), DirectoryError> {
        if self.users.get_by_email(&account.email)?.is_some() {
            return Ok(());
        }
        self.users.register(
            NewUser::new(&account.email, &account.password).with_role(scribe_auth::Role::Admin),
        )?;
        tracing::info!(email = %account.email, "seeded admin account");
        Ok(())
    }
}

/// Build services from settings, connecting to Redis when `USE_REDIS` is set.
pub async fn build_services(settings: &Settings) -> anyhow::Result<AppServices> {
    let store = key_store(settings).await?;
    let services = AppServices::new(&settings.token, store)?;

    if let Some(admin) = &settings.bootstrap_admin {
        services.seed_admin(admin)?;
    }

    Ok(services)
}

#[cfg(feature = "redis")]
async fn key_store(settings: &Settings) -> anyhow::Result<SharedKeyStore> {
    if !settings.use_redis {
        tracing::warn!("USE_REDIS not set; revocations are held in process memory");
        return Ok(Arc::new(InMemoryKeyStore::new()));
    }

    let store = scribe_infra::key_store::RedisKeyStore::new(settings.redis_url())?;
    store.ping().await?;
    tracing::info!(
        host = %settings.redis.host,
        port = settings.redis.port,
        db = settings.redis.db,
        "connected to redis revocation store"
    );
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn key_store(settings: &Settings) -> anyhow::Result<SharedKeyStore> {
    if settings.use_redis {
        anyhow::bail!("USE_REDIS is set but this build lacks the `redis` feature");
    }
    tracing::warn!("revocations are held in process memory");
    Ok(Arc::new(InMemoryKeyStore::new()))
}

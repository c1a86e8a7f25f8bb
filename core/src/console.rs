//! Startup wiring.
//!
//! `Console` is built once when the application starts and handed to every
//! consumer that needs backend access or the current session. There is no
//! global session state.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::{ClientConfig, ConfigError};
use crate::executor::ReqwestExecutor;
use crate::gateway::Gateway;
use crate::session::{Session, SessionManager};
use crate::store::{FileStore, MemoryStore, SessionStore};
use crate::transport::{HttpExecutor, Transport};

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// The session store a `Console` was configured with.
pub type DynStore = Box<dyn SessionStore>;

/// Gateway plus session manager sharing one transport.
pub struct Console {
    gateway: Gateway,
    session: SessionManager<Gateway, DynStore>,
}

impl Console {
    /// Wire the default `reqwest` executor and the configured store.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConsoleError> {
        let executor = ReqwestExecutor::new(&config.user_agent)?;
        let store: DynStore = match &config.session_dir {
            Some(dir) => Box::new(FileStore::for_origin(dir, &config.base_url)),
            None => Box::new(MemoryStore::new()),
        };
        info!(
            base_url = %config.base_url,
            persisted = config.session_dir.is_some(),
            "console configured"
        );
        Ok(Self::with_parts(&config.base_url, Arc::new(executor), store))
    }

    pub fn with_parts(base_url: &str, executor: Arc<dyn HttpExecutor>, store: DynStore) -> Self {
        let gateway = Gateway::new(Transport::new(base_url, executor));
        let session = SessionManager::new(gateway.clone(), store);
        Self { gateway, session }
    }

    /// Re-validate the persisted session against the backend.
    pub async fn start(&self) -> Session {
        self.session.start().await
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn session(&self) -> &SessionManager<Gateway, DynStore> {
        &self.session
    }
}

use crate::config::Config;
use crate::error::{FilehubError, Result};
use std::sync::Arc;
use storage::{AccountService, DiskStore, MetadataStore};
use tracing::{error, info};

/// A running FileHub instance: metadata database, file directory and HTTP server.
pub struct Node {
    config: Config,
    api_server: Arc<api::Server>,
}

impl Node {
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing FileHub at {}", config.bind_address());

        let metadata = Arc::new(MetadataStore::open(&config.database_path).await?);
        let store = Arc::new(DiskStore::open(&config.file_directory).await?);
        let accounts = Arc::new(AccountService::new(metadata.clone(), config.account_settings()));

        let api_server = Arc::new(api::Server::new(
            config.clone().into(),
            metadata,
            store,
            accounts,
        ));

        Ok(Self { config, api_server })
    }

    pub async fn start(self) -> Result<()> {
        info!("Starting FileHub services on {}", self.config.bind_address());

        let api_task = {
            let api = self.api_server.clone();
            tokio::spawn(async move { api.start().await })
        };

        tokio::select! {
            result = api_task => {
                error!("API server stopped: {:?}", result);
                match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.into()),
                    Err(e) => Err(FilehubError::Server(format!("API server task failed: {}", e))),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }
}

/// Marks an account as confirmed. Returns `false` when the username is unknown.
pub async fn confirm_account(config: &Config, username: &str) -> Result<bool> {
    let metadata = Arc::new(MetadataStore::open(&config.database_path).await?);
    let accounts = AccountService::new(metadata, config.account_settings());
    Ok(accounts.confirm_account(username).await?)
}

use crate::config::ImageConfig;
use crate::services::entity::EntityClient;
use crate::services::image_store::HttpImageStore;
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

/// Builds the shared HTTP client used for storage and entity requests
pub fn http_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub fn setup_storage(config: &ImageConfig, client: Client) -> Arc<HttpImageStore> {
    info!("☁️  Image storage: {}/image", config.storage_endpoint);

    Arc::new(
        HttpImageStore::new(client, config.storage_endpoint.clone())
            .with_session_cookie(config.session_cookie.clone()),
    )
}

pub fn setup_entity_client(config: &ImageConfig, client: Client) -> EntityClient {
    EntityClient::new(client, config.storage_endpoint.clone())
        .with_session_cookie(config.session_cookie.clone())
}

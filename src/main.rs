use anyhow::{Context, Result};
use roadmap_rag::{
    advisor::AdvisorService, api, config, generation::GeminiClient, logging,
    store::QdrantCatalogStore,
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    config::init_config();
    logging::init_tracing("roadmap-rag");
    let config = config::get_config();

    let store = QdrantCatalogStore::connect(None)
        .await
        .context("Failed to connect to the catalog store")?;
    let generator = GeminiClient::from_config().context("Failed to configure Gemini")?;
    let service = AdvisorService::new(Arc::new(store), Arc::new(generator));
    let cors = api::cors_layer(config.cors_allowed_origins.as_deref());
    let app = api::create_router(Arc::new(service), cors);

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.server_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.server_port))?;
    tracing::info!("Listening on http://0.0.0.0:{}", config.server_port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

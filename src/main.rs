use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use cvlink::ai::openai::OpenAiAnalyzer;
use cvlink::auth::jwt::JwtService;
use cvlink::config::AppConfig;
use cvlink::db;
use cvlink::extract::PdfExtractor;
use cvlink::routes::create_router;
use cvlink::state::AppState;
use cvlink::storage::S3Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        s3_bucket = %config.s3_bucket,
        openai_enabled = config.openai_endpoint.is_some(),
        "loaded cvlink configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let storage = Arc::new(S3Storage::from_config(&config).await?);
    let extractor = Arc::new(PdfExtractor::new());
    let analyzer = Arc::new(OpenAiAnalyzer::from_config(&config)?);
    let jwt = JwtService::from_config(&config)?;

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;

    let state = AppState::new(pool, config, storage, extractor, analyzer, jwt);
    let router = create_router(state);

    tracing::info!(%listen_addr, "cvlink api listening");
    let listener = TcpListener::bind(listen_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("api received shutdown signal");
        })
        .await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

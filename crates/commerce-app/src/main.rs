use commerce_hex::application::CommerceServices;
use commerce_hex::config::Config;
use commerce_hex::inbound::http::{HttpServer, HttpServerConfig};
use commerce_repo::{build_repo, Repo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for DATABASE_URL / SERVER_PORT when present.
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(config.log_filter.as_str())
        .init();

    let repo: Repo = build_repo(config.database_url.as_deref()).await?;
    tracing::info!(backend = repo.backend(), "repository ready");

    let services = CommerceServices::new(repo);
    services
        .statuses
        .seed_defaults()
        .await
        .map_err(|e| anyhow::anyhow!("seeding order statuses failed: {e}"))?;

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };
    HttpServer::new(services, server_cfg).run().await
}

use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod game;
mod protocol;
mod room_runtime;
mod shared;
mod transport;

use config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let config = ServerConfig::parse()?;
  room_runtime::run(config).await
}

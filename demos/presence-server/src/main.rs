use anyhow::Context;
use plaza::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "presence_server=info,plaza=info,plaza_session=info,plaza_room=info,plaza_transport=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("loading configuration")?;
    let spaces = config.load_spaces().context("loading space catalog")?;
    let verifier = JwtVerifier::hs256(config.jwt_secret.as_bytes());

    let server = PlazaServer::builder()
        .bind(&config.bind_addr)
        .build(verifier, spaces)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    println!("Plaza presence server on ws://{}", server.local_addr()?);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

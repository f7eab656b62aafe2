//! `idp-token`: acquire one access token using settings from the environment
//! and print it as JSON on stdout.
//!
//! Logs go to stderr. `RUST_LOG` controls the filter (default
//! `idp_client=info`); `IDP_LOG_FORMAT=json` switches to JSON log lines.

use anyhow::Context;
use common::secret::ExposeSecret;
use idp_client::bootstrap::IdpComponents;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

fn init_tracing() {
    let json = std::env::var("IDP_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idp_client=info".into()),
        )
        .with(layer)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let components = IdpComponents::from_env().map_err(|e| {
        error!("Failed to compose IdP client: {}", e);
        e
    })?;

    info!("Requesting access token from {}", components.client.token_endpoint());

    let token = components
        .client
        .exchange_client_assertion()
        .await
        .context("token exchange failed")?;

    let output = serde_json::json!({
        "access_token": token.access_token().expose_secret(),
        "token_type": token.token_type(),
        "expires_at": token.expires_at().to_rfc3339(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

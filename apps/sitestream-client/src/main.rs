//! Site Stream Client Binary
//!
//! Authorizes against the provider (PIN flow) when no access token is
//! configured, then opens a site stream and writes every delivered record
//! to stdout as one JSON line.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sitestream-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `SITESTREAM_CONSUMER_KEY`: consumer key
//! - `SITESTREAM_CONSUMER_SECRET`: consumer secret
//!
//! ## Optional
//! - `SITESTREAM_ACCESS_TOKEN` / `SITESTREAM_ACCESS_TOKEN_SECRET`: skip authorization
//! - `SITESTREAM_FOLLOW`: comma-separated user ids (default: the authorizing user)
//! - `SITESTREAM_CALLBACK`: callback URL (default: oob)
//! - `SITESTREAM_RETRY_INTERVAL_MS`: reconnect interval (default: 10000)
//! - `SITESTREAM_DELIVERY_CAPACITY`: record channel capacity (default: 1024)
//! - `SITESTREAM_HTTP_CONNECT_TIMEOUT_SECS`: connect timeout (default: 30)
//! - `SITESTREAM_*_URL`: endpoint overrides
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `RUST_LOG`: Log filter (default: `sitestream_client=info`)

use anyhow::{Context, bail};
use sitestream_client::infrastructure::telemetry;
use sitestream_client::{AccessToken, ClientConfig, OAuthClient, StreamRecord, Token};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting site-stream client");

    let config = ClientConfig::from_env().context("failed to load configuration")?;
    log_config(&config);

    let mut client = OAuthClient::from_config(&config).context("failed to build client")?;

    let (token, follow) = if let Some(token) = config.access_token.clone() {
        (token, config.follow.clone())
    } else {
        let access = authorize(&client, &config.callback).await?;
        let follow = if config.follow.is_empty() {
            vec![
                access
                    .user_id
                    .parse::<u64>()
                    .context("provider returned a non-numeric user id")?,
            ]
        } else {
            config.follow.clone()
        };
        (access.token, follow)
    };

    if follow.is_empty() {
        bail!("SITESTREAM_FOLLOW must list at least one user id");
    }

    let mut records = client
        .take_records()
        .context("record channel already taken")?;

    client
        .site_stream(&token, &follow)
        .await
        .context("failed to open site stream")?;

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => break,
            record = records.recv() => match record {
                Some(record) => emit(&record),
                None => {
                    tracing::warn!("Record channel closed");
                    break;
                }
            },
        }
    }

    client.close().await;
    tracing::info!("Site-stream client stopped");

    Ok(())
}

/// Run the out-of-band PIN flow and print the resulting access token.
async fn authorize(client: &OAuthClient, callback: &str) -> anyhow::Result<AccessToken> {
    let request_token = client
        .request_token(callback)
        .await
        .context("request token call failed")?;

    if !request_token.callback_confirmed {
        tracing::warn!(callback, "Provider did not confirm the callback URL");
    }

    println!("Authorize this application at:");
    println!("  {}", client.authorize_url(&request_token));
    println!("Then enter the PIN:");

    let mut verifier = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut verifier)
        .await
        .context("failed to read verifier")?;

    let access = client
        .access_token(&request_token, verifier.trim())
        .await
        .context("access token call failed")?;

    print_access_token(&access.token);

    Ok(access)
}

fn print_access_token(token: &Token) {
    println!("Access token obtained; set these to skip authorization next time:");
    println!("  SITESTREAM_ACCESS_TOKEN={}", token.token());
    println!("  SITESTREAM_ACCESS_TOKEN_SECRET={}", token.secret());
}

fn emit(record: &StreamRecord) {
    tracing::debug!(id = record.id(), for_user = ?record.for_user(), "Record received");
    println!("{}", record.payload());
}

/// Load environment variables from .env file.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        has_access_token = config.access_token.is_some(),
        follow = config.follow.len(),
        retry_interval_ms = u64::try_from(config.stream.retry_interval.as_millis()).unwrap_or(u64::MAX),
        delivery_capacity = config.stream.delivery_capacity,
        "Configuration loaded"
    );
    tracing::debug!(
        request_token_url = %config.endpoints.request_token_url,
        access_token_url = %config.endpoints.access_token_url,
        stream_url = %config.endpoints.stream_url,
        "Provider endpoints"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}

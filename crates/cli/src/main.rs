//! exrelay command-line front end.
//!
//! Issues one call through an exchange client and prints the resulting
//! envelope as pretty JSON. Exits with status 1 when the call failed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use exrelay_core::config::AppConfig;
use exrelay_core::types::{Exchange, HttpMethod, Params};
use exrelay_execution::{BinanceRestClient, CoinbaseRestClient, ExchangeClient};

/// Signed, retried calls against Binance and Coinbase REST APIs.
#[derive(Parser, Debug)]
#[command(name = "exrelay", about = "Issue one authenticated exchange REST call")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target exchange: binance or coinbase.
    exchange: Exchange,

    /// HTTP method: get, post or delete.
    method: HttpMethod,

    /// Endpoint path, e.g. /api/v3/ticker/price.
    endpoint: String,

    /// Parameters as key=value, sent in the given order.
    params: Vec<String>,
}

/// Parse `key=value` arguments into ordered params.
///
/// Values that look like JSON objects or arrays are decoded so nested
/// request bodies can be expressed; everything else stays a string.
fn parse_params(raw: &[String]) -> Result<Params> {
    let mut params = Params::new();
    for arg in raw {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("parameter {arg:?} is not key=value");
        };
        if key.is_empty() {
            bail!("parameter {arg:?} has an empty key");
        }
        let value = if value.starts_with('{') || value.starts_with('[') {
            serde_json::from_str(value)
                .with_context(|| format!("parameter {key} is not valid JSON"))?
        } else {
            Value::String(value.to_string())
        };
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

fn build_client(exchange: Exchange, config: &AppConfig) -> Result<Box<dyn ExchangeClient>> {
    Ok(match exchange {
        Exchange::Binance => Box::new(BinanceRestClient::from_config(config)?),
        Exchange::Coinbase => Box::new(CoinbaseRestClient::from_config(config)?),
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.clone())?;

    exrelay_core::logging::init_tracing(&config.logging);

    let params = parse_params(&args.params)?;
    let client = build_client(args.exchange, &config)?;

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received, cancelling request");
        cancel_on_signal.cancel();
    });

    tracing::debug!(
        exchange = %args.exchange,
        method = %args.method,
        endpoint = %args.endpoint,
        "issuing request"
    );

    let envelope = client
        .request(args.method, &args.endpoint, params, &cancel)
        .await;

    println!(
        "{}",
        serde_json::to_string_pretty(&envelope).context("failed to render envelope")?
    );

    Ok(if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

//! # Ping Tool
//!
//! Purpose: Check that a server answers on its protocol buffers port, failing
//! over to fallback endpoints when it does not.
//!
//! Usage: `rpb-ping [--config FILE] [HOST:PORT] [--fallback HOST:PORT]...`
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::env;
use std::fs;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rpb_client::{ClientConfig, Endpoint, ExpectCode, MessageCode, PbClient, StaticEndpointPool};
use tracing_subscriber::EnvFilter;

struct PingArgs {
    config: ClientConfig,
    fallbacks: Vec<Endpoint>,
}

impl PingArgs {
    fn from_args() -> Result<Self> {
        let mut config = ClientConfig::default();
        let mut primary = None;
        let mut fallbacks = Vec::new();

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().context("--config needs a file")?;
                    let raw = fs::read_to_string(&path)
                        .with_context(|| format!("reading config {path}"))?;
                    config = ClientConfig::from_json(&raw)?;
                }
                "--fallback" => {
                    let raw = args.next().context("--fallback needs HOST:PORT")?;
                    fallbacks.push(raw.parse::<Endpoint>()?);
                }
                other if other.starts_with("--") => bail!("unknown option {other}"),
                other => primary = Some(other.parse::<Endpoint>()?),
            }
        }

        if let Some(endpoint) = primary {
            config.host = endpoint.host;
            config.pb_port = endpoint.port;
        }
        Ok(PingArgs { config, fallbacks })
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = PingArgs::from_args()?;
    let requested = args.config.endpoint();
    let pool = StaticEndpointPool::new(args.fallbacks);
    let mut client = PbClient::with_decoder(&args.config, pool, ExpectCode(MessageCode::PingResp));

    let start = Instant::now();
    client
        .ping()
        .with_context(|| format!("ping {requested} failed"))?;
    let elapsed = start.elapsed();

    let used = client.endpoint();
    if used != requested {
        println!("{requested} unreachable, failed over to {used}");
    }
    println!("PONG from {used} in {:.3}ms", elapsed.as_secs_f64() * 1e3);
    Ok(())
}

//! resp-cache: send a command to a RESP server, optionally through the
//! client-side cache
//!
//! Configuration via CLI arguments or TOML file.

use resp_cache_client::config::Config;
use resp_cache_client::{Client, Command, Response};
use std::fmt::{self, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let connection = &config.client.connection;
    info!(
        address = %connection.address,
        protocol = connection.protocol,
        cache = config.client.cache.is_some(),
        "Starting resp-cache client"
    );

    let command = match config.command.split_first() {
        Some((id, arguments)) => Command::new(id).args(arguments.iter().map(String::as_str)),
        None => Command::new("PING"),
    };

    let mut client = Client::connect(&config.client).await?;
    for _ in 0..config.repeat.max(1) {
        let reply = client.execute(&command).await?;
        println!("{}", render(&reply));
    }

    if let Some(stats) = client.cache_stats() {
        info!(
            count = stats.count,
            size = stats.size,
            hits = stats.hits,
            misses = stats.misses,
            "Cache statistics"
        );
    }
    client.disconnect().await;
    Ok(())
}

/// Human-readable reply, one element per line for aggregates
fn render(response: &Response) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    if render_into(&mut out, response, 0).is_err() {
        out.push_str("(unrenderable reply)");
    }
    out
}

fn render_into(out: &mut String, response: &Response, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    match response {
        Response::Status(s) => write!(out, "{}", s),
        Response::Bulk(data) => write!(out, "\"{}\"", String::from_utf8_lossy(data)),
        Response::Verbatim { text, .. } => write!(out, "{}", String::from_utf8_lossy(text)),
        Response::Integer(n) => write!(out, "(integer) {}", n),
        Response::Double(d) => write!(out, "(double) {}", d),
        Response::Boolean(b) => write!(out, "({})", b),
        Response::BigNumber(n) => write!(out, "(big number) {}", n),
        Response::Null => write!(out, "(nil)"),
        Response::Error(err) => write!(out, "(error) {}", err),
        Response::Array(items) | Response::Set(items) if items.is_empty() => {
            write!(out, "(empty array)")
        }
        Response::Array(items) | Response::Set(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(out, "\n{indent}")?;
                }
                write!(out, "{}) ", i + 1)?;
                render_into(out, item, depth + 1)?;
            }
            Ok(())
        }
        Response::Map(entries) => {
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    write!(out, "\n{indent}")?;
                }
                render_into(out, key, depth + 1)?;
                out.push_str(" => ");
                render_into(out, value, depth + 1)?;
            }
            Ok(())
        }
        Response::Push(push) => {
            write!(out, "(push {}) ", push.data_type)?;
            render_into(out, &Response::Array(push.payload.clone()), depth)
        }
    }
}

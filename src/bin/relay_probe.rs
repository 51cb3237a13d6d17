//! relay-probe：探测回退链中每个后端的健康状态与模型列表
//!
//! Usage:
//!   relay-probe [<config.yaml|config.json>] [--prompt <text>]
//!
//! Without a config path, `AI_RELAY_CONFIG` is used; without that, the
//! configuration is read from `AI_RELAY_*` variables. Set `RUST_LOG` for
//! retry and fallback logs.

use ai_relay::{AiClient, BackendConfig, ChatRequest, Message};
use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

struct Args {
    config_path: Option<String>,
    prompt: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config_path: None,
        prompt: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--prompt" | "-p" => {
                args.prompt = Some(iter.next().context("--prompt needs a value")?);
            }
            "help" | "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("unknown option: {flag}"),
            path => args.config_path = Some(path.to_string()),
        }
    }
    Ok(args)
}

fn print_usage() {
    println!(
        r#"relay-probe: probe every backend of an ai-relay fallback chain

USAGE:
    relay-probe [CONFIG] [--prompt <text>]

ENVIRONMENT:
    AI_RELAY_CONFIG             Configuration file used when CONFIG is omitted
    AI_RELAY_BASE_URL, ...      Environment configuration used as last resort
    RUST_LOG                    Log filter (e.g. ai_relay=debug)"#
    );
}

fn load_config(args: &Args) -> anyhow::Result<BackendConfig> {
    let path = args
        .config_path
        .clone()
        .or_else(|| std::env::var("AI_RELAY_CONFIG").ok());
    let config = match path {
        Some(path) => BackendConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => BackendConfig::from_env().context("loading configuration from environment")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let config = load_config(&args)?;
    let client = AiClient::new(config)?;

    println!("ai-relay {}", env!("CARGO_PKG_VERSION"));
    let report = client.health_report().await;
    for (member, health) in client.chain().zip(report.iter()) {
        let status = if health.healthy { "up" } else { "down" };
        println!("\n[{}] {} {}", status, health.provider, health.base_url);

        let probe = AiClient::new(member.clone())?;
        match probe.list_models().await {
            Ok(models) => {
                for model in models {
                    match model.context_length {
                        Some(ctx) => println!("    {} (context {})", model.id, ctx),
                        None => println!("    {}", model.id),
                    }
                }
            }
            Err(err) => println!("    models unavailable: {err}"),
        }
    }

    if let Some(prompt) = args.prompt {
        let request = ChatRequest::new(vec![Message::user(prompt)]);
        let response = client.generate(&request).await?;
        println!(
            "\n{}\n-- served by {} in {} ms ({} attempts, {} retries)",
            response.content(),
            response.served_by(),
            response.elapsed_ms(),
            response.attempts(),
            response.retry_count()
        );
    }
    Ok(())
}

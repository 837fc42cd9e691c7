mod call;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use genmedia_config::Transport;
use genmedia_registry::CapabilityRegistry;
use genmedia_types::MediaDomain;

#[derive(Parser)]
#[command(name = "genmedia", version, about = "Generative media gateway (MCP)")]
struct Cli {
    /// Config file (defaults to ~/.genmedia/config.json5)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format; logs always go to stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Serve {
        /// Transport: stdio, sse or http (overrides config)
        #[arg(short, long)]
        transport: Option<Transport>,

        /// Port to listen on (overrides PORT and config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
    },
    /// Print the model catalog
    Catalog {
        /// Emit the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Call one tool on a running HTTP gateway
    Call {
        /// Tool name, e.g. "generate-image"
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Gateway MCP endpoint
        #[arg(long, default_value = "http://127.0.0.1:8080/mcp")]
        url: String,

        /// Write binary results into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
    /// Check configuration, or a running gateway with --url
    Health {
        /// Gateway base URL, e.g. http://127.0.0.1:8080
        #[arg(long)]
        url: Option<String>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if let Err(e) = run(cli) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve {
            transport,
            port,
            host,
        } => {
            let mut config = genmedia_config::load_config(config_path)?;
            if let Some(transport) = transport {
                config.gateway.transport = transport;
            }
            if let Some(port) = port {
                config.gateway.port = Some(port);
            }
            if let Some(host) = host {
                config.gateway.host = host;
            }

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let shutdown = CancellationToken::new();
                let on_signal = shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("Shutting down");
                        on_signal.cancel();
                    }
                });
                genmedia_gateway::start_gateway(config, shutdown).await
            })?;
        }
        Commands::Catalog { json } => {
            let config = genmedia_config::load_config(config_path)?;
            let builder = match &config.catalog_path {
                Some(path) => CapabilityRegistry::builder().with_catalog_file(path)?,
                None => CapabilityRegistry::builder().with_builtin_models(),
            };
            let registry = builder.build()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&registry.catalog_json())?);
            } else {
                for domain in [MediaDomain::Video, MediaDomain::Image, MediaDomain::Speech] {
                    println!("[{}]", domain.as_str());
                    println!("{}", registry.describe(domain));
                }
            }
        }
        Commands::Call {
            tool,
            args,
            url,
            save_dir,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(call::run_call(&url, &tool, &args, save_dir.as_deref()))?;
        }
        Commands::Health { url } => match url {
            Some(url) => {
                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(call::run_health(&url))?;
            }
            None => {
                let config = genmedia_config::load_config(config_path)?;
                println!("genmedia is healthy");
                println!("  transport: {}", config.gateway.transport);
                match config.resolve_port(None) {
                    Some(port) => println!("  port: {port}"),
                    None => println!("  port: none (stdio)"),
                }
                println!(
                    "  project: {}",
                    config.backend.project_id.as_deref().unwrap_or("NOT SET")
                );
                println!("  location: {}", config.backend.location);
                println!("  gemini location: {}", config.backend.gemini_location);
                println!(
                    "  bucket: {}",
                    config.storage.bucket.as_deref().unwrap_or("not set")
                );
                println!(
                    "  rate limit: {}",
                    if config.rate_limit.enabled {
                        format!(
                            "{} requests / {}s",
                            config.rate_limit.limit, config.rate_limit.window_secs
                        )
                    } else {
                        "disabled".to_string()
                    }
                );
            }
        },
    }

    Ok(())
}

mod cli;

use clap::Parser;
use cli::{Cli, Commands, ConfigArgs};
use tracing::info;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

use aria_exporter::app::Exporter;
use aria_exporter::config::AppConfig;
use aria_exporter::server;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;
type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();
    let filter = init_logging();

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(&args, &filter)?;
            info!(
                version = env!("CARGO_PKG_VERSION"),
                host = %config.upstream.host,
                port = config.exporter.port,
                "Starting VMware Aria Operations exporter"
            );

            let exporter = Exporter::bootstrap(config).await?;
            exporter.run(server::shutdown_signal()).await?;
        }
        Commands::CheckConfig(args) => {
            let config = load_config(&args, &filter)?;
            println!("{}", toml::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}

/// `RUST_LOG` when set; otherwise `info` until the configured level is known
fn init_logging() -> Option<FilterHandle> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        return None;
    }

    let (filter, handle) = reload::Layer::new(EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    Some(handle)
}

fn load_config(args: &ConfigArgs, filter: &Option<FilterHandle>) -> Result<AppConfig, AnyError> {
    let config = AppConfig::load(args.config.as_deref(), &args.overrides())?;

    if let Some(handle) = filter {
        handle.reload(EnvFilter::new(config.exporter.log_level.as_filter()))?;
    }

    Ok(config)
}

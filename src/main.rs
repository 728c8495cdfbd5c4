use clap::Parser;
use hetzner_dns_webhook::{
    provider::HetznerProvider,
    settings::{LogFormat, Settings},
    supervisor::Supervisor,
};
use tracing::{info, Level};

build_info::build_info!(fn build_info);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file, instead of the default locations
    #[arg(long, value_name = "PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let cfg = Settings::new(args.config.as_deref())?;

    init_tracing(&cfg)?;
    info!(
        version = %build_info().crate_info.version,
        dry_run = cfg.dry_run,
        "starting hetzner-dns-webhook"
    );

    run(cfg).await
}

fn init_tracing(cfg: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let level = if cfg.debug { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt().with_max_level(level);

    match cfg.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }

    Ok(())
}

async fn run(cfg: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let provider = HetznerProvider::connect(
        &cfg.api_key,
        &cfg.base_url,
        cfg.rate_limit,
        cfg.provider_config()?,
    )?;

    if provider.domain_filter().is_configured() {
        info!(filter = %serde_json::to_string(provider.domain_filter())?, "domain filter active");
    }

    let supervisor = Supervisor::new(provider, cfg.poll_interval()?);
    Ok(supervisor.run().await?)
}

//! beatlight entry point.
//!
//! ```text
//! beatlight                  Run in the foreground
//! beatlight --config <path>  Load a custom config TOML
//! beatlight --gen-config     Write default config to stdout
//! beatlight --dry-run        Log LED datagrams instead of sending them
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use beatlight::config::LightConfig;
use beatlight::service::LightService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "beatlight", about = "Flash a WLED strip in time with the music")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "beatlight.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Run the full pipeline but only log LED datagrams.
    #[arg(long)]
    dry_run: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&LightConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = LightConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("beatlight v{}", env!("CARGO_PKG_VERSION"));
    info!("LED controller: {}", config.led_address());
    info!("LED count: {}", config.led.led_count);
    info!("detector FPS: {}", config.sync.fps);
    info!("analysis: {}", config.source.analysis_path.display());

    let service = LightService::new(config, cli.dry_run);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    service.run().await?;

    Ok(())
}

//! themes binary - bundle a theme set once, or keep rebuilding it on change

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use themes_bundler::{BundlerOptions, Mode, OutputLabel, ThemeSetConfig, ThemeSetCoordinator};
use themes_runtime::NativeRuntime;

#[derive(Parser, Debug)]
#[command(name = "themes")]
#[command(about = "Bundle stylesheet themes and rebuild them on change")]
struct Args {
    /// Theme set description (JSON)
    #[arg(short, long, default_value = "themes.json")]
    config: PathBuf,

    /// Build mode; production always writes minified output
    #[arg(short, long, default_value = "development")]
    mode: Mode,

    /// Write minified output in development mode too
    #[arg(long)]
    minify: bool,

    /// Keep running and rebuild themes when their files change
    #[arg(short, long)]
    watch: bool,

    /// Name outputs `{theme}.compiled.{ext}` instead of `{theme}.bundled.{ext}`
    #[arg(long)]
    compiled: bool,

    /// Log every build step
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "themes_bundler=debug,themes_runtime=debug"
    } else {
        "themes_bundler=info,themes_runtime=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let runtime = NativeRuntime::new();
    let mut config = ThemeSetConfig::load(&runtime, &args.config)
        .with_context(|| format!("Failed to load theme set from {}", args.config.display()))?;
    config.minify |= args.minify;

    let label = if args.compiled {
        OutputLabel::Compiled
    } else {
        OutputLabel::Bundled
    };
    let options = BundlerOptions::default()
        .with_mode(args.mode)
        .with_verbose(args.verbose)
        .with_output_label(label);

    info!(config = %args.config.display(), mode = ?args.mode, watch = args.watch, "Starting themes");

    let coordinator = ThemeSetCoordinator::native(config, options);
    let initialized = coordinator.initialize(args.watch).await?;

    let failed: Vec<_> = initialized
        .builds
        .iter()
        .filter(|build| build.is_err())
        .map(|build| build.theme.as_str())
        .collect();
    if !failed.is_empty() {
        error!(themes = ?failed, "Some themes failed to build");
    }

    if !args.watch {
        if !failed.is_empty() {
            anyhow::bail!("{} theme(s) failed to build", failed.len());
        }
        return Ok(());
    }

    info!("Watching for changes, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    for registration in &initialized.registrations {
        registration.abort();
    }
    info!("Stopped watching");
    Ok(())
}

mod browser;
mod config;
mod credentials;
mod error;
mod extract;
mod nif;
mod output;
mod record;
mod run;
mod session;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use browser::{ChromeBrowser, LaunchOptions};
use config::PortalConfig;
use credentials::Credentials;

#[derive(Parser)]
#[command(
    name = "patrimonio",
    about = "Export personal data and real estate holdings from Portal das Finanças"
)]
struct Cli {
    /// Taxpayer number (NIF) used to log in
    nif: String,
    /// Portal password
    password: String,
    /// Directory the output file is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
    /// Pause after submitting the login form, in milliseconds
    #[arg(long, env = "PATRIMONIO_SETTLE_MS")]
    settle_ms: Option<u64>,
    /// Show the browser window instead of running headless
    #[arg(long)]
    headful: bool,
    /// Chrome/Chromium executable (default: auto-detect)
    #[arg(long, env = "PATRIMONIO_CHROME")]
    chrome: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut config = PortalConfig::default();
    if let Some(ms) = cli.settle_ms {
        config.settle_wait = Duration::from_millis(ms);
    }

    // Validated before anything touches the network.
    let credentials = Credentials::new(&cli.nif, cli.password)?;

    let progress = spinner()?;
    progress.set_message("launching browser");
    let launch = LaunchOptions {
        headful: cli.headful,
        executable: cli.chrome,
    };
    let browser = match ChromeBrowser::launch(&launch, config.network_idle.clone()).await {
        Ok(browser) => browser,
        Err(e) => {
            progress.finish_and_clear();
            return Err(e).context("Failed to launch browser");
        }
    };

    let result = run::run(browser, &config, &credentials, &cli.output_dir, &progress).await;
    progress.finish_and_clear();
    let path = result?;

    info!(
        path = %path.display(),
        elapsed_secs = t0.elapsed().as_secs_f64(),
        "done"
    );
    Ok(())
}

fn spinner() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

//! `taskboard` entry point: loads settings, wires the hosted backend into the
//! application context and runs the console on stdin/stdout.

use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tokio::io::{BufReader, stdin, stdout};
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskboard::config::{LogFormat, TaskboardSettings};
use taskboard::domain::AppContext;
use taskboard::inbound::console::Console;
use taskboard::outbound::hosted::HostedBackend;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let settings = TaskboardSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("failed to load settings: {err}"))?;
    init_tracing(&settings)?;

    let backend = Arc::new(
        HostedBackend::new(
            settings.backend_url()?,
            settings.anon_key()?,
            settings.request_timeout()?,
        )
        .wrap_err("failed to configure hosted backend")?,
    );
    let mut ctx = AppContext::new(
        Arc::clone(&backend),
        Arc::clone(&backend),
        Arc::clone(&backend),
        Arc::new(DefaultClock),
    );
    ctx.start().await;

    let mut console = Console::new(BufReader::new(stdin()), stdout());
    let outcome = console.run(&mut ctx).await;
    ctx.shutdown();
    outcome.wrap_err("console i/o failed")?;
    info!("taskboard exited");
    Ok(())
}

/// Diagnostics go to stderr so the console owns stdout.
fn init_tracing(settings: &TaskboardSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.log_filter()))
        .wrap_err("invalid log filter")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = match settings.log_format()? {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|err| eyre!("tracing init failed: {err}"))
}

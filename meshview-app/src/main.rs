//! meshview: open a 3D model and look at it

mod app;
mod cli;
mod desktop_renderer;
mod instance;
mod menu;
mod notifier;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("meshview=info,meshview_io=info,meshview_gpu=info,meshview_viewer=info")
            }),
        )
        .init();

    let cli = cli::Cli::parse();
    let config = cli.viewer_config();
    tracing::debug!("Starting with {:?}", config);

    let server = match instance::acquire(cli.file.as_deref())? {
        instance::Instance::Forwarded => return Ok(()),
        instance::Instance::Primary(server) => server,
    };

    app::run(config, cli.file, server)
}

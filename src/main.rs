use clap::Parser;
use tracing::{debug, info};

use gwtool::commands::Session;
use gwtool::config::cli::CliArgs;
use gwtool::config::env::apply_env_config;
use gwtool::config::AppConfig;
use gwtool::network::discovery::RtNetlinkLinkSource;
use gwtool::routing::manager::{DryRunRunner, TokioCommandRunner};
use gwtool::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = CliArgs::parse();

    // defaults, then environment, then command line
    let app = cli.apply_to_config(apply_env_config(AppConfig::default())?)?;

    tracing_subscriber::fmt()
        .with_env_filter(app.log_level.as_str())
        .init();

    info!("Starting gwtool, workspace={}", app.workspace.display());
    debug!("Runtime settings: {:?}", app);

    let links = RtNetlinkLinkSource::new()?;
    if app.dry_run {
        let session = Session::load(app, &links, DryRunRunner).await?;
        session.run(&cli.command).await
    } else {
        let session = Session::load(app, &links, TokioCommandRunner).await?;
        session.run(&cli.command).await
    }
}

//! Binary entry point: resolve directories, start logging, open the store and
//! drive the terminal UI until the user quits.
use anyhow::Context;
use cours_prive::{logging, open_store, run_app, App, AppConfig};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    config.prepare()?;
    logging::init(&config.log_path)?;
    info!(data_dir = %config.data_dir.display(), "starting");

    let conn = open_store(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    let mut app = App::load(conn, config)?;
    run_app(&mut app)
}

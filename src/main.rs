use std::path::PathBuf;

use anyhow::Context;
use env_logger::Env;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use crate::core::{config::Config, ControlLoop};

mod core;

fn main() -> anyhow::Result<()> {
    let logger = env_logger::Builder::from_env(Env::default().default_filter_or("info")).build();
    let level = logger.filter();
    let multi = MultiProgress::new();

    LogWrapper::new(multi.clone(), logger)
        .try_init()
        .context("Could not install logger")?;
    log::set_max_level(level);

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&path)?;
    log::info!("Loaded config from {}", path.display());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Could not start async runtime")?;

    runtime.block_on(async move {
        let mut control = ControlLoop::new(config, &multi)?;
        control.run().await
    })
}

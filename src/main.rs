mod cli;
mod cmd;
mod command;
mod config;
mod container;
mod debug;
mod deps;
mod lab;
mod logger;
mod manifest;
mod pipeline;
mod spinner;
mod toolcheck;
mod uptime;

use anyhow::Result;
use tracing::{error, info};

fn main() -> Result<()> {
    logger::init()?;
    info!(args = ?std::env::args().collect::<Vec<_>>(), "labdev start");

    match cli::run() {
        Ok(result) => {
            info!("labdev finished successfully");
            Ok(result)
        }
        Err(err) => {
            error!(error = ?err, "labdev failed");
            Err(err)
        }
    }
}

#[macro_use]
pub mod utils;

pub mod achievements;
pub mod cli;
pub mod db;
pub mod export;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod performance;
pub mod scoring;
pub mod sensing;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod timer;

use clap::Parser;

use cli::Cli;

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::logging::init(cli.verbose);

    log::info!("PostureWatch starting up...");

    // Monitor state is shared through Rc, so everything runs on one thread.
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(cli.execute())
}

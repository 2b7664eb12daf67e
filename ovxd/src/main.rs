// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

mod args;

use crate::args::{CmdArgs, Parser};

use ovxd::Daemon;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn main() {
    let args = CmdArgs::parse();
    init_logging();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let daemon = match Daemon::start(&config) {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("startup failed: {e}");
            std::process::exit(1);
        }
    };

    let (stop_tx, stop_rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .expect("failed to set SIGINT handler");

    info!("ready, press ctrl-c to stop");
    let _ = stop_rx.recv();

    daemon.shutdown();
}

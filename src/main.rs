//! prwatch: watch one pull request until it is mergeable, blocked, or
//! closed.
//!
//! Exit codes: 0 on success or when the watch reaches a terminal
//! state, 1 on any operational error. SIGINT keeps its default
//! disposition, so an interrupted wait surfaces as the conventional
//! signal-death status (130 as shells report it).

mod cli;
mod config;
mod engine;
mod gateway;
mod model;
mod state;
mod watch;

use std::process;

use config::Config;

fn main() {
    env_logger::init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("prwatch: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = cli::run(&config) {
        eprintln!("prwatch: {e}");
        process::exit(1);
    }
}

//! Account-database replication between this host and a shared directory.
//!
//! Usage: `account-sync {push|pull|watch} <directory>`
//!
//! Arguments are checked by hand so an argument-count mismatch exits with
//! code 1, matching the contract the calling framework relies on. System
//! and base directories, the watch interval and the failure bound come
//! from the shared configuration file (`PROVIDER_EXT_CONFIG` or the
//! packaged default).

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use provider_extensions::config::{ExtensionConfig, DEFAULT_CONFIG_PATH};
use provider_extensions::sync::{Direction, SyncEngine};

fn usage() -> ! {
    eprintln!("usage: account-sync {{push|pull|watch}} <directory>");
    std::process::exit(1);
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 2 {
        usage();
    }

    let config_path = env::var("PROVIDER_EXT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = match ExtensionConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let share_dir = Path::new(&args[1]);
    let engine = SyncEngine::new(&config.sync, share_dir);
    let interval = Duration::from_secs(config.sync.interval_secs);

    let result = match args[0].as_str() {
        "push" => engine.sync(Direction::Push),
        "pull" => engine.sync(Direction::Pull),
        "watch" => engine.watch(
            Direction::Pull,
            interval,
            None,
            config.sync.max_consecutive_failures,
        ),
        _ => usage(),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

mod backends;
mod candidate_selector;
mod checkpoint_store;
mod config;
mod config_persistence;
mod db_manager;
mod genre_filter;
mod lookup_orchestrator;
mod pipeline;
mod protocol;
mod update_applier;

use std::process::ExitCode;
use std::str::FromStr;

use backends::musicbrainz::MusicBrainzClient;
use config::Config;
use db_manager::DbManager;
use log::{error, info, warn};
use pipeline::Pipeline;
use protocol::RunOutcome;

fn init_logging() {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Trace);
    clog.init();
    log::set_max_level(log::LevelFilter::Info);
}

fn apply_log_level(config: &Config) {
    match log::LevelFilter::from_str(config.logging.level.trim()) {
        Ok(level) => log::set_max_level(level),
        Err(_) => warn!(
            "Unknown log level {:?}; keeping info",
            config.logging.level
        ),
    }
}

fn run(config: &Config) -> Result<RunOutcome, String> {
    info!(
        "Lookup client configured as {} against {}",
        config.lookup.user_agent(),
        config.lookup.base_url
    );
    let lookup = MusicBrainzClient::new(&config.lookup);
    let store = DbManager::open(&config.database.path)?;
    let mut pipeline = Pipeline::from_config(config, store, lookup)?;
    if pipeline.checkpoint().is_empty() {
        info!(
            "Checkpoint {} is empty; starting a fresh sweep",
            pipeline.checkpoint().path().display()
        );
    } else {
        info!(
            "Checkpoint {} holds {} attempted records; resuming",
            pipeline.checkpoint().path().display(),
            pipeline.checkpoint().len()
        );
    }
    pipeline.run()
}

fn exit_code_for(outcome: &RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Completed(_) => ExitCode::SUCCESS,
        RunOutcome::Aborted { reason, summary } => {
            error!(
                "Aborted after {} of {} records: {}",
                summary.processed, summary.total, reason
            );
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    init_logging();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_path = config_persistence::config_file_path();
    let config = match config_persistence::load_runtime_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to prepare configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    apply_log_level(&config);

    match run(&config) {
        Ok(outcome) => exit_code_for(&outcome),
        Err(err) => {
            error!("Failed to start: {err}");
            ExitCode::FAILURE
        }
    }
}

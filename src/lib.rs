mod config;
mod mplayer;

pub use config::{ConfigError, PlayerConfig};
pub use mplayer::{
  find_mplayer, is_stop_signal, Launcher, MplayerLauncher, PipeError, Player, ProcessError, Restart,
  RestartPolicy, RunOutcome, SessionEnd, SlaveCommand, SlaveHandle, SlaveProcess, SupervisorError,
  NULL_PATH_ANSWER, SLAVE_ARGS,
};

/// Install the stdout logger. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
  env_logger::Builder::new()
    .filter_level(log::LevelFilter::Info)
    .parse_default_env()
    .target(env_logger::Target::Stdout)
    .init();
}

//! MPlayer slave module - keeps an external MPlayer alive and plays files through it.
//!
//! Architecture:
//! - `process.rs` - MPlayer binary detection, spawning and the `Launcher` seam
//! - `pipe.rs` - Line I/O over the slave's stdin/stdout
//! - `protocol.rs` - Slave-mode commands and the end-of-playback answer
//! - `session.rs` - Stop-detection state shared by reader, supervisor and player
//! - `supervisor.rs` - Restart loop forwarding queued commands to the live instance
//! - `player.rs` - High-level player with play-and-wait and skip

mod pipe;
mod player;
mod process;
mod protocol;
mod session;
mod supervisor;

#[cfg(test)]
mod testing;

pub use pipe::PipeError;
pub use player::Player;
pub use process::{
  find_mplayer, Launcher, MplayerLauncher, ProcessError, SlaveHandle, SlaveProcess, SLAVE_ARGS,
};
pub use protocol::{is_stop_signal, SlaveCommand, NULL_PATH_ANSWER};
pub use session::SessionEnd;
pub use supervisor::{Restart, RestartPolicy, RunOutcome, SupervisorError};

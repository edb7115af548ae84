//! Keeps one MPlayer slave alive, forwarding queued commands to it.
//!
//! Crash-only: every exit leads to a fresh launch. Failures are handed to the
//! error handler and followed by a fixed backoff; clean exits restart at once.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::time::Instant;

use super::pipe::{reader_loop, write_command, Outbound, PipeError};
use super::process::{Launcher, ProcessError, SlaveHandle, SlaveProcess};
use super::session::{SessionEnd, SessionSlot};
use crate::config::PlayerConfig;

#[derive(Error, Debug)]
pub enum SupervisorError {
  #[error("Process error: {0}")]
  Process(#[from] ProcessError),
  #[error("Pipe error: {0}")]
  Pipe(#[from] PipeError),
  #[error("MPlayer exited after {0:?}, too quickly to be healthy")]
  ExitedTooQuickly(Duration),
}

/// Callback receiving every supervision failure.
pub type ErrorHandler = Arc<dyn Fn(&SupervisorError) + Send + Sync>;

/// How one slave instance ended.
#[derive(Debug)]
pub enum RunOutcome {
  /// The process exited cleanly after running for `uptime`.
  Exited { uptime: Duration },
  /// Launching, writing to or waiting on the process failed.
  Failed(SupervisorError),
}

/// What the supervisor does after an instance ends.
#[derive(Debug)]
pub enum Restart {
  Immediately,
  After {
    delay: Duration,
    error: SupervisorError,
  },
}

#[derive(Debug, Clone)]
pub struct RestartPolicy {
  pub backoff: Duration,
  pub min_uptime: Duration,
}

impl RestartPolicy {
  pub fn from_config(config: &PlayerConfig) -> Self {
    Self {
      backoff: config.restart_backoff(),
      min_uptime: config.min_uptime(),
    }
  }

  pub fn review(&self, outcome: RunOutcome) -> Restart {
    match outcome {
      RunOutcome::Exited { uptime } if uptime < self.min_uptime => Restart::After {
        delay: self.backoff,
        error: SupervisorError::ExitedTooQuickly(uptime),
      },
      RunOutcome::Exited { .. } => Restart::Immediately,
      RunOutcome::Failed(error) => Restart::After {
        delay: self.backoff,
        error,
      },
    }
  }
}

/// Why the forwarder stopped.
enum Forwarded {
  Exited(Result<(), ProcessError>),
  WriteFailed(PipeError),
  /// Every `Player` handle is gone, nobody can send commands anymore.
  Closed,
}

pub struct Supervisor {
  launcher: Arc<dyn Launcher>,
  commands: async_channel::Receiver<Outbound>,
  session: Arc<SessionSlot>,
  policy: RestartPolicy,
  on_error: ErrorHandler,
  /// Command whose write failed, owed to the next instance.
  carried: Option<Outbound>,
  generation: u64,
}

impl Supervisor {
  pub fn new(
    launcher: Arc<dyn Launcher>,
    commands: async_channel::Receiver<Outbound>,
    session: Arc<SessionSlot>,
    policy: RestartPolicy,
    on_error: ErrorHandler,
  ) -> Self {
    Self {
      launcher,
      commands,
      session,
      policy,
      on_error,
      carried: None,
      generation: 0,
    }
  }

  /// Run until the command channel closes, which in practice is never.
  pub async fn run(mut self) {
    log::info!("MPlayer supervisor started");

    loop {
      self.generation += 1;
      let outcome = match self.run_once().await {
        Some(outcome) => outcome,
        None => {
          log::info!("Command channel closed, MPlayer supervisor exiting");
          self.session.end(SessionEnd::Restarted);
          return;
        }
      };

      if self.session.end(SessionEnd::Restarted) {
        log::warn!("MPlayer went away during playback, session ended");
      }

      match self.policy.review(outcome) {
        Restart::Immediately => {
          log::info!("MPlayer exited cleanly, restarting");
        }
        Restart::After { delay, error } => {
          log::warn!("MPlayer failed: {}. Restarting in {:?}", error, delay);
          (self.on_error)(&error);
          tokio::time::sleep(delay).await;
        }
      }
    }
  }

  /// Launch one instance and serve it until it is gone. `None` means the
  /// command channel closed.
  async fn run_once(&mut self) -> Option<RunOutcome> {
    let started = Instant::now();
    let SlaveHandle {
      mut process,
      mut stdin,
      stdout,
    } = match self.launcher.launch() {
      Ok(slave) => slave,
      Err(e) => return Some(RunOutcome::Failed(e.into())),
    };
    self.session.instance_replaced();
    log::info!(
      "MPlayer running (pid: {:?}, generation: {})",
      process.id(),
      self.generation
    );

    let reader = tokio::spawn(reader_loop(stdout, self.session.clone()));
    let forwarded = self.forward_commands(process.as_mut(), &mut stdin).await;

    let result = match forwarded {
      Forwarded::Exited(result) => result.map_err(SupervisorError::from),
      Forwarded::WriteFailed(e) => {
        Self::reap(process.as_mut()).await;
        Err(e.into())
      }
      Forwarded::Closed => {
        Self::reap(process.as_mut()).await;
        reader.abort();
        return None;
      }
    };
    reader.abort();

    Some(match result {
      Ok(()) => RunOutcome::Exited {
        uptime: started.elapsed(),
      },
      Err(e) => RunOutcome::Failed(e),
    })
  }

  /// Write queued commands to stdin until the process exits or a write fails.
  async fn forward_commands<W: AsyncWrite + Unpin>(
    &mut self,
    process: &mut dyn SlaveProcess,
    stdin: &mut W,
  ) -> Forwarded {
    if let Some(outbound) = self.carried.take() {
      if let Err(e) = self.deliver(stdin, outbound).await {
        return Forwarded::WriteFailed(e);
      }
    }

    loop {
      tokio::select! {
        result = process.wait() => return Forwarded::Exited(result),
        next = self.commands.recv() => {
          let Ok(outbound) = next else {
            return Forwarded::Closed;
          };
          if let Err(e) = self.deliver(stdin, outbound).await {
            return Forwarded::WriteFailed(e);
          }
        }
      }
    }
  }

  async fn deliver<W: AsyncWrite + Unpin>(
    &mut self,
    stdin: &mut W,
    outbound: Outbound,
  ) -> Result<(), PipeError> {
    if outbound.delivered.is_closed() {
      log::debug!("Dropping abandoned command: {}", outbound.command);
      return Ok(());
    }

    if outbound.command.is_path_query() {
      self.session.query_sent();
    }
    match write_command(stdin, &outbound.command).await {
      Ok(()) => {
        let _ = outbound.delivered.send(());
        Ok(())
      }
      Err(e) => {
        log::warn!("Keeping undelivered command for next MPlayer: {}", outbound.command);
        self.carried = Some(outbound);
        Err(e)
      }
    }
  }

  /// Kill and wait for a process that may still be running.
  async fn reap(process: &mut dyn SlaveProcess) {
    if let Err(e) = process.start_kill() {
      log::debug!("kill() failed: {}", e);
    }
    if let Err(e) = process.wait().await {
      log::debug!("MPlayer reaped: {}", e);
    }
  }
}

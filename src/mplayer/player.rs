//! High-level player: queue commands to the slave and play files to the end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::pipe::Outbound;
use super::process::{Launcher, MplayerLauncher};
use super::protocol::{SlaveCommand, PATH_PROPERTY};
use super::session::{SessionEnd, SessionSlot};
use super::supervisor::{ErrorHandler, RestartPolicy, Supervisor, SupervisorError};
use crate::config::PlayerConfig;

struct PlayerInner {
  config: PlayerConfig,
  launcher: Arc<dyn Launcher>,
  command_tx: async_channel::Sender<Outbound>,
  /// Handed to the supervisor when supervision starts.
  command_rx: Mutex<Option<async_channel::Receiver<Outbound>>>,
  session: Arc<SessionSlot>,
  /// Serializes playback sessions so only one is ever armed.
  session_gate: tokio::sync::Mutex<()>,
  supervising: AtomicBool,
}

/// Handle to the supervised MPlayer. Cheap to clone; all clones share the
/// same slave process and command queue.
#[derive(Clone)]
pub struct Player {
  inner: Arc<PlayerInner>,
}

impl Player {
  /// Create a player that launches the real MPlayer binary.
  pub fn new(config: PlayerConfig) -> Self {
    let launcher = MplayerLauncher::new(config.mplayer_path());
    Self::with_launcher(launcher, config)
  }

  /// Create a player around a custom launcher.
  pub fn with_launcher(launcher: impl Launcher + 'static, config: PlayerConfig) -> Self {
    let (command_tx, command_rx) = async_channel::unbounded();
    Self {
      inner: Arc::new(PlayerInner {
        config,
        launcher: Arc::new(launcher),
        command_tx,
        command_rx: Mutex::new(Some(command_rx)),
        session: Arc::new(SessionSlot::new()),
        session_gate: tokio::sync::Mutex::new(()),
        supervising: AtomicBool::new(false),
      }),
    }
  }

  /// Start keeping MPlayer alive in the background. Only the first call has
  /// any effect; the supervisor runs for as long as any handle exists.
  ///
  /// Must be called from within a tokio runtime.
  pub fn supervise<F>(&self, on_error: F)
  where
    F: Fn(&SupervisorError) + Send + Sync + 'static,
  {
    if self.inner.supervising.swap(true, Ordering::SeqCst) {
      log::warn!("supervise() called twice, ignoring");
      return;
    }
    let Some(command_rx) = self.inner.command_rx.lock().take() else {
      return;
    };

    let on_error: ErrorHandler = Arc::new(on_error);
    let supervisor = Supervisor::new(
      self.inner.launcher.clone(),
      command_rx,
      self.inner.session.clone(),
      RestartPolicy::from_config(&self.inner.config),
      on_error,
    );
    tokio::spawn(supervisor.run());
  }

  /// Supervise with errors going to the log.
  pub fn supervise_with_logging(&self) {
    self.supervise(|e| log::error!("MPlayer supervisor: {}", e));
  }

  /// Send a command to whichever MPlayer instance is running.
  ///
  /// Returns once the command has been written to MPlayer's stdin. While no
  /// instance is running (between restarts, or before `supervise`) this waits
  /// for the next one.
  pub async fn send_command(&self, command: impl Into<SlaveCommand>) {
    let command = command.into();
    let (delivered, ack) = oneshot::channel();

    log::debug!("Queueing MPlayer command: {}", command);
    if self
      .inner
      .command_tx
      .send(Outbound { command, delivered })
      .await
      .is_err()
    {
      log::error!("MPlayer command queue closed");
      return;
    }

    if ack.await.is_err() {
      log::warn!("MPlayer supervisor dropped a queued command");
    }
  }

  /// Play a file and wait until it is done.
  pub async fn play_and_wait(&self, path: &str) -> SessionEnd {
    self.play(path, None).await
  }

  /// Play a file and wait until it is done, stopping it once `max_duration`
  /// has elapsed.
  pub async fn play_and_wait_with_duration(
    &self,
    path: &str,
    max_duration: Duration,
  ) -> SessionEnd {
    self.play(path, Some(max_duration)).await
  }

  /// Skip the file currently playing. Does nothing if nothing is playing.
  pub fn skip(&self) {
    if !self.inner.session.end(SessionEnd::Skipped) {
      log::debug!("Skip requested with nothing playing");
    }
  }

  /// Whether a playback session is waiting on MPlayer.
  pub fn is_playing(&self) -> bool {
    self.inner.session.is_armed()
  }

  async fn play(&self, path: &str, max_duration: Option<Duration>) -> SessionEnd {
    let _gate = self.inner.session_gate.lock().await;

    log::info!("Loading file: {}", path);
    self.send_command(SlaveCommand::loadfile(path)).await;
    let mut session = self.inner.session.arm();

    let cancel = CancellationToken::new();
    let _cancel_on_exit = cancel.clone().drop_guard();
    if let Some(duration) = max_duration {
      self.spawn_stop_timer(duration, cancel);
    }

    let interval = self.inner.config.poll_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end = loop {
      tokio::select! {
        biased;
        end = session.ended() => break end,
        _ = ticker.tick() => {
          // Keep listening while the query waits for a live instance.
          tokio::select! {
            biased;
            end = session.ended() => break end,
            _ = self.send_command(SlaveCommand::get_property(PATH_PROPERTY)) => {}
          }
        }
      }
    };

    if end == SessionEnd::Skipped {
      log::info!("Skipping: {}", path);
      self.send_command(SlaveCommand::stop()).await;
    }
    log::info!("Playback of {} ended: {:?}", path, end);
    end
  }

  /// Send `stop` once `duration` has elapsed, unless the session ends first.
  fn spawn_stop_timer(&self, duration: Duration, cancel: CancellationToken) {
    let player = self.clone();
    tokio::spawn(async move {
      tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(duration) => {
          log::info!("Maximum duration of {:?} reached, stopping playback", duration);
          tokio::select! {
            _ = cancel.cancelled() => {}
            _ = player.send_command(SlaveCommand::stop()) => {}
          }
        }
      }
    });
  }
}

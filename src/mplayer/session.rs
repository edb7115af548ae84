//! Stop-detection state shared by the player, the output reader and the
//! supervisor.
//!
//! A session is "armed" while the slot holds its completion sender. Whoever
//! takes the sender first decides how the session ended; everybody after that
//! finds the slot empty.
//!
//! The slot also counts `get_property path` queries still waiting for an
//! answer. MPlayer answers in order, so answers owed to queries sent before a
//! session armed are stale and must not end it.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Why a playback session returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
  /// MPlayer reported that nothing is loaded anymore.
  Finished,
  /// The caller skipped the file.
  Skipped,
  /// The slave process went away while the session was waiting on it.
  Restarted,
}

struct Armed {
  id: u64,
  tx: oneshot::Sender<SessionEnd>,
}

#[derive(Default)]
struct SlotState {
  armed: Option<Armed>,
  /// Path queries written to the current instance and not yet answered.
  unanswered: usize,
  /// How many of those were sent before the armed session started.
  stale: usize,
}

#[derive(Default)]
pub struct SessionSlot {
  state: Mutex<SlotState>,
  next_id: AtomicU64,
}

impl SessionSlot {
  pub fn new() -> Self {
    Self::default()
  }

  /// Arm stop detection for a new session.
  pub fn arm(&self) -> ArmedSession<'_> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = oneshot::channel();

    let mut state = self.state.lock();
    if state.armed.replace(Armed { id, tx }).is_some() {
      log::warn!("Stop detection re-armed over session that never ended");
    }
    state.stale = state.unanswered;
    log::debug!(
      "Stop detection armed (session {}, {} stale answers pending)",
      id,
      state.stale
    );
    drop(state);

    ArmedSession {
      slot: self,
      id,
      ended: rx,
    }
  }

  pub fn is_armed(&self) -> bool {
    self.state.lock().armed.is_some()
  }

  /// A path query is about to be written to the running instance.
  pub fn query_sent(&self) {
    self.state.lock().unanswered += 1;
  }

  /// MPlayer answered the oldest outstanding path query. Returns false when
  /// that query predates the armed session.
  pub fn answer_received(&self) -> bool {
    let mut state = self.state.lock();
    state.unanswered = state.unanswered.saturating_sub(1);
    if state.stale > 0 {
      state.stale -= 1;
      return false;
    }
    true
  }

  /// A new instance is running; nothing sent to the old one will be answered.
  pub fn instance_replaced(&self) {
    let mut state = self.state.lock();
    state.unanswered = 0;
    state.stale = 0;
  }

  /// End whichever session is armed. Returns false if none was.
  pub fn end(&self, reason: SessionEnd) -> bool {
    let Some(armed) = self.state.lock().armed.take() else {
      return false;
    };
    log::debug!("Session {} ended: {:?}", armed.id, reason);
    // The waiter may already be gone; the slot is disarmed either way.
    let _ = armed.tx.send(reason);
    true
  }

  fn disarm(&self, id: u64) {
    let mut state = self.state.lock();
    if state.armed.as_ref().is_some_and(|a| a.id == id) {
      state.armed = None;
      log::debug!("Stop detection disarmed (session {})", id);
    }
  }
}

/// An armed session. Dropping it disarms stop detection.
pub struct ArmedSession<'a> {
  slot: &'a SessionSlot,
  id: u64,
  ended: oneshot::Receiver<SessionEnd>,
}

impl ArmedSession<'_> {
  /// Wait until the session is ended. Cancel-safe, but must not be awaited
  /// again once it has returned.
  pub async fn ended(&mut self) -> SessionEnd {
    (&mut self.ended).await.unwrap_or(SessionEnd::Restarted)
  }
}

impl Drop for ArmedSession<'_> {
  fn drop(&mut self) {
    self.slot.disarm(self.id);
  }
}

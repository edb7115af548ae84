//! In-memory stand-in for MPlayer used by the supervisor and player tests.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::oneshot;

use super::process::{Launcher, ProcessError, SlaveHandle, SlaveProcess};

/// Hands every launched instance to the test through a channel.
pub struct FakeLauncher {
  instances: async_channel::Sender<FakeSlave>,
  failures_left: AtomicUsize,
}

impl FakeLauncher {
  pub fn new() -> (Self, async_channel::Receiver<FakeSlave>) {
    let (tx, rx) = async_channel::unbounded();
    let launcher = Self {
      instances: tx,
      failures_left: AtomicUsize::new(0),
    };
    (launcher, rx)
  }

  /// Make the next `count` launches fail as if MPlayer were missing.
  pub fn fail_next(self, count: usize) -> Self {
    self.failures_left.store(count, Ordering::SeqCst);
    self
  }
}

impl Launcher for FakeLauncher {
  fn launch(&self) -> Result<SlaveHandle, ProcessError> {
    let failing = self
      .failures_left
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if failing {
      return Err(ProcessError::NotFound);
    }

    let (stdin, stdin_peer) = tokio::io::duplex(4096);
    let (stdout_peer, stdout) = tokio::io::duplex(4096);
    let (exit_tx, exit_rx) = oneshot::channel();

    let slave = FakeSlave {
      commands: Some(BufReader::new(stdin_peer)),
      output: Some(stdout_peer),
      exit: Some(exit_tx),
    };
    self
      .instances
      .try_send(slave)
      .map_err(|_| ProcessError::SpawnFailed(io::Error::other("test dropped the launcher")))?;

    Ok(SlaveHandle {
      process: Box::new(FakeProcess {
        exit: exit_rx,
        killed: false,
      }),
      stdin: Box::new(stdin),
      stdout: Box::new(stdout),
    })
  }
}

struct FakeProcess {
  exit: oneshot::Receiver<Result<(), ProcessError>>,
  killed: bool,
}

impl SlaveProcess for FakeProcess {
  fn id(&self) -> Option<u32> {
    Some(4242)
  }

  fn wait(&mut self) -> BoxFuture<'_, Result<(), ProcessError>> {
    Box::pin(async move {
      if self.killed {
        return Err(ProcessError::AbnormalExit("signal: 9 (SIGKILL)".into()));
      }
      match (&mut self.exit).await {
        Ok(result) => result,
        Err(_) => Err(ProcessError::AbnormalExit("test dropped the slave".into())),
      }
    })
  }

  fn start_kill(&mut self) -> io::Result<()> {
    self.killed = true;
    Ok(())
  }
}

/// The test's side of one fake instance.
pub struct FakeSlave {
  commands: Option<BufReader<DuplexStream>>,
  output: Option<DuplexStream>,
  exit: Option<oneshot::Sender<Result<(), ProcessError>>>,
}

impl FakeSlave {
  /// Next command line written by the supervisor, without the newline.
  pub async fn next_command(&mut self) -> Option<String> {
    let commands = self.commands.as_mut()?;
    let mut line = String::new();
    match commands.read_line(&mut line).await {
      Ok(0) | Err(_) => None,
      Ok(_) => {
        assert!(line.ends_with('\n'), "command not newline-terminated: {:?}", line);
        line.pop();
        Some(line)
      }
    }
  }

  pub async fn expect_command(&mut self) -> String {
    self
      .next_command()
      .await
      .expect("slave stdin closed while waiting for a command")
  }

  /// Write a line to the supervisor as MPlayer's stdout.
  pub async fn reply(&mut self, line: &str) {
    let output = self.output.as_mut().expect("slave output already closed");
    output.write_all(line.as_bytes()).await.unwrap();
    output.write_all(b"\n").await.unwrap();
  }

  /// Close stdin from the slave's end so the next write breaks the pipe.
  pub fn close_stdin(&mut self) {
    self.commands = None;
  }

  /// Terminate the instance with the given exit result.
  pub fn exit(mut self, result: Result<(), ProcessError>) {
    self.commands = None;
    self.output = None;
    if let Some(exit) = self.exit.take() {
      let _ = exit.send(result);
    }
  }
}

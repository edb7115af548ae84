//! MPlayer process detection and spawning.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

/// Flags putting MPlayer into slave mode with no file loaded.
pub const SLAVE_ARGS: [&str; 3] = ["-quiet", "-slave", "-idle"];

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("MPlayer executable not found")]
  NotFound,
  #[error("Failed to spawn MPlayer: {0}")]
  SpawnFailed(#[from] io::Error),
  #[error("MPlayer {0} pipe unavailable")]
  MissingPipe(&'static str),
  #[error("Failed to wait for MPlayer: {0}")]
  WaitFailed(io::Error),
  #[error("MPlayer exited abnormally: {0}")]
  AbnormalExit(String),
}

/// A running slave process, as seen by the supervisor.
pub trait SlaveProcess: Send {
  /// OS process id, if known.
  fn id(&self) -> Option<u32>;

  /// Resolves once the process has exited. `Ok` means a clean exit.
  ///
  /// Must be cancel-safe: the supervisor races it against the command queue.
  fn wait(&mut self) -> BoxFuture<'_, Result<(), ProcessError>>;

  /// Ask the process to die without waiting for it.
  fn start_kill(&mut self) -> io::Result<()>;
}

impl SlaveProcess for Child {
  fn id(&self) -> Option<u32> {
    Child::id(self)
  }

  fn wait(&mut self) -> BoxFuture<'_, Result<(), ProcessError>> {
    Box::pin(async move {
      let status = Child::wait(self).await.map_err(ProcessError::WaitFailed)?;
      if status.success() {
        Ok(())
      } else {
        Err(ProcessError::AbnormalExit(status.to_string()))
      }
    })
  }

  fn start_kill(&mut self) -> io::Result<()> {
    Child::start_kill(self)
  }
}

/// One slave instance with its pipes. Replaced as a unit on every restart.
pub struct SlaveHandle {
  pub process: Box<dyn SlaveProcess>,
  pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
  pub stdout: Box<dyn AsyncRead + Send + Unpin>,
}

/// Starts slave instances for the supervisor.
pub trait Launcher: Send + Sync {
  fn launch(&self) -> Result<SlaveHandle, ProcessError>;
}

/// Launches the real MPlayer binary.
#[derive(Debug, Clone, Default)]
pub struct MplayerLauncher {
  mplayer_path: Option<PathBuf>,
}

impl MplayerLauncher {
  /// `None` means auto-detect on every launch.
  pub fn new(mplayer_path: Option<PathBuf>) -> Self {
    Self { mplayer_path }
  }
}

impl Launcher for MplayerLauncher {
  fn launch(&self) -> Result<SlaveHandle, ProcessError> {
    let mut child = spawn_mplayer(self.mplayer_path.as_ref())?;
    // Dropping `child` on the error paths kills it (kill_on_drop).
    let stdin = child.stdin.take().ok_or(ProcessError::MissingPipe("stdin"))?;
    let stdout = child.stdout.take().ok_or(ProcessError::MissingPipe("stdout"))?;

    Ok(SlaveHandle {
      process: Box::new(child),
      stdin: Box::new(stdin),
      stdout: Box::new(stdout),
    })
  }
}

/// Install locations checked when `mplayer` is not on `PATH`.
#[cfg(windows)]
const INSTALL_LOCATIONS: &[&str] = &[
  r"C:\Program Files\MPlayer\mplayer.exe",
  r"C:\Program Files (x86)\MPlayer\mplayer.exe",
];
#[cfg(target_os = "macos")]
const INSTALL_LOCATIONS: &[&str] = &["/opt/homebrew/bin/mplayer", "/opt/local/bin/mplayer"];
#[cfg(not(any(windows, target_os = "macos")))]
const INSTALL_LOCATIONS: &[&str] = &["/usr/local/bin/mplayer", "/usr/bin/mplayer"];

/// Locate the MPlayer executable, preferring `PATH`.
pub fn find_mplayer() -> Option<PathBuf> {
  which::which("mplayer").ok().or_else(|| {
    INSTALL_LOCATIONS
      .iter()
      .map(PathBuf::from)
      .find(|path| path.is_file())
  })
}

/// Spawn MPlayer in slave mode with stdin and stdout piped.
pub fn spawn_mplayer(mplayer_path: Option<&PathBuf>) -> Result<Child, ProcessError> {
  let mplayer_exe = mplayer_path
    .cloned()
    .or_else(find_mplayer)
    .ok_or(ProcessError::NotFound)?;

  log::info!("Spawning MPlayer: {:?} {}", mplayer_exe, SLAVE_ARGS.join(" "));

  let mut command = Command::new(&mplayer_exe);
  command
    .args(SLAVE_ARGS)
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::null())
    .kill_on_drop(true);
  // Own process group, so a terminal Ctrl-C reaches us and not MPlayer.
  #[cfg(unix)]
  command.process_group(0);

  Ok(command.spawn()?)
}

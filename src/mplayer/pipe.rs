//! Line I/O over the slave's stdin and stdout pipes.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;

use super::protocol::{is_stop_signal, parse_answer, SlaveCommand, ERROR_ANSWER, PATH_PROPERTY};
use super::session::{SessionEnd, SessionSlot};

#[derive(Error, Debug)]
pub enum PipeError {
  #[error("Write to MPlayer failed: {0}")]
  WriteFailed(#[from] io::Error),
}

/// A command waiting in the queue. `delivered` fires once it has been written.
pub struct Outbound {
  pub command: SlaveCommand,
  pub delivered: oneshot::Sender<()>,
}

/// Write one command line and flush it through.
pub async fn write_command<W: AsyncWrite + Unpin>(
  writer: &mut W,
  command: &SlaveCommand,
) -> Result<(), PipeError> {
  writer.write_all(&command.to_line()).await?;
  writer.flush().await?;
  log::debug!("MPlayer command written: {}", command);
  Ok(())
}

/// Read the slave's stdout until it closes, ending the armed session when
/// MPlayer reports that nothing is loaded in answer to one of its own queries.
///
/// Read errors end the loop quietly: a closed pipe is how a dead process
/// shows up here, and the supervisor learns about it from `wait` anyway.
pub async fn reader_loop<R: AsyncRead + Unpin>(reader: R, session: Arc<SessionSlot>) {
  log::debug!("MPlayer output reader started");
  let mut buf_reader = BufReader::new(reader);
  let mut line = Vec::new();

  loop {
    line.clear();
    match buf_reader.read_until(b'\n', &mut line).await {
      Ok(0) => {
        log::debug!("MPlayer output closed");
        break;
      }
      Ok(_) => {
        // File names in MPlayer's output are not necessarily UTF-8.
        let text = String::from_utf8_lossy(&line);
        let trimmed = text.trim();
        if trimmed.is_empty() {
          continue;
        }

        let Some((name, value)) = parse_answer(trimmed) else {
          continue;
        };
        log::trace!("MPlayer answer: {}={}", name, value);
        if name != PATH_PROPERTY && name != ERROR_ANSWER {
          continue;
        }

        let fresh = session.answer_received();
        if !is_stop_signal(trimmed) {
          continue;
        }
        if !fresh {
          log::debug!("Ignoring stale {} from an earlier session", trimmed);
        } else if session.end(SessionEnd::Finished) {
          log::info!("MPlayer has nothing loaded, playback finished");
        }
      }
      Err(e) => {
        log::debug!("MPlayer output read error: {}", e);
        break;
      }
    }
  }
}

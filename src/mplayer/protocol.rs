//! MPlayer slave-mode line protocol.
//!
//! Reference: http://www.mplayerhq.hu/DOCS/tech/slave.txt
//!
//! Only the handful of commands the player needs are modeled. Everything else
//! goes through [`SlaveCommand::new`] verbatim.

use std::fmt;

/// Property queried to find out whether anything is still loaded.
pub const PATH_PROPERTY: &str = "path";

/// Answer to `get_property path` when nothing is loaded anymore.
pub const NULL_PATH_ANSWER: &str = "ANS_path=(null)";

/// Answer name MPlayer uses when a property query fails.
pub const ERROR_ANSWER: &str = "ERROR";

/// One line written to the slave's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveCommand(String);

impl SlaveCommand {
  /// Wrap a raw command line. Trailing line terminators are dropped, the
  /// writer adds its own.
  pub fn new(line: impl Into<String>) -> Self {
    let mut line = line.into();
    while line.ends_with(|c: char| c == '\n' || c == '\r') {
      line.pop();
    }
    Self(line)
  }

  /// Load a file for playback, replacing whatever is playing.
  pub fn loadfile(path: &str) -> Self {
    Self(format!("loadfile {}", quote_argument(path)))
  }

  /// Stop playback and unload the current file.
  pub fn stop() -> Self {
    Self("stop".to_string())
  }

  /// Ask for a property value. The answer comes back as `ANS_<name>=<value>`.
  pub fn get_property(name: &str) -> Self {
    Self(format!("get_property {}", name))
  }

  /// Whether this asks for the loaded path, which every session polls.
  pub fn is_path_query(&self) -> bool {
    self.0.strip_prefix("get_property ") == Some(PATH_PROPERTY)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Bytes to write to the pipe, newline-terminated.
  pub fn to_line(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(self.0.len() + 1);
    bytes.extend_from_slice(self.0.as_bytes());
    bytes.push(b'\n');
    bytes
  }
}

impl fmt::Display for SlaveCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for SlaveCommand {
  fn from(line: &str) -> Self {
    Self::new(line)
  }
}

impl From<String> for SlaveCommand {
  fn from(line: String) -> Self {
    Self::new(line)
  }
}

/// The slave parser splits arguments on whitespace, so anything with spaces
/// or quotes must be sent as a quoted, backslash-escaped string.
fn quote_argument(arg: &str) -> String {
  let needs_quotes = arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"');
  if !needs_quotes {
    return arg.to_string();
  }

  let mut quoted = String::with_capacity(arg.len() + 2);
  quoted.push('"');
  for c in arg.chars() {
    if c == '"' || c == '\\' {
      quoted.push('\\');
    }
    quoted.push(c);
  }
  quoted.push('"');
  quoted
}

/// True when a (trimmed) output line means playback has ended.
///
/// MPlayer has no end-of-file notification on the slave channel; the only
/// signal is the `path` property going back to null.
pub fn is_stop_signal(line: &str) -> bool {
  line == NULL_PATH_ANSWER
}

/// Split an `ANS_<name>=<value>` answer line into its name and value.
pub fn parse_answer(line: &str) -> Option<(&str, &str)> {
  line.strip_prefix("ANS_")?.split_once('=')
}

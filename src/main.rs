use std::time::Duration;

use mplayer_slave::{init_logging, Player, PlayerConfig};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const USAGE: &str = "usage: mplayer-slave [--max-seconds N] FILE...";

#[derive(Debug, PartialEq)]
struct Args {
  files: Vec<String>,
  max_duration: Option<Duration>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
  let mut files = Vec::new();
  let mut max_duration = None;
  let mut args = args.into_iter();

  while let Some(arg) = args.next() {
    match arg.as_str() {
      "--max-seconds" => {
        let value = args.next().ok_or("--max-seconds needs a value")?;
        let secs: u64 = value
          .parse()
          .map_err(|_| format!("invalid --max-seconds value: {}", value))?;
        if secs == 0 {
          return Err("--max-seconds must be at least 1".to_string());
        }
        max_duration = Some(Duration::from_secs(secs));
      }
      "--" => files.extend(args.by_ref()),
      _ => files.push(arg),
    }
  }

  if files.is_empty() {
    return Err("no files given".to_string());
  }
  Ok(Args {
    files,
    max_duration,
  })
}

/// Ctrl-C skips the current file; a second Ctrl-C within a second cancels
/// `quit`.
fn skip_on_ctrl_c(player: Player, quit: CancellationToken) {
  tokio::spawn(async move {
    let mut last: Option<Instant> = None;
    loop {
      if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        return;
      }
      if last.is_some_and(|at| at.elapsed() < Duration::from_secs(1)) {
        log::info!("Quitting");
        quit.cancel();
        return;
      }
      last = Some(Instant::now());
      player.skip();
    }
  });
}

#[tokio::main]
async fn main() {
  init_logging();

  let args = match parse_args(std::env::args().skip(1)) {
    Ok(args) => args,
    Err(e) => {
      eprintln!("mplayer-slave: {}\n{}", e, USAGE);
      std::process::exit(2);
    }
  };

  let config = match PlayerConfig::load() {
    Ok(config) => config,
    Err(e) => {
      log::error!("{}", e);
      std::process::exit(1);
    }
  };

  let player = Player::new(config);
  player.supervise_with_logging();
  let quit = CancellationToken::new();
  skip_on_ctrl_c(player.clone(), quit.clone());
  play_all(&player, &args, &quit).await;
  // Returning drops the runtime, and with it MPlayer (kill_on_drop).
}

/// Play every file in order, stopping early once `quit` is cancelled.
async fn play_all(player: &Player, args: &Args, quit: &CancellationToken) {
  for file in &args.files {
    let playing = async {
      match args.max_duration {
        Some(duration) => player.play_and_wait_with_duration(file, duration).await,
        None => player.play_and_wait(file).await,
      }
    };
    tokio::select! {
      _ = quit.cancelled() => {
        log::info!("Stopped before finishing {}", file);
        return;
      }
      end = playing => log::debug!("{} -> {:?}", file, end),
    }
  }
}

//! Runs a player process until it exits or the user interrupts.
//!
//! The child inherits stdout/stderr so player diagnostics stay visible.
//! It is spawned with kill-on-drop, so no return path leaves it running.

use std::io;
use std::process::Stdio;

use tokio::process::{ChildStdin, Command};
use tokio::signal;
use tracing::{debug, info, warn};

use crate::client::AudioStream;
use crate::error::{Result, SayError};

/// Run `command` to completion, optionally streaming `stdin` into it.
///
/// A termination signal (SIGINT, SIGTERM, SIGHUP) kills the child and
/// counts as success. A non-zero exit is an error.
pub async fn run_with_cleanup(mut command: Command, stdin: Option<AudioStream>) -> Result<()> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| SayError::PlayerLaunch {
        program: program.clone(),
        source,
    })?;
    debug!("Started {program} (pid {:?})", child.id());

    let feeder = match (stdin, child.stdin.take()) {
        (Some(audio), Some(pipe)) => Some(tokio::spawn(feed_stdin(audio, pipe))),
        _ => None,
    };

    let exited = tokio::select! {
        status = child.wait() => Some(status),
        () = termination_signal() => None,
    };

    let status = match exited {
        None => {
            if let Some(handle) = feeder {
                handle.abort();
            }
            info!("Interrupted, stopping {program}");
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {program}: {e}");
            }
            return Ok(());
        }
        Some(Ok(status)) => status,
        Some(Err(source)) => return Err(SayError::PlayerLaunch { program, source }),
    };

    if !status.success() {
        if let Some(handle) = feeder {
            handle.abort();
        }
        return Err(SayError::PlayerExit { program, status });
    }

    // The player may exit cleanly on truncated input; a failed download
    // still has to surface.
    if let Some(handle) = feeder {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(source)) => return Err(SayError::AudioStream { source }),
            Err(e) => {
                return Err(SayError::AudioStream {
                    source: io::Error::other(e),
                })
            }
        }
    }

    debug!("{program} finished");
    Ok(())
}

/// Copy audio into the player's stdin, closing it at end of stream.
/// A player that stops reading early is not a failure.
async fn feed_stdin(audio: AudioStream, mut pipe: ChildStdin) -> io::Result<u64> {
    match audio.drain_into(&mut pipe).await {
        Ok(n) => {
            debug!("Streamed {n} bytes to player");
            Ok(n)
        }
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("Player closed stdin early");
            Ok(0)
        }
        Err(e) => {
            warn!("Failed to stream audio to player: {e}");
            Err(e)
        }
    }
}

/// Resolves on the first interrupt, terminate, or hangup signal.
pub(crate) async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let other = async {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};

        match (
            unix_signal(SignalKind::terminate()),
            unix_signal(SignalKind::hangup()),
        ) {
            (Ok(mut term), Ok(mut hup)) => {
                tokio::select! {
                    _ = term.recv() => {},
                    _ = hup.recv() => {},
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let other = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = other => {},
    }
}

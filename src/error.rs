//! Error taxonomy shared by the CLI and the web proxy.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SayError>;

#[derive(Error, Debug)]
pub enum SayError {
    #[error("No text provided. Pass text as argument or pipe to stdin.")]
    NoInputText,

    #[error("Kokoro server not found at {url}. Is it running?")]
    ServerUnreachable { url: String },

    #[error("server returned {status}")]
    ServerError { status: u16 },

    #[error("unsupported platform: {os}")]
    UnsupportedPlatform { os: String },

    #[error("failed to launch {program}: {source}")]
    PlayerLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    PlayerExit { program: String, status: ExitStatus },

    #[error("audio stream failed: {source}")]
    AudioStream {
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Usage(String),

    #[error("web server: {0}")]
    Web(String),
}

impl SayError {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }
}

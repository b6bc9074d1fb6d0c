//! Kokoro speech client.
//!
//! Sends one OpenAI-compatible `/v1/audio/speech` request and hands back
//! the response body as a live stream. The caller decides where the
//! audio goes: a file, a player's stdin, or a scratch file.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use crate::error::{Result, SayError};

pub const SPEECH_PATH: &str = "/v1/audio/speech";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Join a server base URL and an API path.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

/// JSON body of a speech request.
#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest {
    input: String,
    voice: String,
    speed: f32,
    response_format: &'static str,
}

impl SpeechRequest {
    pub fn new(input: impl Into<String>, voice: impl Into<String>, speed: f32) -> Self {
        Self {
            input: input.into(),
            voice: voice.into(),
            speed,
            response_format: "mp3",
        }
    }
}

/// Encoded audio of unknown length, read once by a single consumer.
///
/// Every consumer takes the stream by value; dropping it releases the
/// underlying connection.
pub struct AudioStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl AudioStream {
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
        }
    }

    fn from_response(response: reqwest::Response) -> Self {
        let body = response.bytes_stream().map_err(io::Error::other);
        Self::from_reader(StreamReader::new(body))
    }

    /// Copy the whole stream into `writer`. Returns the byte count.
    pub async fn drain_into<W>(mut self, writer: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        tokio::io::copy(&mut self.reader, writer).await
    }
}

pub struct SpeechClient {
    base_url: String,
    client: Client,
}

impl SpeechClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.to_string(),
            client,
        }
    }

    /// Request speech and return the open audio body on HTTP 200.
    pub async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioStream> {
        let url = endpoint(&self.base_url, SPEECH_PATH);
        debug!(
            "POST {url} ({} chars, voice={}, speed={})",
            request.input.chars().count(),
            request.voice,
            request.speed
        );

        let response = match self.client.post(&url).json(request).send().await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_connect() {
                    warn!("Cannot connect to Kokoro at {}", self.base_url);
                } else if e.is_timeout() {
                    warn!("Kokoro request timed out");
                } else {
                    warn!("Kokoro request failed: {e}");
                }
                return Err(SayError::ServerUnreachable {
                    url: self.base_url.clone(),
                });
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Kokoro returned status {status}");
            drop(response);
            return Err(SayError::ServerError {
                status: status.as_u16(),
            });
        }

        Ok(AudioStream::from_response(response))
    }

    /// Synthesize straight into `path`. The file is only created once the
    /// server has accepted the request.
    pub async fn synthesize_to_file(&self, request: &SpeechRequest, path: &Path) -> Result<()> {
        let audio = self.synthesize(request).await?;
        save_to_file(path, audio).await
    }
}

/// Write an audio stream to `path`, replacing any existing file.
pub async fn save_to_file(path: &Path, audio: AudioStream) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| SayError::file_io(path, e))?;

    let bytes = audio
        .drain_into(&mut file)
        .await
        .map_err(|e| SayError::file_io(path, e))?;
    file.flush().await.map_err(|e| SayError::file_io(path, e))?;

    info!("Saved {bytes} bytes to {}", path.display());
    Ok(())
}

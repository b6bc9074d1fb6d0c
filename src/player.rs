//! Audio player selection and playback.
//!
//! Each platform has a priority-ordered table of player binaries. The first
//! one found on `PATH` wins. Players that read stdin get the stream piped
//! straight in; the rest get a scratch file that is removed afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::client::AudioStream;
use crate::error::{Result, SayError};
use crate::runner::run_with_cleanup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioInput {
    Stdin,
    TempFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    pub program: &'static str,
    pub args: &'static [&'static str],
    pub input: AudioInput,
    /// Last resort, used without probing.
    pub assume_present: bool,
}

impl Player {
    const fn new(program: &'static str, args: &'static [&'static str], input: AudioInput) -> Self {
        Self {
            program,
            args,
            input,
            assume_present: false,
        }
    }

    const fn fallback(program: &'static str) -> Self {
        Self {
            program,
            args: &[],
            input: AudioInput::TempFile,
            assume_present: true,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.program);
        cmd.args(self.args);
        cmd
    }
}

const MPV: Player = Player::new("mpv", &["--no-video", "--really-quiet", "-"], AudioInput::Stdin);
const FFPLAY: Player = Player::new(
    "ffplay",
    &["-nodisp", "-autoexit", "-loglevel", "quiet", "-"],
    AudioInput::Stdin,
);
const PAPLAY: Player = Player::new("paplay", &[], AudioInput::TempFile);
const AFPLAY: Player = Player::fallback("afplay");
const APLAY: Player = Player::fallback("aplay");

const MACOS_PLAYERS: &[Player] = &[MPV, FFPLAY, AFPLAY];
const LINUX_PLAYERS: &[Player] = &[MPV, FFPLAY, PAPLAY, APLAY];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Other(String),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn players(&self) -> &'static [Player] {
        match self {
            Self::MacOs => MACOS_PLAYERS,
            Self::Linux => LINUX_PLAYERS,
            Self::Other(_) => &[],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOs => write!(f, "macos"),
            Self::Linux => write!(f, "linux"),
            Self::Other(os) => write!(f, "{os}"),
        }
    }
}

/// Answers whether a program can be launched by name.
pub trait ProgramProbe: Send + Sync {
    fn is_available(&self, program: &str) -> bool;
}

/// Looks programs up on `PATH`.
pub struct SearchPath;

impl ProgramProbe for SearchPath {
    fn is_available(&self, program: &str) -> bool {
        executable_in_path(program)
    }
}

fn executable_in_path(program: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };

    std::env::split_paths(&path_var).any(|dir| is_executable(&dir.join(program)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

pub struct Dispatcher {
    platform: Platform,
    players: Vec<Player>,
    probe: Box<dyn ProgramProbe>,
    temp_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(platform: Platform) -> Self {
        Self {
            players: platform.players().to_vec(),
            platform,
            probe: Box::new(SearchPath),
            temp_dir: std::env::temp_dir(),
        }
    }

    #[cfg(test)]
    fn with_probe(mut self, probe: impl ProgramProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    #[cfg(test)]
    fn with_players(mut self, players: Vec<Player>) -> Self {
        self.players = players;
        self
    }

    #[cfg(test)]
    fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// First player in priority order that is present.
    pub fn select(&self) -> Result<Player> {
        self.players
            .iter()
            .find(|p| {
                let present = p.assume_present || self.probe.is_available(p.program);
                debug!("Player {}: {}", p.program, if present { "found" } else { "missing" });
                present
            })
            .copied()
            .ok_or_else(|| SayError::UnsupportedPlatform {
                os: self.platform.to_string(),
            })
    }

    pub async fn play(&self, audio: AudioStream) -> Result<()> {
        let player = self.select()?;
        info!("Playing with {}", player.program);

        match player.input {
            AudioInput::Stdin => run_with_cleanup(player.command(), Some(audio)).await,
            AudioInput::TempFile => self.play_from_temp_file(&player, audio).await,
        }
    }

    /// Buffer the whole stream to disk, then hand the path to the player.
    /// The scratch file is deleted when `scratch` drops, on every path.
    async fn play_from_temp_file(&self, player: &Player, audio: AudioStream) -> Result<()> {
        let scratch = tempfile::Builder::new()
            .prefix("kokoro-")
            .suffix(".mp3")
            .tempfile_in(&self.temp_dir)
            .map_err(|e| SayError::file_io(&self.temp_dir, e))?;
        let path = scratch.path().to_path_buf();

        let handle = scratch.reopen().map_err(|e| SayError::file_io(&path, e))?;
        let mut file = tokio::fs::File::from_std(handle);
        let bytes = audio
            .drain_into(&mut file)
            .await
            .map_err(|e| SayError::file_io(&path, e))?;
        file.flush().await.map_err(|e| SayError::file_io(&path, e))?;
        drop(file);
        debug!("Buffered {bytes} bytes to {}", path.display());

        let mut cmd = player.command();
        cmd.arg(&path);
        let result = run_with_cleanup(cmd, None).await;

        drop(scratch);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Only(&'static [&'static str]);

    impl ProgramProbe for Only {
        fn is_available(&self, program: &str) -> bool {
            self.0.contains(&program)
        }
    }

    fn linux_with(present: &'static [&'static str]) -> Dispatcher {
        Dispatcher::new(Platform::Linux).with_probe(Only(present))
    }

    fn macos_with(present: &'static [&'static str]) -> Dispatcher {
        Dispatcher::new(Platform::MacOs).with_probe(Only(present))
    }

    fn audio() -> AudioStream {
        AudioStream::from_reader(&b"ID3 fake mp3 payload"[..])
    }

    fn scratch_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[test]
    fn platform_from_os_name() {
        assert_eq!(Platform::from_os("macos"), Platform::MacOs);
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
        assert_eq!(
            Platform::from_os("windows"),
            Platform::Other("windows".into())
        );
    }

    #[test]
    fn linux_priority_order() {
        assert_eq!(linux_with(&["ffplay", "mpv", "paplay"]).select().unwrap(), MPV);
        assert_eq!(linux_with(&["ffplay", "paplay"]).select().unwrap(), FFPLAY);
        assert_eq!(linux_with(&["paplay"]).select().unwrap(), PAPLAY);
        assert_eq!(linux_with(&[]).select().unwrap(), APLAY);
    }

    #[test]
    fn macos_priority_order() {
        assert_eq!(macos_with(&["mpv", "ffplay"]).select().unwrap(), MPV);
        assert_eq!(macos_with(&["ffplay"]).select().unwrap(), FFPLAY);
        assert_eq!(macos_with(&[]).select().unwrap(), AFPLAY);
    }

    #[test]
    fn stdin_capability_per_player() {
        assert_eq!(MPV.input, AudioInput::Stdin);
        assert_eq!(FFPLAY.input, AudioInput::Stdin);
        assert_eq!(PAPLAY.input, AudioInput::TempFile);
        assert_eq!(AFPLAY.input, AudioInput::TempFile);
        assert_eq!(APLAY.input, AudioInput::TempFile);
    }

    #[tokio::test]
    async fn unknown_platform_is_unsupported() {
        let dispatcher =
            Dispatcher::new(Platform::Other("plan9".into())).with_probe(Only(&["mpv"]));

        let err = dispatcher.play(audio()).await.unwrap_err();

        match err {
            SayError::UnsupportedPlatform { os } => assert_eq!(os, "plan9"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn search_path_finds_shell() {
        assert!(SearchPath.is_available("sh"));
        assert!(!SearchPath.is_available("kokoro-say-no-such-player"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn temp_file_player_sees_audio_and_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        // Succeeds only if the path it is given is a non-empty file
        let checker = Player::new("sh", &["-c", "test -s \"$0\""], AudioInput::TempFile);
        let dispatcher = Dispatcher::new(Platform::Linux)
            .with_players(vec![checker])
            .with_probe(Only(&["sh"]))
            .with_temp_dir(dir.path());

        dispatcher.play(audio()).await.unwrap();

        assert!(scratch_files(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn temp_file_removed_when_player_fails() {
        let dir = tempfile::tempdir().unwrap();
        let failing = Player::new("false", &[], AudioInput::TempFile);
        let dispatcher = Dispatcher::new(Platform::Linux)
            .with_players(vec![failing])
            .with_probe(Only(&["false"]))
            .with_temp_dir(dir.path());

        let err = dispatcher.play(audio()).await.unwrap_err();

        assert!(matches!(err, SayError::PlayerExit { .. }), "{err:?}");
        assert!(scratch_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn temp_file_removed_when_player_cannot_start() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(Platform::Linux)
            .with_players(vec![Player::fallback("kokoro-say-no-such-player")])
            .with_temp_dir(dir.path());

        let err = dispatcher.play(audio()).await.unwrap_err();

        assert!(matches!(err, SayError::PlayerLaunch { .. }), "{err:?}");
        assert!(scratch_files(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdin_player_reads_stream() {
        let reader = Player::new("sh", &["-c", "head -c 3 | grep -q ID3"], AudioInput::Stdin);
        let dispatcher = Dispatcher::new(Platform::Linux)
            .with_players(vec![reader])
            .with_probe(Only(&["sh"]));

        dispatcher.play(audio()).await.unwrap();
    }
}

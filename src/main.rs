//! kokoro-say: speak text through a Kokoro TTS server.

mod client;
mod config;
mod error;
mod player;
mod runner;
#[cfg(test)]
mod test_support;
mod text;
mod voices;
mod web;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use client::{SpeechClient, SpeechRequest};
use config::Config;
use error::{Result, SayError};
use player::{Dispatcher, Platform};

const EXAMPLES: &str = "\
Examples:
  kokoro-say \"Hello, world!\"
  echo \"Hello\" | kokoro-say
  kokoro-say -v bf_emma \"British accent\"
  kokoro-say -o output.mp3 \"Save to file\"
  kokoro-say web -port 3000

Environment:
  KOKORO_URL  Kokoro server base URL (default http://localhost:8880)";

#[derive(Parser, Debug)]
#[command(
    name = "kokoro-say",
    version,
    about = "Convert text to speech using Kokoro TTS",
    after_help = EXAMPLES
)]
struct Cli {
    /// Voice to use
    #[arg(short = 'v', long)]
    voice: Option<String>,

    /// Speech speed (0.5-2.0)
    #[arg(short = 's', long, value_parser = parse_speed)]
    speed: Option<f32>,

    /// Output file (instead of playing)
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// List available voices
    #[arg(long)]
    voices: bool,

    /// Path to a YAML file with default settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Text to speak; read from stdin when omitted
    #[arg(trailing_var_arg = true, num_args = 1..)]
    text: Vec<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the web interface
    Web(WebArgs),
}

#[derive(Args, Debug)]
struct WebArgs {
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Don't open the browser automatically
    #[arg(long)]
    no_browser: bool,
}

fn parse_speed(value: &str) -> std::result::Result<f32, String> {
    let speed: f32 = value.parse().map_err(|e| format!("invalid speed '{value}': {e}"))?;
    config::validate_speed(speed)
}

/// Long flags that may be written Go-style with a single dash.
const LONG_FLAGS: &[&str] = &[
    "voices",
    "voice",
    "speed",
    "output",
    "port",
    "no-browser",
    "config",
    "verbose",
];

/// Flags whose value is the following argument.
const VALUE_FLAGS: &[&str] = &[
    "-v", "-s", "-o", "--voice", "--speed", "--output", "--port", "--config",
];

/// Rewrite `-voices` style flags to `--voices` up to the first word of text.
/// Everything from the text onwards is passed through untouched. `web` is
/// the subcommand only as the very first argument; later it is plain text.
fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut out: Vec<String> = args.next().into_iter().collect();
    let mut expect_value = false;
    let mut verbatim = false;

    for arg in args {
        if verbatim || expect_value {
            expect_value = false;
            out.push(arg);
            continue;
        }

        if arg == "--" {
            verbatim = true;
            out.push(arg);
            continue;
        }

        let arg = match arg.strip_prefix('-') {
            Some(rest) if !rest.starts_with('-') => {
                let name = rest.split('=').next().unwrap_or(rest);
                if LONG_FLAGS.contains(&name) {
                    format!("-{arg}")
                } else {
                    arg
                }
            }
            _ => arg,
        };

        if arg.starts_with('-') {
            expect_value = VALUE_FLAGS.contains(&arg.as_str());
        } else if arg != "web" || out.len() != 1 {
            if arg == "web" {
                out.push("--".to_string());
            }
            verbatim = true;
        }
        out.push(arg);
    }

    out
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args())) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the defaults.
fn init_logging(cli: &Cli) {
    let default = if cli.verbose {
        "debug,hyper=info,hyper_util=info,reqwest=info"
    } else if cli.command.is_some() {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref());
    debug!("Config: {config:?}");

    if let Some(Command::Web(args)) = &cli.command {
        return web::serve(web::WebOptions {
            port: args.port.unwrap_or(config.web.port),
            open_browser: config.web.open_browser && !args.no_browser,
            server_url: config.server_url,
        })
        .await;
    }

    speak(cli, config).await
}

async fn speak(cli: Cli, config: Config) -> Result<()> {
    if cli.voices {
        for voice in voices::VOICES {
            println!("{voice}");
        }
        return Ok(());
    }

    let text = text::acquire(&cli.text);
    if text.is_empty() {
        return Err(SayError::NoInputText);
    }

    let voice = cli.voice.unwrap_or(config.voice);
    let speed = match cli.speed {
        Some(speed) => speed,
        None => config::validate_speed(config.speed).map_err(SayError::Usage)?,
    };
    info!("Speaking {} chars with {voice} at {speed}x", text.chars().count());

    let client = SpeechClient::new(&config.server_url);
    let request = SpeechRequest::new(text, voice, speed);

    if let Some(path) = cli.output {
        return client.synthesize_to_file(&request, &path).await;
    }

    let audio = client.synthesize(&request).await?;
    Dispatcher::new(Platform::current()).play(audio).await
}

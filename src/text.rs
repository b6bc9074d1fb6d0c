//! Resolves the text to speak from arguments or piped stdin.

use std::io::{IsTerminal, Read};

use tracing::{debug, warn};

/// Text from the process's own arguments and stdin.
pub fn acquire(args: &[String]) -> String {
    let stdin = std::io::stdin();
    let is_terminal = stdin.is_terminal();
    resolve_text(args, stdin.lock(), is_terminal)
}

/// Arguments win when present. Otherwise a non-terminal stdin is read to
/// the end and trimmed. Empty means no input.
pub fn resolve_text<R: Read>(args: &[String], mut stdin: R, stdin_is_terminal: bool) -> String {
    if !args.is_empty() {
        return args.join(" ");
    }

    if stdin_is_terminal {
        return String::new();
    }

    let mut buf = Vec::new();
    match stdin.read_to_end(&mut buf) {
        Ok(n) => {
            debug!("Read {n} bytes from stdin");
            String::from_utf8_lossy(&buf).trim().to_string()
        }
        Err(e) => {
            warn!("Failed to read stdin: {e}");
            String::new()
        }
    }
}

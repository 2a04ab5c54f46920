//! Exit information from PBS output logs
//!
//! The cluster may still be writing a log when we look at it, so nothing
//! here fails: an unreadable file or a missing line is `None`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const EXIT_COMMENT_PREFIX: &str = "=>> PBS: ";
const EXIT_STATUS_PREFIX: &str = "Exit Status";

/// Lines of the log, decoded lossily. The job's own output shares the file
/// and may hold arbitrary bytes ahead of the lines PBS appends.
fn lines(path: &Path) -> Option<impl Iterator<Item = String> + '_> {
    let mut reader = match File::open(path) {
        Ok(file) => BufReader::new(file),
        Err(e) => {
            tracing::debug!("Cannot read log {}: {}", path.display(), e);
            return None;
        }
    };
    let mut buf = Vec::new();
    Some(std::iter::from_fn(move || {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => None,
            Ok(_) => Some(
                String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string(),
            ),
            Err(e) => {
                tracing::debug!("Stopped reading log {}: {}", path.display(), e);
                None
            }
        }
    }))
}

/// First `=>> PBS: ` line of the log, trailing whitespace removed
pub fn exit_comment(path: &Path) -> Option<String> {
    lines(path)?
        .find(|line| line.starts_with(EXIT_COMMENT_PREFIX))
        .map(|line| line.trim_end().to_string())
}

/// Integer after the first colon of the first parsable `Exit Status` line
pub fn exit_status(path: &Path) -> Option<i32> {
    lines(path)?.find_map(|line| {
        let line = line.trim();
        if !line.starts_with(EXIT_STATUS_PREFIX) {
            return None;
        }
        line.split_once(':')
            .and_then(|(_, value)| value.trim().parse().ok())
    })
}

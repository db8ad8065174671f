//! File ingestion into the shared input queue

use std::io::{self, BufRead};
use std::path::Path;

use crossbeam_channel::Sender;

use crate::decompression::DecompressionReader;
use crate::error::FileError;

/// Read `path` line by line and push every non-blank line into the input
/// queue, blocking while the queue is full. Returns the number of lines sent.
///
/// Line endings are removed and surrounding spaces trimmed. Tabs are kept so
/// that an empty trailing field survives. Invalid UTF-8 is replaced rather
/// than failing the file; the parser decides whether the line is usable.
pub fn ingest_file(path: &Path, line_sender: &Sender<String>) -> Result<usize, FileError> {
    let mut reader = DecompressionReader::new(path).map_err(|source| FileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(file = %path.display(), format = reader.kind(), "opened input");

    let mut buffer = Vec::new();
    let mut lines = 0usize;
    loop {
        buffer.clear();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .map_err(|source| FileError::Read {
                path: path.to_path_buf(),
                lines,
                source,
            })?;
        if read == 0 {
            break;
        }

        let text = String::from_utf8_lossy(&buffer);
        let line = trim_line(&text);
        if line.is_empty() {
            continue;
        }

        if line_sender.send(line.to_string()).is_err() {
            return Err(FileError::Read {
                path: path.to_path_buf(),
                lines,
                source: io::Error::new(io::ErrorKind::BrokenPipe, "input queue closed"),
            });
        }
        lines += 1;
    }

    Ok(lines)
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches('\n')
        .trim_end_matches('\r')
        .trim_matches(' ')
}

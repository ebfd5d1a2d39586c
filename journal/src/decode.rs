use std::fmt;
use std::io;
use std::ops::Range;
use std::sync::Arc;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};

use crate::entry::{Entry, EntryError};

/// Cooperative cancellation signal for [`read_from`].
///
/// Clones share one underlying flag; cancelling any clone cancels them all.
/// Cancellation is permanent.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        CancelToken {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token has been cancelled. Resolves immediately if
    /// it already is.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a journal from `reader`, sending each decoded entry to `entries`.
///
/// Decoding stops at the first bad line or I/O failure; no further entries
/// are produced. The sender is dropped on every return path, so the sink
/// closes exactly once and consumers can treat a closed sink as exhausted.
/// The terminal error travels out-of-band as this function's return value,
/// never as a sentinel on the sink.
///
/// Callers can force an early return by cancelling `cancel`. The token is
/// checked per would-be emission, between parsing a line and handing it to
/// the sink, and also interrupts a handoff blocked on a full bounded sink.
/// An entry parsed but not yet delivered when cancellation is observed is
/// dropped. A sink whose receiver has been dropped counts as cancellation by
/// the consumer.
pub async fn read_from<R>(
    reader: R,
    entries: mpsc::Sender<Entry>,
    cancel: CancelToken,
) -> Result<(), DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_number = 0usize;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(err) => return Err(DecodeError::Io(err)),
        };
        line_number += 1;
        let entry: Entry = line.parse().map_err(|err| DecodeError::Entry {
            line: line_number,
            source: err,
        })?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DecodeError::Cancelled),
            sent = entries.send(entry) => {
                if sent.is_err() {
                    return Err(DecodeError::Cancelled);
                }
            }
        }
    }
}

/// Terminal failure of a journal decode.
#[derive(Debug)]
pub enum DecodeError {
    /// A line failed to decode. `line` is 1-based.
    Entry { line: usize, source: EntryError },
    /// The underlying reader failed.
    Io(io::Error),
    /// The stream was stopped by caller-requested cancellation before it
    /// was exhausted.
    Cancelled,
}

impl DecodeError {
    /// Convert to a codespan-reporting Diagnostic for display.
    ///
    /// `text` must be the full source the journal was decoded from; entry
    /// errors are labelled with the byte span of the offending line.
    pub fn to_diagnostic(&self, file_id: usize, text: &str) -> Diagnostic<usize> {
        match self {
            DecodeError::Entry { line, source } => {
                let diagnostic = Diagnostic::error().with_message(source.to_string());
                match line_span(text, *line) {
                    Some(span) => diagnostic.with_labels(vec![Label::primary(file_id, span)]),
                    None => diagnostic.with_notes(vec![format!("on line {}", line)]),
                }
            }
            other => Diagnostic::error().with_message(other.to_string()),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Entry { line, source } => write!(f, "line {}: {}", line, source),
            DecodeError::Io(err) => write!(f, "read journal: {}", err),
            DecodeError::Cancelled => write!(f, "decode cancelled"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Entry { source, .. } => Some(source),
            DecodeError::Io(err) => Some(err),
            DecodeError::Cancelled => None,
        }
    }
}

/// Byte span of the 1-based line `number` within `text`, excluding the line
/// terminator.
fn line_span(text: &str, number: usize) -> Option<Range<usize>> {
    let mut offset = 0;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        if idx + 1 == number {
            let content = line.trim_end_matches(['\n', '\r']);
            return Some(offset..offset + content.len());
        }
        offset += line.len();
    }
    None
}

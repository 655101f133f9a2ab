//! Line Framer (spec §4.1).
//!
//! Turns a child process's stdout byte stream into a lazy sequence of
//! JSON-RPC message objects, splitting on `\n` or `\r\n`, buffering a
//! partial trailing fragment, and logging+dropping any line that is not
//! valid JSON. Mirrors the bounded, allocation-light line-reading loop in
//! the teacher crate's `StdioTransport::receive_message`, but decoupled
//! from any particular I/O source so it can frame a child's stdout chunk
//! stream, be unit tested in isolation, and be fuzzed directly.

use tracing::warn;

use crate::jsonrpc::JsonRpcMessage;
use crate::observability::metrics::record_framing_error;

/// Buffers partial stdout chunks and emits complete, trimmed lines.
///
/// Implements the `LineBuffer` entity from the data model (spec §3): the
/// tail of unread bytes belongs to whichever `Child` owns this framer.
#[derive(Debug, Default)]
pub struct LineFramer {
    tail: String,
}

impl LineFramer {
    /// Creates an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every complete line it completes,
    /// trimmed and with empty lines dropped. Invalid UTF-8 in `chunk` is
    /// replaced per `String::from_utf8_lossy`'s policy, which typically
    /// causes the affected line to fail JSON parsing downstream.
    pub fn push_lines(&mut self, chunk: &[u8]) -> Vec<String> {
        self.tail.push_str(&String::from_utf8_lossy(chunk));

        let mut lines = Vec::new();
        loop {
            let Some(pos) = self.tail.find('\n') else {
                break;
            };
            // Strip a preceding '\r' to accept both line endings.
            let end = if pos > 0 && self.tail.as_bytes()[pos - 1] == b'\r' {
                pos - 1
            } else {
                pos
            };
            let line = self.tail[..end].to_string();
            self.tail.drain(..=pos);

            let trimmed = line.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        lines
    }

    /// Appends a chunk and returns every complete line successfully
    /// parsed as a `JsonRpcMessage`. Lines that fail to parse are logged
    /// at `warn` and dropped — framing continues regardless.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<JsonRpcMessage> {
        self.push_lines(chunk)
            .into_iter()
            .filter_map(|line| match serde_json::from_str::<JsonRpcMessage>(&line) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, line = %truncate_for_log(&line, 200), "non-JSON line from child, dropping");
                    record_framing_error();
                    None
                }
            })
            .collect()
    }

    /// Bytes currently buffered as an incomplete trailing line.
    #[must_use]
    pub fn pending_tail_len(&self) -> usize {
        self.tail.len()
    }
}

fn truncate_for_log(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line(id: i64) -> String {
        serde_json::to_string(&json!({"jsonrpc":"2.0","method":"ping","id":id})).unwrap()
    }

    #[test]
    fn splits_on_lf() {
        let mut framer = LineFramer::new();
        let input = format!("{}\n{}\n", line(1), line(2));
        let msgs = framer.feed(input.as_bytes());
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].id().unwrap(), &json!(1));
        assert_eq!(msgs[1].id().unwrap(), &json!(2));
    }

    #[test]
    fn splits_on_crlf() {
        let mut framer = LineFramer::new();
        let input = format!("{}\r\n{}\r\n", line(1), line(2));
        let msgs = framer.feed(input.as_bytes());
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn buffers_partial_tail_across_chunks() {
        let mut framer = LineFramer::new();
        let full = line(42);
        let (first, second) = full.split_at(full.len() / 2);
        assert!(framer.feed(first.as_bytes()).is_empty());
        assert!(framer.pending_tail_len() > 0);
        let msgs = framer.feed(format!("{second}\n").as_bytes());
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id().unwrap(), &json!(42));
    }

    #[test]
    fn empty_lines_are_ignored() {
        let mut framer = LineFramer::new();
        let lines = framer.push_lines(b"\n\n\n");
        assert!(lines.is_empty());
    }

    #[test]
    fn non_json_lines_are_dropped_not_fatal() {
        let mut framer = LineFramer::new();
        let input = format!("not json at all\n{}\n", line(7));
        let msgs = framer.feed(input.as_bytes());
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id().unwrap(), &json!(7));
    }

    #[test]
    fn lone_newline_chunk_emits_one_empty_ignored_line() {
        let mut framer = LineFramer::new();
        let lines = framer.push_lines(b"\n");
        assert!(lines.is_empty());
        assert_eq!(framer.pending_tail_len(), 0);
    }

    proptest::proptest! {
        #[test]
        fn round_trip_concatenated_messages(ids in proptest::collection::vec(0i64..10_000, 0..20)) {
            let mut framer = LineFramer::new();
            let mut input = String::new();
            for (i, id) in ids.iter().enumerate() {
                input.push_str(&line(*id));
                input.push_str(if i % 2 == 0 { "\n" } else { "\r\n" });
            }
            let msgs = framer.feed(input.as_bytes());
            let got: Vec<i64> = msgs.iter().map(|m| m.id().unwrap().as_i64().unwrap()).collect();
            prop_assert_eq!(got, ids);
        }
    }
}

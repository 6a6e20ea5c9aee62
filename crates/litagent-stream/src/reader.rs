//! Stream Reader: bytes in, framed event records out.
//!
//! Chunks arrive at arbitrary byte boundaries. The reader decodes them
//! incrementally, accumulates text and emits one [`RawEventRecord`] per
//! blank-line separated block, only after the full separator was seen.

use std::collections::VecDeque;

use futures::StreamExt as _;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::errors::{DecodeError, TransportError};
use crate::transport::ByteSource;

const DATA_PREFIX: &str = "data: ";

/// Framing class of a record, taken from its first line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// First line starts with `data: `.
    Data,
    /// First line starts with `:` (keep-alive or comment).
    Comment,
    Other,
}

/// One logical record extracted from the byte stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEventRecord {
    pub kind: RecordKind,
    /// Unparsed payload with the field prefix removed.
    pub payload: String,
}

impl RawEventRecord {
    /// Creates a data record.
    pub fn data(payload: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Data,
            payload: payload.into(),
        }
    }
}

/// How a reader stopped producing records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderEnd {
    /// The source signalled end-of-stream.
    EndOfStream,
    /// The cancellation token fired.
    Cancelled,
    /// The source failed; the error was returned once by `next_record`.
    Failed(TransportError),
}

/// Incremental UTF-8 decoder that carries split multi-byte characters over
/// to the next chunk.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn decode(&mut self, chunk: &[u8]) -> Result<String, DecodeError> {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(err) => {
                let utf8_error = err.utf8_error();
                let mut bytes = err.into_bytes();
                let valid_up_to = utf8_error.valid_up_to();
                if utf8_error.error_len().is_some() {
                    return Err(DecodeError {
                        len: bytes.len(),
                        valid_up_to,
                    });
                }
                // Incomplete trailing character: keep it for the next chunk.
                self.carry = bytes.split_off(valid_up_to);
                String::from_utf8(bytes).map_err(|e| DecodeError {
                    len: e.as_bytes().len(),
                    valid_up_to: e.utf8_error().valid_up_to(),
                })
            }
        }
    }

    pub(crate) fn has_carry(&self) -> bool {
        !self.carry.is_empty()
    }
}

/// Splits accumulated text into records on blank-line separators.
#[derive(Debug, Default)]
pub(crate) struct RecordFramer {
    buf: String,
    scan_from: usize,
}

impl RecordFramer {
    pub(crate) fn push_str(&mut self, text: &str) -> Vec<RawEventRecord> {
        self.buf.push_str(text);
        let mut records = Vec::new();
        let mut consumed = 0;
        let mut from = self.scan_from;
        while let Some((idx, delim_len)) = find_separator(self.buf.as_bytes(), from) {
            if let Some(record) = parse_record(&self.buf[consumed..idx]) {
                records.push(record);
            }
            consumed = idx + delim_len;
            from = consumed;
        }
        if consumed > 0 {
            self.buf.drain(..consumed);
        }
        // A separator can straddle the next chunk by at most three bytes.
        self.scan_from = self.buf.len().saturating_sub(3);
        records
    }

    pub(crate) fn pending(&self) -> &str {
        &self.buf
    }
}

fn find_separator(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len()
            && buf[i] == b'\r'
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

pub(crate) fn parse_record(text: &str) -> Option<RawEventRecord> {
    let text = text.trim_start_matches(['\r', '\n']);
    if text.is_empty() {
        return None;
    }
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));
    let first = lines.next()?;

    let (kind, head) = if let Some(rest) = first.strip_prefix(DATA_PREFIX) {
        (RecordKind::Data, rest)
    } else if let Some(rest) = first.strip_prefix(':') {
        (RecordKind::Comment, rest.trim_start())
    } else {
        (RecordKind::Other, first)
    };

    let mut payload = head.to_string();
    for line in lines {
        payload.push('\n');
        let line = match kind {
            RecordKind::Data => line
                .strip_prefix("data:")
                .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
                .unwrap_or(line),
            RecordKind::Comment | RecordKind::Other => line,
        };
        payload.push_str(line);
    }
    Some(RawEventRecord { kind, payload })
}

enum Wait {
    Cancelled,
    Chunk(Option<Result<bytes::Bytes, TransportError>>),
}

/// Lazily reads [`RawEventRecord`]s from a [`ByteSource`].
///
/// Not restartable: once `next_record` returns `None` (or an error) the
/// source has been dropped. Dropping the reader also drops the source.
pub struct EventReader {
    source: Option<ByteSource>,
    token: CancelToken,
    decoder: Utf8Decoder,
    framer: RecordFramer,
    pending: VecDeque<RawEventRecord>,
    end: Option<ReaderEnd>,
    decode_errors: usize,
}

impl EventReader {
    /// Creates a reader that stops as soon as `token` is cancelled.
    pub fn new(source: ByteSource, token: CancelToken) -> Self {
        Self {
            source: Some(source),
            token,
            decoder: Utf8Decoder::default(),
            framer: RecordFramer::default(),
            pending: VecDeque::new(),
            end: None,
            decode_errors: 0,
        }
    }

    /// Returns the next record, `None` once the stream ended or was
    /// cancelled, or the transport error that terminated the source.
    pub async fn next_record(&mut self) -> Option<Result<RawEventRecord, TransportError>> {
        loop {
            if self.end.is_some() {
                return None;
            }
            if self.token.is_cancelled() {
                self.close(ReaderEnd::Cancelled);
                return None;
            }
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }

            let wait = {
                let source = self.source.as_mut()?;
                let token = &self.token;
                tokio::select! {
                    biased;
                    () = token.cancelled() => Wait::Cancelled,
                    next = source.next() => Wait::Chunk(next),
                }
            };

            match wait {
                Wait::Cancelled => {
                    debug!("stream reader cancelled");
                    self.close(ReaderEnd::Cancelled);
                    return None;
                }
                Wait::Chunk(None) => {
                    let fragment = self.framer.pending();
                    if !fragment.trim().is_empty() || self.decoder.has_carry() {
                        debug!(
                            fragment_len = fragment.len(),
                            "discarding unterminated trailing record"
                        );
                    }
                    self.close(ReaderEnd::EndOfStream);
                    return None;
                }
                Wait::Chunk(Some(Err(err))) => {
                    self.close(ReaderEnd::Failed(err.clone()));
                    return Some(Err(err));
                }
                Wait::Chunk(Some(Ok(chunk))) => match self.decoder.decode(&chunk) {
                    Ok(text) => {
                        let records = self.framer.push_str(&text);
                        self.pending.extend(records);
                    }
                    Err(err) => {
                        self.decode_errors += 1;
                        warn!(error = %err, "skipping undecodable chunk");
                    }
                },
            }
        }
    }

    /// Returns why the reader stopped, once it has.
    pub fn end(&self) -> Option<&ReaderEnd> {
        self.end.as_ref()
    }

    /// Number of chunks skipped because they were not valid UTF-8.
    pub fn decode_errors(&self) -> usize {
        self.decode_errors
    }

    /// Returns `true` while the underlying source is still held.
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    fn close(&mut self, end: ReaderEnd) {
        self.source = None;
        self.pending.clear();
        self.end = Some(end);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::transport::test_support::{bytewise, finite, hanging};

    async fn collect(source: ByteSource) -> (Vec<RawEventRecord>, EventReader) {
        let mut reader = EventReader::new(source, CancelToken::detached());
        let mut records = Vec::new();
        while let Some(next) = reader.next_record().await {
            records.push(next.expect("record"));
        }
        (records, reader)
    }

    #[test]
    fn framer_handles_partial_chunk_boundaries() {
        let mut framer = RecordFramer::default();
        assert!(framer.push_str("data: {\"stage\":\"wri").is_empty());
        assert!(framer.push_str("ter\"}\n").is_empty());
        let records = framer.push_str("\ndata: [DONE]\n\n");
        assert_eq!(
            records,
            vec![
                RawEventRecord::data("{\"stage\":\"writer\"}"),
                RawEventRecord::data("[DONE]"),
            ]
        );
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn framer_accepts_crlf_separators_split_across_chunks() {
        let mut framer = RecordFramer::default();
        assert!(framer.push_str("data: a\r\n\r").is_empty());
        let records = framer.push_str("\ndata: b\r\n\r\n");
        assert_eq!(
            records,
            vec![RawEventRecord::data("a"), RawEventRecord::data("b")]
        );
    }

    #[test]
    fn parse_record_classifies_kinds() {
        let comment = parse_record(": keep-alive").expect("comment");
        assert_eq!(comment.kind, RecordKind::Comment);
        assert_eq!(comment.payload, "keep-alive");

        let other = parse_record("event: ping").expect("other");
        assert_eq!(other.kind, RecordKind::Other);

        let no_space = parse_record("data:{}").expect("other");
        assert_eq!(no_space.kind, RecordKind::Other);

        assert!(parse_record("\n").is_none());
    }

    #[test]
    fn parse_record_joins_continuation_lines() {
        let record = parse_record("data: line one\ndata: line two\nraw three").expect("data");
        assert_eq!(record.kind, RecordKind::Data);
        assert_eq!(record.payload, "line one\nline two\nraw three");
    }

    #[test]
    fn utf8_decoder_carries_split_characters() {
        let mut decoder = Utf8Decoder::default();
        let bytes = "研究".as_bytes();
        assert_eq!(decoder.decode(&bytes[..1]).expect("partial"), "");
        assert_eq!(decoder.decode(&bytes[1..4]).expect("first char"), "研");
        assert!(decoder.has_carry());
        assert_eq!(decoder.decode(&bytes[4..]).expect("second char"), "究");
        assert!(!decoder.has_carry());
    }

    #[test]
    fn utf8_decoder_rejects_invalid_bytes() {
        let mut decoder = Utf8Decoder::default();
        let err = decoder.decode(&[b'o', b'k', 0xff, b'x']).expect_err("invalid");
        assert_eq!(err.valid_up_to, 2);
        assert_eq!(decoder.decode(b"fine").expect("recovers"), "fine");
    }

    #[tokio::test]
    async fn single_chunk_and_bytewise_delivery_frame_identically() {
        let stream = "data: {\"stage\":\"researcher\",\"status\":\"start\",\"message\":\"搜索\"}\n\n\
                      : ping\n\n\
                      data: [DONE]\n\n";
        let (whole, _) = collect(finite(vec![stream.as_bytes().to_vec()])).await;
        let (split, _) = collect(finite(bytewise(stream.as_bytes()))).await;
        assert_eq!(whole.len(), 3);
        assert_eq!(whole, split);
    }

    #[tokio::test]
    async fn trailing_fragment_is_discarded_at_end_of_stream() {
        let (records, reader) =
            collect(finite(vec![b"data: one\n\ndata: unterminated".to_vec()])).await;
        assert_eq!(records, vec![RawEventRecord::data("one")]);
        assert_eq!(reader.end(), Some(&ReaderEnd::EndOfStream));
        assert!(!reader.is_open());
    }

    #[tokio::test]
    async fn undecodable_chunk_is_skipped() {
        let (records, reader) = collect(finite(vec![
            b"data: a\n\n".to_vec(),
            vec![0xff, 0xfe],
            b"data: b\n\n".to_vec(),
        ]))
        .await;
        assert_eq!(
            records,
            vec![RawEventRecord::data("a"), RawEventRecord::data("b")]
        );
        assert_eq!(reader.decode_errors(), 1);
    }

    #[tokio::test]
    async fn transport_error_is_returned_once_and_releases_source() {
        let source: ByteSource = Box::pin(futures::stream::iter(vec![
            Ok(bytes::Bytes::from_static(b"data: a\n\n")),
            Err(TransportError::read("fake", "reset")),
            Ok(bytes::Bytes::from_static(b"data: b\n\n")),
        ]));
        let mut reader = EventReader::new(source, CancelToken::detached());
        assert_eq!(
            reader.next_record().await,
            Some(Ok(RawEventRecord::data("a")))
        );
        assert!(matches!(
            reader.next_record().await,
            Some(Err(TransportError::Read { .. }))
        ));
        assert!(!reader.is_open());
        assert!(reader.next_record().await.is_none());
        assert!(matches!(reader.end(), Some(ReaderEnd::Failed(_))));
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_wait_and_drops_source() {
        let (source, dropped) = hanging(vec![b"data: first\n\n".to_vec()]);
        let token = CancelToken::detached();
        let mut reader = EventReader::new(source, token.clone());
        assert_eq!(
            reader.next_record().await,
            Some(Ok(RawEventRecord::data("first")))
        );

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let next = tokio::time::timeout(Duration::from_secs(1), reader.next_record())
            .await
            .expect("reader must observe cancellation");
        assert!(next.is_none());
        assert_eq!(reader.end(), Some(&ReaderEnd::Cancelled));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_suppresses_already_framed_records() {
        let (source, dropped) = hanging(vec![b"data: a\n\ndata: b\n\n".to_vec()]);
        let token = CancelToken::detached();
        let mut reader = EventReader::new(source, token.clone());
        assert!(reader.next_record().await.is_some());
        token.cancel();
        assert!(reader.next_record().await.is_none());
        assert!(dropped.load(Ordering::SeqCst));
    }
}

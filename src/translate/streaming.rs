//! Incremental SSE transcoding from either upstream shape into chat-completion chunks.
//!
//! [`SseLineBuffer`] cuts the raw byte stream into lines, [`StreamTranscoder`]
//! reduces each line to at most one outgoing frame, and [`transcode`] drives both
//! over a live upstream body. Every transcoded stream ends with exactly one
//! [`DONE_FRAME`], whether upstream finished cleanly, closed early or failed.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::chat_types::{ChatCompletionChunk, ChunkChoice, ChunkDelta, FinishReason};
use super::messages_types::MessagesStreamEvent;
use super::response::{completion_id, map_stop_reason};
use super::responses_types::ResponsesStreamEvent;
use super::Vendor;

/// Terminal frame of every outgoing stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Queue depth between the transcoding task and the HTTP body.
pub const STREAM_QUEUE_DEPTH: usize = 256;

const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// What one upstream line turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Emit(Bytes),
    Skip,
    /// Upstream sent its own `[DONE]`; stop reading.
    Finished,
}

/// Per-stream reduction state: one id, one timestamp, the current event type.
#[derive(Debug)]
pub struct StreamTranscoder {
    vendor: Vendor,
    model: String,
    id: String,
    created: i64,
    current_event: Option<String>,
}

impl StreamTranscoder {
    pub fn new(vendor: Vendor, model: impl Into<String>) -> Self {
        Self {
            vendor,
            model: model.into(),
            id: completion_id(),
            created: chrono::Utc::now().timestamp(),
            current_event: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Feed one complete SSE line (without its terminator).
    pub fn push_line(&mut self, line: &str) -> Step {
        if let Some(event) = sse_field(line, "event") {
            // Carries forward until the next `event:` line; blank lines do not reset it.
            self.current_event = Some(event.trim().to_string());
            return Step::Skip;
        }

        let Some(data) = sse_field(line, "data") else {
            // Blank separators, comments, `id:` and `retry:` lines.
            return Step::Skip;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return Step::Finished;
        }
        if data.is_empty() {
            return Step::Skip;
        }

        let payload = match serde_json::from_str::<Value>(data) {
            Ok(payload @ Value::Object(_)) => payload,
            Ok(_) => {
                tracing::debug!(id = %self.id, "skipping non-object stream payload");
                return Step::Skip;
            }
            Err(e) => {
                tracing::debug!(id = %self.id, error = %e, "skipping unparseable stream payload");
                return Step::Skip;
            }
        };

        match self.vendor {
            Vendor::Messages => self.reduce_messages(payload),
            Vendor::Responses => self.reduce_responses(payload),
        }
    }

    fn event_type(&self, payload: &Value) -> String {
        self.current_event
            .clone()
            .or_else(|| payload.get("type").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default()
    }

    fn reduce_messages(&self, payload: Value) -> Step {
        match MessagesStreamEvent::decode(&self.event_type(&payload), payload) {
            MessagesStreamEvent::MessageStart => self.role_chunk(),
            MessagesStreamEvent::ContentBlockDelta { text } => self.content_chunk(text),
            MessagesStreamEvent::MessageDelta { stop_reason } => {
                self.finish_chunk(map_stop_reason(stop_reason.as_deref()))
            }
            MessagesStreamEvent::MessageStop | MessagesStreamEvent::Other => Step::Skip,
        }
    }

    fn reduce_responses(&self, mut payload: Value) -> Step {
        if payload.get("choices").is_some() {
            payload["model"] = Value::String(self.model.clone());
            return frame(&payload);
        }

        match ResponsesStreamEvent::decode(&self.event_type(&payload), payload) {
            ResponsesStreamEvent::Created => self.role_chunk(),
            ResponsesStreamEvent::OutputTextDelta { text } => self.content_chunk(text),
            ResponsesStreamEvent::Done { status } => {
                let reason = if status.as_deref() == Some("incomplete") {
                    FinishReason::Length
                } else {
                    FinishReason::Stop
                };
                self.finish_chunk(reason)
            }
            ResponsesStreamEvent::Incomplete => self.finish_chunk(FinishReason::Length),
            ResponsesStreamEvent::Ignored => Step::Skip,
        }
    }

    fn role_chunk(&self) -> Step {
        self.chunk(
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: None,
            },
            None,
        )
    }

    fn content_chunk(&self, text: String) -> Step {
        self.chunk(
            ChunkDelta {
                role: None,
                content: Some(text),
            },
            None,
        )
    }

    fn finish_chunk(&self, reason: FinishReason) -> Step {
        self.chunk(ChunkDelta::default(), Some(reason))
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<FinishReason>) -> Step {
        frame(&ChatCompletionChunk {
            id: self.id.clone(),
            object: CHUNK_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        })
    }
}

fn frame<T: serde::Serialize>(payload: &T) -> Step {
    match serde_json::to_string(payload) {
        Ok(json) => Step::Emit(Bytes::from(format!("data: {json}\n\n"))),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialise stream chunk");
            Step::Skip
        }
    }
}

/// `name:` field value, with the single optional leading space removed.
fn sse_field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Splits an SSE byte stream into lines across arbitrary chunk boundaries.
///
/// Bytes are only decoded once a full line is present, so multi-byte characters
/// split between network reads survive intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    /// Append bytes, returning every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&raw[..pos]));
        }
        lines
    }

    /// The unterminated trailing line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Transcode an upstream SSE body into chat-completion frames.
///
/// A transport error mid-stream ends the stream like a normal close; the
/// terminal frame is still sent.
pub fn transcode<S, E>(vendor: Vendor, model: String, upstream: S) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: std::fmt::Display + Send,
{
    async_stream::stream! {
        let mut transcoder = StreamTranscoder::new(vendor, model);
        let mut lines = SseLineBuffer::default();
        let mut emitted = 0usize;
        let mut upstream_done = false;

        tokio::pin!(upstream);

        'read: while let Some(chunk) = upstream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(id = %transcoder.id(), error = %e, "upstream stream failed");
                    break;
                }
            };

            for line in lines.push(&chunk) {
                match transcoder.push_line(&line) {
                    Step::Emit(frame) => {
                        emitted += 1;
                        yield frame;
                    }
                    Step::Skip => {}
                    Step::Finished => {
                        upstream_done = true;
                        break 'read;
                    }
                }
            }
        }

        if !upstream_done {
            if let Some(line) = lines.finish() {
                if let Step::Emit(frame) = transcoder.push_line(&line) {
                    emitted += 1;
                    yield frame;
                }
            }
        }

        tracing::info!(id = %transcoder.id(), chunks = emitted, "stream completed");
        yield Bytes::from_static(DONE_FRAME.as_bytes());
    }
}

/// Run `stream` on its own task, handing frames over a bounded queue.
///
/// When the receiving side is dropped (caller disconnected) the task stops,
/// even while it is waiting on upstream, and the upstream body is dropped.
pub fn spawn_bounded<S>(stream: S, depth: usize) -> ReceiverStream<Bytes>
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(depth);

    tokio::spawn(async move {
        tokio::pin!(stream);
        loop {
            tokio::select! {
                () = tx.closed() => {
                    tracing::debug!("client disconnected; abandoning upstream stream");
                    break;
                }
                next = stream.next() => match next {
                    Some(frame) => {
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn run(vendor: Vendor, chunks: Vec<&'static str>) -> Vec<String> {
        let upstream = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(Bytes::from_static(c.as_bytes()))),
        );
        let frames: Vec<Bytes> =
            tokio_test::block_on(transcode(vendor, "canon".to_string(), upstream).collect());
        frames
            .into_iter()
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .collect()
    }

    fn payload(frame: &str) -> Value {
        let json = frame
            .strip_prefix("data: ")
            .and_then(|f| f.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_single_delta_then_close() {
        let frames = run(
            Vendor::Messages,
            vec!["event: content_block_delta\ndata: {\"delta\":{\"text\":\"ab\"}}\n\n"],
        );
        assert_eq!(frames.len(), 2);
        let chunk = payload(&frames[0]);
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["model"], "canon");
        assert_eq!(chunk["choices"][0]["delta"]["content"], "ab");
        assert_eq!(chunk["choices"][0]["finish_reason"], Value::Null);
        assert_eq!(frames[1], DONE_FRAME);
    }

    #[test]
    fn test_empty_stream_still_terminates() {
        assert_eq!(run(Vendor::Messages, vec![]), vec![DONE_FRAME.to_string()]);
        assert_eq!(run(Vendor::Responses, vec![]), vec![DONE_FRAME.to_string()]);
    }

    #[test]
    fn test_messages_full_stream() {
        let frames = run(
            Vendor::Messages,
            vec![
                "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n",
                "event: ping\ndata: {\"type\":\"ping\"}\n\n",
                "event: content_block_delta\ndata: {\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"hm\"}}\n\n",
                "event: content_block_delta\ndata: {\"delta\":{\"text\":\"Hi\"}}\n\n",
                "event: message_delta\ndata: {\"delta\":{\"stop_reason\":\"max_tokens\"}}\n\n",
                "event: message_stop\ndata: {}\n\n",
            ],
        );
        assert_eq!(frames.len(), 5);
        let chunks: Vec<Value> = frames[..4].iter().map(|f| payload(f)).collect();
        assert_eq!(chunks[0]["choices"][0]["delta"], serde_json::json!({"role": "assistant"}));
        assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "");
        assert_eq!(chunks[2]["choices"][0]["delta"]["content"], "Hi");
        assert_eq!(chunks[3]["choices"][0]["finish_reason"], "length");
        assert_eq!(chunks[3]["choices"][0]["delta"], serde_json::json!({}));

        let id = chunks[0]["id"].as_str().unwrap();
        assert!(id.starts_with("chatcmpl-"));
        assert!(chunks.iter().all(|c| c["id"] == id && c["created"] == chunks[0]["created"]));
        assert_eq!(frames[4], DONE_FRAME);
    }

    #[test]
    fn test_lines_split_across_chunks() {
        // The two bytes of "é" arrive in different reads.
        let upstream = stream::iter(
            [
                &b"event: content_blo"[..],
                &b"ck_delta\r\ndata: {\"delta\":{\"text\":\"caf\xc3"[..],
                &b"\xa9\"}}\r\n\r\n"[..],
            ]
            .map(|c| Ok::<_, std::io::Error>(Bytes::from_static(c))),
        );
        let frames: Vec<Bytes> = tokio_test::block_on(
            transcode(Vendor::Messages, "canon".to_string(), upstream).collect(),
        );
        assert_eq!(frames.len(), 2);
        let first = String::from_utf8(frames[0].to_vec()).unwrap();
        assert_eq!(payload(&first)["choices"][0]["delta"]["content"], "café");
    }

    #[test]
    fn test_event_type_carries_forward() {
        let frames = run(
            Vendor::Messages,
            vec![
                "event: content_block_delta\n",
                "data: {\"delta\":{\"text\":\"a\"}}\n\n",
                "data: {\"delta\":{\"text\":\"b\"}}\n\n",
            ],
        );
        assert_eq!(frames.len(), 3);
        assert_eq!(payload(&frames[1])["choices"][0]["delta"]["content"], "b");
    }

    #[test]
    fn test_payload_type_used_without_event_line() {
        let frames = run(
            Vendor::Responses,
            vec!["data: {\"type\":\"response.output_text.delta\",\"delta\":\"x\"}\n\n"],
        );
        assert_eq!(frames.len(), 2);
        assert_eq!(payload(&frames[0])["choices"][0]["delta"]["content"], "x");
    }

    #[test]
    fn test_upstream_done_yields_single_sentinel() {
        let frames = run(
            Vendor::Responses,
            vec![
                "data: {\"id\":\"up\",\"model\":\"azure\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hi\"}}]}\n\n",
                "data: [DONE]\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
            ],
        );
        assert_eq!(frames.len(), 2);
        let chunk = payload(&frames[0]);
        assert_eq!(chunk["id"], "up");
        assert_eq!(chunk["model"], "canon");
        assert_eq!(chunk["choices"][0]["delta"]["content"], "hi");
        assert_eq!(frames[1], DONE_FRAME);
    }

    #[test]
    fn test_responses_native_stream() {
        let frames = run(
            Vendor::Responses,
            vec![
                "event: response.created\ndata: {\"response\":{\"id\":\"r\"}}\n\n",
                "event: response.in_progress\ndata: {}\n\n",
                "event: response.reasoning_summary_text.delta\ndata: {\"delta\":\"thinking\"}\n\n",
                "event: response.output_item.added\ndata: {\"item\":{}}\n\n",
                "event: response.output_text.delta\ndata: {\"delta\":\"Hel\"}\n\n",
                "event: response.output_text.delta\ndata: {\"text\":\"lo\"}\n\n",
                "event: response.incomplete\ndata: {}\n\n",
            ],
        );
        assert_eq!(frames.len(), 5);
        assert_eq!(payload(&frames[0])["choices"][0]["delta"]["role"], "assistant");
        assert_eq!(payload(&frames[1])["choices"][0]["delta"]["content"], "Hel");
        assert_eq!(payload(&frames[2])["choices"][0]["delta"]["content"], "lo");
        assert_eq!(payload(&frames[3])["choices"][0]["finish_reason"], "length");
        assert_eq!(frames[4], DONE_FRAME);
    }

    #[test]
    fn test_response_done_status() {
        let frames = run(
            Vendor::Responses,
            vec!["event: response.done\ndata: {\"response\":{\"status\":\"completed\"}}\n\n"],
        );
        assert_eq!(payload(&frames[0])["choices"][0]["finish_reason"], "stop");
    }

    #[test]
    fn test_bad_payloads_skipped() {
        let frames = run(
            Vendor::Messages,
            vec![
                ": keep-alive\n\n",
                "event: content_block_delta\ndata: not json\n\n",
                "data: [1,2]\n\n",
                "data: {\"delta\":{\"text\":\"ok\"}}\n\n",
            ],
        );
        assert_eq!(frames.len(), 2);
        assert_eq!(payload(&frames[0])["choices"][0]["delta"]["content"], "ok");
    }

    #[test]
    fn test_transport_error_still_terminates() {
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(
                b"event: content_block_delta\ndata: {\"delta\":{\"text\":\"a\"}}\n\n",
            )),
            Err("connection reset"),
            Ok(Bytes::from_static(b"data: {\"delta\":{\"text\":\"never\"}}\n\n")),
        ]);
        let frames: Vec<Bytes> = tokio_test::block_on(
            transcode(Vendor::Messages, "canon".to_string(), upstream).collect(),
        );
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], Bytes::from_static(DONE_FRAME.as_bytes()));
    }

    #[test]
    fn test_trailing_line_without_newline() {
        let frames = run(
            Vendor::Messages,
            vec!["event: content_block_delta\ndata: {\"delta\":{\"text\":\"tail\"}}"],
        );
        assert_eq!(frames.len(), 2);
        assert_eq!(payload(&frames[0])["choices"][0]["delta"]["content"], "tail");

        let truncated = run(
            Vendor::Messages,
            vec!["event: content_block_delta\ndata: {\"delta\":{\"te"],
        );
        assert_eq!(truncated, vec![DONE_FRAME.to_string()]);
    }

    #[test]
    fn test_line_buffer() {
        let mut buf = SseLineBuffer::default();
        assert!(buf.push(b"abc").is_empty());
        assert_eq!(buf.push(b"def\r\n\nxy"), vec!["abcdef".to_string(), String::new()]);
        assert_eq!(buf.finish(), Some("xy".to_string()));
        assert_eq!(buf.finish(), None);
    }

    #[tokio::test]
    async fn test_spawn_bounded_forwards_all_frames() {
        let upstream = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(
                b"event: message_start\ndata: {}\n\n",
            )),
        ]);
        let rx = spawn_bounded(
            transcode(Vendor::Messages, "canon".to_string(), upstream),
            STREAM_QUEUE_DEPTH,
        );
        let frames: Vec<Bytes> = rx.collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], Bytes::from_static(DONE_FRAME.as_bytes()));
    }

    #[tokio::test]
    async fn test_spawn_bounded_stops_when_receiver_dropped() {
        let (alive_tx, mut alive_rx) = mpsc::channel::<()>(1);
        let endless = stream::unfold(alive_tx, |alive| async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Some((Bytes::from_static(b"data: x\n\n"), alive))
        });

        let mut rx = spawn_bounded(endless, 1);
        assert!(rx.next().await.is_some());
        drop(rx);

        // The producer task owns the only sender; it is released once the task ends.
        let ended = tokio::time::timeout(std::time::Duration::from_secs(2), alive_rx.recv()).await;
        assert!(matches!(ended, Ok(None)));
    }
}

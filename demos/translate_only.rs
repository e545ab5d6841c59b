//! Show the translation layer without a server.
//!
//! Usage:
//!   `cargo run --example translate_only`

use chat_bridge::translate::chat_types::ChatCompletionRequest;
use chat_bridge::translate::reasoning::{apply_reasoning, ReasoningTier};
use chat_bridge::translate::request::RequestTranslator;
use chat_bridge::translate::response::transform_response;
use chat_bridge::translate::streaming::{SseLineBuffer, Step, StreamTranscoder};
use chat_bridge::translate::Vendor;

fn main() -> anyhow::Result<()> {
    let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
        "model": "claude-opus",
        "max_tokens": 1000,
        "messages": [
            {"role": "system", "content": "Be concise."},
            {"role": "user", "content": "What is the capital of France?"}
        ]
    }))?;

    let translator = RequestTranslator::new("You are a geography expert.", 64_000);

    for vendor in [Vendor::Messages, Vendor::Responses] {
        let upstream = apply_reasoning(Some(ReasoningTier::High), translator.translate(&req, vendor));
        println!("=== {} request ===", vendor.as_str());
        println!("{}\n", serde_json::to_string_pretty(&upstream)?);
    }

    let body = br#"{"id":"msg_1","content":[{"type":"thinking","text":"..."},{"type":"text","text":"Paris."}],"stop_reason":"end_turn","usage":{"input_tokens":12,"output_tokens":3}}"#;
    let resp = transform_response(Vendor::Messages, "claude-opus", body)?;
    println!("=== translated response ===");
    println!("{}\n", serde_json::to_string_pretty(&resp)?);

    println!("=== translated stream ===");
    let mut transcoder = StreamTranscoder::new(Vendor::Messages, "claude-opus");
    let mut lines = SseLineBuffer::default();
    let upstream = concat!(
        "event: message_start\ndata: {}\n\n",
        "event: content_block_delta\ndata: {\"delta\":{\"text\":\"Par\"}}\n\n",
        "event: content_block_delta\ndata: {\"delta\":{\"text\":\"is.\"}}\n\n",
        "event: message_delta\ndata: {\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
    );
    for line in lines.push(upstream.as_bytes()) {
        if let Step::Emit(frame) = transcoder.push_line(&line) {
            print!("{}", String::from_utf8_lossy(&frame));
        }
    }

    Ok(())
}

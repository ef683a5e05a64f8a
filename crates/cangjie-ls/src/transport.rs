//! `Content-Length` message framing.
//!
//! The LSP base protocol frames each JSON payload with MIME-style headers.
//! Header lines may end in `\r\n` or bare `\n`; both are tolerated on
//! input and `\r\n` is always produced on output.

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use std::io::{BufRead, Read, Write};
use thiserror::Error;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying stream failed.
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    /// Headers were present but no `Content-Length`.
    #[error("missing Content-Length header")]
    MissingContentLength,
    /// The payload was not valid JSON.
    #[error("malformed payload: {0}")]
    BadJson(#[from] serde_json::Error),
}

/// Read one framed message. `Ok(None)` signals a cleanly closed stream.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<JsonRpcRequest>, TransportError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = value.trim().parse::<usize>().ok();
        }
        // Content-Type headers are accepted and ignored.
    }
    let length = content_length.ok_or(TransportError::MissingContentLength)?;
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;
    let request = serde_json::from_slice(&payload)?;
    Ok(Some(request))
}

fn write_framed<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError> {
    write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Write a framed response.
pub fn write_message<W: Write>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<(), TransportError> {
    let payload = serde_json::to_vec(response)?;
    write_framed(writer, &payload)
}

/// Write a framed notification.
pub fn write_notification<W: Write>(
    writer: &mut W,
    notification: &JsonRpcNotification,
) -> Result<(), TransportError> {
    let payload = serde_json::to_vec(notification)?;
    write_framed(writer, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_testkit::{must, must_some};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::BufReader;

    fn frame(body: &str, crlf: bool) -> Vec<u8> {
        let sep = if crlf { "\r\n" } else { "\n" };
        format!("Content-Length: {}{sep}{sep}{body}", body.len()).into_bytes()
    }

    #[test]
    fn reads_crlf_framing() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"shutdown"}"#;
        let framed = frame(body, true);
        let mut reader = BufReader::new(framed.as_slice());
        let req = must_some(must(read_message(&mut reader)));
        assert_eq!(req.method, "shutdown");
    }

    #[test]
    fn reads_lf_only_framing() {
        let body = r#"{"jsonrpc":"2.0","method":"exit"}"#;
        let framed = frame(body, false);
        let mut reader = BufReader::new(framed.as_slice());
        let req = must_some(must(read_message(&mut reader)));
        assert_eq!(req.method, "exit");
        assert!(req.is_notification());
    }

    #[test]
    fn eof_reads_as_none() {
        let mut reader = BufReader::new(&[] as &[u8]);
        assert!(must(read_message(&mut reader)).is_none());
    }

    #[test]
    fn missing_content_length_is_an_error() {
        let data = b"Content-Type: application/json\r\n\r\n{}".to_vec();
        let mut reader = BufReader::new(data.as_slice());
        assert!(read_message(&mut reader).is_err());
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut out = Vec::new();
        must(write_message(&mut out, &JsonRpcResponse::success(Some(json!(7)), json!({"ok": true}))));
        let text = String::from_utf8_lossy(&out).to_string();
        assert!(text.starts_with("Content-Length: "));
        assert!(text.contains("\r\n\r\n"));
    }

    #[test]
    fn two_messages_in_sequence() {
        let a = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        let b = r#"{"jsonrpc":"2.0","method":"initialized"}"#;
        let mut bytes = frame(a, true);
        bytes.extend_from_slice(&frame(b, true));
        let mut reader = BufReader::new(bytes.as_slice());
        assert_eq!(must_some(must(read_message(&mut reader))).method, "initialize");
        assert_eq!(must_some(must(read_message(&mut reader))).method, "initialized");
    }
}

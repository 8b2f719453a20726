//! JSON-RPC framing codec for LSP communication.
//!
//! LSP frames every message as a header block followed by a JSON body:
//!
//! ```text
//! Content-Length: N\r\n
//! Content-Type: application/vscode-jsonrpc; charset=utf-8\r\n
//! \r\n
//! {json}
//! ```
//!
//! Everything in this module is pure: [`encode`] produces bytes,
//! [`HeaderParser`] consumes header lines one at a time, and [`decode_body`]
//! turns exactly `Content-Length` bytes into a JSON value. Reading the lines
//! and bytes off a stream is the engine's job.

use encoding_rs::{Encoding, REPLACEMENT, UTF_8};
use serde::Serialize;
use thiserror::Error;

/// The only MIME type this client understands.
pub const DEFAULT_MIME_TYPE: &str = "application/vscode-jsonrpc";

/// Charset emitted on send and assumed on receive when none is declared.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Maximum frame size (4 MiB) to prevent unbounded memory allocation.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const SEPARATOR: &str = "\r\n";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("missing Content-Length header")]
    MissingContentLength,
    #[error("invalid Content-Length value: {0:?}")]
    InvalidContentLength(String),
    #[error("Content-Length {length} exceeds maximum {max}")]
    FrameTooLarge { length: usize, max: usize },
    #[error("header block ended before the blank separator line")]
    IncompleteHeader,
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("body has {actual} bytes, expected {expected}")]
    TruncatedBody { expected: usize, actual: usize },
    #[error("body is not valid {encoding} text")]
    MalformedText { encoding: &'static str },
    #[error("parsing JSON-RPC body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("serializing JSON-RPC message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CodecError {
    /// Framing errors leave the stream position unknown; nothing after them can be trusted.
    #[must_use]
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::MissingContentLength
                | Self::InvalidContentLength(_)
                | Self::FrameTooLarge { .. }
                | Self::IncompleteHeader
        )
    }

    /// Errors confined to a single message whose body was fully consumed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedContentType(_)
                | Self::InvalidEncoding(_)
                | Self::TruncatedBody { .. }
                | Self::MalformedText { .. }
                | Self::Decode(_)
        )
    }
}

/// Wire form of one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    header: Vec<u8>,
    body: Vec<u8>,
}

impl EncodedMessage {
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Header immediately followed by the body, with nothing after it.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.header.len() + self.body.len());
        bytes.extend_from_slice(&self.header);
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Serialize `message` and build its header block.
///
/// `Content-Length` counts bytes of the UTF-8 body, not characters.
pub fn encode<M: Serialize + ?Sized>(message: &M) -> Result<EncodedMessage, CodecError> {
    let body = serde_json::to_vec(message).map_err(CodecError::Encode)?;
    let header = format!(
        "Content-Length: {len}{SEPARATOR}Content-Type: {DEFAULT_MIME_TYPE}; charset={DEFAULT_CHARSET}{SEPARATOR}{SEPARATOR}",
        len = body.len(),
    );
    Ok(EncodedMessage {
        header: header.into_bytes(),
        body,
    })
}

/// Header fields as read off the wire, before content-type negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub content_length: usize,
    pub content_type: Option<String>,
}

impl RawHeader {
    /// Resolve the declared content type into a MIME type and text encoding.
    ///
    /// Kept separate from header parsing so that a rejected content type
    /// still leaves the caller with a known body length to consume.
    pub fn negotiate(&self) -> Result<HeaderBlock, CodecError> {
        let (mime_type, encoding) = parse_content_type(self.content_type.as_deref())?;
        Ok(HeaderBlock {
            content_length: self.content_length,
            mime_type,
            encoding,
        })
    }
}

/// A fully validated header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    pub content_length: usize,
    pub mime_type: String,
    pub encoding: &'static Encoding,
}

/// Line-at-a-time header accumulator.
///
/// Accepts both `\r\n` and bare `\n` terminators. Header names are matched
/// case-insensitively; unknown headers are ignored.
#[derive(Debug)]
pub struct HeaderParser {
    content_length: Option<usize>,
    content_type: Option<String>,
    max_frame_bytes: usize,
    started: bool,
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new(MAX_FRAME_BYTES)
    }
}

impl HeaderParser {
    #[must_use]
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            content_length: None,
            content_type: None,
            max_frame_bytes,
            started: false,
        }
    }

    /// Whether any header line has been consumed yet.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Feed one line. Returns the header once the blank separator line arrives.
    pub fn push_line(&mut self, line: &[u8]) -> Result<Option<RawHeader>, CodecError> {
        self.started = true;
        let line = String::from_utf8_lossy(line);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            let content_length = self
                .content_length
                .take()
                .ok_or(CodecError::MissingContentLength)?;
            return Ok(Some(RawHeader {
                content_length,
                content_type: self.content_type.take(),
            }));
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            tracing::trace!("Ignoring malformed header line: {trimmed}");
            return Ok(None);
        };
        let value = value.trim();
        if key.trim().eq_ignore_ascii_case("Content-Length") {
            let length: usize = value
                .parse()
                .map_err(|_| CodecError::InvalidContentLength(value.to_string()))?;
            if length > self.max_frame_bytes {
                return Err(CodecError::FrameTooLarge {
                    length,
                    max: self.max_frame_bytes,
                });
            }
            self.content_length = Some(length);
        } else if key.trim().eq_ignore_ascii_case("Content-Type") {
            self.content_type = Some(value.to_string());
        }
        Ok(None)
    }
}

/// Parse a complete header block from already-split lines.
pub fn decode_header<'a, I>(lines: I) -> Result<HeaderBlock, CodecError>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut parser = HeaderParser::default();
    for line in lines {
        if let Some(raw) = parser.push_line(line)? {
            return raw.negotiate();
        }
    }
    Err(CodecError::IncompleteHeader)
}

/// Split `Content-Type` into its MIME type and charset.
///
/// A missing header means the defaults; a missing `charset` parameter means UTF-8.
pub fn parse_content_type(
    content_type: Option<&str>,
) -> Result<(String, &'static Encoding), CodecError> {
    let Some(content_type) = content_type else {
        return Ok((DEFAULT_MIME_TYPE.to_string(), UTF_8));
    };

    let mut parts = content_type.split(';');
    let mime_type = parts.next().unwrap_or("").trim();
    if !mime_type.eq_ignore_ascii_case(DEFAULT_MIME_TYPE) {
        return Err(CodecError::UnsupportedContentType(content_type.to_string()));
    }

    let mut encoding = UTF_8;
    for part in parts {
        if let Some((key, value)) = part.split_once('=')
            && key.trim().eq_ignore_ascii_case("charset")
        {
            let label = value.trim().trim_matches('"').trim_matches('\'');
            encoding = lookup_charset(label)
                .ok_or_else(|| CodecError::InvalidEncoding(label.to_string()))?;
        }
    }

    Ok((mime_type.to_string(), encoding))
}

/// Resolve a charset label to a text encoding.
///
/// WHATWG labels first, then the underscore and hyphen spellings servers
/// commonly emit (`utf_8`, `latin-1`, `utf-16-le`). Labels that only map to
/// the WHATWG replacement encoding (`iso-2022-kr`, `hz-gb-2312`, ...) decode
/// nothing useful and are rejected, as is UTF-32, which has no decoder.
fn lookup_charset(label: &str) -> Option<&'static Encoding> {
    let encoding = Encoding::for_label(label.as_bytes()).or_else(|| {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
        let alias = match normalized.as_str() {
            "latin-1" | "8859" => "latin1",
            "utf-16-le" => "utf-16le",
            "utf-16-be" => "utf-16be",
            "u8" | "utf" | "utf8-ucs2" => "utf-8",
            other => other,
        };
        Encoding::for_label(alias.as_bytes())
            .or_else(|| Encoding::for_label(alias.replace('-', "").as_bytes()))
    })?;
    (encoding != REPLACEMENT).then_some(encoding)
}

/// Decode exactly `content_length` bytes of `bytes` as `encoding` text, then as JSON.
pub fn decode_body(
    bytes: &[u8],
    content_length: usize,
    encoding: &'static Encoding,
) -> Result<serde_json::Value, CodecError> {
    let body = bytes
        .get(..content_length)
        .ok_or(CodecError::TruncatedBody {
            expected: content_length,
            actual: bytes.len(),
        })?;
    let text = encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or(CodecError::MalformedText {
            encoding: encoding.name(),
        })?;
    serde_json::from_str(&text).map_err(CodecError::Decode)
}

/// Decode one complete in-memory frame (header block plus body).
pub fn decode(frame: &[u8]) -> Result<serde_json::Value, CodecError> {
    let mut parser = HeaderParser::default();
    let mut rest = frame;
    let raw = loop {
        let Some(end) = rest.iter().position(|&b| b == b'\n') else {
            return Err(CodecError::IncompleteHeader);
        };
        let (line, tail) = rest.split_at(end + 1);
        rest = tail;
        if let Some(raw) = parser.push_line(line)? {
            break raw;
        }
    };
    let header = raw.negotiate()?;
    decode_body(rest, header.content_length, header.encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;
    use serde_json::json;

    fn header(lines: &[&str]) -> Result<HeaderBlock, CodecError> {
        decode_header(lines.iter().map(|line| line.as_bytes()))
    }

    fn frame(headers: &str, body: &[u8]) -> Vec<u8> {
        let mut bytes = headers.as_bytes().to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_encode_header_layout() {
        let encoded = encode(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"})).unwrap();
        let header = String::from_utf8(encoded.header().to_vec()).unwrap();
        assert_eq!(
            header,
            format!(
                "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=utf-8\r\n\r\n",
                encoded.body().len()
            )
        );
        let bytes = encoded.to_bytes();
        assert!(bytes.ends_with(b"}"), "no trailing separator after the body");
    }

    #[test]
    fn test_encode_empty_object() {
        let encoded = encode(&json!({})).unwrap();
        assert_eq!(encoded.body(), b"{}");
        assert!(encoded.header().starts_with(b"Content-Length: 2\r\n"));
    }

    #[test]
    fn test_content_length_counts_bytes_not_chars() {
        let encoded = encode(&json!({"k": "é日本"})).unwrap();
        let body = String::from_utf8(encoded.body().to_vec()).unwrap();
        assert!(body.chars().count() < body.len());
        assert!(
            encoded
                .header()
                .starts_with(format!("Content-Length: {}\r\n", body.len()).as_bytes())
        );
    }

    #[test]
    fn test_content_length_multi_kilobyte_payload() {
        let text = "ünïcödé ".repeat(2048);
        let encoded = encode(&json!({ "text": text })).unwrap();
        assert!(encoded.content_length() > 16 * 1024);
        let decoded = decode(&encoded.to_bytes()).unwrap();
        assert_eq!(decoded["text"], text);
    }

    #[test]
    fn test_roundtrip_request_fields() {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "textDocument/didOpen",
            "params": { "textDocument": { "uri": "file:///a.rs", "text": "fn main() {}" } }
        });
        let decoded = decode(&encode(&request).unwrap().to_bytes()).unwrap();
        assert_eq!(decoded["id"], request["id"]);
        assert_eq!(decoded["method"], request["method"]);
        assert_eq!(decoded["params"], request["params"]);
    }

    #[test]
    fn test_missing_content_type_defaults() {
        let block = header(&["Content-Length: 2\r\n", "\r\n"]).unwrap();
        assert_eq!(block.content_length, 2);
        assert_eq!(block.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(block.encoding, UTF_8);
    }

    #[test]
    fn test_bare_lf_terminators() {
        let body = br#"{"id":1}"#;
        let bytes = frame(&format!("Content-Length: {}\n\n", body.len()), body);
        assert_eq!(decode(&bytes).unwrap()["id"], 1);
    }

    #[test]
    fn test_case_insensitive_header_names() {
        let block = header(&[
            "content-length: 10\r\n",
            "CONTENT-TYPE: application/vscode-jsonrpc\r\n",
            "\r\n",
        ])
        .unwrap();
        assert_eq!(block.content_length, 10);
    }

    #[test]
    fn test_missing_content_length() {
        let err = header(&[
            "Content-Type: application/vscode-jsonrpc\r\n",
            "\r\n",
        ])
        .unwrap_err();
        assert!(matches!(err, CodecError::MissingContentLength));
        assert!(err.is_framing());
    }

    #[test]
    fn test_invalid_content_length_value() {
        let err = header(&["Content-Length: not_a_number\r\n", "\r\n"])
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidContentLength(_)));
        assert!(err.is_framing());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut parser = HeaderParser::new(16);
        let err = parser.push_line(b"Content-Length: 17\r\n").unwrap_err();
        assert!(matches!(
            err,
            CodecError::FrameTooLarge { length: 17, max: 16 }
        ));
    }

    #[test]
    fn test_header_without_blank_line_is_incomplete() {
        let err = header(&["Content-Length: 2\r\n"]).unwrap_err();
        assert!(matches!(err, CodecError::IncompleteHeader));
    }

    #[test]
    fn test_unsupported_content_type() {
        let err = parse_content_type(Some("text/plain")).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedContentType(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_unsupported_content_type_keeps_length() {
        let mut parser = HeaderParser::default();
        assert!(parser.push_line(b"Content-Length: 42\r\n").unwrap().is_none());
        assert!(parser.push_line(b"Content-Type: text/plain\r\n").unwrap().is_none());
        let raw = parser.push_line(b"\r\n").unwrap().unwrap();
        assert_eq!(raw.content_length, 42);
        assert!(matches!(
            raw.negotiate(),
            Err(CodecError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn test_invalid_charset() {
        let err = parse_content_type(Some("application/vscode-jsonrpc; charset=klingon")).unwrap_err();
        assert!(matches!(err, CodecError::InvalidEncoding(ref label) if label == "klingon"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_charset_labels() {
        let (_, enc) = parse_content_type(Some("application/vscode-jsonrpc; charset=utf8")).unwrap();
        assert_eq!(enc, UTF_8);
        let (_, enc) =
            parse_content_type(Some("application/vscode-jsonrpc; charset=\"windows-1252\""))
                .unwrap();
        assert_eq!(enc, WINDOWS_1252);
        let (mime, enc) = parse_content_type(Some("application/vscode-jsonrpc")).unwrap();
        assert_eq!(mime, DEFAULT_MIME_TYPE);
        assert_eq!(enc, UTF_8);
    }

    fn charset(label: &str) -> Result<&'static Encoding, CodecError> {
        parse_content_type(Some(&format!("application/vscode-jsonrpc; charset={label}")))
            .map(|(_, encoding)| encoding)
    }

    #[test]
    fn test_python_style_charset_aliases() {
        assert_eq!(charset("utf_8").unwrap(), UTF_8);
        assert_eq!(charset("UTF_8").unwrap(), UTF_8);
        assert_eq!(charset("latin-1").unwrap(), WINDOWS_1252);
        assert_eq!(charset("latin_1").unwrap(), WINDOWS_1252);
        assert_eq!(charset("utf_16_le").unwrap(), encoding_rs::UTF_16LE);
        assert_eq!(charset("utf-16-be").unwrap(), encoding_rs::UTF_16BE);
    }

    #[test]
    fn test_replacement_and_utf32_labels_are_invalid() {
        for label in ["iso-2022-kr", "hz-gb-2312", "utf-32", "utf_32"] {
            let err = charset(label).unwrap_err();
            assert!(
                matches!(err, CodecError::InvalidEncoding(ref l) if l == label),
                "{label}: {err:?}"
            );
        }
    }

    #[test]
    fn test_decode_body_latin1_alias() {
        let frame = b"Content-Length: 9\r\nContent-Type: application/vscode-jsonrpc; charset=latin_1\r\n\r\n{\"k\":\"\xE9\"}";
        assert_eq!(decode(frame).unwrap()["k"], "é");
    }

    #[test]
    fn test_decode_body_with_declared_charset() {
        // "é" is 0xE9 in windows-1252.
        let body = b"{\"k\":\"\xE9\"}";
        let value = decode_body(body, body.len(), WINDOWS_1252).unwrap();
        assert_eq!(value["k"], "é");
    }

    #[test]
    fn test_decode_body_reads_exactly_content_length() {
        let bytes = br#"{"a":1}{"b":2}"#;
        let value = decode_body(bytes, 7, UTF_8).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_decode_body_truncated() {
        let err = decode_body(b"{}", 10, UTF_8).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TruncatedBody {
                expected: 10,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_decode_body_invalid_utf8() {
        let body = b"{\"k\":\"\xFF\"}";
        let err = decode_body(body, body.len(), UTF_8).unwrap_err();
        assert!(matches!(err, CodecError::MalformedText { encoding: "UTF-8" }));
    }

    #[test]
    fn test_decode_body_invalid_json() {
        let body = b"not valid json!!!";
        let err = decode_body(body, body.len(), UTF_8).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
        assert!(err.is_recoverable());
        assert!(!err.is_framing());
    }

    #[test]
    fn test_ignores_unknown_headers() {
        let body = br#"{"jsonrpc":"2.0","id":1}"#;
        let bytes = frame(
            &format!("X-Custom: yes\r\nContent-Length: {}\r\n\r\n", body.len()),
            body,
        );
        assert_eq!(decode(&bytes).unwrap()["id"], 1);
    }
}

//! Shared HTTP plumbing for the provider adapters
//!
//! Status classification, error sanitizing, credential masking, and the
//! line framing used by SSE and NDJSON streams.

use reqwest::{Response, StatusCode};
use std::fmt;
use std::time::Duration;
use ultra_application::AdapterError;
use ultra_domain::core::string::truncate;

const MAX_ERROR_BODY: usize = 300;

/// API credential that never prints itself
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw key, for request headers only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", mask_api_key(&self.0))
    }
}

/// Mask all but the outer characters of a key
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Strip anything credential-shaped from a provider error body
pub fn sanitize_error(body: &str) -> String {
    let lower = body.to_lowercase();
    if lower.contains("api key")
        || lower.contains("api_key")
        || lower.contains("apikey")
        || lower.contains("x-api-key")
        || lower.contains("bearer")
    {
        return "credential rejected by provider".to_string();
    }
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&collapsed, MAX_ERROR_BODY)
}

/// Parse a `Retry-After` header given in (possibly fractional) seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Map a non-success HTTP status onto the adapter error taxonomy
pub fn classify_status(status: StatusCode, retry_after: Option<&str>, body: &str) -> AdapterError {
    let detail = format!("HTTP {}: {}", status.as_u16(), sanitize_error(body));
    match status.as_u16() {
        401 | 403 => AdapterError::Auth(format!("HTTP {}", status.as_u16())),
        429 => AdapterError::rate_limited(detail, retry_after.and_then(parse_retry_after)),
        408 | 504 => AdapterError::Timeout(detail),
        500..=599 => AdapterError::ProviderUnavailable(detail),
        _ => AdapterError::MalformedResponse(detail),
    }
}

/// Map a transport-level failure
pub fn from_reqwest(err: reqwest::Error) -> AdapterError {
    // reqwest error text can embed the request URL but never headers
    let message = err.to_string();
    if err.is_timeout() {
        AdapterError::Timeout(message)
    } else if err.is_decode() || err.is_body() {
        AdapterError::MalformedResponse(message)
    } else {
        AdapterError::ProviderUnavailable(message)
    }
}

/// Pass a successful response through, or classify the failure
pub async fn ensure_success(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, retry_after.as_deref(), &body))
}

/// Longest unterminated line a stream may buffer
pub const MAX_PENDING_LINE: usize = 4 * 1024 * 1024;

/// Reassembles newline-delimited lines from arbitrary byte chunks
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    limit: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_LINE)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    /// Append a chunk and return every line it completed
    ///
    /// Fails with `MalformedResponse` once the unterminated tail exceeds the limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, AdapterError> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\n', '\r']);
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        if self.pending.len() > self.limit {
            let size = self.pending.len();
            self.pending.clear();
            return Err(AdapterError::MalformedResponse(format!(
                "stream line exceeds {} bytes without a newline ({} buffered)",
                self.limit, size
            )));
        }
        Ok(lines)
    }

    /// Whatever is left after the stream closed
    pub fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        if rest.is_empty() { None } else { Some(rest) }
    }
}

/// One meaningful line of a server-sent event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
}

/// Extract the payload of an SSE `data:` line; comments and other fields are ignored
pub fn parse_sse_line(line: &str) -> Option<SseLine<'_>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        Some(SseLine::Done)
    } else if data.is_empty() {
        None
    } else {
        Some(SseLine::Data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultra_domain::ProviderErrorKind;

    #[test]
    fn test_classify_status() {
        let cases = [
            (401, ProviderErrorKind::Auth),
            (403, ProviderErrorKind::Auth),
            (429, ProviderErrorKind::RateLimited),
            (408, ProviderErrorKind::Timeout),
            (504, ProviderErrorKind::Timeout),
            (500, ProviderErrorKind::ProviderUnavailable),
            (503, ProviderErrorKind::ProviderUnavailable),
            (400, ProviderErrorKind::MalformedResponse),
        ];
        for (code, kind) in cases {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(classify_status(status, None, "").kind(), kind, "status {code}");
        }
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, Some("2"), "slow down");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after("0.5"), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }

    #[test]
    fn test_auth_errors_never_echo_body() {
        let err = classify_status(
            StatusCode::UNAUTHORIZED,
            None,
            r#"{"error":"invalid key sk-live-1234567890abcdef"}"#,
        );
        assert!(!err.to_string().contains("sk-live"));
    }

    #[test]
    fn test_sanitize_error() {
        assert_eq!(
            sanitize_error("Incorrect API key provided: sk-abc"),
            "credential rejected by provider"
        );
        assert_eq!(sanitize_error("model   overloaded\n"), "model overloaded");
        assert!(sanitize_error(&"x".repeat(1000)).len() <= MAX_ERROR_BODY);
    }

    #[test]
    fn test_api_key_debug_is_masked() {
        let key = ApiKey::new("sk-live-1234567890abcdef").unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("1234567890"));
        assert_eq!(debug, "ApiKey(sk-l...cdef)");
        assert_eq!(format!("{:?}", ApiKey::new("short").unwrap()), "ApiKey(****)");
        assert!(ApiKey::new("   ").is_none());
    }

    #[test]
    fn test_line_buffer_reassembles_split_lines() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"data: {\"a\"").unwrap().is_empty());
        assert_eq!(buf.push(b":1}\r\n\r\ndata: [DO").unwrap(), vec!["data: {\"a\":1}"]);
        assert_eq!(buf.push(b"NE]\n").unwrap(), vec!["data: [DONE]"]);
        assert_eq!(buf.finish(), None);

        buf.push(b"{\"done\":true}").unwrap();
        assert_eq!(buf.finish(), Some("{\"done\":true}".to_string()));
    }

    #[test]
    fn test_line_buffer_rejects_unterminated_overflow() {
        let mut buf = LineBuffer::with_limit(16);
        assert_eq!(buf.push(b"0123456789\nabcdef").unwrap(), vec!["0123456789"]);
        // exactly at the limit is still accepted
        assert!(buf.push(b"0123456789").unwrap().is_empty());
        let err = buf.push(b"x").unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::MalformedResponse);
        assert_eq!(buf.finish(), None);

        // a line completed within the same chunk is never buffered
        let mut buf = LineBuffer::with_limit(16);
        assert_eq!(buf.push(b"a much longer line than sixteen\n").unwrap().len(), 1);
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(parse_sse_line("data: {\"x\":1}"), Some(SseLine::Data("{\"x\":1}")));
        assert_eq!(parse_sse_line("data:[DONE]"), Some(SseLine::Done));
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: message"), None);
        assert_eq!(parse_sse_line("data: "), None);
    }
}

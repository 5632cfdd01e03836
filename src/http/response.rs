use crate::error::Result;
use crate::http::BodyStream;
use hyper::StatusCode;
use indexmap::IndexMap;
use std::io::Write;

/// In-memory response with ordered headers and a seekable body stream.
///
/// Header serialization happens exactly once per response: `create_headers`
/// freezes the header block, `execute_headers` flushes the status line and
/// the frozen block to the transport.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: IndexMap<String, String>,
    body: BodyStream,
    header_block: Option<Vec<String>>,
    headers_executed: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: IndexMap::new(),
            body: BodyStream::new(),
            header_block: None,
            headers_executed: false,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = BodyStream::from_bytes(body);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn reason_phrase(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn body(&self) -> &BodyStream {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut BodyStream {
        &mut self.body
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some((existing, _)) = self
            .headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            let existing = existing.clone();
            self.headers.insert(existing, value.to_string());
        } else {
            self.headers.insert(name.to_string(), value.to_string());
        }
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Header value by case-insensitive name; empty string when absent
    pub fn header_line(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// Default no-cache directive for dynamic content
    pub fn clear_cache(&mut self) {
        self.set_header(
            "Cache-Control",
            "no-store, no-cache, must-revalidate, max-age=0",
        );
        self.set_header("Pragma", "no-cache");
    }

    /// Cache-validation headers built from a stamp value and a TTL in seconds
    pub fn set_cache(&mut self, stamp: i64, ttl: u64) {
        self.set_header("Cache-Control", &format!("public, max-age={}", ttl));
        self.set_header("ETag", &format!("\"{:x}\"", stamp));
    }

    /// Serialize the header block. Only the first call has an effect.
    pub fn create_headers(&mut self) {
        if self.header_block.is_some() {
            return;
        }
        self.header_block = Some(
            self.headers
                .iter()
                .map(|(name, value)| format!("{}: {}", name, value))
                .collect(),
        );
    }

    /// Flush the status line and the serialized header block to the
    /// transport. Only the first call writes; later calls are no-ops.
    pub fn execute_headers(&mut self, transport: &mut dyn Write) -> Result<()> {
        if self.headers_executed {
            return Ok(());
        }
        self.create_headers();
        write!(
            transport,
            "HTTP/1.1 {} {}\r\n",
            self.status.as_u16(),
            self.reason_phrase()
        )?;
        if let Some(block) = &self.header_block {
            for line in block {
                write!(transport, "{}\r\n", line)?;
            }
        }
        write!(transport, "\r\n")?;
        self.headers_executed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut res = Response::ok();
        res.set_header("Content-Type", "text/plain");
        res.set_header("content-type", "text/html");
        assert_eq!(res.header_line("CONTENT-TYPE"), "text/html");
        assert_eq!(res.headers.len(), 1);
    }

    #[test]
    fn headers_are_frozen_after_create() {
        let mut res = Response::ok();
        res.set_header("X-One", "1");
        res.create_headers();
        res.set_header("X-Two", "2");
        res.create_headers();

        let mut out = Vec::new();
        res.execute_headers(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("X-One: 1\r\n"));
        assert!(!text.contains("X-Two"));
    }

    #[test]
    fn execute_headers_writes_once() {
        let mut res = Response::ok();
        let mut out = Vec::new();
        res.execute_headers(&mut out).unwrap();
        let first = out.len();
        res.execute_headers(&mut out).unwrap();
        assert_eq!(out.len(), first);
    }
}

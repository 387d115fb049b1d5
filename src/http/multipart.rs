//! C5 — multipart/form-data streaming reader.
//!
//! A byte-at-a-time-safe state machine: `UnusedArea` skips the preamble up
//! to the first boundary line, `Content` alternates between a header block
//! (terminated by a blank line) and a body (terminated by the next
//! boundary line), `Done` is reached once the closing `--boundary--` is
//! seen. Chunks are appended to a `ChunkedBuffer` and the boundary search
//! resumes from the last unmatched position instead of rescanning from
//! the start of the buffer.

use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::http::boyer_moore::BoyerMooreSearcher;
use crate::http::chunked_buffer::ChunkedBuffer;

pub type HttpHeaders = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

pub trait PartHandler {
    fn handle_part(&mut self, part: Part);
}

impl<F: FnMut(Part)> PartHandler for F {
    fn handle_part(&mut self, part: Part) {
        (self)(part)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    UnusedArea,
    Content,
    Done,
}

pub struct MultipartStreamReader {
    state: State,
    boundary_matcher: BoyerMooreSearcher,
    header_matcher: BoyerMooreSearcher,
    buffer: ChunkedBuffer,
    scan_from: usize,
}

fn find_crlf_crlf(haystack: &[u8], matcher: &BoyerMooreSearcher, from: usize) -> Option<usize> {
    matcher.search_from(haystack, from)
}

impl MultipartStreamReader {
    pub fn new(boundary: &str) -> Self {
        let delimiter = format!("--{}", boundary);
        Self {
            state: State::UnusedArea,
            boundary_matcher: BoyerMooreSearcher::new(delimiter.as_bytes()),
            header_matcher: BoyerMooreSearcher::new(b"\r\n\r\n"),
            buffer: ChunkedBuffer::new(),
            scan_from: 0,
        }
    }

    pub fn add_chunk(&mut self, chunk: &[u8], handler: &mut dyn PartHandler) -> Result<()> {
        self.buffer.add_chunk(chunk);
        self.parse_stream(handler)
    }

    pub fn close_stream(&mut self, handler: &mut dyn PartHandler) -> Result<()> {
        self.parse_stream(handler)?;
        if self.state != State::Done {
            return Err(CoreError::BadRequest(
                "multipart stream closed before the closing boundary".to_string(),
            ));
        }
        Ok(())
    }

    fn extract_front(&mut self, count: usize) -> Vec<u8> {
        let data = self.buffer.extract_front(count);
        self.scan_from = self.scan_from.saturating_sub(count);
        data
    }

    fn parse_stream(&mut self, handler: &mut dyn PartHandler) -> Result<()> {
        loop {
            match self.state {
                State::Done => return Ok(()),
                State::UnusedArea => {
                    let flat = self.buffer.flatten();
                    match self.boundary_matcher.search_from(&flat, self.scan_from) {
                        Some(pos) => {
                            let after = pos + self.boundary_matcher.pattern_len();
                            if flat[after..].starts_with(b"--") {
                                self.buffer.clear();
                                self.scan_from = 0;
                                self.state = State::Done;
                                return Ok(());
                            }
                            match skip_eol(&flat, after) {
                                Some(line_end) => {
                                    self.extract_front(line_end);
                                    self.state = State::Content;
                                }
                                None => return Ok(()),
                            }
                        }
                        None => {
                            self.scan_from = safe_resume(&flat, self.boundary_matcher.pattern_len());
                            return Ok(());
                        }
                    }
                }
                State::Content => {
                    let flat = self.buffer.flatten();

                    let header_end = match find_crlf_crlf(&flat, &self.header_matcher, 0) {
                        Some(pos) => pos,
                        None => return Ok(()),
                    };

                    let headers = parse_headers(&flat[..header_end])?;
                    let body_start = header_end + 4;

                    match self
                        .boundary_matcher
                        .search_from(&flat, self.scan_from.max(body_start))
                    {
                        Some(boundary_pos) => {
                            // body ends right before the preceding CRLF
                            let body_end = boundary_pos.saturating_sub(2).max(body_start);
                            let body = flat[body_start..body_end].to_vec();
                            handler.handle_part(Part { headers, body });

                            let after = boundary_pos + self.boundary_matcher.pattern_len();
                            if flat[after..].starts_with(b"--") {
                                self.buffer.clear();
                                self.scan_from = 0;
                                self.state = State::Done;
                                return Ok(());
                            }

                            match skip_eol(&flat, after) {
                                Some(line_end) => {
                                    self.extract_front(line_end);
                                }
                                None => return Ok(()),
                            }
                        }
                        None => {
                            self.scan_from =
                                safe_resume(&flat, self.boundary_matcher.pattern_len()).max(body_start);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

fn safe_resume(flat: &[u8], pattern_len: usize) -> usize {
    flat.len().saturating_sub(pattern_len.saturating_sub(1))
}

fn skip_eol(flat: &[u8], from: usize) -> Option<usize> {
    if flat[from..].starts_with(b"\r\n") {
        Some(from + 2)
    } else if from < flat.len() {
        None
    } else {
        None
    }
}

fn parse_headers(block: &[u8]) -> Result<HttpHeaders> {
    let text = std::str::from_utf8(block)
        .map_err(|e| CoreError::BadRequest(format!("non-utf8 multipart header: {}", e)))?;
    let mut headers = HashMap::new();
    for line in text.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        if let Some(pos) = line.find(':') {
            let key = line[..pos].trim().to_ascii_lowercase();
            let value = line[pos + 1..].trim().to_string();
            headers.insert(key, value);
        }
    }
    Ok(headers)
}

/// Extract the boundary token from a `multipart/...` Content-Type header
/// value, matching `ParseMultipartContentType`.
pub fn parse_boundary(content_type: &str) -> Option<String> {
    for token in content_type.split(';').skip(1) {
        let token = token.trim();
        if let Some(rest) = token.strip_prefix("boundary=") {
            let rest = rest.trim();
            let rest = rest.strip_prefix('"').unwrap_or(rest);
            let rest = rest.strip_suffix('"').unwrap_or(rest);
            return Some(rest.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_body(boundary: &str, parts: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (headers, body) in parts {
            out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            out.extend_from_slice(headers.as_bytes());
            out.extend_from_slice(b"\r\n\r\n");
            out.extend_from_slice(body.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        out
    }

    #[test]
    fn parses_two_parts_fed_whole() {
        let boundary = "B1";
        let body = build_body(
            boundary,
            &[
                ("Content-Type: text/plain", "hello"),
                ("Content-Type: application/json", "{}"),
            ],
        );

        let mut parts = Vec::new();
        let mut reader = MultipartStreamReader::new(boundary);
        reader
            .add_chunk(&body, &mut |p: Part| parts.push(p))
            .unwrap();
        reader.close_stream(&mut |p: Part| parts.push(p)).unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body, b"hello");
        assert_eq!(parts[0].headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(parts[1].body, b"{}");
    }

    #[test]
    fn parses_byte_at_a_time() {
        let boundary = "B2";
        let body = build_body(boundary, &[("Content-Type: text/plain", "abcdef")]);

        let mut parts = Vec::new();
        let mut reader = MultipartStreamReader::new(boundary);
        for byte in &body {
            reader
                .add_chunk(std::slice::from_ref(byte), &mut |p: Part| parts.push(p))
                .unwrap();
        }
        reader.close_stream(&mut |p: Part| parts.push(p)).unwrap();

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"abcdef");
    }

    #[test]
    fn close_before_terminal_boundary_is_bad_request() {
        let mut reader = MultipartStreamReader::new("B3");
        reader.add_chunk(b"garbage, no boundary here", &mut |_: Part| {}).unwrap();
        assert!(reader.close_stream(&mut |_: Part| {}).is_err());
    }

    #[test]
    fn boundary_extraction_handles_quoted_value() {
        let ct = r#"multipart/related; type="application/dicom"; boundary="abc123""#;
        assert_eq!(parse_boundary(ct), Some("abc123".to_string()));
    }

    #[test]
    fn boundary_extraction_handles_unquoted_value() {
        let ct = "multipart/form-data; boundary=XYZ";
        assert_eq!(parse_boundary(ct), Some("XYZ".to_string()));
    }
}

//! C3 — HTTP output sink.
//!
//! Enforces a strict call-sequence discipline: a status must be sent
//! before a body, only one "terminal" call (body,
//! redirect, unauthorized, method-not-allowed, or a closed multipart) may
//! happen per response, and calling out of order is a `BadSequenceOfCalls`
//! rather than a silent no-op. Multipart responses buffer at most two
//! pending items before flushing them into the rendered body, bounding
//! peak memory for large result sets without true chunked socket writes.

use std::collections::HashMap;
use std::io::Write;

use http::{Method, StatusCode};

use crate::error::{CoreError, Result};
use crate::http::multipart::HttpHeaders;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Deflate,
}

#[derive(Debug, Clone)]
pub enum ResponseBody {
    Empty,
    Bytes(Vec<u8>),
    Multipart { subtype: String, boundary: String, rendered: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct HttpResponseDraft {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    AwaitingStatus,
    WritingBody,
    MultipartOpen,
    Done,
}

pub struct HttpOutputSink {
    state: SinkState,
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    multipart: Option<MultipartState>,
    compression: Compression,
}

struct MultipartState {
    subtype: String,
    boundary: String,
    rendered: Vec<u8>,
    pending: Vec<(HttpHeaders, Vec<u8>)>,
}

const MULTIPART_BUFFER_THRESHOLD: usize = 2;

impl Default for HttpOutputSink {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpOutputSink {
    pub fn new() -> Self {
        Self {
            state: SinkState::AwaitingStatus,
            status: StatusCode::OK,
            headers: HashMap::new(),
            body: Vec::new(),
            multipart: None,
            compression: Compression::None,
        }
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn send_status(&mut self, status: StatusCode) -> Result<()> {
        self.require_state(SinkState::AwaitingStatus)?;
        self.status = status;
        self.state = SinkState::WritingBody;
        Ok(())
    }

    pub fn send_body(&mut self, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.require_state(SinkState::WritingBody)?;
        self.headers
            .insert("content-type".to_string(), content_type.to_string());
        self.body = data;
        self.state = SinkState::Done;
        Ok(())
    }

    pub fn send_redirect(&mut self, location: &str) -> Result<()> {
        self.require_state(SinkState::AwaitingStatus)?;
        self.status = StatusCode::FOUND;
        self.headers.insert("location".to_string(), location.to_string());
        self.state = SinkState::Done;
        Ok(())
    }

    pub fn send_unauthorized(&mut self, realm: &str) -> Result<()> {
        self.require_state(SinkState::AwaitingStatus)?;
        self.status = StatusCode::UNAUTHORIZED;
        self.headers.insert(
            "www-authenticate".to_string(),
            format!("Basic realm=\"{}\"", realm),
        );
        self.state = SinkState::Done;
        Ok(())
    }

    pub fn send_method_not_allowed(&mut self, allowed: &[Method]) -> Result<()> {
        self.require_state(SinkState::AwaitingStatus)?;
        self.status = StatusCode::METHOD_NOT_ALLOWED;
        let joined = allowed
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        self.headers.insert("allow".to_string(), joined);
        self.state = SinkState::Done;
        Ok(())
    }

    pub fn start_multipart(&mut self, subtype: &str, boundary: &str) -> Result<()> {
        self.require_state(SinkState::WritingBody)?;
        self.multipart = Some(MultipartState {
            subtype: subtype.to_string(),
            boundary: boundary.to_string(),
            rendered: Vec::new(),
            pending: Vec::new(),
        });
        self.state = SinkState::MultipartOpen;
        Ok(())
    }

    pub fn send_multipart_item(&mut self, headers: HttpHeaders, data: Vec<u8>) -> Result<()> {
        self.require_state(SinkState::MultipartOpen)?;
        let mp = self.multipart.as_mut().expect("multipart state set");
        mp.pending.push((headers, data));
        if mp.pending.len() > MULTIPART_BUFFER_THRESHOLD {
            let (headers, data) = mp.pending.remove(0);
            render_part(&mut mp.rendered, &mp.boundary, &headers, &data);
        }
        Ok(())
    }

    pub fn close_multipart(&mut self) -> Result<()> {
        self.require_state(SinkState::MultipartOpen)?;
        let mp = self.multipart.as_mut().expect("multipart state set");
        for (headers, data) in std::mem::take(&mut mp.pending) {
            render_part(&mut mp.rendered, &mp.boundary, &headers, &data);
        }
        mp.rendered
            .extend_from_slice(format!("--{}--\r\n", mp.boundary).as_bytes());
        self.state = SinkState::Done;
        Ok(())
    }

    pub fn finalize(mut self) -> Result<HttpResponseDraft> {
        self.require_state(SinkState::Done)?;

        if let Some(mp) = self.multipart.take() {
            self.headers.insert(
                "content-type".to_string(),
                format!("multipart/{}; boundary={}", mp.subtype, mp.boundary),
            );
            return Ok(HttpResponseDraft {
                status: self.status,
                headers: self.headers,
                body: ResponseBody::Multipart {
                    subtype: mp.subtype,
                    boundary: mp.boundary,
                    rendered: mp.rendered,
                },
            });
        }

        if self.body.is_empty() && !self.headers.contains_key("content-type") {
            return Ok(HttpResponseDraft {
                status: self.status,
                headers: self.headers,
                body: ResponseBody::Empty,
            });
        }

        let body = match self.compression {
            Compression::None => self.body,
            Compression::Gzip => {
                self.headers
                    .insert("content-encoding".to_string(), "gzip".to_string());
                gzip_compress(&self.body)?
            }
            Compression::Deflate => {
                self.headers
                    .insert("content-encoding".to_string(), "deflate".to_string());
                deflate_compress(&self.body)?
            }
        };

        Ok(HttpResponseDraft {
            status: self.status,
            headers: self.headers,
            body: ResponseBody::Bytes(body),
        })
    }

    fn require_state(&self, expected: SinkState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CoreError::BadSequenceOfCalls(format!(
                "HTTP output sink in state {:?}, expected {:?}",
                self.state, expected
            )))
        }
    }
}

fn render_part(out: &mut Vec<u8>, boundary: &str, headers: &HttpHeaders, data: &[u8]) {
    out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    for (key, value) in headers {
        out.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression as Level;

    let mut encoder = GzEncoder::new(Vec::new(), Level::default());
    encoder
        .write_all(data)
        .map_err(|e| CoreError::InternalError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CoreError::InternalError(e.to_string()))
}

fn deflate_compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::DeflateEncoder;
    use flate2::Compression as Level;

    let mut encoder = DeflateEncoder::new(Vec::new(), Level::default());
    encoder
        .write_all(data)
        .map_err(|e| CoreError::InternalError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CoreError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_before_status_is_bad_sequence() {
        let mut sink = HttpOutputSink::new();
        assert!(matches!(
            sink.send_body(vec![1], "text/plain"),
            Err(CoreError::BadSequenceOfCalls(_))
        ));
    }

    #[test]
    fn normal_status_then_body_finalizes() {
        let mut sink = HttpOutputSink::new();
        sink.send_status(StatusCode::OK).unwrap();
        sink.send_body(b"hello".to_vec(), "text/plain").unwrap();
        let draft = sink.finalize().unwrap();
        assert_eq!(draft.status, StatusCode::OK);
        match draft.body {
            ResponseBody::Bytes(b) => assert_eq!(b, b"hello"),
            _ => panic!("expected Bytes body"),
        }
    }

    #[test]
    fn double_status_call_is_bad_sequence() {
        let mut sink = HttpOutputSink::new();
        sink.send_status(StatusCode::OK).unwrap();
        assert!(matches!(
            sink.send_status(StatusCode::OK),
            Err(CoreError::BadSequenceOfCalls(_))
        ));
    }

    #[test]
    fn method_not_allowed_sets_allow_header() {
        let mut sink = HttpOutputSink::new();
        sink.send_method_not_allowed(&[Method::GET, Method::POST]).unwrap();
        let draft = sink.finalize().unwrap();
        assert_eq!(draft.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(draft.headers.get("allow"), Some(&"GET, POST".to_string()));
    }

    #[test]
    fn gzip_compression_sets_header_and_shrinks_repetitive_body() {
        let mut sink = HttpOutputSink::new();
        sink.set_compression(Compression::Gzip);
        sink.send_status(StatusCode::OK).unwrap();
        sink.send_body(vec![b'a'; 4096], "text/plain").unwrap();
        let draft = sink.finalize().unwrap();
        assert_eq!(draft.headers.get("content-encoding"), Some(&"gzip".to_string()));
        match draft.body {
            ResponseBody::Bytes(b) => assert!(b.len() < 4096),
            _ => panic!("expected Bytes body"),
        }
    }

    #[test]
    fn multipart_sequence_renders_all_items() {
        let mut sink = HttpOutputSink::new();
        sink.send_status(StatusCode::OK).unwrap();
        sink.start_multipart("related", "BOUND").unwrap();
        for i in 0..5 {
            let mut headers = HttpHeaders::new();
            headers.insert("x-index".to_string(), i.to_string());
            sink.send_multipart_item(headers, vec![i as u8]).unwrap();
        }
        sink.close_multipart().unwrap();
        let draft = sink.finalize().unwrap();
        match draft.body {
            ResponseBody::Multipart { rendered, .. } => {
                let text = String::from_utf8_lossy(&rendered);
                assert_eq!(text.matches("--BOUND").count(), 6);
                assert!(text.ends_with("--BOUND--\r\n"));
            }
            _ => panic!("expected Multipart body"),
        }
    }
}

//! C2 — HTTP content negotiation.
//!
//! Registered handlers are concrete `type/subtype` pairs (no wildcards
//! allowed at registration),
//! the `Accept` header is split on commas, each media range split on `;`
//! into type/subtype and parameters, and the best match is chosen by
//! (level, quality) where level is 0 for `*/*`, 1 for `type/*`, 2 for an
//! exact match, and quality is the `q` parameter (default 1.0, range
//! 0.0-1.0, anything else is a `BadRequest`).

use std::collections::HashMap;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub kind: String,
    pub subtype: String,
}

impl MediaType {
    pub fn new(kind: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            subtype: subtype.into(),
        }
    }

    fn is_match(&self, kind: &str, subtype: &str) -> bool {
        if kind == "*" && subtype == "*" {
            true
        } else if subtype == "*" && kind == self.kind {
            true
        } else {
            kind == self.kind && subtype == self.subtype
        }
    }
}

struct Candidate {
    level: u8,
    quality: f32,
    index: usize,
    parameters: HashMap<String, String>,
}

impl Candidate {
    fn better_than(&self, other: &Candidate) -> bool {
        (self.level, ordered_float(self.quality)) > (other.level, ordered_float(other.quality))
    }
}

fn ordered_float(q: f32) -> i32 {
    (q * 1000.0).round() as i32
}

fn strip_spaces(s: &str) -> &str {
    s.trim()
}

fn split_pair(source: &str, separator: char) -> Option<(String, String)> {
    let pos = source.find(separator)?;
    Some((
        strip_spaces(&source[..pos]).to_string(),
        strip_spaces(&source[pos + 1..]).to_string(),
    ))
}

fn parse_quality(parameters: &HashMap<String, String>) -> Result<f32> {
    match parameters.get("q") {
        None => Ok(1.0),
        Some(raw) => match raw.parse::<f32>() {
            Ok(q) if (0.0..=1.0).contains(&q) => Ok(q),
            _ => Err(CoreError::BadRequest(format!(
                "quality parameter out of range in a HTTP request (must be between 0 and 1): {}",
                raw
            ))),
        },
    }
}

/// A registry of acceptable content types for one response, used to pick
/// the best representation for an incoming `Accept` header.
pub struct ContentNegotiation {
    handlers: Vec<MediaType>,
}

impl Default for ContentNegotiation {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentNegotiation {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a concrete `type/subtype` this response can produce.
    /// Wildcards are not allowed here; only in the `Accept` header.
    pub fn register(&mut self, mime: &str) -> Result<()> {
        let (kind, subtype) = split_pair(mime, '/')
            .ok_or_else(|| CoreError::ParameterOutOfRange(mime.to_string()))?;
        if kind == "*" || subtype == "*" {
            return Err(CoreError::ParameterOutOfRange(mime.to_string()));
        }
        self.handlers.push(MediaType::new(kind, subtype));
        Ok(())
    }

    /// Apply the given `Accept` header value and return the index of the
    /// registered handler (in registration order) that best matches,
    /// together with the media-range parameters that won.
    pub fn apply(&self, accept: &str) -> Result<Option<(usize, HashMap<String, String>)>> {
        let mut best: Option<Candidate> = None;

        for media_range in accept.split(',') {
            let mut tokens = media_range.split(';');
            let type_subtype = match tokens.next() {
                Some(t) => t,
                None => continue,
            };

            let mut parameters = HashMap::new();
            for token in tokens {
                if let Some((key, mut value)) = split_pair(token, '=') {
                    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                        value = value[1..value.len() - 1].to_string();
                    }
                    parameters.insert(key, value);
                } else {
                    parameters.insert(strip_spaces(token).to_string(), String::new());
                }
            }

            let (kind, subtype) = match split_pair(type_subtype, '/') {
                Some(pair) => pair,
                None => continue,
            };

            let quality = parse_quality(&parameters)?;
            let level = if kind == "*" && subtype == "*" {
                0
            } else if subtype == "*" {
                1
            } else {
                2
            };

            for (index, handler) in self.handlers.iter().enumerate() {
                if handler.is_match(&kind, &subtype) {
                    let candidate = Candidate {
                        level,
                        quality,
                        index,
                        parameters: parameters.clone(),
                    };
                    best = match best {
                        None => Some(candidate),
                        Some(current) => {
                            if candidate.better_than(&current) {
                                Some(candidate)
                            } else {
                                Some(current)
                            }
                        }
                    };
                }
            }
        }

        Ok(best.map(|c| (c.index, c.parameters)))
    }

    /// Apply against a header map, defaulting to `*/*` when `Accept` is
    /// absent.
    pub fn apply_headers(
        &self,
        headers: &HashMap<String, String>,
    ) -> Result<Option<(usize, HashMap<String, String>)>> {
        match headers.get("accept") {
            Some(accept) => self.apply(accept),
            None => self.apply("*/*"),
        }
    }
}

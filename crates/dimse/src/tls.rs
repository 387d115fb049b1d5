//! TLS support for DIMSE connections
//!
//! This module provides TLS/SSL encryption support for DIMSE connections.
//! Currently under development.

/// TLS configuration for DIMSE connections
pub struct TlsConfig {
    // TODO: Implement TLS configuration
}

impl TlsConfig {
    /// Create a new TLS configuration
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! # EdgePath Codec
//!
//! An edge request path has the shape
//!
//! ```text
//! /<ignored>/<escaped nodeID>/<port>/<escaped interfaceURL...>
//! ```
//!
//! Segments are counted after the leading `/`:
//!
//! | Segments | Result |
//! |----------|--------|
//! | 0-2 | root (no node addressed) |
//! | 3 | `InvalidFormat` |
//! | 4+ | `EdgePath { node_id, port, interface_url }` |
//!
//! Decoding follows query-unescape rules: `+` is a space and every `%` must
//! start a two-digit hex escape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Leading segment written by [`EdgePath::encode`].
pub const EDGE_PATH_PREFIX: &str = "edge";

/// Errors produced while decoding an edge path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EdgePathError {
    #[error("invalid path format")]
    InvalidFormat,

    #[error("invalid escape in {segment:?}")]
    InvalidEscape { segment: String },

    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// Structured address of an edge application, decoded from an HTTP path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgePath {
    pub node_id: String,
    pub port: u16,
    pub interface_url: String,
}

impl EdgePath {
    pub fn new(node_id: impl Into<String>, port: u16, interface_url: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            port,
            interface_url: interface_url.into(),
        }
    }

    /// Decode `path`. Pure: the same input always yields the same result.
    pub fn parse(path: &str) -> Result<Self, EdgePathError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let segments: Vec<&str> = trimmed.split('/').collect();

        match segments.len() {
            0..=2 => Ok(Self::default()),
            3 => Err(EdgePathError::InvalidFormat),
            _ => {
                let node_id = unescape(segments[1])?;
                let raw_port = unescape(segments[2])?;
                let port = raw_port
                    .parse::<u16>()
                    .map_err(|_| EdgePathError::InvalidPort(raw_port.clone()))?;
                let interface_url = unescape(&segments[3..].join("/"))?;

                Ok(Self {
                    node_id,
                    port,
                    interface_url,
                })
            }
        }
    }

    /// Encode as `/edge/{node}/{port}/{interface}`, escaping each segment.
    pub fn encode(&self) -> String {
        let interface = self
            .interface_url
            .split('/')
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!(
            "/{}/{}/{}/{}",
            EDGE_PATH_PREFIX,
            urlencoding::encode(&self.node_id),
            self.port,
            interface
        )
    }

    /// True when no node is addressed (the node's own status endpoint).
    pub fn is_root(&self) -> bool {
        self.node_id.is_empty()
    }
}

/// Query-style unescape: `+` decodes to a space, malformed `%` escapes and
/// non-UTF-8 results are errors.
fn unescape(segment: &str) -> Result<String, EdgePathError> {
    let invalid = || EdgePathError::InvalidEscape {
        segment: segment.to_string(),
    };

    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !well_formed {
                return Err(invalid());
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = segment.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| invalid())
}

/// Legacy JSON envelope carrying the edge path alongside the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransparentForward {
    pub edge_path: EdgePath,
    pub payload: String,
}

//! Connection authentication: token carriers, the verifier seam, and the
//! verified-identity cache.

pub mod cache;
pub mod verifier;

use std::fmt;

use serde::{Deserialize, Serialize};

/// The authenticated principal behind one or more connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Why a connection attempt was refused.
///
/// Every verification failure cause (malformed, expired, bad signature,
/// unresolvable identity) collapses into `InvalidToken` at this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No token found in any accepted carrier.
    MissingToken,
    /// The token failed verification.
    InvalidToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "no credential provided"),
            AuthError::InvalidToken => write!(f, "invalid credential"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Token carriers captured from the upgrade request before the socket is
/// handed off. The identify frame's own auth payload outranks both.
#[derive(Debug, Clone, Default)]
pub struct HandshakeTokens {
    /// `token` query parameter on the upgrade URL.
    pub query: Option<String>,
    /// `authorization` header on the upgrade request.
    pub header: Option<String>,
}

/// Select the bearer token from the accepted carriers in priority order:
/// identify auth payload, then query parameter, then authorization header.
/// First non-empty carrier wins; no merging across carriers.
pub fn select_token(auth_payload: Option<&str>, handshake: &HandshakeTokens) -> Option<String> {
    [
        auth_payload,
        handshake.query.as_deref(),
        handshake.header.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|t| !t.is_empty())
    .map(|t| strip_bearer(t).to_string())
}

/// Strip a `Bearer ` scheme prefix; any other shape is used as-is.
pub fn strip_bearer(value: &str) -> &str {
    value.strip_prefix("Bearer ").unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(query: Option<&str>, header: Option<&str>) -> HandshakeTokens {
        HandshakeTokens {
            query: query.map(String::from),
            header: header.map(String::from),
        }
    }

    #[test]
    fn auth_payload_outranks_query_and_header() {
        let hs = handshake(Some("from-query"), Some("from-header"));
        assert_eq!(
            select_token(Some("from-payload"), &hs),
            Some("from-payload".to_string())
        );
    }

    #[test]
    fn query_outranks_header() {
        let hs = handshake(Some("from-query"), Some("from-header"));
        assert_eq!(select_token(None, &hs), Some("from-query".to_string()));
    }

    #[test]
    fn header_is_the_last_resort() {
        let hs = handshake(None, Some("from-header"));
        assert_eq!(select_token(None, &hs), Some("from-header".to_string()));
    }

    #[test]
    fn empty_carriers_fall_through() {
        let hs = handshake(Some("  "), Some("from-header"));
        assert_eq!(select_token(Some(""), &hs), Some("from-header".to_string()));
    }

    #[test]
    fn no_carriers_yields_none() {
        assert_eq!(select_token(None, &HandshakeTokens::default()), None);
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let hs = handshake(None, Some("Bearer abc.def.ghi"));
        assert_eq!(select_token(None, &hs), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn raw_header_value_is_used_as_is() {
        assert_eq!(strip_bearer("abc.def.ghi"), "abc.def.ghi");
        assert_eq!(strip_bearer("Basic xyz"), "Basic xyz");
    }
}

//! Session URI
//!
//! `wc:{topic}@{version}?bridge={percent-encoded bridge url}&key={hex key}`
//!
//! The URI is the only way the key reaches the wallet. It is handed to the
//! caller once and never kept by the session.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

use crate::crypto::{SessionKey, Topic};

/// Protocol version carried in every URI
pub const PROTOCOL_VERSION: u32 = 1;

const SCHEME: &str = "wc:";

// RFC 3986 unreserved characters stay as they are
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// URI parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// Does not start with `wc:`
    #[error("Not a session URI: missing `wc:` scheme")]
    MissingScheme,

    /// No `@version` after the topic
    #[error("Missing protocol version")]
    MissingVersion,

    /// Version is not a number
    #[error("Invalid protocol version: {0}")]
    InvalidVersion(String),

    /// A required query parameter is absent
    #[error("Missing `{0}` parameter")]
    MissingParameter(&'static str),

    /// Bad percent-encoding in a parameter
    #[error("Invalid percent-encoding in `{0}`")]
    InvalidEncoding(&'static str),

    /// Key is not 32 hex bytes
    #[error("Invalid session key")]
    InvalidKey,
}

/// Parsed or freshly built session URI
#[derive(Clone, PartialEq, Eq)]
pub struct SessionUri {
    /// Session topic
    pub topic: Topic,
    /// Protocol version
    pub version: u32,
    /// Bridge URL, unencoded
    pub bridge: String,
    /// Hex session key
    pub key: String,
}

impl SessionUri {
    /// Build a version 1 URI
    pub fn new(topic: &Topic, bridge: &str, key: &SessionKey) -> Self {
        SessionUri {
            topic: topic.clone(),
            version: PROTOCOL_VERSION,
            bridge: bridge.to_string(),
            key: key.to_hex(),
        }
    }

    /// Decode the key
    pub fn session_key(&self) -> Result<SessionKey, UriError> {
        SessionKey::from_hex(&self.key).map_err(|_| UriError::InvalidKey)
    }
}

impl fmt::Display for SessionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}@{}?bridge={}&key={}",
            SCHEME,
            self.topic,
            self.version,
            utf8_percent_encode(&self.bridge, QUERY_VALUE),
            self.key
        )
    }
}

impl fmt::Debug for SessionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionUri")
            .field("topic", &self.topic)
            .field("version", &self.version)
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}

impl FromStr for SessionUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(SCHEME).ok_or(UriError::MissingScheme)?;
        let (topic, rest) = rest.split_once('@').ok_or(UriError::MissingVersion)?;
        let (version, query) = rest.split_once('?').unwrap_or((rest, ""));
        let version = version
            .parse()
            .map_err(|_| UriError::InvalidVersion(version.to_string()))?;

        let mut bridge = None;
        let mut key = None;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            match name {
                "bridge" => {
                    bridge =
                        Some(percent_decode(value).ok_or(UriError::InvalidEncoding("bridge"))?)
                }
                "key" => key = Some(value.to_string()),
                _ => {}
            }
        }

        let uri = SessionUri {
            topic: Topic::from(topic),
            version,
            bridge: bridge.ok_or(UriError::MissingParameter("bridge"))?,
            key: key.ok_or(UriError::MissingParameter("key"))?,
        };
        uri.session_key()?;
        Ok(uri)
    }
}

// Every `%` must start a full escape; the decoder alone would pass `%zz` through.
fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let well_formed = bytes.iter().enumerate().all(|(i, &b)| {
        b != b'%'
            || bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if !well_formed {
        return None;
    }

    let plus_as_space = s.replace('+', " ");
    percent_decode_str(&plus_as_space)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

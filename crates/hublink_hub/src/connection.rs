//! Portal-format connection string parsing.
//!
//! A connection string is a semicolon-separated list of `key=value` pairs
//! naming the hub endpoint and the shared-access credentials this device
//! uses to authorize registration calls:
//!
//! `Endpoint=sb://example.servicebus.example.net/;SharedAccessKeyName=Listen;SharedAccessKey=…`

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ENDPOINT_KEY: &str = "Endpoint";
const SHARED_ACCESS_KEY_NAME_KEY: &str = "SharedAccessKeyName";
const SHARED_ACCESS_KEY_KEY: &str = "SharedAccessKey";

/// Errors produced while parsing a connection string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStringError {
    /// A segment did not have the `key=value` shape.
    #[error("connection string segment '{0}' is not a key=value pair")]
    MalformedSegment(String),

    /// A segment used a key this format does not define.
    #[error("connection string contains unrecognized key '{0}'")]
    UnknownKey(String),

    /// One of the three required keys was absent.
    #[error("connection string is missing required key '{0}'")]
    MissingKey(&'static str),
}

/// Parsed credentials for the remote registration hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    endpoint: String,
    shared_access_key_name: String,
    shared_access_key: String,
}

impl ConnectionString {
    pub fn new(
        endpoint: impl Into<String>,
        shared_access_key_name: impl Into<String>,
        shared_access_key: impl Into<String>,
    ) -> Self {
        ConnectionString {
            endpoint: endpoint.into(),
            shared_access_key_name: shared_access_key_name.into(),
            shared_access_key: shared_access_key.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn shared_access_key_name(&self) -> &str {
        &self.shared_access_key_name
    }

    pub fn shared_access_key(&self) -> &str {
        &self.shared_access_key
    }

    /// The endpoint rewritten for REST calls: the `sb://` scheme becomes
    /// `https://`, trailing slashes are dropped. Endpoints that already
    /// carry an http scheme are kept as-is.
    pub fn https_endpoint(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        match endpoint.strip_prefix("sb://") {
            Some(host) => format!("https://{}", host),
            None => endpoint.to_string(),
        }
    }
}

impl FromStr for ConnectionString {
    type Err = ConnectionStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;

        for segment in s.split(';').filter(|segment| !segment.is_empty()) {
            let (name, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
            match name {
                ENDPOINT_KEY => endpoint = Some(value.to_string()),
                SHARED_ACCESS_KEY_NAME_KEY => key_name = Some(value.to_string()),
                SHARED_ACCESS_KEY_KEY => key = Some(value.to_string()),
                other => return Err(ConnectionStringError::UnknownKey(other.to_string())),
            }
        }

        Ok(ConnectionString {
            endpoint: endpoint.ok_or(ConnectionStringError::MissingKey(ENDPOINT_KEY))?,
            shared_access_key_name: key_name
                .ok_or(ConnectionStringError::MissingKey(SHARED_ACCESS_KEY_NAME_KEY))?,
            shared_access_key: key.ok_or(ConnectionStringError::MissingKey(SHARED_ACCESS_KEY_KEY))?,
        })
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={};{}={};{}={};",
            ENDPOINT_KEY,
            self.endpoint,
            SHARED_ACCESS_KEY_NAME_KEY,
            self.shared_access_key_name,
            SHARED_ACCESS_KEY_KEY,
            self.shared_access_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTAL_STRING: &str =
        "Endpoint=sb://demo.servicebus.example.net/;SharedAccessKeyName=DefaultListenSharedAccessSignature;SharedAccessKey=2+emKB0HBGLvbsDDWbCAGxbeM6vLmnaXEI2t1c0dKVg=";

    #[test]
    fn parses_portal_format() {
        let parsed: ConnectionString = PORTAL_STRING.parse().unwrap();
        assert_eq!(parsed.endpoint(), "sb://demo.servicebus.example.net/");
        assert_eq!(
            parsed.shared_access_key_name(),
            "DefaultListenSharedAccessSignature"
        );
        // Base64 padding after the first '=' belongs to the value.
        assert!(parsed.shared_access_key().ends_with("dKVg="));
    }

    #[test]
    fn segment_order_does_not_matter() {
        let reordered =
            "SharedAccessKey=abc;Endpoint=sb://demo.example.net/;SharedAccessKeyName=Listen;";
        let parsed: ConnectionString = reordered.parse().unwrap();
        assert_eq!(parsed.shared_access_key(), "abc");
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = "Endpoint=sb://x/;SharedAccessKeyName=n;SharedAccessKey=k;EntityPath=oops"
            .parse::<ConnectionString>()
            .unwrap_err();
        assert_eq!(
            err,
            ConnectionStringError::UnknownKey("EntityPath".to_string())
        );
    }

    #[test]
    fn rejects_missing_required_keys() {
        let err = "Endpoint=sb://x/;SharedAccessKeyName=n"
            .parse::<ConnectionString>()
            .unwrap_err();
        assert_eq!(
            err,
            ConnectionStringError::MissingKey(SHARED_ACCESS_KEY_KEY)
        );
    }

    #[test]
    fn display_round_trips() {
        let parsed: ConnectionString = PORTAL_STRING.parse().unwrap();
        let reparsed: ConnectionString = parsed.to_string().parse().unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn https_endpoint_rewrites_scheme() {
        let parsed: ConnectionString = PORTAL_STRING.parse().unwrap();
        assert_eq!(
            parsed.https_endpoint(),
            "https://demo.servicebus.example.net"
        );

        let local = ConnectionString::new("http://127.0.0.1:9090", "n", "k");
        assert_eq!(local.https_endpoint(), "http://127.0.0.1:9090");
    }
}

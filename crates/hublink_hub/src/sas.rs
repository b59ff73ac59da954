//! Shared-access-signature tokens for hub REST calls.
//!
//! Every request carries an `Authorization` header of the form
//! `SharedAccessSignature sr=…&sig=…&se=…&skn=…`, where `sig` is an
//! HMAC-SHA256 over the URL-encoded resource URI and the expiry timestamp,
//! keyed with the shared access key from the connection string.

use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::connection::ConnectionString;

type HmacSha256 = Hmac<Sha256>;

/// Tokens stay valid for five minutes; one is minted per request.
const TOKEN_EXPIRE_SECONDS: i64 = 5 * 60;

#[derive(Error, Debug)]
pub enum SasError {
    #[error("failed to URL-encode signing payload: {0}")]
    Encoding(#[from] serde_urlencoded::ser::Error),
}

fn url_encode(value: &str) -> Result<String, SasError> {
    // serde_urlencoded only emits key=value pairs; encode under a throwaway
    // key and strip it to get the bare encoded value.
    let encoded = serde_urlencoded::to_string([("v", value)])?;
    Ok(encoded["v=".len()..].to_string())
}

/// Generates a token authorizing access to `target_uri` until `expiry`
/// (unix seconds).
pub fn generate_sas_token(
    connection: &ConnectionString,
    target_uri: &str,
    expiry: i64,
) -> Result<String, SasError> {
    let resource = target_uri.to_lowercase();
    let to_sign = format!("{}\n{}", url_encode(&resource)?, expiry);

    let mut mac = HmacSha256::new_from_slice(connection.shared_access_key().as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(to_sign.as_bytes());
    let signature = base64_engine.encode(mac.finalize().into_bytes());

    let query = serde_urlencoded::to_string([
        ("sr", resource.as_str()),
        ("sig", signature.as_str()),
        ("se", expiry.to_string().as_str()),
        ("skn", connection.shared_access_key_name()),
    ])?;

    Ok(format!("SharedAccessSignature {}", query))
}

/// Generates a token for `target_uri` expiring [`TOKEN_EXPIRE_SECONDS`]
/// from now.
pub fn sas_token_for(connection: &ConnectionString, target_uri: &str) -> Result<String, SasError> {
    let expiry = Utc::now().timestamp() + TOKEN_EXPIRE_SECONDS;
    generate_sas_token(connection, target_uri, expiry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> ConnectionString {
        ConnectionString::new("sb://demo.example.net/", "Listen", "secret-key")
    }

    #[test]
    fn token_carries_all_four_fields() {
        let token =
            generate_sas_token(&connection(), "https://demo.example.net/hub", 1_700_000_000)
                .unwrap();
        assert!(token.starts_with("SharedAccessSignature "));
        for field in ["sr=", "sig=", "se=1700000000", "skn=Listen"] {
            assert!(token.contains(field), "token missing '{field}': {token}");
        }
    }

    #[test]
    fn signing_is_deterministic_for_fixed_expiry() {
        let a = generate_sas_token(&connection(), "https://demo.example.net/a", 1_700_000_000)
            .unwrap();
        let b = generate_sas_token(&connection(), "https://demo.example.net/a", 1_700_000_000)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn resource_uri_is_lowercased_before_signing() {
        let mixed = generate_sas_token(&connection(), "https://Demo.Example.net/A", 1_700_000_000)
            .unwrap();
        let lower = generate_sas_token(&connection(), "https://demo.example.net/a", 1_700_000_000)
            .unwrap();
        assert_eq!(mixed, lower);
    }

    #[test]
    fn different_keys_produce_different_signatures() {
        let other = ConnectionString::new("sb://demo.example.net/", "Listen", "another-key");
        let a = generate_sas_token(&connection(), "https://demo.example.net/hub", 1_700_000_000)
            .unwrap();
        let b =
            generate_sas_token(&other, "https://demo.example.net/hub", 1_700_000_000).unwrap();
        assert_ne!(a, b);
    }
}

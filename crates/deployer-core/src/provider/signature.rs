//! Webhook authenticity checks.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// A secret is configured but the request carries no signature.
    #[error("Missing signature header '{0}'")]
    Missing(&'static str),

    #[error("Invalid Signature 401")]
    Mismatch,
}

/// `sha1=<lower hex HMAC-SHA1>` of the raw body, as sent in `X-Hub-Signature`.
pub fn github_signature(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = new_mac(secret)?;
    mac.update(body);
    Ok(format!("sha1={}", hex::encode(mac.finalize().into_bytes())))
}

/// Check `X-Hub-Signature`. Without a configured secret nothing is checked.
pub fn verify_github(
    secret: Option<&str>,
    header: Option<&str>,
    body: &[u8],
) -> Result<(), SignatureError> {
    let Some(secret) = secret else {
        tracing::warn!("Skip signature validation!");
        return Ok(());
    };
    let header = header.ok_or(SignatureError::Missing("X-Hub-Signature"))?;

    // Comparison is case-sensitive: only lower-case hex is accepted.
    let digest = header
        .strip_prefix("sha1=")
        .filter(|hex| !hex.bytes().any(|b| b.is_ascii_uppercase()))
        .and_then(|hex| hex::decode(hex).ok())
        .ok_or(SignatureError::Mismatch)?;

    let mut mac = new_mac(secret)?;
    mac.update(body);
    mac.verify_slice(&digest).map_err(|_| {
        tracing::error!("Invalid GitHub signature, automatic deploy failed!");
        tracing::debug!(
            "Computed Mac: {}\nSent Mac    : {}",
            github_signature(secret, body).unwrap_or_default(),
            header
        );
        SignatureError::Mismatch
    })
}

/// Check a plain shared token such as `X-Gitlab-Token`.
pub fn verify_token(
    secret: Option<&str>,
    header_name: &'static str,
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let Some(secret) = secret else {
        tracing::warn!("Skip signature validation!");
        return Ok(());
    };
    match header {
        None => Err(SignatureError::Missing(header_name)),
        Some(token) if token == secret => Ok(()),
        Some(_) => Err(SignatureError::Mismatch),
    }
}

fn new_mac(secret: &str) -> Result<HmacSha1, SignatureError> {
    HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"The quick brown fox jumps over the lazy dog";

    #[test]
    fn test_known_vector() {
        assert_eq!(
            github_signature("key", BODY).unwrap(),
            "sha1=de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
        );
    }

    #[test]
    fn test_valid_signature_passes() {
        let header = github_signature("topSecret", BODY).unwrap();
        assert_eq!(verify_github(Some("topSecret"), Some(&header), BODY), Ok(()));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let header = github_signature("other", BODY).unwrap();
        assert_eq!(
            verify_github(Some("topSecret"), Some(&header), BODY),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_comparison_is_case_sensitive() {
        let header = github_signature("key", BODY)
            .unwrap()
            .to_uppercase().replace("SHA1=", "sha1=");
        assert_eq!(
            verify_github(Some("key"), Some(&header), BODY),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_missing_header_with_secret_fails() {
        assert_eq!(
            verify_github(Some("key"), None, BODY),
            Err(SignatureError::Missing("X-Hub-Signature"))
        );
    }

    #[test]
    fn test_no_secret_skips_validation() {
        assert_eq!(verify_github(None, None, BODY), Ok(()));
        assert_eq!(verify_token(None, "X-Gitlab-Token", Some("x")), Ok(()));
    }

    #[test]
    fn test_token_equality() {
        assert_eq!(verify_token(Some("s3"), "X-Gitlab-Token", Some("s3")), Ok(()));
        assert_eq!(
            verify_token(Some("s3"), "X-Gitlab-Token", Some("S3")),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_token(Some("s3"), "X-Gitlab-Token", None),
            Err(SignatureError::Missing("X-Gitlab-Token"))
        );
    }
}

//! `Authorization: Bearer` header parsing

/// Scheme name expected in the authorization header
pub const BEARER_SCHEME: &str = "Bearer";

/// Extract the token from an `Authorization` header value
///
/// Returns `None` unless the value is exactly `Bearer <token>` with a
/// non-empty token.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    let (scheme, token) = header.split_once(' ')?;

    if scheme != BEARER_SCHEME {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(' ') {
        return None;
    }

    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer(Some("  Bearer abc  ")), Some("abc"));
    }

    #[test]
    fn test_extract_bearer_rejects() {
        assert_eq!(extract_bearer(None), None);
        assert_eq!(extract_bearer(Some("")), None);
        assert_eq!(extract_bearer(Some("Bearer")), None);
        assert_eq!(extract_bearer(Some("Bearer ")), None);
        assert_eq!(extract_bearer(Some("Basic abc")), None);
        assert_eq!(extract_bearer(Some("bearer abc")), None);
        assert_eq!(extract_bearer(Some("Bearer a b")), None);
    }
}

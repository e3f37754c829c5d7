//! Shared-secret check for inbound webhooks.

use axum::http::HeaderMap;

/// Header the platform carries the shared secret in.
pub const SECRET_HEADER: &str = "x-vapi-secret";

/// Checks the request's secret header against `expected`.
///
/// With no expected secret every request passes. The comparison does not
/// short-circuit on the first differing byte.
#[must_use]
pub fn verify(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get(SECRET_HEADER)
        .is_some_and(|provided| constant_time_eq(provided.as_bytes(), expected.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, HeaderValue::from_str(secret).unwrap());
        headers
    }

    #[test]
    fn no_configured_secret_accepts_everything() {
        assert!(verify(None, &HeaderMap::new()));
        assert!(verify(None, &headers("anything")));
    }

    #[test]
    fn matching_secret_is_accepted() {
        assert!(verify(Some("s3cret"), &headers("s3cret")));
    }

    #[test]
    fn mismatch_or_missing_is_rejected() {
        assert!(!verify(Some("s3cret"), &headers("s3cre7")));
        assert!(!verify(Some("s3cret"), &headers("s3cret-longer")));
        assert!(!verify(Some("s3cret"), &HeaderMap::new()));
    }
}

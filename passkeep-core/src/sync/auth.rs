//! Bearer auth header formatting and parsing.

/// Name of the header carrying the token.
pub const AUTHORIZATION: &str = "Authorization";

const SCHEME: &str = "Bearer";

/// Format the Authorization header value.
///
/// ```text
/// Bearer <token>
/// ```
pub fn format_bearer(token: &str) -> String {
    format!("{} {}", SCHEME, token)
}

/// Extract the token from an Authorization header value.
///
/// The scheme is matched case-insensitively. Returns `None` for any other
/// scheme or an empty token.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_parse_roundtrip() {
        let header = format_bearer("abc.def.ghi");
        assert_eq!(header, "Bearer abc.def.ghi");
        assert_eq!(parse_bearer(&header), Some("abc.def.ghi"));
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert_eq!(parse_bearer("bearer tok"), Some("tok"));
    }

    #[test]
    fn other_schemes_rejected() {
        assert_eq!(parse_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer("tok"), None);
    }

    #[test]
    fn empty_token_rejected() {
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer    "), None);
    }
}

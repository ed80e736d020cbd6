//! Explicit upstream sessions.
//!
//! A [`Session`] bundles everything a dependent request needs (ephemeral
//! identifiers, the anti-forgery token, and the cookie set) into one value
//! that is built once and then only read. Nothing here is shared between
//! calls.

use std::collections::BTreeMap;

/// Cookies captured from `Set-Cookie` headers, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSet {
    cookies: BTreeMap<String, String>,
}

impl CookieSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw `Set-Cookie` header values.
    ///
    /// Attributes after the first `;` (Path, Expires, HttpOnly...) are dropped.
    pub fn from_set_cookie_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut set = Self::new();
        for header in headers {
            let pair = header.as_ref().split(';').next().unwrap_or("");
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    set.cookies.insert(name.to_string(), value.trim().to_string());
                }
            }
        }
        set
    }

    /// Merge two sets; on name clashes `later` wins.
    pub fn merged(&self, later: &CookieSet) -> CookieSet {
        let mut cookies = self.cookies.clone();
        cookies.extend(later.cookies.iter().map(|(k, v)| (k.clone(), v.clone())));
        CookieSet { cookies }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Render as a `Cookie` request header value.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// An acquired upstream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Ephemeral identifiers of the upstream search job, in extraction order
    identifiers: Vec<(String, String)>,
    /// Anti-forgery token echoed back on every dependent request
    token: String,
    cookies: CookieSet,
}

impl Session {
    pub fn new(identifiers: Vec<(String, String)>, token: String, cookies: CookieSet) -> Self {
        Self {
            identifiers,
            token,
            cookies,
        }
    }

    pub fn identifier(&self, name: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn identifiers(&self) -> &[(String, String)] {
        &self.identifiers
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn cookies(&self) -> &CookieSet {
        &self.cookies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_cookie_headers() {
        let set = CookieSet::from_set_cookie_headers(&[
            "sid=abc123; Path=/; HttpOnly",
            "XSRF-TOKEN=tok%3D; Secure",
            "broken-header",
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("sid"), Some("abc123"));
        assert_eq!(set.get("XSRF-TOKEN"), Some("tok%3D"));
    }

    #[test]
    fn test_merge_later_overrides() {
        let first = CookieSet::from_set_cookie_headers(&["a=1", "b=2"]);
        let second = CookieSet::from_set_cookie_headers(&["b=3", "c=4"]);
        let merged = first.merged(&second);
        assert_eq!(merged.header_value(), "a=1; b=3; c=4");
        // inputs are untouched
        assert_eq!(first.get("b"), Some("2"));
    }

    #[test]
    fn test_session_accessors() {
        let session = Session::new(
            vec![("searchId".into(), "s-1".into()), ("requestId".into(), "r-9".into())],
            "tok".into(),
            CookieSet::new(),
        );
        assert_eq!(session.identifier("requestId"), Some("r-9"));
        assert_eq!(session.identifier("missing"), None);
        assert_eq!(session.token(), "tok");
        assert!(session.cookies().is_empty());
    }
}

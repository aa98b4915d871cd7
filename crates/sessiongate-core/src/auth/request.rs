//! Minimal view of an inbound request: header and cookie lookup.

use std::collections::HashMap;

use cookie::Cookie;

/// Name of the header carrying credentials
pub const AUTHORIZATION_HEADER: &str = "Authorization";

const COOKIE_HEADER: &str = "Cookie";

/// What the strategies need from the hosting server's request type.
pub trait AuthRequest {
    /// Header value by name. Names compare case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;

    /// Cookie value by exact name.
    fn cookie(&self, name: &str) -> Option<&str>;
}

/// Owned request metadata, for servers that don't want to implement
/// [`AuthRequest`] on their own type, and for tests.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    path: String,
    headers: Vec<(String, String)>,
    cookies: HashMap<String, String>,
}

impl RequestParts {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Add a header. A `Cookie` header is also split into cookies; when a
    /// name repeats, the first value wins.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name.eq_ignore_ascii_case(COOKIE_HEADER) {
            for (cookie_name, cookie_value) in parse_cookie_header(&value) {
                self.cookies.entry(cookie_name).or_insert(cookie_value);
            }
        }
        self.headers.push((name, value));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl AuthRequest for RequestParts {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// Split a `Cookie` header (`a=1; b=2`) into name/value pairs in header
/// order, dropping surrounding double quotes. Unparsable pairs are skipped.
fn parse_cookie_header(value: &str) -> impl Iterator<Item = (String, String)> + '_ {
    Cookie::split_parse(value)
        .filter_map(Result::ok)
        .map(|cookie| (cookie.name().to_string(), cookie.value_trimmed().to_string()))
}

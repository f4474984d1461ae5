//! Opaque cookie bag
//!
//! The provider's session rides on browser cookies. We never interpret
//! them beyond name/value: whatever the login flow sets is forwarded
//! verbatim on every authenticated request.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, SET_COOKIE};

/// Name/value cookie bag with deterministic ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture every `Set-Cookie` value from a response.
    ///
    /// Attributes (`Path`, `HttpOnly`, ...) are dropped; later values
    /// for the same name win, matching browser jar behavior.
    pub fn absorb(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some(pair) = raw.split(';').next() else { continue };
            let Some((name, value)) = pair.split_once('=') else { continue };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            self.cookies.insert(name.to_string(), value.trim().to_string());
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Render the bag as a `Cookie` request-header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.cookies {
            if !out.is_empty() {
                out.push_str("; ");
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

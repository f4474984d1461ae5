//! Login-response parsing
//!
//! The login flow scrapes two values out of browser-oriented
//! responses: the `authenticity_token` embedded in the login page, and
//! the auth token issued by a successful credential submission. Both
//! lookups are ordered fallback chains; callers treat `None` as the
//! provider's response shape having changed.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, SET_COOKIE};

use envoyweb_domain::constants::{AUTH_TOKEN_COOKIE, AUTH_TOKEN_HEADER};

#[allow(clippy::expect_used)]
static INPUT_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<input[^>]+>").expect("valid regex"));
#[allow(clippy::expect_used)]
static NAME_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)name=["']([^"']+)["']"#).expect("valid regex"));
#[allow(clippy::expect_used)]
static TYPE_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)type=["']([^"']+)["']"#).expect("valid regex"));
#[allow(clippy::expect_used)]
static VALUE_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)value=["']([^"']*)["']"#).expect("valid regex"));
#[allow(clippy::expect_used)]
static META_CSRF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<meta name="csrf-token" content="([^"]+)""#).expect("valid regex"));

/// Hidden form fields scraped from the login page.
#[derive(Debug, Default)]
pub(crate) struct LoginPage {
    pub form_defaults: BTreeMap<String, String>,
    pub authenticity_token: Option<String>,
}

/// Parse the login page: hidden form inputs first, `csrf-token` meta
/// tag as the fallback token source.
pub(crate) fn parse_login_page(html: &str) -> LoginPage {
    let mut form_defaults = BTreeMap::new();
    for tag in INPUT_TAG_RE.find_iter(html) {
        let tag = tag.as_str();
        let Some(name) = NAME_ATTR_RE.captures(tag).map(|c| c[1].to_string()) else {
            continue;
        };
        let input_type = TYPE_ATTR_RE
            .captures(tag)
            .map(|c| c[1].to_ascii_lowercase())
            .unwrap_or_default();
        let value = VALUE_ATTR_RE
            .captures(tag)
            .map(|c| unescape_html(&c[1]))
            .unwrap_or_default();
        if input_type == "hidden" || name == "utf8" || name == "authenticity_token" {
            form_defaults.insert(name, value);
        }
    }

    let authenticity_token = form_defaults
        .get("authenticity_token")
        .filter(|token| !token.is_empty())
        .cloned()
        .or_else(|| {
            META_CSRF_RE.captures(html).map(|c| c[1].trim().to_string())
        })
        .filter(|token| !token.is_empty());

    LoginPage { form_defaults, authenticity_token }
}

/// Locate the auth token in a login response, in priority order:
/// the auth cookie from `Set-Cookie`, then the `e-auth-token` response
/// header, then a top-level `token` field in a JSON body.
pub(crate) fn extract_auth_token(headers: &HeaderMap, body: &str) -> Option<String> {
    for value in headers.get_all(SET_COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        let Some(pair) = raw.split(';').next() else { continue };
        if let Some((name, value)) = pair.split_once('=') {
            if name.trim() == AUTH_TOKEN_COOKIE && !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }

    if let Some(value) = headers.get(AUTH_TOKEN_HEADER) {
        if let Ok(token) = value.to_str() {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(|value| value.get("token"))
        .and_then(|token| token.as_str())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Minimal entity unescape for the handful of entities the login form
/// has been observed to use.
fn unescape_html(value: &str) -> String {
    value
        .replace("&#x2713;", "\u{2713}")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

//! Wire-level constants for the Enlighten web API
//!
//! The API is undocumented and browser-oriented; everything here was
//! observed from the web UI's own traffic and may change without
//! notice.

/// Production Enlighten origin; overridable per config for tests.
pub const DEFAULT_BASE_URL: &str = "https://enlighten.enphaseenergy.com";

/// Origin the battery-profile web UI serves from. Sent as
/// `origin`/`referer` on profile calls because the backend checks it.
pub const UI_ORIGIN: &str = "https://battery-profile-ui.enphaseenergy.com";

/// Login form submission endpoint, relative to the base URL.
pub const LOGIN_PATH: &str = "/login/login";

/// Profile resource, relative to the base URL; the battery ID is
/// appended as a path segment.
pub const PROFILE_API_PATH: &str = "/service/batteryConfig/api/v1/profile";

/// Cookie carrying the auth token after a successful login.
pub const AUTH_TOKEN_COOKIE: &str = "enlighten_manager_token_production";

/// Response header that may carry the auth token instead of the cookie.
pub const AUTH_TOKEN_HEADER: &str = "e-auth-token";

/// Cookie names the anti-forgery token has been observed under, in
/// lookup order.
pub const XSRF_COOKIE_NAMES: [&str; 2] = ["XSRF-TOKEN", "BP-XSRF-Token"];

/// Request header the anti-forgery token is echoed back in.
pub const XSRF_HEADER: &str = "x-xsrf-token";

/// Default per-request deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// The login endpoint rejects non-browser user agents.
pub const LOGIN_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// Upper bound on response-body excerpts embedded in error details.
pub const BODY_SNIPPET_MAX_LEN: usize = 256;

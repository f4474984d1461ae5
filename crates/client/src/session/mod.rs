//! Session lifecycle for the Enlighten web API
//!
//! A session is the bundle of anti-forgery token, auth token, and
//! cookies that together represent one authenticated logical
//! connection. [`SessionManager`] owns the only mutable copy and
//! replaces it wholesale; callers read it by value.

mod cookies;
mod login;
mod manager;

pub use cookies::CookieJar;
pub use manager::{Session, SessionManager};

//! # envoyweb Client
//!
//! Authenticated client for the Enlighten battery-profile web API.
//!
//! The API is browser-oriented: access requires a cookie-based
//! session, an anti-forgery token, and an auth token, none of which
//! the provider exposes as a stable interface. This crate owns that
//! session lifecycle — login, expiry detection, bounded
//! reauthentication — and exposes the two profile operations built on
//! top of it.
//!
//! ```no_run
//! use envoyweb_client::EnvoyWebClient;
//! use envoyweb_domain::{BatteryProfile, Credentials, EnvoyWebConfig};
//!
//! # async fn example() -> envoyweb_domain::Result<()> {
//! let config = EnvoyWebConfig::new(Credentials::new("me@example.com", "secret", 42, 7));
//! let client = EnvoyWebClient::new(config)?;
//!
//! let state = client.get_profile().await?;
//! println!("{} at {}%", state.profile, state.battery_backup_percentage);
//!
//! client.set_profile(BatteryProfile::SelfConsumption, 20).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod http;
pub mod session;

// Re-export commonly used items
pub use api::EnvoyWebClient;
pub use http::HttpClient;
pub use session::{Session, SessionManager};

//! Authenticated profile operations

mod client;

pub use client::EnvoyWebClient;

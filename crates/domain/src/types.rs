//! Profile and credential types
//!
//! Wire representations match the battery-profile API: profile modes
//! are the provider's string identifiers, and `ProfileState` uses the
//! camelCase field names of the response envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EnvoyWebError;

/// Battery operating profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryProfile {
    /// Prioritize consuming stored energy over grid import.
    #[serde(rename = "self-consumption")]
    SelfConsumption,
    /// Reserve the full battery for outages.
    #[serde(rename = "backup_only")]
    BackupOnly,
}

impl BatteryProfile {
    /// The provider's string identifier for this profile.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfConsumption => "self-consumption",
            Self::BackupOnly => "backup_only",
        }
    }
}

impl fmt::Display for BatteryProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatteryProfile {
    type Err = EnvoyWebError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self-consumption" => Ok(Self::SelfConsumption),
            "backup_only" => Ok(Self::BackupOnly),
            other => Err(EnvoyWebError::Validation(format!(
                "unknown profile {other:?} (expected \"self-consumption\" or \"backup_only\")"
            ))),
        }
    }
}

/// Battery profile state as reported by the provider.
///
/// A value type returned to callers; the client holds it only for the
/// scope of a single request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileState {
    /// Current operating profile.
    pub profile: BatteryProfile,
    /// Minimum charge level (0-100%) preserved for backup.
    pub battery_backup_percentage: u8,
}

/// Account credentials and battery identifiers.
///
/// Supplied once at construction and never mutated. `Debug` redacts
/// everything identifying; neither the email nor the password may ever
/// reach a log line.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: String,
    battery_id: u64,
    user_id: u64,
}

impl Credentials {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        battery_id: u64,
        user_id: u64,
    ) -> Self {
        Self { email: email.into(), password: password.into(), battery_id, user_id }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn battery_id(&self) -> u64 {
        self.battery_id
    }

    #[must_use]
    pub fn user_id(&self) -> u64 {
        self.user_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &"<redacted>")
            .field("password", &"<redacted>")
            .field("battery_id", &self.battery_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

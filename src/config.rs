//! Runtime configuration for the card core

use crate::core::clock::{FixedClock, SystemClock};
use crate::core::lifecycle::DEFAULT_MAX_NUMBER_ATTEMPTS;
use crate::core::traits::Clock;
use crate::security::generator::DEFAULT_ISSUER_PREFIX;
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;

/// Settings needed to assemble a card core
///
/// Built from command-line arguments by the CLI, or directly by tests.
#[derive(Clone)]
pub struct BankConfig {
    /// Secret the field codec key is derived from
    pub secret: String,

    /// Six-digit issuer prefix of generated card numbers
    pub issuer_prefix: String,

    /// Bound on card number generation attempts
    pub max_number_attempts: usize,

    /// Pin the clock to this date instead of the system clock
    pub as_of: Option<NaiveDate>,
}

impl BankConfig {
    /// Configuration with defaults for everything but the secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer_prefix: DEFAULT_ISSUER_PREFIX.to_string(),
            max_number_attempts: DEFAULT_MAX_NUMBER_ATTEMPTS,
            as_of: None,
        }
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    /// The clock selected by this configuration
    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.as_of {
            Some(date) => Arc::new(FixedClock::on(date)),
            None => Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for BankConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankConfig")
            .field("secret", &"<redacted>")
            .field("issuer_prefix", &self.issuer_prefix)
            .field("max_number_attempts", &self.max_number_attempts)
            .field("as_of", &self.as_of)
            .finish()
    }
}

//! Uid generation configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UidStrategy {
    /// `{Prefix}_{zero-padded counter}`.
    #[default]
    Counter,
    /// `{Prefix}_{uuid v4}`.
    Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UidConfig {
    pub strategy: UidStrategy,
    /// Minimum width of the counter part.
    pub number_of_uid_digits: usize,
}

impl Default for UidConfig {
    fn default() -> Self {
        Self {
            strategy: UidStrategy::Counter,
            number_of_uid_digits: 6,
        }
    }
}

//! Configuration for a mailbox store

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::INBOX_NAME;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Mailboxes created under `#mail` when the store starts, as paths
    /// relative to the namespace (`"INBOX"`, `"INBOX.Sent"`)
    #[serde(default = "default_initial_mailboxes")]
    pub initial_mailboxes: Vec<String>,

    /// Seed UID validity values from the clock instead of starting at 1
    #[serde(default = "default_clock_seeded")]
    pub clock_seeded_uid_validity: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_mailboxes: default_initial_mailboxes(),
            clock_seeded_uid_validity: default_clock_seeded(),
        }
    }
}

impl StoreConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Internal(format!("Invalid store config: {}", e)))
    }
}

fn default_initial_mailboxes() -> Vec<String> {
    vec![INBOX_NAME.to_string()]
}

fn default_clock_seeded() -> bool {
    true
}

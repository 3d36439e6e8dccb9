use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::Path,
    time::Duration,
};

/// Client-side policy knobs. Persisted as JSON so a deployment can pin its
/// own retry and deadline policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Total submission attempts per operation, including the first.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Deadline imposed on every confirmation wait.
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    /// Confirmation fan-out buffer; lagging subscribers drop the oldest.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_retry_count() -> u32 {
    3
}

fn default_confirmation_timeout_ms() -> u64 {
    60_000
}

fn default_event_buffer() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ClientConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

use std::time::Duration;

use anyhow::Context;

use crate::firestore_client::DEFAULT_BASE_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub firestore_project_id: String,
    pub firestore_api_key: String,
    pub firestore_base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub bind_addr: String,
}

const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let firestore_project_id = lookup("FIRESTORE_PROJECT_ID").unwrap_or_default();
        let firestore_api_key = lookup("FIRESTORE_API_KEY").unwrap_or_default();
        let firestore_base_url =
            lookup("FIRESTORE_BASE_URL").unwrap_or(DEFAULT_BASE_URL.into());
        let bind_addr = lookup("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.into());
        let millis = |key: &str, default: u64| -> anyhow::Result<u64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("Invalid {}: {}", key, raw)),
                None => Ok(default),
            }
        };
        let poll_interval_ms = millis("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let request_timeout_ms = millis("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        Ok(Config {
            firestore_project_id,
            firestore_api_key,
            firestore_base_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
            bind_addr,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.firestore_project_id.is_empty() {
            return Err("FIRESTORE_PROJECT_ID is missing".into());
        }
        if self.firestore_base_url.is_empty() {
            return Err("FIRESTORE_BASE_URL is empty".into());
        }
        if self.poll_interval.is_zero() {
            return Err("POLL_INTERVAL_MS must be greater than zero".into());
        }
        if self.request_timeout.is_zero() {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".into());
        }
        Ok(())
    }
}

/// Environment lookup used by configuration and the project/credential resolver
use std::collections::HashMap;
use std::sync::{Mutex, Once};

static DOTENV: Once = Once::new();

/// Read-only key/value environment
pub trait EnvSource: Send + Sync {
    /// Look up a key. Empty or whitespace-only values count as unset.
    fn get(&self, key: &str) -> Option<String>;

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

/// Process environment, with `.env` loaded on first use
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ProcessEnv {
    pub fn new() -> Self {
        DOTENV.call_once(|| {
            dotenv::dotenv().ok();
        });
        Self
    }
}

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.trim().is_empty())
    }
}

/// In-memory environment that records every lookup
#[derive(Debug, Default)]
pub struct MapEnv {
    values: HashMap<String, String>,
    lookups: Mutex<Vec<String>>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    /// Keys looked up so far, in order
    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn was_read(&self, key: &str) -> bool {
        self.lookups().iter().any(|k| k == key)
    }
}

impl EnvSource for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(key.to_string());
        }
        self.values
            .get(key)
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }
}

/// Parse a value, falling back to `default` when unset or unparsable
pub fn parse_or<T: std::str::FromStr>(env: &dyn EnvSource, key: &str, default: T) -> T {
    env.get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

/// Boolean parsing accepting `1/0`, `true/false`, `yes/no`, `on/off`
pub fn flag_or(env: &dyn EnvSource, key: &str, default: bool) -> bool {
    match env.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

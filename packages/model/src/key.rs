use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Highest numeric key handed out or seen so far
static KEY_COUNT: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a node, unique within a document.
///
/// Keys survive every edit that keeps the node alive, which is what makes
/// key-addressed transforms possible while paths shift underneath them.
///
/// Generated keys are decimal counters. Any numeric key built or loaded from
/// outside raises the counter past itself, so a later [`Key::generate`]
/// never repeats a key that already exists in a loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Key(String);

impl Key {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        reserve(&value);
        Self(value)
    }

    /// Generate the next process-unique key
    pub fn generate() -> Self {
        let count = KEY_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
        Self(count.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn reserve(value: &str) {
    if let Ok(count) = value.parse::<u64>() {
        KEY_COUNT.fetch_max(count, Ordering::Relaxed);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

use crate::retry::{is_truthy, parse_bool_env};
use serde_json::json;
use std::env;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Parsed test environment configuration.
#[derive(Debug, Clone)]
pub struct TestEnv {
    pub prefix: TestPrefix,
    /// Delete everything the suite created, even on success paths that
    /// already consume the secret.
    pub cleanup: bool,
}

impl TestEnv {
    pub fn from_env(store: &str) -> Self {
        let prefix = TestPrefix::from_env(store);
        let cleanup = if parse_bool_env("SNAPSECRET_TEST_KEEP") {
            false
        } else {
            env::var("SNAPSECRET_TEST_CLEANUP")
                .map(|value| value.trim().is_empty() || is_truthy(&value))
                .unwrap_or(true)
        };

        Self { prefix, cleanup }
    }
}

/// Generates caller-chosen ids that cannot collide across runs.
///
/// Ids only use ASCII alphanumerics and `-` so every backend accepts them.
#[derive(Debug, Clone)]
pub struct TestPrefix {
    store: String,
    base: String,
    counter: Arc<AtomicU64>,
}

impl TestPrefix {
    pub fn from_env(store: &str) -> Self {
        if let Ok(explicit) = env::var("SNAPSECRET_TEST_PREFIX") {
            return Self::new(store, sanitize(&explicit));
        }

        let run_id = env::var("GITHUB_RUN_ID").ok();
        let run_attempt = env::var("GITHUB_RUN_ATTEMPT").ok();
        if let (Some(id), Some(attempt)) = (run_id, run_attempt) {
            return Self::new(store, sanitize(&format!("ci-{store}-{id}-{attempt}")));
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let mut base = String::from("local-");
        let _ = write!(&mut base, "{store}-{now}-{}", std::process::id());
        Self::new(store, sanitize(&base))
    }

    fn new(store: &str, base: String) -> Self {
        Self {
            store: store.to_string(),
            base,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Derive a unique secret id for a test case.
    pub fn id(&self, suffix: &str) -> String {
        let next = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}-{next}", self.base, sanitize(suffix))
    }

    /// Minimal JSON metadata used in debugging output.
    pub fn to_metadata(&self) -> serde_json::Value {
        json!({
            "store": self.store,
            "prefix": self.base,
        })
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect()
}

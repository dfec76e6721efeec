use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Process-wide locks keyed by an opaque string, serializing the
/// read-compose-push sequence of a rule group or tenant so concurrent
/// writers cannot interleave stale remote state.
///
/// Entries are retained for the life of the process. The key space is
/// bounded by the configured groups and tenants, so there is no sweep.
#[derive(Default)]
pub struct KeyLocks {
    entries: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    pub async fn lock(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let entry = self
            .entries
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .clone();

        entry.lock_owned().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_contends_and_other_keys_do_not() {
        let locks = KeyLocks::default();

        let held = locks.lock("rules/gojek/ns/group").await;

        // A second acquisition of the held key blocks.
        let contended = tokio::time::timeout(
            Duration::from_millis(10),
            locks.lock("rules/gojek/ns/group"),
        )
        .await;
        assert!(contended.is_err());

        // An unrelated key is immediately available.
        let _other = tokio::time::timeout(
            Duration::from_millis(10),
            locks.lock("routing/gojek"),
        )
        .await
        .expect("unrelated key must not contend");

        drop(held);
        let _reacquired = tokio::time::timeout(
            Duration::from_millis(10),
            locks.lock("rules/gojek/ns/group"),
        )
        .await
        .expect("released key must be available");
    }
}

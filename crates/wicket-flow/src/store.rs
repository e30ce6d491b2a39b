//! TTL-indexed in-memory store for flow state.
//!
//! Correctness never depends on the sweeper: expired entries are
//! invisible to reads even before they are reclaimed. The sweeper only
//! bounds memory.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::records::{DeviceStatus, FlowRecord, StateRecord};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A keyed map with per-entry absolute expiry.
///
/// All operations take the lock for their full duration, so `take` is
/// an atomic consume: under concurrent callers exactly one observes
/// the value.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts or replaces the entry, resetting its expiry.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Returns a copy of the live value for `key`. An entry past its
    /// expiry is not observable even if the sweeper has not run yet.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone())
    }

    /// Removes the entry and returns its value if it was still live.
    /// At most one of any number of concurrent callers gets the value.
    #[must_use]
    pub fn take(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        entries
            .remove(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value)
    }

    /// Removes the entry. Idempotent.
    pub fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Drops expired entries, returning how many were reclaimed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Number of entries currently held, including expired ones the
    /// sweeper has not reclaimed yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared store binding the three record kinds of a device flow.
///
/// Each record kind lives in its own typed cache; keys are the opaque
/// tokens themselves, so no cross-kind collision is possible and no
/// secondary index is needed: every cross-record reference is carried
/// inside the records.
#[derive(Default)]
pub struct FlowStore {
    flows: TtlCache<FlowRecord>,
    devices: TtlCache<DeviceStatus>,
    states: TtlCache<StateRecord>,
}

impl FlowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a flow record under its normalized user code.
    pub fn put_flow(&self, user_code: &str, record: FlowRecord, ttl: Duration) {
        self.flows.set(user_code, record, ttl);
    }

    /// Looks up the flow for a normalized user code.
    #[must_use]
    pub fn get_flow(&self, user_code: &str) -> Option<FlowRecord> {
        self.flows.get(user_code)
    }

    /// Deletes the flow record. This is the commit point of the
    /// authentication leg: the user code cannot be redeemed again.
    pub fn delete_flow(&self, user_code: &str) {
        self.flows.delete(user_code);
    }

    /// Stores the polling status for a device code.
    pub fn put_device(&self, device_code: &str, status: DeviceStatus, ttl: Duration) {
        self.devices.set(device_code, status, ttl);
    }

    /// Looks up the polling status for a device code.
    #[must_use]
    pub fn get_device(&self, device_code: &str) -> Option<DeviceStatus> {
        self.devices.get(device_code)
    }

    /// Consumes the device status, returning it to exactly one caller.
    #[must_use]
    pub fn take_device(&self, device_code: &str) -> Option<DeviceStatus> {
        self.devices.take(device_code)
    }

    /// Deletes the device status. Idempotent.
    pub fn delete_device(&self, device_code: &str) {
        self.devices.delete(device_code);
    }

    /// Stores the CSRF state issued for an upstream redirect.
    pub fn put_state(&self, state: &str, record: StateRecord, ttl: Duration) {
        self.states.set(state, record, ttl);
    }

    /// Looks up a CSRF state record.
    #[must_use]
    pub fn get_state(&self, state: &str) -> Option<StateRecord> {
        self.states.get(state)
    }

    /// Deletes a CSRF state record. States are single use.
    pub fn delete_state(&self, state: &str) {
        self.states.delete(state);
    }

    /// Reclaims expired entries across all record kinds, returning how
    /// many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.flows.purge_expired() + self.devices.purge_expired() + self.states.purge_expired()
    }

    /// Total entries held, including not-yet-reclaimed expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flows.len() + self.devices.len() + self.states.len()
    }

    /// Whether the store holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn flow(device_code: &str) -> FlowRecord {
        FlowRecord {
            client_id: "cli1".to_string(),
            scope: None,
            device_code: device_code.to_string(),
            pkce_verifier: "verifier".to_string(),
            client_secret: None,
        }
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = TtlCache::new();
        cache.set("key", 42u32, TTL);
        assert_eq!(cache.get("key"), Some(42));
        assert_eq!(cache.get("other"), None);
    }

    #[test]
    fn test_set_replaces_and_resets_expiry() {
        let cache = TtlCache::new();
        cache.set("key", 1u32, Duration::from_millis(5));
        cache.set("key", 2u32, TTL);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("key"), Some(2));
    }

    #[test]
    fn test_expired_entry_not_observable() {
        let cache = TtlCache::new();
        cache.set("key", 1u32, Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(10));

        // Not yet purged, but invisible to reads and takes.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("key"), None);
        assert_eq!(cache.take("key"), None);
    }

    #[test]
    fn test_take_consumes_once() {
        let cache = TtlCache::new();
        cache.set("key", 7u32, TTL);
        assert_eq!(cache.take("key"), Some(7));
        assert_eq!(cache.take("key"), None);
        assert_eq!(cache.get("key"), None);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let cache = TtlCache::new();
        cache.set("key", 7u32, TTL);
        cache.delete("key");
        cache.delete("key");
        assert_eq!(cache.get("key"), None);
    }

    #[test]
    fn test_purge_reclaims_only_expired() {
        let cache = TtlCache::new();
        cache.set("old", 1u32, Duration::from_millis(5));
        cache.set("new", 2u32, TTL);
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[test]
    fn test_concurrent_take_single_winner() {
        use std::sync::Arc;

        let cache = Arc::new(TtlCache::new());
        cache.set("key", 1u32, TTL);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.take("key").is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_flow_store_typed_accessors() {
        let store = FlowStore::new();
        store.put_flow("AB12CD34", flow("device1"), TTL);
        store.put_device("device1", DeviceStatus::pending("cli1"), TTL);
        store.put_state("state1", StateRecord::new("AB12CD34"), TTL);

        assert_eq!(store.get_flow("AB12CD34").unwrap().device_code, "device1");
        assert!(matches!(
            store.get_device("device1"),
            Some(DeviceStatus::Pending { .. })
        ));
        assert_eq!(store.get_state("state1").unwrap().user_code, "AB12CD34");
        assert_eq!(store.len(), 3);

        store.delete_flow("AB12CD34");
        store.delete_state("state1");
        assert!(store.get_flow("AB12CD34").is_none());
        assert!(store.get_state("state1").is_none());
    }

    #[test]
    fn test_flow_store_keys_do_not_leak_across_kinds() {
        let store = FlowStore::new();
        store.put_flow("SAMEKEY", flow("device1"), TTL);

        // The same key in a different record kind resolves nothing.
        assert!(store.get_device("SAMEKEY").is_none());
        assert!(store.get_state("SAMEKEY").is_none());
    }

    #[test]
    fn test_flow_store_purge_counts_all_kinds() {
        let store = FlowStore::new();
        store.put_flow("a", flow("d"), Duration::from_millis(5));
        store.put_device("b", DeviceStatus::pending("cli1"), Duration::from_millis(5));
        store.put_state("c", StateRecord::new("a"), TTL);
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.len(), 1);
    }
}

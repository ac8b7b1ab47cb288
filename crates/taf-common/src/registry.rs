//! Optional hash-to-string registry for diagnostics.
//!
//! The registry maps FNV-1a hashes back to the strings that produced them,
//! so logs and error messages can show `main_amplifier` instead of a hex
//! value. It is process-wide and purely diagnostic: saving and loading
//! assets never depends on it.

use std::sync::LazyLock;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::hash::fnv1a_hash;

static REGISTRY: LazyLock<Mutex<FxHashMap<u64, String>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Register a string and return its hash.
///
/// If a different string is already registered under the same hash, the
/// collision is logged and the existing entry is kept.
pub fn register(s: &str) -> u64 {
    let hash = fnv1a_hash(s.as_bytes());
    let mut map = REGISTRY.lock();
    match map.get(&hash) {
        Some(existing) if existing != s => {
            log::warn!("hash collision: 0x{hash:016X} maps to both {existing:?} and {s:?}");
        }
        Some(_) => {}
        None => {
            map.insert(hash, s.to_string());
        }
    }
    hash
}

/// Look up the registered string for a hash.
pub fn lookup(hash: u64) -> Option<String> {
    REGISTRY.lock().get(&hash).cloned()
}

/// Look up a hash, falling back to a synthetic placeholder.
pub fn lookup_or_hex(hash: u64) -> String {
    lookup(hash).unwrap_or_else(|| format!("UNKNOWN_HASH_0x{hash:016X}"))
}

/// Check whether a string would collide with an existing entry.
pub fn has_collision(s: &str) -> bool {
    let hash = fnv1a_hash(s.as_bytes());
    REGISTRY
        .lock()
        .get(&hash)
        .is_some_and(|existing| existing != s)
}

/// Snapshot all registered entries, sorted by hash.
pub fn debug_dump() -> Vec<(u64, String)> {
    let mut entries: Vec<(u64, String)> = REGISTRY
        .lock()
        .iter()
        .map(|(&h, s)| (h, s.clone()))
        .collect();
    entries.sort_by_key(|(h, _)| *h);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup() {
        let hash = register("oscillator_test_name");
        assert_eq!(lookup(hash).as_deref(), Some("oscillator_test_name"));
    }

    #[test]
    fn unknown_hash_gets_placeholder() {
        assert_eq!(
            lookup_or_hex(0x1234),
            "UNKNOWN_HASH_0x0000000000001234"
        );
    }

    #[test]
    fn re_registering_same_string_is_not_a_collision() {
        register("stable_name");
        register("stable_name");
        assert!(!has_collision("stable_name"));
    }
}

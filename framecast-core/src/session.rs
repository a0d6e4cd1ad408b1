//! Per-client playback sessions.
//!
//! Each polling client identifies itself with an opaque string and gets
//! its own video playback cursor, created lazily on first contact.
//! Sessions are never destroyed — clients may silently disappear, and the
//! map grows with the number of *distinct* identifiers seen, not with
//! request volume.

use dashmap::DashMap;

/// Concurrent client-id → playback-cursor map.
///
/// Operations on the same identifier are serialized by the underlying
/// shard lock; disjoint identifiers never contend with each other.
#[derive(Debug)]
pub struct SessionStore {
    cursors: DashMap<String, u64>,
    start_frame: u64,
}

impl SessionStore {
    /// New store; unseen clients are seeded with `start_frame`.
    pub fn new(start_frame: u64) -> Self {
        Self {
            cursors: DashMap::new(),
            start_frame,
        }
    }

    /// Look up the cursor for `id`, registering the session if this is
    /// the first contact. The flag is `true` exactly when the session
    /// was created by this call, so the caller can log the event once.
    pub fn get_or_create(&self, id: &str) -> (u64, bool) {
        let mut created = false;
        let cursor = *self
            .cursors
            .entry(id.to_string())
            .or_insert_with(|| {
                created = true;
                self.start_frame
            })
            .value();
        (cursor, created)
    }

    /// Advance the cursor for `id` by `delta`, returning the new value.
    /// Registers the session first if it does not exist yet.
    pub fn advance(&self, id: &str, delta: u64) -> u64 {
        let mut entry = self
            .cursors
            .entry(id.to_string())
            .or_insert(self.start_frame);
        *entry = entry.saturating_add(delta);
        *entry
    }

    /// Rewind the cursor for `id` to frame 0 (video wraparound).
    pub fn reset(&self, id: &str) {
        self.cursors.insert(id.to_string(), 0);
    }

    /// Current cursor for `id`, if the session exists.
    pub fn cursor(&self, id: &str) -> Option<u64> {
        self.cursors.get(id).map(|entry| *entry.value())
    }

    /// Number of distinct sessions seen so far.
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Whether any session has been registered.
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

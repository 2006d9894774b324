//! In-memory presence map and its transitions
//!
//! Only the feed task mutates this (through the watch channel in
//! `presence::PresenceFeed`); everything else reads it.

use std::collections::HashMap;

use crate::models::{AdminUser, PresenceRecord};

/// Read access to live presence, keyed by customer.
pub trait PresenceLookup {
    /// Live record for `user`, or `None` meaning "use whatever you already know".
    fn lookup(&self, user: &AdminUser) -> Option<&PresenceRecord>;
}

/// Connectivity plus the latest known record per `user_key`.
#[derive(Debug, Clone, Default)]
pub struct PresenceState {
    connected: bool,
    /// A snapshot arrived on the current connection.
    snapshot_seen: bool,
    /// The connection task finished; nothing more arrives until a new token.
    ended: bool,
    records: HashMap<String, PresenceRecord>,
    /// Bumped on every mutation so views can memoize on it.
    revision: u64,
    /// Identifies the connection allowed to write; stale tasks are ignored.
    generation: u64,
}

impl PresenceState {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot_seen
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, user_key: &str) -> Option<&PresenceRecord> {
        self.records.get(user_key)
    }

    pub fn records(&self) -> impl Iterator<Item = &PresenceRecord> {
        self.records.values()
    }

    /// Number of records currently marked online.
    pub fn online_users_count(&self) -> usize {
        self.records.values().filter(|r| r.is_online).count()
    }

    pub fn on_connected(&mut self) {
        self.connected = true;
        self.revision += 1;
    }

    /// Connection lost; known records stay visible until the next snapshot.
    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.ended = true;
        self.revision += 1;
    }

    /// Replace the whole map. Records without a `user_key` are dropped.
    pub fn apply_snapshot(&mut self, users: Vec<PresenceRecord>) {
        self.records = users
            .into_iter()
            .filter_map(|record| {
                let key = record.user_key.clone().filter(|k| !k.is_empty())?;
                Some((key, record))
            })
            .collect();
        self.snapshot_seen = true;
        self.revision += 1;
    }

    /// Upsert one record; returns false if it had no `user_key`.
    pub fn apply_update(&mut self, record: PresenceRecord) -> bool {
        let Some(key) = record.user_key.clone().filter(|k| !k.is_empty()) else {
            return false;
        };
        self.records.insert(key, record);
        self.revision += 1;
        true
    }

    /// Teardown: forget everything and hand writes to a new generation.
    pub(crate) fn reset(&mut self) -> u64 {
        self.connected = false;
        self.snapshot_seen = false;
        self.ended = false;
        self.records.clear();
        self.revision += 1;
        self.generation += 1;
        self.generation
    }
}

impl PresenceLookup for PresenceState {
    fn lookup(&self, user: &AdminUser) -> Option<&PresenceRecord> {
        self.records.get(&user.presence_key()?)
    }
}

#[cfg(test)]
pub(crate) fn record(key: &str, online: bool, last_seen: Option<&str>) -> PresenceRecord {
    PresenceRecord {
        user_key: Some(key.to_string()),
        user_id: key.strip_prefix("id:").and_then(|id| id.parse().ok()),
        email: key.strip_prefix("email:").map(String::from),
        is_online: online,
        last_seen_at: last_seen.map(String::from),
    }
}

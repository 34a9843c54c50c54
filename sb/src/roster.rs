//! Derived roster of known contacts merged with live presence
//!
//! The roster is never persisted: it is recomputed wholesale from the
//! current contact list and the live presence set on every contact-list
//! update, so it can never retain entries from a previous recomputation.

use std::collections::{HashMap, HashSet};

use contactstore::Contact;
use serde_json::Value;
use tracing::debug;

use crate::session::Presence;

/// One broadcastable roster entry
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    /// Canonical identifier value for this contact
    pub identifier: String,

    /// Display name; mirrors the identifier until a SPA supplies a real one
    pub username: String,

    /// Live presence, defaulted to disconnected
    pub presence: Presence,
}

/// In-memory roster, one entry per identifier, input order preserved
#[derive(Debug, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    index: HashMap<String, usize>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild the roster from a contact list and the live presence set
    ///
    /// Each input contact becomes one entry; a duplicate identifier folds
    /// into the existing entry (last-applied wins) rather than producing a
    /// second one. Entry order follows first appearance in the input.
    pub fn rebuild(&mut self, contacts: &[Contact], live: &HashSet<String>) {
        self.entries.clear();
        self.index.clear();

        for contact in contacts {
            let presence = if live.contains(&contact.identifier) {
                Presence::Connected
            } else {
                Presence::Disconnected
            };

            match self.index.get(&contact.identifier) {
                Some(&position) => {
                    self.entries[position].presence = presence;
                }
                None => {
                    self.index.insert(contact.identifier.clone(), self.entries.len());
                    self.entries.push(RosterEntry {
                        identifier: contact.identifier.clone(),
                        username: contact.identifier.clone(),
                        presence,
                    });
                }
            }
        }

        debug!(entries = self.entries.len(), "Roster rebuilt");
    }

    /// Update a single entry's presence; returns whether the entry existed
    pub fn set_presence(&mut self, identifier: &str, presence: Presence) -> bool {
        match self.index.get(identifier) {
            Some(&position) => {
                self.entries[position].presence = presence;
                true
            }
            None => false,
        }
    }

    /// Clear the roster back to empty
    pub fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Render the full broadcast snapshot, keyed under the active adapter's
    /// username field
    pub fn to_payload(&self, username_field_key: &str) -> Vec<Value> {
        self.entries
            .iter()
            .map(|entry| {
                let mut object = serde_json::Map::new();
                object.insert(username_field_key.to_string(), Value::String(entry.identifier.clone()));
                object.insert("username".to_string(), Value::String(entry.username.clone()));
                object.insert(
                    "presence".to_string(),
                    Value::String(entry.presence.as_str().to_string()),
                );
                Value::Object(object)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contacts(identifiers: &[&str]) -> Vec<Contact> {
        identifiers.iter().map(|id| Contact::new(*id)).collect()
    }

    #[test]
    fn test_rebuild_preserves_input_order() {
        let mut roster = Roster::new();
        roster.rebuild(&contacts(&["foo", "bar"]), &HashSet::new());

        let payload = roster.to_payload("email");
        assert_eq!(
            payload,
            vec![
                json!({"email": "foo", "username": "foo", "presence": "disconnected"}),
                json!({"email": "bar", "username": "bar", "presence": "disconnected"}),
            ]
        );
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut roster = Roster::new();
        let list = contacts(&["foo", "bar", "baz"]);
        let live = HashSet::from(["bar".to_string()]);

        roster.rebuild(&list, &live);
        let first = roster.to_payload("email");
        roster.rebuild(&list, &live);
        let second = roster.to_payload("email");

        assert_eq!(first, second);
    }

    #[test]
    fn test_default_presence_is_disconnected() {
        let mut roster = Roster::new();
        roster.rebuild(&contacts(&["foo", "bar"]), &HashSet::new());

        for entry in roster.to_payload("email") {
            assert_eq!(entry["presence"], "disconnected");
        }
    }

    #[test]
    fn test_live_presence_overlay() {
        let mut roster = Roster::new();
        let live = HashSet::from(["bar".to_string()]);
        roster.rebuild(&contacts(&["foo", "bar"]), &live);

        let payload = roster.to_payload("email");
        assert_eq!(payload[0]["presence"], "disconnected");
        assert_eq!(payload[1]["presence"], "connected");
    }

    #[test]
    fn test_duplicate_identifiers_fold_into_one_entry() {
        let mut roster = Roster::new();
        let list = vec![
            Contact::new("foo"),
            Contact::new("bar"),
            Contact::from_source("foo", "google"),
        ];
        roster.rebuild(&list, &HashSet::new());

        assert_eq!(roster.len(), 2);
        let payload = roster.to_payload("email");
        assert_eq!(payload[0]["email"], "foo");
        assert_eq!(payload[1]["email"], "bar");
    }

    #[test]
    fn test_rebuild_drops_absent_entries() {
        let mut roster = Roster::new();
        roster.rebuild(&contacts(&["foo", "bar"]), &HashSet::new());
        roster.rebuild(&contacts(&["baz"]), &HashSet::new());

        assert_eq!(roster.len(), 1);
        assert_eq!(roster.to_payload("email")[0]["email"], "baz");
    }

    #[test]
    fn test_set_presence() {
        let mut roster = Roster::new();
        roster.rebuild(&contacts(&["foo"]), &HashSet::new());

        assert!(roster.set_presence("foo", Presence::Connected));
        assert_eq!(roster.to_payload("email")[0]["presence"], "connected");

        assert!(!roster.set_presence("missing", Presence::Connected));
    }

    #[test]
    fn test_reset() {
        let mut roster = Roster::new();
        roster.rebuild(&contacts(&["foo"]), &HashSet::new());
        roster.reset();

        assert!(roster.is_empty());
        assert!(roster.to_payload("email").is_empty());
    }
}

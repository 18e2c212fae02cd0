//! Contact name lookup.
//!
//! The address book itself lives outside this tool. Anything that can map a
//! handle (phone number, email or chat identifier) to a person's name
//! implements [`ContactResolver`]; a miss means "show the raw handle".

use std::collections::BTreeMap;

/// Maps a handle or chat identifier to a human name.
pub trait ContactResolver {
    /// Name for `handle`, or `None` when unknown.
    fn resolve(&self, handle: &str) -> Option<String>;
}

/// Resolver that never knows anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContacts;

impl ContactResolver for NoContacts {
    fn resolve(&self, _handle: &str) -> Option<String> {
        None
    }
}

/// Resolver backed by a fixed handle → name table (the `[contacts]` config section).
#[derive(Debug, Clone, Default)]
pub struct ContactBook {
    entries: BTreeMap<String, String>,
}

impl ContactBook {
    #[must_use]
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|(_, name)| !name.trim().is_empty())
            .map(|(handle, name)| (normalize(&handle), name))
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContactResolver for ContactBook {
    fn resolve(&self, handle: &str) -> Option<String> {
        self.entries.get(&normalize(handle)).cloned()
    }
}

/// Phone numbers compare on digits and a leading `+`; emails case-insensitively.
fn normalize(handle: &str) -> String {
    let handle = handle.trim();
    if handle.contains('@') {
        return handle.to_lowercase();
    }

    let digits: String = handle
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if digits.chars().filter(char::is_ascii_digit).count() >= 3 {
        digits
    } else {
        handle.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> ContactBook {
        let mut entries = BTreeMap::new();
        entries.insert("+1 (555) 123-4567".to_string(), "Alice".to_string());
        entries.insert("Bob@Example.com".to_string(), "Bob".to_string());
        entries.insert("+15550000000".to_string(), "  ".to_string());
        ContactBook::new(entries)
    }

    #[test]
    fn test_no_contacts() {
        assert_eq!(NoContacts.resolve("+15551234567"), None);
    }

    #[test]
    fn test_phone_lookup_ignores_formatting() {
        assert_eq!(book().resolve("+15551234567"), Some("Alice".to_string()));
    }

    #[test]
    fn test_email_lookup_is_case_insensitive() {
        assert_eq!(book().resolve("bob@example.com"), Some("Bob".to_string()));
    }

    #[test]
    fn test_blank_names_are_dropped() {
        let book = book();
        assert_eq!(book.len(), 2);
        assert_eq!(book.resolve("+15550000000"), None);
    }
}

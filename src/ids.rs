//! Identifier generation for column and image ids.
//!
//! A generator is handed to each renderer at construction, so ids are unique
//! per renderer without any process-wide registry.

use uuid::Uuid;

pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// Random v4 UUIDs with a configurable group separator, e.g.
/// `42b5e564_1df2_42ac_930f_e29d96451234`. Underscores keep the ids valid
/// in CSS selectors.
#[derive(Debug, Clone)]
pub struct UuidIds {
    separator: char,
}

impl Default for UuidIds {
    fn default() -> Self {
        Self { separator: '_' }
    }
}

impl UuidIds {
    pub fn with_separator(separator: char) -> Self {
        Self { separator }
    }
}

impl IdGenerator for UuidIds {
    fn next_id(&mut self) -> String {
        let id = Uuid::new_v4().hyphenated().to_string();
        if self.separator == '-' {
            id
        } else {
            id.replace('-', &self.separator.to_string())
        }
    }
}

/// Predictable ids: `<prefix>0`, `<prefix>1`, ...
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: 0,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_use_separator() {
        let id = UuidIds::default().next_id();
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('_').count(), 4);
        assert!(!id.contains('-'));
    }

    #[test]
    fn uuid_ids_differ() {
        let mut ids = UuidIds::with_separator('-');
        assert_ne!(ids.next_id(), ids.next_id());
    }

    #[test]
    fn sequential_ids_count_up() {
        let mut ids = SequentialIds::new("flow");
        assert_eq!(ids.next_id(), "flow0");
        assert_eq!(ids.next_id(), "flow1");
    }
}

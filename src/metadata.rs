//! Annotation registry decoupling "declare" time from "register" time.
//!
//! Controllers and channels describe themselves through annotations attached
//! to an opaque subject handle; the router consumes the annotations later,
//! when the subject is registered. Subjects are arena-allocated integer ids,
//! stable for the process lifetime, so identity never depends on pointer
//! comparisons.

use std::any::Any;
use std::collections::HashMap;

/// Stable handle for an annotated handler or controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubjectId(u32);

/// Well-known annotation keys used by the registration machinery.
pub mod keys {
    pub const ROUTE: &str = "route";
    pub const ACTION: &str = "action";
    pub const PREFIX: &str = "prefix";
    pub const CORS: &str = "cors";
    pub const MIDDLEWARE: &str = "middleware";
    pub const HTTP_ERROR_HANDLER: &str = "http_error_handler";
    pub const CHANNEL_NAME: &str = "channel_name";
}

/// Arena-indexed key/value annotation store.
///
/// Values are type-erased on write and downcast on read; a `get` with the
/// wrong type behaves like an absent entry.
#[derive(Default)]
pub struct MetadataStore {
    labels: Vec<String>,
    entries: Vec<HashMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl MetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new subject. The label is diagnostic only.
    pub fn subject(&mut self, label: impl Into<String>) -> SubjectId {
        let id = SubjectId(self.labels.len() as u32);
        self.labels.push(label.into());
        self.entries.push(HashMap::new());
        id
    }

    /// Attach an annotation to a subject, replacing any previous value
    /// under the same key.
    pub fn define<T: Any + Send + Sync>(&mut self, key: &'static str, value: T, subject: SubjectId) {
        self.entries[subject.0 as usize].insert(key, Box::new(value));
    }

    /// Read an annotation back. Absent key or mismatched type yields `None`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &'static str, subject: SubjectId) -> Option<&T> {
        self.entries
            .get(subject.0 as usize)
            .and_then(|map| map.get(key))
            .and_then(|value| value.downcast_ref::<T>())
    }

    #[must_use]
    pub fn label(&self, subject: SubjectId) -> &str {
        &self.labels[subject.0 as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_get_round_trips() {
        let mut store = MetadataStore::new();
        let subject = store.subject("UserController::show");
        store.define(keys::PREFIX, "/users".to_string(), subject);
        assert_eq!(
            store.get::<String>(keys::PREFIX, subject).map(String::as_str),
            Some("/users")
        );
    }

    #[test]
    fn absent_key_is_none() {
        let mut store = MetadataStore::new();
        let subject = store.subject("x");
        assert!(store.get::<String>(keys::PREFIX, subject).is_none());
    }

    #[test]
    fn mismatched_type_is_none() {
        let mut store = MetadataStore::new();
        let subject = store.subject("x");
        store.define(keys::CORS, true, subject);
        assert!(store.get::<String>(keys::CORS, subject).is_none());
        assert_eq!(store.get::<bool>(keys::CORS, subject), Some(&true));
    }

    #[test]
    fn redefining_replaces_the_value() {
        let mut store = MetadataStore::new();
        let subject = store.subject("x");
        store.define(keys::PREFIX, "/a".to_string(), subject);
        store.define(keys::PREFIX, "/b".to_string(), subject);
        assert_eq!(
            store.get::<String>(keys::PREFIX, subject).map(String::as_str),
            Some("/b")
        );
    }

    #[test]
    fn subjects_are_independent() {
        let mut store = MetadataStore::new();
        let a = store.subject("a");
        let b = store.subject("b");
        store.define(keys::CORS, true, a);
        assert!(store.get::<bool>(keys::CORS, b).is_none());
        assert_eq!(store.label(b), "b");
    }
}

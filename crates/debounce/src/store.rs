//! Subject state store with one lock per subject

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::state::SubjectState;

/// Key used for frames that carry no subject identifier
pub const UNKNOWN_SUBJECT: &str = "unknown";

/// Normalize an optional subject identifier to a store key
pub fn subject_key(id: Option<&str>) -> String {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => UNKNOWN_SUBJECT.to_string(),
    }
}

/// Owns all per-subject state.
///
/// The outer map lock is only held to look up or insert a subject's slot;
/// state transitions run under that subject's own lock.
#[derive(Debug, Default)]
pub struct SubjectStore {
    subjects: Mutex<HashMap<String, Arc<Mutex<SubjectState>>>>,
}

impl SubjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<Mutex<SubjectState>> {
        let mut subjects = self.subjects.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = subjects.get(key) {
            return Arc::clone(slot);
        }

        debug!("Tracking new subject {}", key);
        let slot = Arc::new(Mutex::new(SubjectState::default()));
        subjects.insert(key.to_string(), Arc::clone(&slot));
        slot
    }

    /// Run `f` atomically against the subject's state, creating it if needed
    pub fn with_subject<R>(&self, key: &str, f: impl FnOnce(&mut SubjectState) -> R) -> R {
        let slot = self.slot(key);
        let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Copy of a subject's state, if it has been seen
    pub fn snapshot(&self, key: &str) -> Option<SubjectState> {
        let slot = {
            let subjects = self.subjects.lock().unwrap_or_else(PoisonError::into_inner);
            subjects.get(key).cloned()
        }?;
        let state = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Some(state.clone())
    }

    /// Number of subjects seen so far
    pub fn subject_count(&self) -> usize {
        self.subjects
            .lock()
            .map(|s| s.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_key() {
        assert_eq!(subject_key(Some("s-42")), "s-42");
        assert_eq!(subject_key(Some("  ")), UNKNOWN_SUBJECT);
        assert_eq!(subject_key(None), UNKNOWN_SUBJECT);
    }

    #[test]
    fn test_lazy_creation() {
        let store = SubjectStore::new();
        assert!(store.snapshot("a").is_none());

        store.with_subject("a", |s| s.sample_counter += 1);
        store.with_subject("a", |s| s.sample_counter += 1);
        store.with_subject("b", |_| ());

        assert_eq!(store.snapshot("a").unwrap().sample_counter, 2);
        assert_eq!(store.subject_count(), 2);
    }

    #[test]
    fn test_concurrent_updates_are_atomic() {
        let store = Arc::new(SubjectStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        store.with_subject("shared", |s| {
                            let seen = s.sample_counter;
                            s.sample_counter = seen + 1;
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.snapshot("shared").unwrap().sample_counter, 8000);
    }
}

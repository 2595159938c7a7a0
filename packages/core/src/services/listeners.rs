//! Listener Plumbing
//!
//! Caller tokens and the shared invocation helper used by every fan-out.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use uuid::Uuid;

/// Identity of a listening caller
///
/// A caller registers at most one callback per registry slot (per node id for binds,
/// once globally for add/remove listeners); registering again with the same token
/// replaces the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(Uuid);

impl ListenerToken {
    pub fn new() -> Self {
        ListenerToken(Uuid::new_v4())
    }
}

impl Default for ListenerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Insert or replace the entry for `token`, keeping registration order
pub(crate) fn upsert<T>(entries: &mut Vec<(ListenerToken, T)>, token: ListenerToken, value: T) {
    match entries.iter_mut().find(|(t, _)| *t == token) {
        Some(slot) => slot.1 = value,
        None => entries.push((token, value)),
    }
}

/// Remove the entry for `token`. Returns `true` if one was present.
pub(crate) fn remove<T>(entries: &mut Vec<(ListenerToken, T)>, token: ListenerToken) -> bool {
    let before = entries.len();
    entries.retain(|(t, _)| *t != token);
    entries.len() != before
}

/// Run one listener callback
///
/// With `isolate` set a panic is caught and logged so the caller can carry on with the
/// next listener; otherwise it unwinds through the fan-out.
pub(crate) fn invoke(isolate: bool, what: &str, token: ListenerToken, call: impl FnOnce()) {
    if !isolate {
        call();
        return;
    }
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        tracing::warn!("{} listener {} panicked; continuing fan-out", what, token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_in_place() {
        let a = ListenerToken::new();
        let b = ListenerToken::new();
        let mut entries = Vec::new();
        upsert(&mut entries, a, 1);
        upsert(&mut entries, b, 2);
        upsert(&mut entries, a, 3);

        assert_eq!(entries, vec![(a, 3), (b, 2)]);
        assert!(remove(&mut entries, a));
        assert!(!remove(&mut entries, a));
    }

    #[test]
    fn test_isolated_panic_is_swallowed() {
        let mut ran_after = false;
        invoke(true, "test", ListenerToken::new(), || panic!("boom"));
        invoke(true, "test", ListenerToken::new(), || ran_after = true);
        assert!(ran_after);
    }
}

//! Opaque identities: one per dispatch/reset ([`RequestId`]) and one per accessor ([`AccessorKey`]).

use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);
static ACCESSOR_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identity written alongside state by the engine.
///
/// A write from a dispatch is honored only while the accessor still carries the
/// identity minted for that dispatch. Never serialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Mints a process-unique identity.
    pub fn mint() -> Self {
        RequestId(REQUEST_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

/// Opaque handle identifying one accessor (pending registry key).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AccessorKey(u64);

impl AccessorKey {
    /// Mints a process-unique key.
    pub fn mint() -> Self {
        AccessorKey(ACCESSOR_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_identities_are_distinct() {
        let a = RequestId::mint();
        let b = RequestId::mint();
        assert_ne!(a, b);
        assert_ne!(AccessorKey::mint(), AccessorKey::mint());
    }
}

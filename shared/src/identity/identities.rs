use std::sync::atomic::{AtomicI64, Ordering};

use crate::identity::rd_id::RdId;

/// Which end of a connection an [`Identities`] generator belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Client,
    Server,
}

/// Generates ids for one side of a connection.
///
/// Dynamic ids come from a counter stepping by two: client ids are even, server ids are odd, so
/// both sides can create entities concurrently without negotiating. Path ids produced by
/// [`Identities::mix`] carry the high bit, which keeps them apart from the counter range.
#[derive(Debug)]
pub struct Identities {
    kind: IdKind,
    id_acc: AtomicI64,
}

impl Identities {
    pub const STABLE_MASK: i64 = i64::MIN;

    pub fn new(kind: IdKind) -> Self {
        let start = match kind {
            IdKind::Client => RdId::MAX_STATIC_ID,
            IdKind::Server => RdId::MAX_STATIC_ID + 1,
        };
        Self {
            kind,
            id_acc: AtomicI64::new(start),
        }
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }

    /// Fresh id for an unnamed, dynamically created entity. The parent does not participate
    /// in the result; it is accepted so callers always name where the entity will live.
    pub fn next(&self, _parent: RdId) -> RdId {
        RdId::new(self.id_acc.fetch_add(2, Ordering::Relaxed))
    }

    pub fn mix(&self, id: RdId, tail: &str) -> RdId {
        RdId::new(id.mix(tail).value() | Self::STABLE_MASK)
    }

    pub fn mix_i32(&self, id: RdId, tail: i32) -> RdId {
        RdId::new(id.mix_i32(tail).value() | Self::STABLE_MASK)
    }

    pub fn mix_i64(&self, id: RdId, tail: i64) -> RdId {
        RdId::new(id.mix_i64(tail).value() | Self::STABLE_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_and_server_never_collide() {
        let client = Identities::new(IdKind::Client);
        let server = Identities::new(IdKind::Server);

        let client_ids: Vec<RdId> = (0..100).map(|_| client.next(RdId::NULL)).collect();
        let server_ids: Vec<RdId> = (0..100).map(|_| server.next(RdId::NULL)).collect();

        assert_eq!(client_ids[0].value(), RdId::MAX_STATIC_ID);
        assert_eq!(server_ids[0].value(), RdId::MAX_STATIC_ID + 1);
        assert!(client_ids.iter().all(|id| id.value() % 2 == 0));
        assert!(server_ids.iter().all(|id| id.value() % 2 == 1));
        assert!(client_ids.iter().all(|id| !id.is_static()));
    }

    #[test]
    fn stable_ids_carry_the_high_bit() {
        let identities = Identities::new(IdKind::Client);
        let id = identities.mix(RdId::new(1), ".name");
        assert!(id.value() < 0);
        assert_eq!(id, identities.mix(RdId::new(1), ".name"));
    }

    #[test]
    fn mask_preserves_concatenation() {
        let identities = Identities::new(IdKind::Server);
        let stepwise = identities.mix(identities.mix(RdId::NULL, "abcd"), "efg");
        assert_eq!(stepwise, identities.mix(RdId::NULL, "abcdefg"));
    }
}

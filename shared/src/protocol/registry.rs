use std::collections::HashMap;

use crate::{identity::rd_id::RdId, protocol::error::ProtocolError, world::entity::location::Location};

/// Handle of one registered entity. A key is never reused for another entity: the slot's
/// generation moves on when the entity leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKey {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
pub struct EntityNode {
    pub id: RdId,
    pub location: Location,
    pub parent: Option<EntityKey>,
    pub kind: &'static str,
}

struct Slot {
    generation: u32,
    node: Option<EntityNode>,
}

/// Arena of the entities pre-bound in one protocol.
///
/// Parent links are keys into the arena, so navigating towards the root never keeps an entity
/// alive.
#[derive(Default)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_id: HashMap<RdId, EntityKey>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        id: RdId,
        location: Location,
        parent: Option<EntityKey>,
        kind: &'static str,
    ) -> Result<EntityKey, ProtocolError> {
        if let Some(existing) = self.by_id.get(&id).and_then(|key| self.get(*key)) {
            return Err(ProtocolError::DuplicateEntityId {
                id,
                existing: existing.location.to_string(),
                attempted: location.to_string(),
            });
        }

        let node = EntityNode {
            id,
            location,
            parent,
            kind,
        };
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                EntityKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                EntityKey {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.by_id.insert(id, key);
        Ok(key)
    }

    pub fn remove(&mut self, key: EntityKey) -> Option<EntityNode> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        if self.by_id.get(&node.id) == Some(&key) {
            self.by_id.remove(&node.id);
        }
        Some(node)
    }

    pub fn get(&self, key: EntityKey) -> Option<&EntityNode> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn key_of(&self, id: RdId) -> Option<EntityKey> {
        self.by_id.get(&id).copied()
    }

    pub fn contains_id(&self, id: RdId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn location_of(&self, id: RdId) -> Option<Location> {
        self.key_of(id)
            .and_then(|key| self.get(key))
            .map(|node| node.location.clone())
    }

    /// Ids from `key` up to its top-level ancestor, `key` first
    pub fn ancestry(&self, key: EntityKey) -> Vec<RdId> {
        let mut ids = Vec::new();
        let mut current = self.get(key);
        while let Some(node) = current {
            ids.push(node.id);
            current = node.parent.and_then(|parent| self.get(parent));
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(path: &str) -> Location {
        Location::root(path)
    }

    #[test]
    fn stale_key_does_not_reach_new_entity() {
        let mut registry = EntityRegistry::new();
        let first = registry
            .insert(RdId::new(1), location("a"), None, "A")
            .unwrap();
        registry.remove(first).unwrap();
        let second = registry
            .insert(RdId::new(2), location("b"), None, "B")
            .unwrap();

        assert!(registry.get(first).is_none());
        assert!(registry.remove(first).is_none());
        assert_eq!(registry.get(second).unwrap().id, RdId::new(2));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut registry = EntityRegistry::new();
        registry
            .insert(RdId::new(5), location("root.a"), None, "A")
            .unwrap();
        let err = registry
            .insert(RdId::new(5), location("root.b"), None, "B")
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::DuplicateEntityId {
                id: RdId::new(5),
                existing: "root.a".to_string(),
                attempted: "root.b".to_string(),
            }
        );
    }

    #[test]
    fn ancestry_walks_parent_keys() {
        let mut registry = EntityRegistry::new();
        let root = registry.insert(RdId::new(1), location("r"), None, "R").unwrap();
        let child = registry
            .insert(RdId::new(2), location("r.c"), Some(root), "C")
            .unwrap();
        let leaf = registry
            .insert(RdId::new(3), location("r.c.l"), Some(child), "L")
            .unwrap();

        assert_eq!(
            registry.ancestry(leaf),
            vec![RdId::new(3), RdId::new(2), RdId::new(1)]
        );
        assert_eq!(registry.len(), 3);
    }
}

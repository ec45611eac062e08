//! Items lying on the floor of a map instance.
//!
//! The table is concurrent so network handlers can look items up while the
//! instance updates; the tile index is kept in step on every add and remove.

use dashmap::DashMap;
use uuid::Uuid;

use crate::game::types::{EntityId, Position};
use crate::network::packet::ItemSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapItem {
    pub id: Uuid,
    pub item_id: Uuid,
    pub quantity: u32,
    pub position: Position,
    /// Only this player may pick the item up until `owner_until`.
    pub owner: Option<EntityId>,
    pub owner_until: i64,
    pub despawn_at: i64,
}

impl MapItem {
    pub fn summary(&self) -> ItemSummary {
        ItemSummary { id: self.id, item_id: self.item_id, quantity: self.quantity, position: self.position }
    }

    pub fn can_pick(&self, player: EntityId, now: i64) -> bool {
        match self.owner {
            Some(owner) if now < self.owner_until => owner == player,
            _ => true,
        }
    }
}

#[derive(Debug, Default)]
pub struct MapItems {
    items: DashMap<Uuid, MapItem>,
    tiles: DashMap<Position, Vec<Uuid>>,
}

impl MapItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&self, item: MapItem) -> ItemSummary {
        let summary = item.summary();
        self.tiles.entry(item.position).or_default().push(item.id);
        self.items.insert(item.id, item);
        summary
    }

    pub fn remove(&self, id: Uuid) -> Option<MapItem> {
        let (_, item) = self.items.remove(&id)?;
        let now_empty = match self.tiles.get_mut(&item.position) {
            Some(mut ids) => {
                ids.retain(|i| *i != id);
                ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.tiles.remove_if(&item.position, |_, ids| ids.is_empty());
        }
        Some(item)
    }

    pub fn get(&self, id: Uuid) -> Option<MapItem> {
        self.items.get(&id).map(|i| i.clone())
    }

    pub fn at(&self, position: Position) -> Vec<MapItem> {
        let ids = self.tiles.get(&position).map(|ids| ids.clone()).unwrap_or_default();
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Removes and returns every item on `position` that `player` may take.
    pub fn take_at(&self, position: Position, player: EntityId, now: i64) -> Vec<MapItem> {
        self.at(position)
            .into_iter()
            .filter(|item| item.can_pick(player, now))
            .filter_map(|item| self.remove(item.id))
            .collect()
    }

    /// Removes despawned items and returns their ids.
    pub fn expire(&self, now: i64) -> Vec<Uuid> {
        let expired: Vec<Uuid> = self
            .items
            .iter()
            .filter(|item| now >= item.despawn_at)
            .map(|item| item.id)
            .collect();
        for id in &expired {
            self.remove(*id);
        }
        expired
    }

    pub fn summaries(&self) -> Vec<ItemSummary> {
        self.items.iter().map(|item| item.summary()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(position: Position, owner: Option<EntityId>) -> MapItem {
        MapItem {
            id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            quantity: 1,
            position,
            owner,
            owner_until: 100,
            despawn_at: 1_000,
        }
    }

    #[test]
    fn test_tile_index_follows_add_and_remove() {
        let items = MapItems::new();
        let tile = Position::new(4, 4);
        let a = item(tile, None);
        let b = item(tile, None);
        items.add(a.clone());
        items.add(b.clone());
        assert_eq!(items.at(tile).len(), 2);

        assert_eq!(items.remove(a.id), Some(a));
        assert_eq!(items.at(tile), vec![b.clone()]);
        items.remove(b.id);
        assert!(items.at(tile).is_empty());
        assert!(items.is_empty());
    }

    #[test]
    fn test_owner_window() {
        let owner = EntityId::new();
        let other = EntityId::new();
        let items = MapItems::new();
        let tile = Position::new(1, 1);
        items.add(item(tile, Some(owner)));

        assert!(items.take_at(tile, other, 50).is_empty());
        assert_eq!(items.take_at(tile, other, 100).len(), 1);
        assert!(items.is_empty());
    }

    #[test]
    fn test_expire() {
        let items = MapItems::new();
        let keep = item(Position::new(0, 0), None);
        let mut gone = item(Position::new(0, 1), None);
        gone.despawn_at = 10;
        items.add(keep.clone());
        items.add(gone.clone());

        assert_eq!(items.expire(10), vec![gone.id]);
        assert_eq!(items.len(), 1);
        assert!(items.get(keep.id).is_some());
    }
}

use std::collections::HashMap;

use super::instruction::{PlayerUpdate, StructureChange};
use crate::net::ItemType;

/// Player values owned by the application thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub gold: u32,
    pub in_game: bool,
    structures: HashMap<ItemType, u32>,
}

impl PlayerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn structure_count(&self, item: ItemType) -> u32 {
        self.structures.get(&item).copied().unwrap_or(0)
    }

    pub fn huts(&self) -> u32 {
        self.structure_count(ItemType::Hut)
    }

    pub fn apply(&mut self, update: &PlayerUpdate) {
        if let Some(gold) = update.gold {
            self.gold = gold;
        }

        for &(item, change) in &update.structures {
            if !item.counts_structures() {
                continue;
            }
            let count = self.structures.entry(item).or_insert(0);
            match change {
                StructureChange::Set(value) => *count = value,
                StructureChange::Increment => *count = count.saturating_add(1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sets_gold_and_counts() {
        let mut player = PlayerState::new();
        player.apply(
            &PlayerUpdate::gold(100).with_structure(ItemType::Hut, StructureChange::Set(2)),
        );
        assert_eq!(player.gold, 100);
        assert_eq!(player.huts(), 2);

        player.apply(&PlayerUpdate::gold(75).with_structure(ItemType::Hut, StructureChange::Increment));
        assert_eq!(player.gold, 75);
        assert_eq!(player.huts(), 3);
    }

    #[test]
    fn test_decorative_items_not_counted() {
        let mut player = PlayerState::new();
        player.apply(&PlayerUpdate::default().with_structure(ItemType::Farm, StructureChange::Increment));
        assert_eq!(player.structure_count(ItemType::Farm), 0);
        assert_eq!(player.gold, 0);
    }
}

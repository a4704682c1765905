use crate::placement::{PageKey, Placement, PlacementId, Slot};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};
use strum_macros::Display;

/// Occupancy of one page, rebuilt from a fresh placement list on every use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMap {
    page_key: PageKey,
    width: Slot,
    occupied: BTreeMap<Slot, Placement>,
}

/// How a slot button is drawn: red, green, or ringed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SlotState {
    Taken,
    Free,
    Selected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCell<'a> {
    pub slot: Slot,
    pub state: SlotState,
    pub occupant: Option<&'a Placement>,
}

/// Builds the slot map of `page_key` from every known placement.
///
/// Inactive placements and `exclude` (the one being edited) never occupy a slot.
pub fn compute_slot_map(
    all: &[Placement],
    page_key: PageKey,
    exclude: Option<PlacementId>,
    width: Slot,
) -> SlotMap {
    let mut occupied: BTreeMap<Slot, Placement> = BTreeMap::new();
    for placement in all.iter().filter(|p| {
        p.page_key == page_key && p.is_considered_active() && Some(p.id) != exclude
    }) {
        if let Some(first) = occupied.get(&placement.slot) {
            warn!(
                "Page {page_key} slot {} held by both {} and {}",
                placement.slot, first.id, placement.id
            );
            continue;
        }
        occupied.insert(placement.slot, placement.clone());
    }
    SlotMap {
        page_key,
        width,
        occupied,
    }
}

/// The placement holding `slot`, if any.
pub fn check_conflict(map: &SlotMap, slot: Slot) -> Option<&Placement> {
    map.occupied.get(&slot)
}

/// First slot at or after `start_from` that is not in `taken`.
///
/// `None` once every slot up to `Slot::MAX` is taken.
pub fn next_free_slot(taken: &BTreeSet<Slot>, start_from: Slot) -> Option<Slot> {
    (start_from..=Slot::MAX).find(|slot| !taken.contains(slot))
}

impl SlotMap {
    pub fn page_key(&self) -> PageKey {
        self.page_key
    }

    pub fn width(&self) -> Slot {
        self.width
    }

    pub fn occupied(&self) -> &BTreeMap<Slot, Placement> {
        &self.occupied
    }

    pub fn occupant(&self, slot: Slot) -> Option<&Placement> {
        check_conflict(self, slot)
    }

    pub fn is_taken(&self, slot: Slot) -> bool {
        self.occupied.contains_key(&slot)
    }

    pub fn taken_slots(&self) -> BTreeSet<Slot> {
        self.occupied.keys().copied().collect()
    }

    /// Free slots among the buttons offered (0..width).
    pub fn free_slots(&self) -> Vec<Slot> {
        (0..self.width).filter(|s| !self.is_taken(*s)).collect()
    }

    pub fn next_free_slot(&self, start_from: Slot) -> Option<Slot> {
        next_free_slot(&self.taken_slots(), start_from)
    }

    /// Slots for `count` new placements, in order, each after the previous one.
    ///
    /// Slots handed out earlier in the batch count as taken for later ones.
    /// Returns fewer than `count` slots when the slot space runs out.
    pub fn claim_free_slots(&self, count: usize, start_from: Slot) -> Vec<Slot> {
        let mut claimed = self.taken_slots();
        let mut cursor = Some(start_from);
        let mut slots = Vec::with_capacity(count);
        while slots.len() < count {
            let Some(slot) = cursor.and_then(|from| next_free_slot(&claimed, from)) else {
                break;
            };
            claimed.insert(slot);
            slots.push(slot);
            cursor = slot.checked_add(1);
        }
        slots
    }

    /// One cell per offered slot for the picker. Selection outranks occupancy.
    pub fn strip(&self, selected: Option<Slot>) -> Vec<SlotCell<'_>> {
        (0..self.width)
            .map(|slot| {
                let occupant = self.occupant(slot);
                let state = if selected == Some(slot) {
                    SlotState::Selected
                } else if occupant.is_some() {
                    SlotState::Taken
                } else {
                    SlotState::Free
                };
                SlotCell {
                    slot,
                    state,
                    occupant,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_SLOT_WIDTH;
    use crate::placement::Payload;

    fn placement(id: u64, page: u32, slot: Slot) -> Placement {
        Placement {
            id: PlacementId(id),
            page_key: PageKey(page),
            slot,
            active: true,
            related_search: None,
            payload: Payload::titled(format!("result {id}")),
            created_at: None,
        }
    }

    fn sample() -> Vec<Placement> {
        vec![
            placement(1, 1, 0),
            placement(2, 1, 1),
            placement(3, 2, 0),
            placement(4, 1, 4),
        ]
    }

    #[test]
    fn test_filters_to_page() {
        let map = compute_slot_map(&sample(), PageKey(1), None, DEFAULT_SLOT_WIDTH);
        assert_eq!(map.taken_slots(), BTreeSet::from([0, 1, 4]));
        assert_eq!(map.occupant(0).map(|p| p.id), Some(PlacementId(1)));
        assert_eq!(map.page_key(), PageKey(1));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let all = sample();
        let first = compute_slot_map(&all, PageKey(1), Some(PlacementId(2)), 10);
        let second = compute_slot_map(&all, PageKey(1), Some(PlacementId(2)), 10);
        assert_eq!(first, second);
    }

    #[test]
    fn test_excluded_placement_never_occupies() {
        let map = compute_slot_map(&sample(), PageKey(1), Some(PlacementId(2)), 10);
        assert!(!map.is_taken(1));
        assert!(
            map.occupied()
                .values()
                .all(|p| p.id != PlacementId(2))
        );
    }

    #[test]
    fn test_inactive_placement_is_free() {
        let mut all = sample();
        all[1].active = false;
        let map = compute_slot_map(&all, PageKey(1), None, 10);
        assert!(check_conflict(&map, 1).is_none());
    }

    #[test]
    fn test_check_conflict() {
        let map = compute_slot_map(&sample(), PageKey(1), None, 10);
        assert_eq!(check_conflict(&map, 4).map(|p| p.id), Some(PlacementId(4)));
        assert!(check_conflict(&map, 3).is_none());
        // Slots outside the offered range are still checked.
        assert!(check_conflict(&map, 42).is_none());
    }

    #[test]
    fn test_double_occupancy_keeps_first() {
        let mut all = sample();
        all.push(placement(9, 1, 0));
        let map = compute_slot_map(&all, PageKey(1), None, 10);
        assert_eq!(map.occupant(0).map(|p| p.id), Some(PlacementId(1)));
    }

    #[test]
    fn test_next_free_slot() {
        assert_eq!(next_free_slot(&BTreeSet::from([0, 1, 2, 4]), 0), Some(3));
        assert_eq!(next_free_slot(&(0..10).collect(), 0), Some(10));
        assert_eq!(next_free_slot(&BTreeSet::from([0, 1, 2, 4]), 4), Some(5));
        assert_eq!(next_free_slot(&BTreeSet::new(), 7), Some(7));
    }

    #[test]
    fn test_next_free_slot_at_the_top_of_the_range() {
        assert_eq!(next_free_slot(&BTreeSet::new(), Slot::MAX), Some(Slot::MAX));
        assert_eq!(next_free_slot(&BTreeSet::from([Slot::MAX]), Slot::MAX), None);
        assert_eq!(
            next_free_slot(&BTreeSet::from([Slot::MAX - 1, Slot::MAX]), Slot::MAX - 1),
            None
        );

        let map = compute_slot_map(&[placement(1, 1, Slot::MAX)], PageKey(1), None, 10);
        assert_eq!(map.next_free_slot(Slot::MAX), None);
        assert_eq!(map.next_free_slot(Slot::MAX - 1), Some(Slot::MAX - 1));
    }

    #[test]
    fn test_claim_free_slots_stops_when_exhausted() {
        let empty = compute_slot_map(&[], PageKey(1), None, 10);
        assert_eq!(empty.claim_free_slots(2, Slot::MAX), vec![Slot::MAX]);
        assert_eq!(
            empty.claim_free_slots(3, Slot::MAX - 1),
            vec![Slot::MAX - 1, Slot::MAX]
        );

        let full_top = compute_slot_map(&[placement(1, 1, Slot::MAX)], PageKey(1), None, 10);
        assert!(full_top.claim_free_slots(1, Slot::MAX).is_empty());
    }

    #[test]
    fn test_claim_free_slots_skips_batch_claims() {
        let all = vec![placement(1, 1, 0), placement(2, 1, 2)];
        let map = compute_slot_map(&all, PageKey(1), None, 10);
        assert_eq!(map.claim_free_slots(4, 0), vec![1, 3, 4, 5]);
        assert_eq!(map.claim_free_slots(2, 2), vec![3, 4]);
        assert!(map.claim_free_slots(0, 0).is_empty());
    }

    #[test]
    fn test_free_slots_and_strip() {
        let map = compute_slot_map(&sample(), PageKey(1), None, 5);
        assert_eq!(map.free_slots(), vec![2, 3]);

        let strip = map.strip(Some(2));
        let states: Vec<SlotState> = strip.iter().map(|c| c.state).collect();
        assert_eq!(
            states,
            vec![
                SlotState::Taken,
                SlotState::Taken,
                SlotState::Selected,
                SlotState::Free,
                SlotState::Taken,
            ]
        );
        assert_eq!(strip[4].occupant.map(|p| p.label()), Some("result 4"));
        assert_eq!(SlotState::Taken.to_string(), "taken");
    }
}

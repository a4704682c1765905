use crate::placement::{Draft, PageKey, Placement, PlacementId, Slot};
use chrono::Utc;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use strum_macros::{Display, EnumString};
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} does not exist")]
    Missing(PlacementId),

    /// Raised by stores that enforce unique (page, slot) among active rows.
    #[error("slot {slot} on page {page} violates the unique placement constraint")]
    UniqueViolation { page: PageKey, slot: Slot },

    #[error("{0}")]
    Backend(String),
}

/// Store call, used to tell the operator which step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum StoreOp {
    List,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub page: Option<PageKey>,
    pub id: Option<PlacementId>,
    pub active_only: bool,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(page: PageKey) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    pub fn id(id: PlacementId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn matches(&self, placement: &Placement) -> bool {
        self.page.is_none_or(|p| placement.page_key == p)
            && self.id.is_none_or(|id| placement.id == id)
            && (!self.active_only || placement.is_considered_active())
    }
}

/// Persistence backing a tenant's placements.
///
/// Every call may fail; nothing here is transactional.
pub trait RecordStore {
    fn list(&self, filter: &ListFilter) -> StoreResult<Vec<Placement>>;

    fn insert(&mut self, draft: Draft) -> StoreResult<Placement>;

    fn update(&mut self, id: PlacementId, draft: Draft) -> StoreResult<Placement>;

    fn delete(&mut self, id: PlacementId) -> StoreResult<()>;

    /// Removes rows that reference `id` (click tracking). Returns how many went away.
    fn delete_dependents(&mut self, _id: PlacementId) -> StoreResult<usize> {
        Ok(0)
    }
}

/// Placements held in memory, with click counts as dependent rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    placements: BTreeMap<PlacementId, Placement>,
    clicks: HashMap<PlacementId, usize>,
    next_id: u64,
    unique_slots: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes that would put two active placements in one (page, slot).
    pub fn with_unique_slots(mut self) -> Self {
        self.unique_slots = true;
        self
    }

    /// Loads existing rows; new ids continue after the largest one seen.
    /// A repeated id keeps its first row.
    pub fn from_placements<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Placement>,
    {
        let mut store = Self::new();
        for row in rows {
            if store.placements.contains_key(&row.id) {
                warn!("Duplicate placement id {}, dropping \"{}\"", row.id, row.label());
                continue;
            }
            store.next_id = store.next_id.max(row.id.0);
            store.placements.insert(row.id, row);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn get(&self, id: PlacementId) -> Option<&Placement> {
        self.placements.get(&id)
    }

    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.placements.values()
    }

    pub fn record_click(&mut self, id: PlacementId) -> StoreResult<()> {
        if !self.placements.contains_key(&id) {
            return Err(StoreError::Missing(id));
        }
        *self.clicks.entry(id).or_insert(0) += 1;
        Ok(())
    }

    pub fn clicks(&self, id: PlacementId) -> usize {
        self.clicks.get(&id).copied().unwrap_or(0)
    }

    fn check_unique(&self, draft: &Draft, ignore: Option<PlacementId>) -> StoreResult<()> {
        if !self.unique_slots || !draft.active {
            return Ok(());
        }
        let clash = self.placements.values().any(|p| {
            Some(p.id) != ignore
                && p.is_considered_active()
                && p.page_key == draft.page_key
                && p.slot == draft.slot
        });
        if clash {
            return Err(StoreError::UniqueViolation {
                page: draft.page_key,
                slot: draft.slot,
            });
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn list(&self, filter: &ListFilter) -> StoreResult<Vec<Placement>> {
        Ok(self
            .placements
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    fn insert(&mut self, draft: Draft) -> StoreResult<Placement> {
        self.check_unique(&draft, None)?;

        self.next_id += 1;
        let placement = Placement {
            id: PlacementId(self.next_id),
            page_key: draft.page_key,
            slot: draft.slot,
            active: draft.active,
            related_search: draft.related_search,
            payload: draft.payload,
            created_at: Some(Utc::now()),
        };
        debug!(
            "insert placement {} at page {} slot {}",
            placement.id, placement.page_key, placement.slot
        );
        self.placements.insert(placement.id, placement.clone());
        Ok(placement)
    }

    fn update(&mut self, id: PlacementId, draft: Draft) -> StoreResult<Placement> {
        self.check_unique(&draft, Some(id))?;

        let existing = self
            .placements
            .get_mut(&id)
            .ok_or(StoreError::Missing(id))?;
        existing.page_key = draft.page_key;
        existing.slot = draft.slot;
        existing.active = draft.active;
        existing.related_search = draft.related_search;
        existing.payload = draft.payload;
        Ok(existing.clone())
    }

    fn delete(&mut self, id: PlacementId) -> StoreResult<()> {
        self.placements
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::Missing(id))
    }

    fn delete_dependents(&mut self, id: PlacementId) -> StoreResult<usize> {
        Ok(self.clicks.remove(&id).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::Payload;

    fn draft(page: u32, slot: Slot, title: &str) -> Draft {
        Draft {
            page_key: PageKey(page),
            slot,
            active: true,
            related_search: None,
            payload: Payload::titled(title),
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut store = MemoryStore::new();
        let a = store.insert(draft(1, 0, "A")).unwrap();
        let b = store.insert(draft(1, 1, "B")).unwrap();
        assert_eq!(a.id, PlacementId(1));
        assert_eq!(b.id, PlacementId(2));
        assert!(a.created_at.is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_from_placements_continues_ids() {
        let mut seed = MemoryStore::new();
        seed.insert(draft(1, 0, "A")).unwrap();
        seed.insert(draft(1, 1, "B")).unwrap();
        let rows: Vec<Placement> = seed.placements().cloned().collect();

        let mut store = MemoryStore::from_placements(rows);
        let c = store.insert(draft(2, 0, "C")).unwrap();
        assert_eq!(c.id, PlacementId(3));
    }

    #[test]
    fn test_from_placements_keeps_first_of_duplicate_ids() {
        let mut seed = MemoryStore::new();
        let first = seed.insert(draft(1, 0, "First")).unwrap();
        let mut second = first.clone();
        second.payload.title = "Second".to_string();

        let store = MemoryStore::from_placements([first.clone(), second]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(first.id).unwrap().payload.title, "First");
    }

    #[test]
    fn test_list_filters_by_page_and_activity() {
        let mut store = MemoryStore::new();
        store.insert(draft(1, 0, "A")).unwrap();
        store.insert(draft(2, 0, "B")).unwrap();
        let mut hidden = draft(1, 1, "C");
        hidden.active = false;
        store.insert(hidden).unwrap();

        assert_eq!(store.list(&ListFilter::all()).unwrap().len(), 3);
        assert_eq!(store.list(&ListFilter::page(PageKey(1))).unwrap().len(), 2);

        let active = ListFilter {
            active_only: true,
            ..ListFilter::page(PageKey(1))
        };
        let rows = store.list(&active).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payload.title, "A");
    }

    #[test]
    fn test_update_and_delete_missing_record() {
        let mut store = MemoryStore::new();
        let err = store.update(PlacementId(9), draft(1, 0, "X")).unwrap_err();
        assert!(matches!(err, StoreError::Missing(PlacementId(9))));

        let err = store.delete(PlacementId(9)).unwrap_err();
        assert!(matches!(err, StoreError::Missing(PlacementId(9))));
    }

    #[test]
    fn test_unique_slots_backstop() {
        let mut store = MemoryStore::new().with_unique_slots();
        let a = store.insert(draft(1, 0, "A")).unwrap();

        let err = store.insert(draft(1, 0, "B")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation { page: PageKey(1), slot: 0 }
        ));

        // Same slot on another page, or an inactive row, is fine.
        store.insert(draft(2, 0, "C")).unwrap();
        let mut inactive = draft(1, 0, "D");
        inactive.active = false;
        store.insert(inactive).unwrap();

        // Updating a row in place does not clash with itself.
        store.update(a.id, draft(1, 0, "A2")).unwrap();
    }

    #[test]
    fn test_delete_dependents_clears_clicks() {
        let mut store = MemoryStore::new();
        let a = store.insert(draft(1, 0, "A")).unwrap();
        store.record_click(a.id).unwrap();
        store.record_click(a.id).unwrap();
        assert_eq!(store.clicks(a.id), 2);

        assert_eq!(store.delete_dependents(a.id).unwrap(), 2);
        assert_eq!(store.clicks(a.id), 0);
        assert_eq!(store.delete_dependents(a.id).unwrap(), 0);
    }

    #[test]
    fn test_store_op_display() {
        assert_eq!(StoreOp::Insert.to_string(), "insert");
        assert_eq!("delete".parse::<StoreOp>().unwrap(), StoreOp::Delete);
    }
}

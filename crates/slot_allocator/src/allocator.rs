use crate::{
    config::TenantProfile,
    constants::UNKNOWN_OCCUPANT_LABEL,
    error::{AllocError, Result},
    placement::{Candidate, Draft, PageKey, Payload, Placement, PlacementId, Slot},
    slot_map::{SlotMap, check_conflict, compute_slot_map},
    store::{ListFilter, RecordStore, StoreError, StoreOp},
};
use log::{debug, info, warn};

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Inserted(Placement),
    Updated(Placement),
    /// `evicted` held the slot and was deleted first.
    Replaced {
        placement: Placement,
        evicted: Placement,
    },
}

impl Submitted {
    pub fn placement(&self) -> &Placement {
        match self {
            Submitted::Inserted(p) | Submitted::Updated(p) => p,
            Submitted::Replaced { placement, .. } => placement,
        }
    }
}

/// Keeps one active placement per (page, slot) for a tenant.
///
/// Nothing is cached: every call lists the store again.
pub struct SlotAllocator<S> {
    store: S,
    profile: TenantProfile,
}

impl<S: RecordStore> SlotAllocator<S> {
    pub fn new(store: S, profile: TenantProfile) -> Self {
        Self { store, profile }
    }

    pub fn profile(&self) -> &TenantProfile {
        &self.profile
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Every placement of the tenant, across all pages.
    pub fn placements(&self) -> Result<Vec<Placement>> {
        self.store
            .list(&ListFilter::all())
            .map_err(AllocError::persistence(StoreOp::List))
    }

    pub fn slot_map(&self, page_key: PageKey, exclude: Option<PlacementId>) -> Result<SlotMap> {
        let all = self.placements()?;
        Ok(compute_slot_map(
            &all,
            page_key,
            exclude,
            self.profile.slot_width,
        ))
    }

    /// Creates or updates a placement at `desired_slot` on `page_key`.
    ///
    /// Creations into a taken slot fail with [`AllocError::SlotTaken`] unless
    /// `force_replace` is set, in which case the occupant is deleted first.
    /// Edits are not checked unless the tenant has `guard_edits` enabled.
    /// Inactive candidates hold no slot and are never checked.
    pub fn submit(
        &mut self,
        candidate: Candidate,
        page_key: PageKey,
        desired_slot: Slot,
        force_replace: bool,
    ) -> Result<Submitted> {
        match candidate.id {
            Some(id) => self.update(id, candidate, page_key, desired_slot, force_replace),
            None => self.create(candidate, page_key, desired_slot, force_replace),
        }
    }

    fn create(
        &mut self,
        candidate: Candidate,
        page_key: PageKey,
        slot: Slot,
        force_replace: bool,
    ) -> Result<Submitted> {
        if !candidate.active {
            debug!(
                "[{}] inactive result on page {page_key} slot {slot} skips the slot check",
                self.profile.name
            );
            let placement = self.insert(candidate.into_draft(page_key, slot))?;
            return Ok(Submitted::Inserted(placement));
        }

        let map = self.slot_map(page_key, None)?;
        let draft = candidate.into_draft(page_key, slot);

        match check_conflict(&map, slot) {
            None => {
                let placement = self.insert(draft)?;
                Ok(Submitted::Inserted(placement))
            }
            Some(occupant) if !force_replace => {
                warn!(
                    "[{}] page {page_key} slot {slot} is taken by {} ({})",
                    self.profile.name,
                    occupant.id,
                    occupant.label()
                );
                Err(slot_taken(occupant))
            }
            Some(occupant) => {
                let evicted = occupant.clone();
                self.evict(&evicted)?;
                let placement = self.insert(draft)?;
                info!(
                    "[{}] page {page_key} slot {slot}: replaced {} with {}",
                    self.profile.name, evicted.id, placement.id
                );
                Ok(Submitted::Replaced { placement, evicted })
            }
        }
    }

    fn update(
        &mut self,
        id: PlacementId,
        candidate: Candidate,
        page_key: PageKey,
        slot: Slot,
        force_replace: bool,
    ) -> Result<Submitted> {
        let mut evicted = None;

        if self.profile.guard_edits {
            let all = self.placements()?;
            let previous = all
                .iter()
                .find(|p| p.id == id)
                .ok_or(AllocError::NotFound(id))?;

            let claims_slot = candidate.active
                && (!previous.active || previous.page_key != page_key || previous.slot != slot);
            if claims_slot {
                let map = compute_slot_map(&all, page_key, Some(id), self.profile.slot_width);
                if let Some(occupant) = check_conflict(&map, slot) {
                    if !force_replace {
                        return Err(slot_taken(occupant));
                    }
                    let occupant = occupant.clone();
                    self.evict(&occupant)?;
                    evicted = Some(occupant);
                }
            }
        } else {
            debug!("[{}] edit of {id} skips the slot check", self.profile.name);
        }

        let draft = candidate.into_draft(page_key, slot);
        let placement = self
            .store
            .update(id, draft)
            .map_err(|e| self.store_error(StoreOp::Update, e))?;

        Ok(match evicted {
            Some(evicted) => Submitted::Replaced { placement, evicted },
            None => Submitted::Updated(placement),
        })
    }

    /// Deletes a placement on operator request, dependents first.
    pub fn remove(&mut self, id: PlacementId) -> Result<Placement> {
        let placement = self
            .store
            .list(&ListFilter::id(id))
            .map_err(AllocError::persistence(StoreOp::List))?
            .into_iter()
            .next()
            .ok_or(AllocError::NotFound(id))?;

        self.evict(&placement)?;
        info!(
            "[{}] removed {} from page {} slot {}",
            self.profile.name, placement.id, placement.page_key, placement.slot
        );
        Ok(placement)
    }

    /// Inserts generated placements into the free slots of a page.
    ///
    /// Slots are handed out upward from `start_from`. Nothing is inserted when
    /// the page cannot hold the whole batch. Inserts run one by one; a failure
    /// stops the batch and leaves earlier inserts in place.
    pub fn fill_page(
        &mut self,
        page_key: PageKey,
        payloads: Vec<Payload>,
        start_from: Slot,
    ) -> Result<Vec<Placement>> {
        let map = self.slot_map(page_key, None)?;
        let slots = map.claim_free_slots(payloads.len(), start_from);
        if slots.len() < payloads.len() {
            return Err(AllocError::SlotsExhausted {
                page: page_key,
                start_from,
                requested: payloads.len(),
                available: slots.len(),
            });
        }
        debug!(
            "[{}] batch of {} onto page {page_key}: slots {slots:?}",
            self.profile.name,
            payloads.len()
        );

        let mut inserted = Vec::with_capacity(payloads.len());
        for (payload, slot) in payloads.into_iter().zip(slots) {
            let draft = Candidate::new(payload).into_draft(page_key, slot);
            inserted.push(self.insert(draft)?);
        }
        info!(
            "[{}] placed {} generated results on page {page_key}",
            self.profile.name,
            inserted.len()
        );
        Ok(inserted)
    }

    /// Deletes the dependents of `placement`, then the placement itself.
    /// Stops at the first failure.
    fn evict(&mut self, placement: &Placement) -> Result<()> {
        let removed = self
            .store
            .delete_dependents(placement.id)
            .map_err(|source| AllocError::DependencyDelete {
                id: placement.id,
                source,
            })?;
        if removed > 0 {
            debug!("deleted {removed} dependent rows of {}", placement.id);
        }

        self.store
            .delete(placement.id)
            .map_err(AllocError::persistence(StoreOp::Delete))
    }

    fn insert(&mut self, draft: Draft) -> Result<Placement> {
        self.store
            .insert(draft)
            .map_err(|e| self.store_error(StoreOp::Insert, e))
    }

    /// A uniqueness violation from the store is reported like our own conflict.
    fn store_error(&self, op: StoreOp, err: StoreError) -> AllocError {
        match err {
            StoreError::UniqueViolation { page, slot } => {
                let filter = ListFilter {
                    active_only: true,
                    ..ListFilter::page(page)
                };
                let occupant = self
                    .store
                    .list(&filter)
                    .ok()
                    .and_then(|rows| rows.into_iter().find(|p| p.slot == slot));
                AllocError::SlotTaken {
                    page,
                    slot,
                    occupant: occupant.as_ref().map(|p| p.id),
                    label: occupant
                        .as_ref()
                        .map_or(UNKNOWN_OCCUPANT_LABEL, |p| p.label())
                        .to_string(),
                }
            }
            source => AllocError::Persistence { op, source },
        }
    }
}

fn slot_taken(occupant: &Placement) -> AllocError {
    AllocError::SlotTaken {
        page: occupant.page_key,
        slot: occupant.slot,
        occupant: Some(occupant.id),
        label: occupant.label().to_string(),
    }
}

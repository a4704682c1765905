use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display position within a page.
pub type Slot = u32;

/// Opaque placement identifier, assigned by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlacementId(pub u64);

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Page a placement is shown on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(pub u32);

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PageKey {
    fn from(n: u32) -> Self {
        PageKey(n)
    }
}

/// Identifier of a parent "related search" record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelatedSearchId(pub u64);

impl fmt::Display for RelatedSearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content carried by a placement. The allocator only reads `title`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub title: String,
    pub link: Option<String>,
    #[serde(default)]
    pub sponsored: bool,
}

impl Payload {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A web result occupying one slot on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: PlacementId,
    pub page_key: PageKey,
    pub slot: Slot,
    pub active: bool,
    pub related_search: Option<RelatedSearchId>,
    pub payload: Payload,
    pub created_at: Option<DateTime<Utc>>,
}

impl Placement {
    /// Name shown to the operator when this placement blocks a slot.
    pub fn label(&self) -> &str {
        let title = self.payload.title.trim();
        if title.is_empty() { "(untitled)" } else { title }
    }

    pub fn is_considered_active(&self) -> bool {
        self.active
    }

    /// The fields an update would send back to the store unchanged.
    pub fn to_draft(&self) -> Draft {
        Draft {
            page_key: self.page_key,
            slot: self.slot,
            active: self.active,
            related_search: self.related_search,
            payload: self.payload.clone(),
        }
    }
}

/// Everything the store needs to insert or update a placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub page_key: PageKey,
    pub slot: Slot,
    pub active: bool,
    pub related_search: Option<RelatedSearchId>,
    pub payload: Payload,
}

/// What the operator submitted from the form.
///
/// `id` is set when an existing placement is being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: Option<PlacementId>,
    pub active: bool,
    pub related_search: Option<RelatedSearchId>,
    pub payload: Payload,
}

impl Candidate {
    pub fn new(payload: Payload) -> Self {
        Self {
            id: None,
            active: true,
            related_search: None,
            payload,
        }
    }

    pub fn editing(placement: &Placement) -> Self {
        Self {
            id: Some(placement.id),
            active: placement.active,
            related_search: placement.related_search,
            payload: placement.payload.clone(),
        }
    }

    pub(crate) fn into_draft(self, page_key: PageKey, slot: Slot) -> Draft {
        Draft {
            page_key,
            slot,
            active: self.active,
            related_search: self.related_search,
            payload: self.payload,
        }
    }
}

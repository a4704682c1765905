use crate::placement::{PageKey, RelatedSearchId};
use log::warn;
use serde::{Deserialize, Serialize};

/// A "related search" record that web results can be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedSearch {
    pub id: RelatedSearchId,
    pub page_number: PageKey,
    pub title: String,
}

/// Page choice coming from the form.
///
/// `explicit` is the typed page number (only shown when editing);
/// `parent` is the related search picked from the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSelection {
    pub explicit: Option<PageKey>,
    pub parent: Option<RelatedSearchId>,
}

impl PageSelection {
    pub fn explicit(page: PageKey) -> Self {
        Self {
            explicit: Some(page),
            parent: None,
        }
    }

    pub fn parent(parent: RelatedSearchId) -> Self {
        Self {
            explicit: None,
            parent: Some(parent),
        }
    }
}

/// Works out which page a submission targets.
///
/// A resolvable parent wins over the typed page. A parent that no longer
/// exists (deleted elsewhere) falls back to `default` without failing.
pub fn resolve_page(
    selection: &PageSelection,
    parents: &[RelatedSearch],
    default: PageKey,
) -> PageKey {
    match selection.parent {
        Some(parent_id) => match parents.iter().find(|rs| rs.id == parent_id) {
            Some(rs) => rs.page_number,
            None => {
                warn!("Related search {parent_id} not found, using page {default}");
                default
            }
        },
        None => selection.explicit.unwrap_or(default),
    }
}

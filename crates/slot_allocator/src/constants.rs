use crate::placement::{PageKey, Slot};

/// Number of slot buttons offered per page (0..=9)
pub const DEFAULT_SLOT_WIDTH: Slot = 10;

/// Page used when neither a related search nor an explicit page is given
pub const DEFAULT_PAGE: PageKey = PageKey(1);

/// Label shown when a storage-level conflict cannot name its occupant
pub const UNKNOWN_OCCUPANT_LABEL: &str = "another placement";

/// Default record field names (column headers in CSV interchange)
pub const DEFAULT_ID_COLUMN: &str = "id";
pub const DEFAULT_PAGE_COLUMN: &str = "page_no";
pub const DEFAULT_SLOT_COLUMN: &str = "position";
pub const DEFAULT_TITLE_COLUMN: &str = "title";
pub const DEFAULT_LINK_COLUMN: &str = "link";
pub const DEFAULT_SPONSORED_COLUMN: &str = "is_sponsored";
pub const DEFAULT_ACTIVE_COLUMN: &str = "is_active";
pub const DEFAULT_RELATED_SEARCH_COLUMN: &str = "related_search_id";
pub const DEFAULT_CREATED_AT_COLUMN: &str = "created_at";

/// Expected headers of the related-search CSV
pub const RELATED_ID_HEADER: &str = "id";
pub const RELATED_PAGE_HEADER: &str = "page_number";
pub const RELATED_TITLE_HEADER: &str = "title";

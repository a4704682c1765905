pub mod allocator;
pub mod config;
pub mod constants;
pub mod csv_reader;
pub mod error;
pub mod export;
pub mod page;
pub mod placement;
pub mod slot_map;
pub mod store;

pub use allocator::{SlotAllocator, Submitted};
pub use config::{ColumnNames, Config, PageSource, TenantProfile};
pub use constants::{DEFAULT_PAGE, DEFAULT_SLOT_WIDTH};
pub use csv_reader::{read_placements_csv, read_related_searches_csv};
pub use error::{AllocError, Result};
pub use export::{export_to_csv_with_path, save_placements_csv, write_placements};
pub use page::{PageSelection, RelatedSearch, resolve_page};
pub use placement::{Candidate, Draft, PageKey, Payload, Placement, PlacementId, RelatedSearchId, Slot};
pub use slot_map::{SlotCell, SlotMap, SlotState, check_conflict, compute_slot_map, next_free_slot};
pub use store::{ListFilter, MemoryStore, RecordStore, StoreError, StoreOp};

use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use log::{debug, info, warn};
use slot_allocator::{
    AllocError, Candidate, DEFAULT_PAGE, ListFilter, MemoryStore, PageKey, PageSelection,
    PageSource, Payload, PlacementId, RecordStore, RelatedSearch, RelatedSearchId, Slot,
    SlotAllocator, SlotMap, SlotState, Submitted, TenantProfile, export_to_csv_with_path,
    read_placements_csv, read_related_searches_csv, resolve_page, save_placements_csv,
};
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show which slots of a page are taken
    Map {
        #[command(flatten)]
        page: PageArgs,
        /// Treat this placement as absent (the one being edited)
        #[arg(long)]
        exclude: Option<u64>,
        /// Slot to highlight as selected
        #[arg(long)]
        selected: Option<Slot>,
    },
    /// Create a web result in a slot
    Add {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long)]
        slot: Slot,
        #[command(flatten)]
        content: ContentArgs,
        /// Delete the current occupant of the slot first
        #[arg(long)]
        force: bool,
    },
    /// Change an existing web result
    Edit {
        #[arg(long)]
        id: u64,
        // `--page` alone clears the related search
        #[command(flatten)]
        page: PageArgs,
        #[arg(long)]
        slot: Option<Slot>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        sponsored: Option<bool>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        force: bool,
    },
    /// Delete a web result and its click records
    Remove {
        #[arg(long)]
        id: u64,
    },
    /// Place generated results into the free slots of a page
    Fill {
        #[command(flatten)]
        page: PageArgs,
        /// One title per generated result, in order
        #[arg(long = "title", required = true)]
        titles: Vec<String>,
        #[arg(long, default_value_t = 0)]
        start_from: Slot,
    },
    /// Write web results to a timestamped CSV in the export directory
    Export {
        #[arg(long)]
        page: Option<u32>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// Page number
    #[arg(long)]
    pub page: Option<u32>,
    /// Related search whose page is used instead
    #[arg(long)]
    pub related_search: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct ContentArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub link: Option<String>,
    #[arg(long)]
    pub sponsored: bool,
    /// Store the result as inactive (it holds no slot)
    #[arg(long)]
    pub inactive: bool,
}

impl PageArgs {
    fn selection(&self) -> PageSelection {
        PageSelection {
            explicit: self.page.map(PageKey),
            parent: self.related_search.map(RelatedSearchId),
        }
    }
}

/// A tenant's placements loaded from its data file.
pub struct Workspace {
    allocator: SlotAllocator<MemoryStore>,
    related: Vec<RelatedSearch>,
    data_file: PathBuf,
    export_dir: PathBuf,
}

impl Workspace {
    /// Missing data files mean the tenant has no placements yet.
    pub fn open(config: &Config, profile: TenantProfile) -> Result<Self> {
        let data_file = config.data_file(&profile.name);
        let placements = if data_file.exists() {
            read_placements_csv(&data_file, &profile.columns)
                .with_context(|| format!("loading {}", data_file.display()))?
        } else {
            debug!("No data file at {}, starting empty", data_file.display());
            Vec::new()
        };

        let related_file = config.related_file(&profile.name);
        let related = if related_file.exists() {
            read_related_searches_csv(&related_file)
                .with_context(|| format!("loading {}", related_file.display()))?
        } else {
            Vec::new()
        };

        debug!(
            "[{}] loaded {} placements, {} related searches",
            profile.name,
            placements.len(),
            related.len()
        );
        Ok(Self {
            allocator: SlotAllocator::new(MemoryStore::from_placements(placements), profile),
            related,
            data_file,
            export_dir: config.export_dir.clone(),
        })
    }

    pub fn allocator(&self) -> &SlotAllocator<MemoryStore> {
        &self.allocator
    }

    fn profile(&self) -> &TenantProfile {
        self.allocator.profile()
    }

    fn resolve(&self, page: &PageArgs) -> PageKey {
        resolve_page(&page.selection(), &self.related, DEFAULT_PAGE)
    }

    /// Runs one command and saves the data file if anything changed.
    pub fn run(&mut self, command: Command) -> Result<()> {
        let changed = match command {
            Command::Map {
                page,
                exclude,
                selected,
            } => {
                let page_key = self.resolve(&page);
                let map = self
                    .allocator
                    .slot_map(page_key, exclude.map(PlacementId))?;
                print_map(&map, selected);
                false
            }
            Command::Add {
                page,
                slot,
                content,
                force,
            } => {
                self.add(&page, slot, content, force)?;
                true
            }
            Command::Edit {
                id,
                page,
                slot,
                title,
                link,
                sponsored,
                active,
                force,
            } => {
                let id = PlacementId(id);
                let existing = self
                    .allocator
                    .store()
                    .get(id)
                    .cloned()
                    .ok_or(AllocError::NotFound(id))?;

                let mut candidate = Candidate::editing(&existing);
                if let Some(title) = title {
                    candidate.payload.title = title;
                }
                if link.is_some() {
                    candidate.payload.link = link;
                }
                if let Some(sponsored) = sponsored {
                    candidate.payload.sponsored = sponsored;
                }
                if let Some(active) = active {
                    candidate.active = active;
                }
                let page_key = if page.page.is_some() || page.related_search.is_some() {
                    candidate.related_search = page.related_search.map(RelatedSearchId);
                    self.resolve(&page)
                } else {
                    existing.page_key
                };
                let slot = slot.unwrap_or(existing.slot);

                let outcome = self.allocator.submit(candidate, page_key, slot, force)?;
                report(&outcome);
                true
            }
            Command::Remove { id } => {
                let removed = self.allocator.remove(PlacementId(id))?;
                println!(
                    "Removed {} \"{}\" from page {} slot {}",
                    removed.id,
                    removed.label(),
                    removed.page_key,
                    removed.slot
                );
                true
            }
            Command::Fill {
                page,
                titles,
                start_from,
            } => {
                let page_key = self.resolve(&page);
                let payloads = titles.into_iter().map(Payload::titled).collect();
                let inserted = self.allocator.fill_page(page_key, payloads, start_from)?;
                for p in &inserted {
                    println!("slot {:>2}: {} (id {})", p.slot, p.label(), p.id);
                }
                true
            }
            Command::Export { page } => {
                let filter = page.map_or_else(ListFilter::all, |p| ListFilter::page(PageKey(p)));
                let rows = self.allocator.store().list(&filter)?;
                let path = export_to_csv_with_path(&rows, self.profile(), Some(self.export_dir.as_path()))?;
                info!("Exported {} web results to: {}", rows.len(), path.display());
                false
            }
        };

        if changed {
            self.save()?;
        }
        Ok(())
    }

    fn add(&mut self, page: &PageArgs, slot: Slot, content: ContentArgs, force: bool) -> Result<()> {
        if self.profile().page_source == PageSource::RelatedSearch && page.related_search.is_none() {
            warn!(
                "{} pages are normally chosen through a related search",
                self.profile().name
            );
        }
        let page_key = self.resolve(page);

        let mut candidate = Candidate::new(Payload {
            title: content.title,
            link: content.link,
            sponsored: content.sponsored,
        });
        candidate.active = !content.inactive;
        candidate.related_search = page.related_search.map(RelatedSearchId);

        match self.allocator.submit(candidate, page_key, slot, force) {
            Ok(outcome) => {
                report(&outcome);
                Ok(())
            }
            Err(e) if e.is_slot_taken() => {
                if let Ok(map) = self.allocator.slot_map(page_key, None) {
                    warn!("Free slots on page {page_key}: {:?}", map.free_slots());
                    if let Some(next) = map.next_free_slot(slot) {
                        warn!("Next free slot after {slot}: {next}");
                    }
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self) -> Result<()> {
        let rows = self.allocator.placements()?;
        save_placements_csv(&self.data_file, &rows, self.profile())?;
        debug!("Saved {} placements to {}", rows.len(), self.data_file.display());
        Ok(())
    }
}

fn report(outcome: &Submitted) {
    match outcome {
        Submitted::Inserted(p) => {
            println!("Added {} \"{}\" at page {} slot {}", p.id, p.label(), p.page_key, p.slot)
        }
        Submitted::Updated(p) => {
            println!("Updated {} \"{}\" at page {} slot {}", p.id, p.label(), p.page_key, p.slot)
        }
        Submitted::Replaced { placement, evicted } => println!(
            "Replaced \"{}\" with {} \"{}\" at page {} slot {}",
            evicted.label(),
            placement.id,
            placement.label(),
            placement.page_key,
            placement.slot
        ),
    }
}

fn print_map(map: &SlotMap, selected: Option<Slot>) {
    println!("Page {} ({} slots)", map.page_key(), map.width());
    for cell in map.strip(selected) {
        let marker = match cell.state {
            SlotState::Taken => "x",
            SlotState::Free => " ",
            SlotState::Selected => "*",
        };
        match cell.occupant {
            Some(p) => println!("[{marker}] {:>2} {:<8} {} (id {})", cell.slot, cell.state, p.label(), p.id),
            None => println!("[{marker}] {:>2} {}", cell.slot, cell.state),
        }
    }
    // Occupants beyond the offered buttons still block their slots.
    for (slot, p) in map.occupied().range(map.width()..) {
        println!("[x] {slot:>2} taken    {} (id {})", p.label(), p.id);
    }
}

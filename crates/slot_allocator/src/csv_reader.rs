use crate::config::ColumnNames;
use crate::constants::{RELATED_ID_HEADER, RELATED_PAGE_HEADER, RELATED_TITLE_HEADER};
use crate::error::{AllocError, Result};
use crate::page::RelatedSearch;
use crate::placement::{PageKey, Payload, Placement, PlacementId, RelatedSearchId};

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Column positions resolved from the header row.
struct PlacementColumns {
    id: usize,
    page: usize,
    slot: usize,
    title: usize,
    link: Option<usize>,
    sponsored: Option<usize>,
    active: Option<usize>,
    related_search: Option<usize>,
    created_at: Option<usize>,
}

/// Reads web results exported with the given tenant column names.
pub fn read_placements_csv<P: AsRef<Path>>(path: P, columns: &ColumnNames) -> Result<Vec<Placement>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| AllocError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_placements_from_reader(file, columns)
}

/// Reads web results from CSV.
/// - headers are matched case-insensitively; extra columns are ignored
/// - id, page, slot and title columns are required
/// - missing `active` means active, missing `sponsored` means not sponsored
/// - title and link keep their whitespace, other fields are trimmed
/// - an id may appear only once
pub fn read_placements_from_reader<R: Read>(
    reader: R,
    columns: &ColumnNames,
) -> Result<Vec<Placement>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| AllocError::CsvHeader(format!("Failed to read headers: {e}")))?
        .clone();
    let layout = PlacementColumns {
        id: require_column(&headers, &columns.id)?,
        page: require_column(&headers, &columns.page)?,
        slot: require_column(&headers, &columns.slot)?,
        title: require_column(&headers, &columns.title)?,
        link: find_column(&headers, &columns.link),
        sponsored: find_column(&headers, &columns.sponsored),
        active: find_column(&headers, &columns.active),
        related_search: find_column(&headers, &columns.related_search),
        created_at: find_column(&headers, &columns.created_at),
    };

    let mut placements = Vec::new();
    let mut ids = HashSet::new();
    for (i, result) in rdr.records().enumerate() {
        let rec = result?;
        let row = i + 2; // 1-indexed, after the header

        if is_blank(&rec) {
            continue;
        }
        let placement = parse_placement(&rec, row, &layout, columns)?;
        if !ids.insert(placement.id) {
            return Err(AllocError::CsvValue {
                row,
                column: columns.id.clone(),
                value: placement.id.to_string(),
            });
        }
        placements.push(placement);
    }
    Ok(placements)
}

fn parse_placement(
    rec: &StringRecord,
    row: usize,
    layout: &PlacementColumns,
    names: &ColumnNames,
) -> Result<Placement> {
    let id = parse_value::<u64>(rec, row, layout.id, &names.id)?;
    let page = parse_value::<u32>(rec, row, layout.page, &names.page)?;
    let slot = parse_value::<u32>(rec, row, layout.slot, &names.slot)?;
    let title = get_column_value(rec, row, layout.title, &names.title)?.to_string();

    let link = layout
        .link
        .and_then(|i| rec.get(i))
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string);
    let sponsored = match optional_value(rec, layout.sponsored) {
        Some(v) => parse_bool(v, row, &names.sponsored)?,
        None => false,
    };
    let active = match optional_value(rec, layout.active) {
        Some(v) => parse_bool(v, row, &names.active)?,
        None => true,
    };
    let related_search = optional_value(rec, layout.related_search)
        .map(|v| parse_str::<u64>(v, row, &names.related_search).map(RelatedSearchId))
        .transpose()?;
    let created_at = optional_value(rec, layout.created_at)
        .map(|v| parse_str::<DateTime<Utc>>(v, row, &names.created_at))
        .transpose()?;

    Ok(Placement {
        id: PlacementId(id),
        page_key: PageKey(page),
        slot,
        active,
        related_search,
        payload: Payload {
            title,
            link,
            sponsored,
        },
        created_at,
    })
}

/// Reads `id,page_number,title` related-search rows.
pub fn read_related_searches_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RelatedSearch>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| AllocError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_related_searches_from_reader(file)
}

pub fn read_related_searches_from_reader<R: Read>(reader: R) -> Result<Vec<RelatedSearch>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| AllocError::CsvHeader(format!("Failed to read headers: {e}")))?
        .clone();
    let id_col = require_column(&headers, RELATED_ID_HEADER)?;
    let page_col = require_column(&headers, RELATED_PAGE_HEADER)?;
    let title_col = find_column(&headers, RELATED_TITLE_HEADER);

    let mut searches = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let rec = result?;
        let row = i + 2;
        if is_blank(&rec) {
            continue;
        }
        searches.push(RelatedSearch {
            id: RelatedSearchId(parse_value(&rec, row, id_col, RELATED_ID_HEADER)?),
            page_number: PageKey(parse_value(&rec, row, page_col, RELATED_PAGE_HEADER)?),
            title: optional_value(&rec, title_col).unwrap_or_default().to_string(),
        });
    }
    Ok(searches)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn require_column(headers: &StringRecord, name: &str) -> Result<usize> {
    find_column(headers, name)
        .ok_or_else(|| AllocError::CsvHeader(format!("Missing required column '{name}'")))
}

fn get_column_value<'r>(
    rec: &'r StringRecord,
    row: usize,
    index: usize,
    column: &str,
) -> Result<&'r str> {
    rec.get(index).ok_or_else(|| AllocError::CsvRow {
        row,
        column: column.to_string(),
    })
}

fn is_blank(rec: &StringRecord) -> bool {
    rec.iter().all(|f| f.trim().is_empty())
}

/// Empty cells and short rows both read as "not given". Values come back trimmed.
fn optional_value(rec: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| rec.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(rec: &StringRecord, row: usize, index: usize, column: &str) -> Result<T> {
    parse_str(get_column_value(rec, row, index, column)?, row, column)
}

fn parse_str<T: FromStr>(value: &str, row: usize, column: &str) -> Result<T> {
    let value = value.trim();
    value.parse().map_err(|_| AllocError::CsvValue {
        row,
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(value: &str, row: usize, column: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Ok(true),
        "false" | "f" | "no" | "0" => Ok(false),
        _ => Err(AllocError::CsvValue {
            row,
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

use crate::config::TenantProfile;
use crate::error::{AllocError, Result};
use crate::placement::Placement;
use chrono::{Local, SecondsFormat};
use csv::WriterBuilder;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Writes placements as CSV using the tenant's column names.
///
/// Rows are ordered by page, then slot, then id.
pub fn write_placements<W: Write>(
    writer: W,
    placements: &[Placement],
    profile: &TenantProfile,
) -> Result<()> {
    #[allow(unused_mut)]
    let mut builder = WriterBuilder::new();
    #[cfg(windows)]
    {
        use csv::Terminator;
        builder = builder.terminator(Terminator::CRLF);
    }
    let mut wtr = builder.from_writer(writer);

    wtr.write_record(profile.columns.headers())?;

    let mut rows: Vec<&Placement> = placements.iter().collect();
    rows.sort_unstable_by_key(|p| (p.page_key, p.slot, p.id));

    for p in rows {
        let related = p.related_search.map(|r| r.to_string()).unwrap_or_default();
        let created = p
            .created_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        wtr.write_record([
            p.id.to_string().as_str(),
            p.page_key.to_string().as_str(),
            p.slot.to_string().as_str(),
            p.payload.title.as_str(),
            p.payload.link.as_deref().unwrap_or(""),
            bool_cell(p.payload.sponsored),
            bool_cell(p.active),
            related.as_str(),
            created.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Saves placements to `path`, replacing the file.
pub fn save_placements_csv(path: &Path, placements: &[Placement], profile: &TenantProfile) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| AllocError::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    let file = File::create(path).map_err(|e| AllocError::CreateFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_placements(BufWriter::new(file), placements, profile)
}

/// Exports placements to a timestamped file in `output_dir` (or the
/// working directory) and returns its path.
pub fn export_to_csv_with_path(
    placements: &[Placement],
    profile: &TenantProfile,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let filename = format!("{}_web_results_{timestamp}.csv", profile.name.to_lowercase());

    let file_path = if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir).map_err(|e| AllocError::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
        dir.join(&filename)
    } else {
        filename.into()
    };

    let file = File::create(&file_path).map_err(|e| AllocError::CreateFile {
        path: file_path.clone(),
        source: e,
    })?;
    write_placements(BufWriter::new(file), placements, profile)?;
    Ok(file_path)
}

fn bool_cell(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_reader::read_placements_csv;
    use crate::placement::{PageKey, Payload, PlacementId, RelatedSearchId};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn placement(id: u64, page: u32, slot: u32, title: &str) -> Placement {
        Placement {
            id: PlacementId(id),
            page_key: PageKey(page),
            slot,
            active: true,
            related_search: None,
            payload: Payload::titled(title),
            created_at: None,
        }
    }

    #[test]
    fn test_write_orders_by_page_then_slot() {
        let rows = vec![
            placement(3, 2, 0, "C"),
            placement(2, 1, 5, "B"),
            placement(1, 1, 1, "A"),
        ];
        let mut out = Vec::new();
        write_placements(&mut out, &rows, &TenantProfile::new("FastMoney")).unwrap();
        let content = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(
            lines[0],
            "id,page_no,position,title,link,is_sponsored,is_active,related_search_id,created_at"
        );
        assert!(lines[1].starts_with("1,1,1,A,"));
        assert!(lines[2].starts_with("2,1,5,B,"));
        assert!(lines[3].starts_with("3,2,0,C,"));
    }

    #[test]
    fn test_write_empty_list_is_header_only() {
        let mut out = Vec::new();
        let mut profile = TenantProfile::new("DataOrbit");
        profile.columns.slot = "slot".to_string();
        write_placements(&mut out, &[], &profile).unwrap();
        let content = String::from_utf8(out).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains(",slot,"));
    }

    #[test]
    fn test_save_then_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("fastmoney.csv");
        let profile = TenantProfile::new("FastMoney");

        let mut full = placement(1, 1, 0, "AcmeCo, Inc.");
        full.payload.link = Some("https://acme.example".to_string());
        full.payload.sponsored = true;
        full.related_search = Some(RelatedSearchId(10));
        full.created_at = Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
        let mut hidden = placement(2, 1, 1, " Hidden ");
        hidden.active = false;
        let rows = vec![full, hidden];

        save_placements_csv(&path, &rows, &profile).unwrap();
        let back = read_placements_csv(&path, &profile.columns).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_export_to_csv_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let rows = vec![placement(1, 1, 0, "A")];

        let path = export_to_csv_with_path(
            &rows,
            &TenantProfile::new("OfferGrabZone"),
            Some(temp_dir.path()),
        )
        .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("offergrabzone_web_results_"));
        assert!(name.ends_with(".csv"));
        assert!(path.exists());
    }

    #[test]
    fn test_export_to_invalid_directory() {
        let invalid_path = Path::new("/invalid/nonexistent/deeply/nested/path");
        let result = export_to_csv_with_path(&[], &TenantProfile::new("FastMoney"), Some(invalid_path));

        // Fails on most systems due to permissions
        if let Err(e) = result {
            let msg = e.to_string();
            assert!(
                msg.contains("Failed to create directory") || msg.contains("Failed to create file"),
                "Unexpected error: {e}"
            );
        }
    }
}

use crate::{
    constants::{
        DEFAULT_ACTIVE_COLUMN, DEFAULT_CREATED_AT_COLUMN, DEFAULT_ID_COLUMN, DEFAULT_LINK_COLUMN,
        DEFAULT_PAGE_COLUMN, DEFAULT_RELATED_SEARCH_COLUMN, DEFAULT_SLOT_COLUMN,
        DEFAULT_SLOT_WIDTH, DEFAULT_SPONSORED_COLUMN, DEFAULT_TITLE_COLUMN,
    },
    error::{AllocError, Result},
    placement::Slot,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};
use strum_macros::{Display, EnumString};

/// Tenant profiles, usually loaded from a TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tenants: Vec<TenantProfile>,
}

/// Per-site parameters of the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TenantProfile {
    pub name: String,
    #[serde(default = "default_slot_width")]
    pub slot_width: Slot,
    /// Run the conflict check for edits that move a placement.
    #[serde(default)]
    pub guard_edits: bool,
    #[serde(default)]
    pub page_source: PageSource,
    #[serde(default)]
    pub columns: ColumnNames,
}

/// Where the form takes a new placement's page from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PageSource {
    #[default]
    PageNumber,
    RelatedSearch,
}

/// Field names of a web-result record for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnNames {
    pub id: String,
    pub page: String,
    pub slot: String,
    pub title: String,
    pub link: String,
    pub sponsored: String,
    pub active: String,
    pub related_search: String,
    pub created_at: String,
}

fn default_slot_width() -> Slot {
    DEFAULT_SLOT_WIDTH
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: DEFAULT_ID_COLUMN.to_string(),
            page: DEFAULT_PAGE_COLUMN.to_string(),
            slot: DEFAULT_SLOT_COLUMN.to_string(),
            title: DEFAULT_TITLE_COLUMN.to_string(),
            link: DEFAULT_LINK_COLUMN.to_string(),
            sponsored: DEFAULT_SPONSORED_COLUMN.to_string(),
            active: DEFAULT_ACTIVE_COLUMN.to_string(),
            related_search: DEFAULT_RELATED_SEARCH_COLUMN.to_string(),
            created_at: DEFAULT_CREATED_AT_COLUMN.to_string(),
        }
    }
}

impl ColumnNames {
    /// Header row in output order.
    pub fn headers(&self) -> [&str; 9] {
        [
            self.id.as_str(),
            self.page.as_str(),
            self.slot.as_str(),
            self.title.as_str(),
            self.link.as_str(),
            self.sponsored.as_str(),
            self.active.as_str(),
            self.related_search.as_str(),
            self.created_at.as_str(),
        ]
    }
}

impl TenantProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot_width: DEFAULT_SLOT_WIDTH,
            guard_edits: false,
            page_source: PageSource::default(),
            columns: ColumnNames::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AllocError::InvalidConfiguration(
                "tenant name cannot be empty".to_string(),
            ));
        }
        if self.slot_width == 0 {
            return Err(AllocError::InvalidConfiguration(format!(
                "tenant '{}': slot_width must be at least 1",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in self.columns.headers() {
            if column.trim().is_empty() {
                return Err(AllocError::InvalidConfiguration(format!(
                    "tenant '{}': column names cannot be empty",
                    self.name
                )));
            }
            if !seen.insert(column.to_ascii_lowercase()) {
                return Err(AllocError::InvalidConfiguration(format!(
                    "tenant '{}': column '{}' is used twice",
                    self.name, column
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Config {
    /// Profiles of the five managed sites.
    pub fn builtin() -> Self {
        let related = |name: &str| TenantProfile {
            page_source: PageSource::RelatedSearch,
            ..TenantProfile::new(name)
        };
        let mut data_orbit = related("DataOrbit");
        data_orbit.columns.page = "page_number".to_string();
        data_orbit.columns.slot = "slot".to_string();

        Self {
            tenants: vec![
                TenantProfile::new("FastMoney"),
                TenantProfile::new("MingleMoody"),
                related("OfferGrabZone"),
                data_orbit,
                related("TejaStarin"),
            ],
        }
    }

    /// Reads and validates a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AllocError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tenants.is_empty() {
            return Err(AllocError::InvalidConfiguration(
                "at least one tenant must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for tenant in &self.tenants {
            tenant.validate()?;
            if !names.insert(tenant.name.to_ascii_lowercase()) {
                return Err(AllocError::InvalidConfiguration(format!(
                    "tenant '{}' is defined twice",
                    tenant.name
                )));
            }
        }
        Ok(())
    }

    /// Looks a tenant up by name, ignoring case.
    pub fn tenant(&self, name: &str) -> Result<&TenantProfile> {
        self.tenants
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| AllocError::UnknownTenant(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_is_valid() {
        let config = Config::builtin();
        config.validate().unwrap();
        assert_eq!(config.tenants.len(), 5);
        assert_eq!(
            config.tenant("offergrabzone").unwrap().page_source,
            PageSource::RelatedSearch
        );
        assert_eq!(config.tenant("DataOrbit").unwrap().columns.slot, "slot");
    }

    #[test]
    fn test_from_toml_with_defaults() {
        let config = Config::from_toml(
            r#"
            [[tenants]]
            name = "FastMoney"

            [[tenants]]
            name = "TejaStarin"
            slot_width = 6
            guard_edits = true
            page_source = "related-search"

            [tenants.columns]
            slot = "web_result_position"
            "#,
        )
        .unwrap();

        let fast = config.tenant("FastMoney").unwrap();
        assert_eq!(fast.slot_width, DEFAULT_SLOT_WIDTH);
        assert!(!fast.guard_edits);
        assert_eq!(fast.columns, ColumnNames::default());

        let teja = config.tenant("TejaStarin").unwrap();
        assert_eq!(teja.slot_width, 6);
        assert!(teja.guard_edits);
        assert_eq!(teja.page_source, PageSource::RelatedSearch);
        assert_eq!(teja.columns.slot, "web_result_position");
        assert_eq!(teja.columns.page, DEFAULT_PAGE_COLUMN);
    }

    #[test]
    fn test_sample_profiles_match_builtin() {
        let sample = Config::from_toml(include_str!("../../../config/tenants.toml")).unwrap();
        assert_eq!(sample.tenants, Config::builtin().tenants);
    }

    #[test]
    fn test_zero_slot_width_rejected() {
        let err = Config::from_toml(
            r#"
            [[tenants]]
            name = "FastMoney"
            slot_width = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("slot_width"));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut profile = TenantProfile::new("MingleMoody");
        profile.columns.title = "ID".to_string();
        let err = profile.validate().unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_duplicate_tenant_rejected() {
        let config = Config {
            tenants: vec![TenantProfile::new("DataOrbit"), TenantProfile::new("dataorbit")],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_config_rejected() {
        assert!(Config::from_toml("").is_err());
    }

    #[test]
    fn test_unknown_tenant() {
        let err = Config::builtin().tenant("Nowhere").unwrap_err();
        assert!(matches!(err, AllocError::UnknownTenant(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[[tenants]]\nname = \"OfferGrabZone\"\nslot_width = 8").unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.tenant("OfferGrabZone").unwrap().slot_width, 8);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load_from_file(Path::new("/nonexistent/tenants.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[test]
    fn test_page_source_text_form() {
        assert_eq!(PageSource::RelatedSearch.to_string(), "related-search");
        assert_eq!(
            "page-number".parse::<PageSource>().unwrap(),
            PageSource::PageNumber
        );
    }
}

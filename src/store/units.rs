// src/store/units.rs

//! Content units, unit filters and unit listings
//!
//! Both store implementations share the copy semantics defined here so that
//! filtering and mirroring behave identically regardless of backend.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use strum_macros::{Display, EnumString};

/// Kind of a content unit
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Rpm,
    Erratum,
    ModuleStream,
    Deb,
    File,
}

/// One piece of content held by a repository
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub unit_type: UnitType,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl Unit {
    pub fn rpm(name: &str, version: &str, arch: &str) -> Self {
        Self {
            unit_type: UnitType::Rpm,
            name: name.to_string(),
            version: version.to_string(),
            arch: Some(arch.to_string()),
        }
    }

    pub fn new(unit_type: UnitType, name: &str, version: &str) -> Self {
        Self {
            unit_type,
            name: name.to_string(),
            version: version.to_string(),
            arch: None,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.arch {
            Some(arch) => write!(f, "{}:{}-{}.{}", self.unit_type, self.name, self.version, arch),
            None => write!(f, "{}:{}-{}", self.unit_type, self.name, self.version),
        }
    }
}

/// Include or exclude units of one type whose name matches a glob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFilter {
    pub inclusion: bool,
    pub unit_type: UnitType,
    pub pattern: String,
}

/// How content is copied from a source repository into a target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOptions {
    /// Copy every unit, ignoring filters
    pub copy_all: bool,
    #[serde(default)]
    pub filters: Vec<UnitFilter>,
    /// Make the target hold exactly the selected units, removing the rest
    pub mirror: bool,
}

impl CopyOptions {
    pub fn all() -> Self {
        Self {
            copy_all: true,
            filters: Vec::new(),
            mirror: false,
        }
    }

    pub fn all_mirrored() -> Self {
        Self {
            copy_all: true,
            filters: Vec::new(),
            mirror: true,
        }
    }

    pub fn filtered(filters: Vec<UnitFilter>, mirror: bool) -> Self {
        Self {
            copy_all: filters.is_empty(),
            filters,
            mirror,
        }
    }
}

/// Result of a copy operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyStatus {
    pub copied: usize,
    pub removed: usize,
}

struct CompiledFilter {
    inclusion: bool,
    unit_type: UnitType,
    pattern: glob::Pattern,
}

/// Select the units that pass `filters`.
///
/// For each unit type, inclusion filters (if any) restrict the set to
/// matching names; exclusion filters then remove matching names. Types with
/// no filters pass through unchanged.
pub fn apply_filters<'a>(units: impl IntoIterator<Item = &'a Unit>, filters: &[UnitFilter]) -> Result<Vec<Unit>> {
    let compiled = filters
        .iter()
        .map(|f| {
            Ok(CompiledFilter {
                inclusion: f.inclusion,
                unit_type: f.unit_type,
                pattern: glob::Pattern::new(&f.pattern)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let selected = units
        .into_iter()
        .filter(|unit| {
            let mut inclusions = compiled
                .iter()
                .filter(|f| f.unit_type == unit.unit_type && f.inclusion)
                .peekable();
            let included = inclusions.peek().is_none() || inclusions.any(|f| f.pattern.matches(&unit.name));
            let excluded = compiled
                .iter()
                .filter(|f| f.unit_type == unit.unit_type && !f.inclusion)
                .any(|f| f.pattern.matches(&unit.name));
            included && !excluded
        })
        .cloned()
        .collect();
    Ok(selected)
}

/// Apply a copy to an in-memory target set and report what changed
pub fn copy_units(source: &BTreeSet<Unit>, target: &mut BTreeSet<Unit>, options: &CopyOptions) -> Result<CopyStatus> {
    let selected: BTreeSet<Unit> = if options.copy_all {
        source.clone()
    } else {
        apply_filters(source, &options.filters)?.into_iter().collect()
    };

    let mut status = CopyStatus::default();
    if options.mirror {
        let before = target.len();
        target.retain(|u| selected.contains(u));
        status.removed = before - target.len();
    }
    for unit in selected {
        if target.insert(unit) {
            status.copied += 1;
        }
    }
    Ok(status)
}

/// Listing file written for each exported repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitListing {
    pub units: Vec<Unit>,
}

/// Write a unit listing and return its sha256 checksum
pub fn write_listing(path: &Path, units: &BTreeSet<Unit>) -> Result<String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let listing = UnitListing {
        units: units.iter().cloned().collect(),
    };
    let bytes = serde_json::to_vec_pretty(&listing)?;
    fs::write(path, &bytes)?;
    Ok(checksum_bytes(&bytes))
}

pub fn read_listing(path: &Path) -> Result<Vec<Unit>> {
    let bytes = fs::read(path)
        .map_err(|e| Error::Store(format!("Cannot read unit listing {}: {}", path.display(), e)))?;
    let listing: UnitListing = serde_json::from_slice(&bytes)?;
    Ok(listing.units)
}

/// sha256 of a file's contents, hex encoded
pub fn file_checksum(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(checksum_bytes(&bytes))
}

fn checksum_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn units() -> BTreeSet<Unit> {
        [
            Unit::rpm("bash", "5.1-1", "x86_64"),
            Unit::rpm("bash-debuginfo", "5.1-1", "x86_64"),
            Unit::rpm("kernel", "6.1-1", "x86_64"),
            Unit::new(UnitType::Erratum, "RHSA-2024:1", "1"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_exclusion_filter() {
        let filters = vec![UnitFilter {
            inclusion: false,
            unit_type: UnitType::Rpm,
            pattern: "*-debuginfo".to_string(),
        }];
        let selected = apply_filters(&units(), &filters).unwrap();
        assert_eq!(selected.len(), 3);
        assert!(selected.iter().all(|u| u.name != "bash-debuginfo"));
    }

    #[test]
    fn test_inclusion_only_restricts_its_type() {
        let filters = vec![UnitFilter {
            inclusion: true,
            unit_type: UnitType::Rpm,
            pattern: "kernel*".to_string(),
        }];
        let selected = apply_filters(&units(), &filters).unwrap();
        let names: Vec<_> = selected.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["kernel", "RHSA-2024:1"]);
    }

    #[test]
    fn test_mirror_removes_unselected() {
        let source = units();
        let mut target: BTreeSet<Unit> = [Unit::rpm("old", "1-1", "noarch")].into_iter().collect();

        let status = copy_units(&source, &mut target, &CopyOptions::all_mirrored()).unwrap();
        assert_eq!(status.copied, 4);
        assert_eq!(status.removed, 1);
        assert_eq!(target, source);
    }

    #[test]
    fn test_plain_copy_keeps_existing() {
        let source = units();
        let mut target: BTreeSet<Unit> = [Unit::rpm("old", "1-1", "noarch")].into_iter().collect();

        let status = copy_units(&source, &mut target, &CopyOptions::all()).unwrap();
        assert_eq!(status.removed, 0);
        assert_eq!(target.len(), 5);
    }

    #[test]
    fn test_listing_checksum_matches_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repo.json");

        let checksum = write_listing(&path, &units()).unwrap();
        assert_eq!(file_checksum(&path).unwrap(), checksum);
        assert_eq!(read_listing(&path).unwrap().len(), 4);
    }
}

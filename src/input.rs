// Local input files.
//
// - The desired-set file is a JSON object keyed by subject DID; the values
//   are whatever the producing script stored and are ignored here.
// - The manual-changes file is TOML with `[Adds]` and `[Removes]` sections,
//   each holding an `identifiers` array of handles or DIDs.

use crate::error::{Error, Result};
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_DESIRED_FILE: &str = "processed_haters.json";
pub const DEFAULT_MANUAL_FILE: &str = "manual-changes.toml";

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Keys of the JSON object in `path`.
pub fn read_desired_subjects(path: &Path) -> Result<Vec<String>> {
    let data = read(path)?;
    let map: BTreeMap<String, IgnoredAny> =
        serde_json::from_str(&data).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(map.into_keys().collect())
}

#[derive(Debug, Default, Deserialize)]
struct Section {
    #[serde(default)]
    identifiers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ManualChangesFile {
    #[serde(default, rename = "Adds")]
    adds: Section,
    #[serde(default, rename = "Removes")]
    removes: Section,
}

/// Handles (or DIDs) to add and remove, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualChanges {
    pub adds: Vec<String>,
    pub removes: Vec<String>,
}

fn clean(identifiers: Vec<String>) -> Vec<String> {
    identifiers
        .into_iter()
        .map(|s| s.trim().trim_start_matches('@').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn parse_manual_changes(text: &str, path: &Path) -> Result<ManualChanges> {
    let file: ManualChangesFile = toml::from_str(text).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(ManualChanges {
        adds: clean(file.adds.identifiers),
        removes: clean(file.removes.identifiers),
    })
}

pub fn read_manual_changes(path: &Path) -> Result<ManualChanges> {
    let text = read(path)?;
    parse_manual_changes(&text, path)
}

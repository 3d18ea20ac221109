use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::resolver::policy::MergeStrategy;

/// Which fields drive the resolver, and how. Loaded from defaults,
/// an optional settings file, and `DEDUPE_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Field whose value marks a record as a confirmed duplicate.
    pub flag_field: String,
    /// Flag value selecting a record for merging.
    pub confirmed_value: String,
    /// Flag value written back to the survivor.
    pub cleared_value: String,
    /// Field holding references to a record's duplicate counterparts.
    pub link_field: String,
    /// Per-field merge strategy overrides; unlisted fields fill if empty.
    pub policies: BTreeMap<String, MergeStrategy>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut policies = BTreeMap::new();
        policies.insert("Primary Contact".to_string(), MergeStrategy::PreferEmail);
        policies.insert("Scouting Mandates".to_string(), MergeStrategy::UnionOptions);
        Settings {
            flag_field: "Duplicate".to_string(),
            confirmed_value: "Confirmed duplicate".to_string(),
            cleared_value: "No duplicate".to_string(),
            link_field: "Duplicate Of".to_string(),
            policies,
        }
    }
}

pub fn load(path: Option<&Path>) -> Result<Settings> {
    let mut builder = Config::builder();
    if let Some(p) = path {
        builder = builder.add_source(File::from(p));
    }
    let cfg = builder
        .add_source(Environment::with_prefix("DEDUPE"))
        .build()
        .context("Failed to load configuration")?;
    let settings: Settings = cfg
        .try_deserialize()
        .context("Invalid configuration")?;
    Ok(settings)
}

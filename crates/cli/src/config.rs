use anyhow::{anyhow, Context, Result};
use reasonscan_chunker::{ChunkerConfig, CleaningConfig};
use reasonscan_core::{AliasTable, RatingConfig, TaxonomyConfig};
use reasonscan_pipeline::RunConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Alias table shipped with the binary
pub const DEFAULT_ALIASES_TOML: &str = include_str!("../data/aliases.toml");

/// Every tunable of a run, loaded from one TOML file. Each section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReasonscanConfig {
    pub chunker: ChunkerConfig,
    pub cleaning: CleaningConfig,
    pub taxonomy: TaxonomyConfig,
    pub rating: RatingConfig,
    pub run: RunConfig,
}

impl ReasonscanConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve the effective alias table: the shipped defaults (unless
    /// disabled), then the config file's table, then any extra file.
    pub fn resolve_aliases(&mut self, use_defaults: bool, extra: Option<&Path>) -> Result<()> {
        let mut table = if use_defaults {
            default_aliases()?
        } else {
            AliasTable::new()
        };
        table
            .extend(&self.taxonomy.aliases)
            .context("Config alias table conflicts with the default table")?;
        if let Some(path) = extra {
            let extra_table = load_aliases(path)?;
            table
                .extend(&extra_table)
                .with_context(|| format!("Alias file {} conflicts", path.display()))?;
        }
        log::debug!("alias table: {} synonym(s)", table.len());
        self.taxonomy.aliases = table;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.chunker
            .validate()
            .map_err(|e| anyhow!("[chunker] {e}"))?;
        self.taxonomy.validate().context("[taxonomy]")?;
        self.rating.validate().context("[rating]")?;
        self.run.validate().context("[run]")?;
        Ok(())
    }
}

pub fn default_aliases() -> Result<AliasTable> {
    toml::from_str(DEFAULT_ALIASES_TOML).context("Built-in alias table is invalid")
}

pub fn load_aliases(path: &Path) -> Result<AliasTable> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read alias file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Invalid alias file {}", path.display()))
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::model::Domain;

/// On-disk shape of an alias table: `domain → { synonym → canonical }`
pub type RawAliasTable = BTreeMap<String, BTreeMap<String, String>>;

/// Collapse whitespace runs to single spaces and trim
#[must_use]
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Grouping key for a type name: case-folded, whitespace-collapsed
#[must_use]
pub fn normalize_label(raw: &str) -> String {
    collapse_whitespace(&raw.to_lowercase())
}

/// Result of resolving a raw type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// Normalized canonical name, the taxonomy grouping key
    pub key: String,

    /// Display spelling: the configured canonical, or the collapsed input
    pub display: String,

    /// Whether the alias table supplied the canonical name
    pub aliased: bool,
}

/// Domain-scoped synonym table. Data, not code: loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAliasTable", into = "RawAliasTable")]
pub struct AliasTable {
    /// normalized synonym → canonical display name, per domain
    synonyms: BTreeMap<Domain, BTreeMap<String, String>>,
}

impl AliasTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `synonym` as an alias of `canonical` within `domain`.
    /// The canonical name always resolves to itself.
    pub fn insert(&mut self, domain: Domain, synonym: &str, canonical: &str) -> Result<()> {
        let canonical = collapse_whitespace(canonical);
        if canonical.is_empty() {
            return Err(CoreError::invalid_config(format!(
                "empty canonical name for alias '{synonym}' in domain {domain}"
            )));
        }

        let table = self.synonyms.entry(domain).or_default();
        for name in [synonym, canonical.as_str()] {
            let key = normalize_label(name);
            if key.is_empty() {
                continue;
            }
            match table.get(&key) {
                Some(existing) if normalize_label(existing) != normalize_label(&canonical) => {
                    return Err(CoreError::invalid_config(format!(
                        "'{name}' in domain {domain} maps to both '{existing}' and '{canonical}'"
                    )));
                }
                Some(_) => {}
                None => {
                    table.insert(key, canonical.clone());
                }
            }
        }
        Ok(())
    }

    /// Merge another table into this one; conflicting mappings are rejected
    pub fn extend(&mut self, other: &Self) -> Result<()> {
        for (domain, table) in &other.synonyms {
            for (synonym, canonical) in table {
                self.insert(*domain, synonym, canonical)?;
            }
        }
        Ok(())
    }

    /// Resolve a raw type name within a domain
    #[must_use]
    pub fn resolve(&self, domain: Domain, raw: &str) -> ResolvedName {
        let normalized = normalize_label(raw);
        match self.synonyms.get(&domain).and_then(|t| t.get(&normalized)) {
            Some(canonical) => ResolvedName {
                key: normalize_label(canonical),
                display: canonical.clone(),
                aliased: true,
            },
            None => ResolvedName {
                key: normalized,
                display: collapse_whitespace(raw),
                aliased: false,
            },
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.synonyms.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<RawAliasTable> for AliasTable {
    type Error = CoreError;

    fn try_from(raw: RawAliasTable) -> Result<Self> {
        let mut table = Self::new();
        for (domain_name, entries) in raw {
            let domain = Domain::parse(&domain_name).ok_or_else(|| {
                CoreError::invalid_config(format!("unknown alias domain '{domain_name}'"))
            })?;
            for (synonym, canonical) in entries {
                table.insert(domain, &synonym, &canonical)?;
            }
        }
        Ok(table)
    }
}

impl From<AliasTable> for RawAliasTable {
    fn from(table: AliasTable) -> Self {
        table
            .synonyms
            .into_iter()
            .map(|(domain, entries)| (domain.payload_key().to_string(), entries))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> AliasTable {
        let mut t = AliasTable::new();
        t.insert(Domain::RhetoricalTactic, "Bandwagon Effect", "Bandwagon")
            .expect("insert");
        t.insert(Domain::Fallacy, "Strawman", "Straw Man").expect("insert");
        t
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_label("  Bandwagon\t  EFFECT "), "bandwagon effect");
    }

    #[test]
    fn resolves_synonyms_and_canonicals() {
        let t = table();
        let a = t.resolve(Domain::RhetoricalTactic, "bandwagon   effect");
        let b = t.resolve(Domain::RhetoricalTactic, "BANDWAGON");
        assert_eq!(a.key, "bandwagon");
        assert_eq!(a.display, "Bandwagon");
        assert!(a.aliased);
        assert_eq!(a, b);
    }

    #[test]
    fn aliases_are_domain_scoped() {
        let t = table();
        let r = t.resolve(Domain::Bias, "Bandwagon Effect");
        assert!(!r.aliased);
        assert_eq!(r.key, "bandwagon effect");
        assert_eq!(r.display, "Bandwagon Effect");
    }

    #[test]
    fn unmapped_names_pass_through_normalized() {
        let r = table().resolve(Domain::Fallacy, " Red   Herring ");
        assert_eq!(r.key, "red herring");
        assert_eq!(r.display, "Red Herring");
    }

    #[test]
    fn conflicting_mapping_rejected() {
        let mut t = table();
        let err = t.insert(Domain::RhetoricalTactic, "bandwagon effect", "Peer Pressure");
        assert!(err.is_err());
    }

    #[test]
    fn loads_from_toml_data() {
        let raw = r#"
            [rhetorical_tactics]
            "Bandwagon Effect" = "Bandwagon"
            "Appeal to popularity" = "Bandwagon"

            [F]
            "Ad hominem attack" = "Ad Hominem"
        "#;
        let t: AliasTable = toml::from_str(raw).expect("alias table");
        assert_eq!(t.resolve(Domain::RhetoricalTactic, "appeal to popularity").display, "Bandwagon");
        assert_eq!(t.resolve(Domain::Fallacy, "AD HOMINEM ATTACK").display, "Ad Hominem");
    }

    #[test]
    fn unknown_domain_rejected() {
        let raw = "[vibes]\n\"a\" = \"b\"\n";
        assert!(toml::from_str::<AliasTable>(raw).is_err());
    }
}

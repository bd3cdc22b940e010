//! Datastore resolvers

use sluice_core::domain::ConfigEntry;
use std::collections::BTreeMap;

use super::{Destination, DestinationResolver, config_value};
use crate::error::{Result, RuntimeError};

/// Table-like destinations, `<datastore>://<project>:<dataset>.<table>`
///
/// Reads the `PROJECT`, `DATASET` and `TABLE` task config keys.
#[derive(Debug, Clone)]
pub struct TableDestinationResolver {
    datastore: String,
}

impl TableDestinationResolver {
    pub fn new(datastore: impl Into<String>) -> Self {
        Self {
            datastore: datastore.into(),
        }
    }
}

impl DestinationResolver for TableDestinationResolver {
    fn resolve(&self, config: &[ConfigEntry], _assets: &BTreeMap<String, String>) -> Result<Destination> {
        let [project, dataset, table] = required(config, ["PROJECT", "DATASET", "TABLE"])?;
        Ok(Destination {
            urn: format!("{}://{}:{}.{}", self.datastore, project, dataset, table),
            type_tag: "table".to_string(),
        })
    }
}

/// Dataset-like destinations, `<datastore>://<project>:<dataset>`
#[derive(Debug, Clone)]
pub struct DatasetDestinationResolver {
    datastore: String,
}

impl DatasetDestinationResolver {
    pub fn new(datastore: impl Into<String>) -> Self {
        Self {
            datastore: datastore.into(),
        }
    }
}

impl DestinationResolver for DatasetDestinationResolver {
    fn resolve(&self, config: &[ConfigEntry], _assets: &BTreeMap<String, String>) -> Result<Destination> {
        let [project, dataset] = required(config, ["PROJECT", "DATASET"])?;
        Ok(Destination {
            urn: format!("{}://{}:{}", self.datastore, project, dataset),
            type_tag: "dataset".to_string(),
        })
    }
}

/// Fixed destination chosen by the caller
#[derive(Debug, Clone)]
pub struct StaticDestinationResolver {
    destination: Destination,
}

impl StaticDestinationResolver {
    pub fn new(urn: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            destination: Destination {
                urn: urn.into(),
                type_tag: type_tag.into(),
            },
        }
    }
}

impl DestinationResolver for StaticDestinationResolver {
    fn resolve(&self, _config: &[ConfigEntry], _assets: &BTreeMap<String, String>) -> Result<Destination> {
        Ok(self.destination.clone())
    }
}

fn required<'a, const N: usize>(config: &'a [ConfigEntry], keys: [&str; N]) -> Result<[&'a str; N]> {
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|key| config_value(config, key).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(RuntimeError::InvalidDestination(format!(
            "missing task config {}",
            missing.join(", ")
        )));
    }
    Ok(keys.map(|key| config_value(config, key).unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(entries: &[(&str, &str)]) -> Vec<ConfigEntry> {
        entries.iter().map(|(k, v)| ConfigEntry::new(*k, *v)).collect()
    }

    #[test]
    fn test_table_destination() {
        let resolver = TableDestinationResolver::new("bigquery");
        let dest = resolver
            .resolve(
                &config(&[("PROJECT", "proj"), ("DATASET", "playground"), ("TABLE", "sample")]),
                &BTreeMap::new(),
            )
            .unwrap();
        assert_eq!(dest.urn, "bigquery://proj:playground.sample");
        assert_eq!(dest.type_tag, "table");
    }

    #[test]
    fn test_table_destination_missing_keys() {
        let resolver = TableDestinationResolver::new("bigquery");
        let err = resolver
            .resolve(&config(&[("PROJECT", "proj")]), &BTreeMap::new())
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidDestination");
        assert!(err.to_string().contains("DATASET, TABLE"));
    }

    #[test]
    fn test_dataset_destination() {
        let resolver = DatasetDestinationResolver::new("bigquery");
        let dest = resolver
            .resolve(&config(&[("PROJECT", "proj"), ("DATASET", "playground")]), &BTreeMap::new())
            .unwrap();
        assert_eq!(dest.to_string(), "bigquery://proj:playground");
        assert_eq!(dest.type_tag, "dataset");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let resolver = TableDestinationResolver::new("bigquery");
        let cfg = config(&[("PROJECT", "p"), ("DATASET", "d"), ("TABLE", "t")]);
        let first = resolver.resolve(&cfg, &BTreeMap::new()).unwrap();
        let second = resolver.resolve(&cfg, &BTreeMap::new()).unwrap();
        assert_eq!(first, second);
    }
}

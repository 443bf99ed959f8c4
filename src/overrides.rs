//! Manual column mappings supplied as YAML.
//!
//! These stand in for the edits a user makes by hand in the mapping step:
//!
//! ```yaml
//! files:
//!   clients_main.xlsx:
//!     "Тел.": phone
//!     "Комментарий": ~
//! ```
//!
//! A `~` (null) value explicitly unmaps a column the keyword heuristic would
//! otherwise have picked up.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{error::MergeError, field::Field, source::SourceFile};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOverrides {
    #[serde(default)]
    pub files: BTreeMap<String, BTreeMap<String, Option<Field>>>,
}

impl MappingOverrides {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening mapping file {path:?}"))?;
        let overrides: MappingOverrides =
            serde_yaml::from_reader(BufReader::new(file)).context("Parsing mapping YAML")?;
        Ok(overrides)
    }

    /// Applies every override as a manual edit and returns how many columns
    /// were touched. Unknown files or columns are rejected.
    pub fn apply(&self, sources: &mut [SourceFile]) -> Result<usize, MergeError> {
        let mut applied = 0usize;
        for (file_name, columns) in &self.files {
            let source = sources
                .iter_mut()
                .find(|source| &source.name == file_name)
                .ok_or_else(|| MergeError::UnknownSource(file_name.clone()))?;
            for (column, field) in columns {
                source.assign(column, *field)?;
                applied += 1;
            }
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<SourceFile> {
        vec![SourceFile::new(
            "clients_main.xlsx",
            vec!["Тел.".into(), "Комментарий имя".into()],
            Vec::new(),
        )]
    }

    #[test]
    fn parses_fields_and_explicit_nulls() {
        let yaml = "files:\n  clients_main.xlsx:\n    \"Тел.\": phone\n    \"Комментарий имя\": ~\n";
        let overrides: MappingOverrides = serde_yaml::from_str(yaml).unwrap();
        let mut files = sources();
        assert_eq!(files[0].mapping().field(1), Some(Field::Name));

        assert_eq!(overrides.apply(&mut files).unwrap(), 2);
        assert_eq!(files[0].mapping().field(0), Some(Field::Phone));
        assert_eq!(files[0].mapping().field(1), None);
    }

    #[test]
    fn unknown_names_are_errors() {
        let yaml = "files:\n  other.xlsx:\n    phone: phone\n";
        let overrides: MappingOverrides = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            overrides.apply(&mut sources()).unwrap_err(),
            MergeError::UnknownSource("other.xlsx".into())
        );

        let yaml = "files:\n  clients_main.xlsx:\n    Email: personal\n";
        let overrides: MappingOverrides = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            overrides.apply(&mut sources()).unwrap_err(),
            MergeError::UnknownColumn { .. }
        ));
    }

    #[test]
    fn rejects_unknown_field_names() {
        let yaml = "files:\n  clients_main.xlsx:\n    \"Тел.\": email\n";
        assert!(serde_yaml::from_str::<MappingOverrides>(yaml).is_err());
    }
}

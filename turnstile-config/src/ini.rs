//! INI text parsing with section and key ordering preserved.

use std::path::Path;
use std::str::FromStr;

use tokio::fs;

use crate::{ConfigError, ConfigResult};

/// Section name assigned to key/value lines that appear before any header.
pub const DEFAULT_SECTION: &str = "undefined_section";

/// A named section holding its key/value entries in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Returns the section name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the key/value entries in insertion order. Duplicate keys are
    /// kept as separate entries.
    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Returns the first value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A parsed configuration file: sections in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    sections: Vec<Section>,
}

impl Config {
    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::MalformedLine`] on syntax errors.
    pub async fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = fs::read_to_string(path.as_ref()).await?;
        text.parse()
    }

    /// Returns all sections in file order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Returns the first section with the given name, if any.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Returns the first value stored under `key` in `section`, if any.
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(text: &str) -> ConfigResult<Self> {
        let mut sections: Vec<Section> = Vec::new();

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(ConfigError::MalformedLine { line: line_no });
                };
                sections.push(Section::new(name.trim()));
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedLine { line: line_no });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::MalformedLine { line: line_no });
            }

            if sections.is_empty() {
                sections.push(Section::new(DEFAULT_SECTION));
            }
            if let Some(section) = sections.last_mut() {
                section
                    .entries
                    .push((key.to_owned(), value.trim().to_owned()));
            }
        }

        Ok(Self { sections })
    }
}

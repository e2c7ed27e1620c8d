//! Run configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration:
//!
//! ```json
//! {
//!   "list_extension": "txt",
//!   "name_marker": ".evio",
//!   "output_format": "json",
//!   "output_extension": "root",
//!   "hits_bank": "TimeBasedTrkg::TBHits",
//!   "segments_bank": "TimeBasedTrkg::TBSegments"
//! }
//! ```

use crate::{Error, Result};
use dcwire_hipo::dc::{TB_HITS, TB_SEGMENTS};
use dcwire_hipo::DcBankNames;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

/// Output container format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Hdf5,
}

impl OutputFormat {
    /// File extension used when none is configured.
    #[must_use]
    pub fn default_extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Hdf5 => "h5",
        }
    }

    /// Whether this build can write the format.
    #[must_use]
    pub fn is_available(self) -> bool {
        match self {
            OutputFormat::Json => true,
            OutputFormat::Hdf5 => cfg!(feature = "hdf5"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Hdf5 => write!(f, "hdf5"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "hdf5" | "h5" => Ok(OutputFormat::Hdf5),
            other => Err(Error::Config(format!("unknown output format '{other}'"))),
        }
    }
}

/// Settings shared by every list file of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Extension (without dot) of list files picked up in batch mode.
    pub list_extension: String,
    /// Output names are cut at the first occurrence of this marker.
    pub name_marker: String,
    pub output_format: OutputFormat,
    /// Overrides the format's default extension (e.g. `root`).
    pub output_extension: Option<String>,
    pub hits_bank: String,
    pub segments_bank: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            list_extension: "txt".to_string(),
            name_marker: ".evio".to_string(),
            output_format: OutputFormat::Json,
            output_extension: None,
            hits_bank: TB_HITS.to_string(),
            segments_bank: TB_SEGMENTS.to_string(),
        }
    }
}

impl RunConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file cannot be read, parsed or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validated()
    }

    /// Loads a configuration from a JSON string.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the string cannot be parsed or fails
    /// validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validated()
    }

    /// Normalizes extensions and checks the settings.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for empty names or an output format this
    /// build cannot write.
    pub fn validated(mut self) -> Result<Self> {
        self.list_extension = self.list_extension.trim_start_matches('.').to_string();
        if self.list_extension.is_empty() {
            return Err(Error::Config("list_extension must not be empty".to_string()));
        }
        if let Some(ext) = self.output_extension.take() {
            let ext = ext.trim_start_matches('.');
            if ext.is_empty() {
                return Err(Error::Config(
                    "output_extension must not be empty".to_string(),
                ));
            }
            self.output_extension = Some(ext.to_string());
        }
        if self.hits_bank.is_empty() || self.segments_bank.is_empty() {
            return Err(Error::Config("bank names must not be empty".to_string()));
        }
        if !self.output_format.is_available() {
            return Err(Error::Config(format!(
                "output format {} is not available in this build",
                self.output_format
            )));
        }
        Ok(self)
    }

    /// Extension of output files: the configured one, or the format default.
    #[must_use]
    pub fn output_extension(&self) -> &str {
        self.output_extension
            .as_deref()
            .unwrap_or_else(|| self.output_format.default_extension())
    }

    /// Banks to read hits and segments from.
    #[must_use]
    pub fn bank_names(&self) -> DcBankNames {
        DcBankNames {
            hits: self.hits_bank.clone(),
            segments: self.segments_bank.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_json("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.output_extension(), "json");
        assert_eq!(config.bank_names(), DcBankNames::default());
    }

    #[test]
    fn test_overrides_are_normalized() {
        let config = RunConfig::from_json(
            r#"{"list_extension": ".lst", "output_extension": ".root", "name_marker": ""}"#,
        )
        .unwrap();
        assert_eq!(config.list_extension, "lst");
        assert_eq!(config.output_extension(), "root");
        assert!(config.name_marker.is_empty());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            RunConfig::from_json(r#"{"list_extension": ""}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RunConfig::from_json(r#"{"output_format": "root"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RunConfig::from_json(r#"{"hits_bank": "", "segments_bank": "x"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RunConfig::from_json(r#"{"typo_field": 1}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"segments_bank": "HitBasedTrkg::HBSegments"}}"#).unwrap();
        let config = RunConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bank_names().segments, "HitBasedTrkg::HBSegments");
        assert_eq!(config.bank_names().hits, TB_HITS);

        assert!(matches!(
            RunConfig::from_file("/nonexistent/dcwire.json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("h5".parse::<OutputFormat>().unwrap(), OutputFormat::Hdf5);
        assert!("root".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Hdf5.default_extension(), "h5");
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_hdf5_requires_feature() {
        assert!(RunConfig::from_json(r#"{"output_format": "hdf5"}"#).is_err());
    }
}

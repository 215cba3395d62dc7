use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsiParseError {
    #[error("A spectrum identifier must start with `mzspec:`, got {0:?}")]
    MissingPrefix(String),
    #[error("A spectrum identifier must name a dataset and a file, got {0:?}")]
    MissingComponent(String),
    #[error("Failed to parse the scan number {0:?}")]
    MalformedScan(String),
}

/// A Universal Spectrum Identifier, `mzspec:<dataset>:<file>[:scan:<n>]`.
///
/// Only the components needed to find a spectrum in an already available file are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usi {
    pub dataset: String,
    pub filename: String,
    pub scan: Option<u64>,
}

impl Usi {
    pub const PREFIX: &'static str = "mzspec";

    pub fn new(dataset: impl Into<String>, filename: impl Into<String>, scan: Option<u64>) -> Self {
        Self {
            dataset: dataset.into(),
            filename: filename.into(),
            scan,
        }
    }
}

impl FromStr for Usi {
    type Err = UsiParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut tokens = s.split(':');
        if tokens.next() != Some(Self::PREFIX) {
            return Err(UsiParseError::MissingPrefix(s.to_string()));
        }
        let (Some(dataset), Some(filename)) = (tokens.next(), tokens.next()) else {
            return Err(UsiParseError::MissingComponent(s.to_string()));
        };
        if dataset.is_empty() || filename.is_empty() {
            return Err(UsiParseError::MissingComponent(s.to_string()));
        }
        let scan = match (tokens.next(), tokens.next()) {
            (Some("scan"), Some(n)) => Some(
                n.parse()
                    .map_err(|_| UsiParseError::MalformedScan(n.to_string()))?,
            ),
            (Some("scan"), None) => return Err(UsiParseError::MalformedScan(String::new())),
            _ => None,
        };
        Ok(Self::new(dataset, filename, scan))
    }
}

impl Display for Usi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", Self::PREFIX, self.dataset, self.filename)?;
        if let Some(scan) = self.scan {
            write!(f, ":scan:{scan}")?;
        }
        Ok(())
    }
}

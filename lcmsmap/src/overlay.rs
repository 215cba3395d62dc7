//! Map an external table of annotations onto the channels of the map
use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("An IO error occurred reading the overlay: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse the overlay table: {0}")]
    Csv(#[from] csv::Error),
}

/// Guess the delimiter of a delimited text table from the start of it, tab if the header line
/// has one, comma otherwise.
pub fn sniff_delimiter(head: &[u8]) -> u8 {
    let header = head.split(|b| *b == b'\n').next().unwrap_or_default();
    if header.contains(&b'\t') {
        b'\t'
    } else {
        b','
    }
}

/// A table of string cells with named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl OverlayTable {
    /// Build a table, padding or truncating each row to the number of columns
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Read at most `row_limit` rows. Rows past the limit are ignored.
    pub fn from_reader<R: Read>(
        reader: R,
        delimiter: u8,
        row_limit: usize,
    ) -> Result<Self, OverlayError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|s| s.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records().take(row_limit) {
            let record = record?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }
        debug!("Read {} overlay rows with {} columns", rows.len(), columns.len());
        Ok(Self::new(columns, rows))
    }

    /// Read a table, sniffing whether it is tab or comma separated
    pub fn from_buffered<R: BufRead>(mut reader: R, row_limit: usize) -> Result<Self, OverlayError> {
        let delimiter = sniff_delimiter(reader.fill_buf()?);
        Self::from_reader(reader, delimiter, row_limit)
    }

    pub fn from_path<P: AsRef<Path>>(path: P, row_limit: usize) -> Result<Self, OverlayError> {
        let handle = io::BufReader::new(fs::File::open(path)?);
        Self::from_buffered(handle, row_limit)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let i = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[i].as_str()).collect())
    }

    /// Copy column `source` into column `dest`, creating it if needed
    fn copy_column(&mut self, source: usize, dest: &str) {
        let dest = match self.column_index(dest) {
            Some(i) => i,
            None => {
                self.columns.push(dest.to_string());
                for row in self.rows.iter_mut() {
                    row.push(String::new());
                }
                self.columns.len() - 1
            }
        };
        if dest == source {
            return;
        }
        for row in self.rows.iter_mut() {
            row[dest] = row[source].clone();
        }
    }
}

/// The named channels a plot can draw an overlay with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayChannel {
    Mz,
    Rt,
    Size,
    Color,
    Hover,
}

impl OverlayChannel {
    pub const fn name(&self) -> &'static str {
        match self {
            OverlayChannel::Mz => "mz",
            OverlayChannel::Rt => "rt",
            OverlayChannel::Size => "size",
            OverlayChannel::Color => "color",
            OverlayChannel::Hover => "hover",
        }
    }
}

/// Source column names for each channel and the row filter. Empty strings mean unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayAliases {
    pub mz: String,
    pub rt: String,
    pub filter_column: String,
    pub filter_value: String,
    pub size: String,
    pub color: String,
    pub hover: String,
}

/// One overlay row placed on the map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayPoint {
    pub rt: f64,
    pub mz: f64,
    pub size: Option<f64>,
    pub color: Option<String>,
    pub hover: Option<String>,
}

/// An overlay table with its populated channels
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayDataset {
    pub table: OverlayTable,
    pub channels: Vec<OverlayChannel>,
}

impl OverlayDataset {
    pub fn has_channel(&self, channel: OverlayChannel) -> bool {
        self.channels.contains(&channel)
    }

    /// The values of a channel, `None` if it was not populated
    pub fn channel(&self, channel: OverlayChannel) -> Option<Vec<&str>> {
        if !self.has_channel(channel) {
            return None;
        }
        self.table.column(channel.name())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The rows that can be placed on the map, those whose `rt` and `mz` channels are numbers
    pub fn points(&self) -> Vec<OverlayPoint> {
        let (Some(rts), Some(mzs)) = (
            self.channel(OverlayChannel::Rt),
            self.channel(OverlayChannel::Mz),
        ) else {
            return Vec::new();
        };
        let sizes = self.channel(OverlayChannel::Size);
        let colors = self.channel(OverlayChannel::Color);
        let hovers = self.channel(OverlayChannel::Hover);

        rts.iter()
            .zip(mzs.iter())
            .enumerate()
            .filter_map(|(i, (rt, mz))| {
                let rt = rt.trim().parse::<f64>().ok()?;
                let mz = mz.trim().parse::<f64>().ok()?;
                Some(OverlayPoint {
                    rt,
                    mz,
                    size: sizes.as_ref().and_then(|v| v[i].trim().parse().ok()),
                    color: colors.as_ref().map(|v| v[i].to_string()),
                    hover: hovers.as_ref().map(|v| v[i].to_string()),
                })
            })
            .collect()
    }
}

fn populate(
    table: &mut OverlayTable,
    channels: &mut Vec<OverlayChannel>,
    channel: OverlayChannel,
    alias: &str,
) {
    if alias.is_empty() {
        return;
    }
    match table.column_index(alias) {
        Some(i) => {
            table.copy_column(i, channel.name());
            channels.push(channel);
        }
        None => debug!("Overlay has no column {alias} for {}", channel.name()),
    }
}

/// Alias the requested columns onto overlay channels and apply the row filter.
///
/// Position channels are populated before filtering and the rest after. Requested columns that
/// do not exist are skipped, and columns that are not aliased are kept as-is.
#[instrument(level = "debug", skip(table))]
pub fn resolve_overlay(table: OverlayTable, aliases: &OverlayAliases) -> OverlayDataset {
    let mut table = table;
    let mut channels = Vec::new();

    populate(&mut table, &mut channels, OverlayChannel::Mz, &aliases.mz);
    populate(&mut table, &mut channels, OverlayChannel::Rt, &aliases.rt);

    if !aliases.filter_column.is_empty() && !aliases.filter_value.is_empty() {
        if let Some(i) = table.column_index(&aliases.filter_column) {
            let before = table.len();
            table.rows.retain(|row| row[i] == aliases.filter_value);
            debug!(
                "Kept {} of {before} overlay rows where {} = {}",
                table.len(),
                aliases.filter_column,
                aliases.filter_value
            );
        }
    }

    populate(&mut table, &mut channels, OverlayChannel::Size, &aliases.size);
    populate(&mut table, &mut channels, OverlayChannel::Color, &aliases.color);
    populate(&mut table, &mut channels, OverlayChannel::Hover, &aliases.hover);

    OverlayDataset { table, channels }
}

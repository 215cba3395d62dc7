use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use tracing::debug;

use lcmsmap::{
    Bounds, HighlightMarker, LcmsMap, OverlayChannel, OverlayPoint, RunSummary, Selection,
    TotalIonChromatogram, Usi,
};

/// Everything computed for one input file, written out as a single JSON document
#[derive(Debug, Clone, Serialize)]
pub struct MapReport {
    pub input_file: String,
    pub usi: Option<Usi>,
    pub selection: Selection,
    pub highlight: Option<HighlightMarker>,
    pub rendering_bounds: Bounds,
    pub map: LcmsMap,
    pub summary: RunSummary,
    pub tic: Option<TotalIonChromatogram>,
    pub overlay_channels: Vec<OverlayChannel>,
    pub overlay_points: Vec<OverlayPoint>,
}

fn write_json<W: Write>(mut writer: W, report: &MapReport) -> io::Result<W> {
    serde_json::to_writer(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(writer)
}

/// Write `report` to `path`, or STDOUT if `path` is `-`. Paths ending in `.gz` are gzip
/// compressed.
pub fn write_report(path: &Path, report: &MapReport) -> io::Result<()> {
    if path == Path::new("-") {
        let stdout = io::stdout();
        let _lock = write_json(stdout.lock(), report)?;
        return Ok(());
    }
    let handle = io::BufWriter::new(fs::File::create(path)?);
    let compressed = path.extension().is_some_and(|ext| ext == "gz");
    debug!("Writing report to {} (compressed? {compressed})", path.display());
    if compressed {
        let encoder = GzEncoder::new(handle, Compression::best());
        write_json(encoder, report)?.finish()?;
    } else {
        write_json(handle, report)?;
    }
    Ok(())
}

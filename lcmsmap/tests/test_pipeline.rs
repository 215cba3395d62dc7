use std::io;

use mzdata::prelude::*;
use mzdata::{spectrum::ScanPolarity, MZReader};

use lcmsmap::{
    build_map, locate_time_index, resolve_selection, summarize_run, total_ion_chromatogram,
    AxisOverrides, Bounds, MapParams, MzDataRun, SelectionInputs, SelectionSource, SpectrumRun,
    StreamStrategy, Usi,
};

fn open_run() -> io::Result<MzDataRun<MZReader<std::fs::File>>> {
    let reader = MZReader::open_path("./tests/data/small.mzML")?;
    Ok(MzDataRun::new(reader))
}

#[test_log::test]
fn test_read_run() -> io::Result<()> {
    let mut run = open_run()?;
    assert_eq!(run.len(), 30);

    let spec = run.get(3).unwrap();
    assert_eq!(spec.ms_level, 1);
    assert!((spec.time - 0.3).abs() < 1e-9);
    assert_eq!(spec.id, "controllerType=0 controllerNumber=1 scan=4");
    assert_eq!(spec.peaks.len(), 200);

    let spec = run.get_by_scan_number(5).unwrap();
    assert_eq!(spec.index, 4);
    assert_eq!(spec.ms_level, 2);
    assert_eq!(spec.precursor_mz, Some(404.0));

    assert!(run.get(30).is_err());
    assert_eq!(locate_time_index(&mut run, 1.0).unwrap(), 10);
    assert_eq!(locate_time_index(&mut run, 1.05).unwrap(), 11);
    Ok(())
}

#[test_log::test]
fn test_full_map() -> io::Result<()> {
    let mut run = open_run()?;
    let map = build_map(&mut run, &Bounds::MAP_DEFAULT, &MapParams::default());
    assert_eq!(map.progress.ms1_spectra, 10);
    assert_eq!(map.progress.msn_spectra, 20);
    assert_eq!(map.progress.ms1_peaks, 10 * 150);
    assert_eq!(map.ms2_points.len(), 20);
    assert_eq!((map.grid.width, map.grid.height), (40, 18));
    assert!(map.grid.has_signal());
    Ok(())
}

#[test_log::test]
fn test_indexed_matches_linear() -> io::Result<()> {
    let mut run = open_run()?;
    let bounds = Bounds::new(0.75, 2.05, 350.0, 450.0);

    let indexed = build_map(&mut run, &bounds, &MapParams::default());
    let linear = build_map(
        &mut run,
        &bounds,
        &MapParams {
            strategy: StreamStrategy::Linear,
            ..Default::default()
        },
    );
    assert_eq!(indexed.grid, linear.grid);
    assert_eq!(indexed.ms2_points, linear.ms2_points);
    assert_eq!(indexed.progress.ms1_spectra, 4);
    assert_eq!(indexed.progress.ms1_spectra, linear.progress.ms1_spectra);
    assert!(indexed.progress.out_of_window < linear.progress.out_of_window);
    Ok(())
}

#[test_log::test]
fn test_selection_from_usi() -> io::Result<()> {
    let mut run = open_run()?;
    let usi: Usi = "mzspec:MSV000000000:small:scan:5".parse().unwrap();
    let inputs = SelectionInputs {
        requested_scan: usi.scan,
        overrides: AxisOverrides::from_strings("", "", "", "406"),
        ..Default::default()
    };
    let (selection, highlight) = resolve_selection(&mut run, &inputs);
    let bounds = selection.bounds;
    assert_eq!(bounds.min_rt, 0.0);
    assert!((bounds.max_rt - 0.9).abs() < 1e-9);
    assert_eq!(bounds.min_mz, 401.0);
    assert_eq!(bounds.max_mz, 406.0);
    assert_eq!(selection.provenance.max_mz, SelectionSource::ExplicitOverride);
    assert_eq!(selection.provenance.min_mz, SelectionSource::ScanCentering);
    assert!(highlight.is_some());

    let map = build_map(&mut run, &selection.rendering_bounds(), &MapParams::default());
    assert_eq!(map.ms2_points.len(), 4);
    Ok(())
}

#[test_log::test]
fn test_summary() -> io::Result<()> {
    let mut run = open_run()?;
    let summary = summarize_run(&mut run);
    assert_eq!(summary.spectrum_count, 30);
    assert_eq!(summary.ms1_spectra, 10);
    assert_eq!(summary.positive, 30);
    assert_eq!(summary.polarity(), ScanPolarity::Positive);

    let tic = total_ion_chromatogram(&mut run);
    assert_eq!(tic.len(), 10);
    assert!((tic.times[1] - 18.0).abs() < 1e-6);
    Ok(())
}

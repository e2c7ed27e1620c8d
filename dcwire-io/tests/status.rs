#![allow(clippy::cast_precision_loss)]
use dcwire_core::{BadWire, OccupancyAccumulator, OccupancyHistograms, RawHit, RawSegment};
use dcwire_io::{process_status, OutputContainer, OutputFormat};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const HITS_PER_WIRE: usize = 20;

/// Uniform occupancy on wires 1..=112 with the listed wires left dead.
fn detector_run(dead: &[(i32, i32, i32, i32)]) -> OccupancyHistograms {
    let mut acc = OccupancyAccumulator::new();
    for sector in 1..=6 {
        for superlayer in 1..=6 {
            for wire in 1..=112 {
                for _ in 0..HITS_PER_WIRE {
                    acc.fill_segment(RawSegment::new(sector, superlayer, wire as f32))
                        .unwrap();
                }
                for layer in 1..=6 {
                    if dead.contains(&(sector, superlayer, layer, wire)) {
                        continue;
                    }
                    for _ in 0..HITS_PER_WIRE {
                        acc.fill_hit(RawHit::new(sector, layer, superlayer, wire)).unwrap();
                    }
                }
            }
        }
    }
    acc.finish().0
}

fn write_container(path: &Path, grid: &OccupancyHistograms) {
    OutputContainer::create(path, OutputFormat::Json)
        .unwrap()
        .write_overview(grid, &[])
        .unwrap();
}

#[test]
fn test_dead_wire_reaches_every_table() {
    let dir = tempdir().unwrap();
    let container = dir.path().join("run5038.json");
    write_container(&container, &detector_run(&[(4, 2, 3, 50), (1, 1, 1, 3)]));
    let out = dir.path().join("status");

    let report = process_status(&container, &out).unwrap();
    assert_eq!(report.run, "5038");
    assert_eq!(report.directory, out.join("5038"));
    assert_eq!(
        report.bad_wires,
        vec![BadWire {
            superlayer: 2,
            sector: 4,
            layer: 3,
            wire: 50
        }]
    );
    assert!(report.files.iter().all(|f| f.is_file()));

    let run_dir = out.join("5038");
    assert_eq!(
        fs::read_to_string(run_dir.join("results/SL2/BWsec4.csv")).unwrap(),
        "Super Layer,Sector,Layer,Wire\n2,4,3,50\n"
    );
    assert!(!run_dir.join("results/SL1/BWsec1.csv").exists());
    assert_eq!(
        fs::read_to_string(run_dir.join("BW_total.dat")).unwrap(),
        "Super Layer,Sector,Layer,Wire\n2,4,3,50\n"
    );
    assert_eq!(
        fs::read_to_string(run_dir.join("BW_only_ccdb.dat")).unwrap(),
        "sector,layer,component,status\n4,9,50,112\n"
    );
    let grid = fs::read_to_string(run_dir.join("BW_ccdb.dat")).unwrap();
    let flagged: Vec<&str> = grid.lines().filter(|l| l.ends_with(" 112")).collect();
    assert_eq!(flagged, vec!["4 9 50 112"]);
}

#[test]
fn test_rerun_replaces_previous_results() {
    let dir = tempdir().unwrap();
    let container = dir.path().join("run77.json");
    let out = dir.path().join("status");

    write_container(&container, &detector_run(&[(6, 5, 1, 80)]));
    process_status(&container, &out).unwrap();
    assert!(out.join("77/results/SL5/BWsec6.csv").is_file());

    write_container(&container, &detector_run(&[]));
    let report = process_status(&container, &out).unwrap();
    assert!(report.bad_wires.is_empty());
    assert!(!out.join("77/results/SL5/BWsec6.csv").exists());
    assert_eq!(
        fs::read_to_string(out.join("77/BW_total.dat")).unwrap(),
        "Super Layer,Sector,Layer,Wire\n"
    );
}

#[test]
fn test_container_without_grid_is_rejected() {
    let dir = tempdir().unwrap();
    let container = dir.path().join("run9.json");
    fs::write(&container, r#"{"format_version": "1.0", "sources": [], "groups": {"overview": []}}"#).unwrap();

    assert!(process_status(&container, dir.path().join("status")).is_err());
    assert!(!dir.path().join("status/9").exists());
}

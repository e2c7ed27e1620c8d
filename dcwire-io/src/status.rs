//! Wire status tables.
//!
//! [`process_status`] reads an overview container back, selects the bad
//! wires and writes them out for calibration:
//!
//! - `results/SL{n}/BWsec{s}.csv`: one file per superlayer and sector with
//!   bad wires,
//! - `BW_SL{n}.dat` and `BW_total.dat`: the same rows concatenated,
//! - `BW_only_ccdb.dat`: the bad wires as CCDB rows,
//! - `BW_ccdb.dat`: the full sector/layer/component grid with a status for
//!   every wire.
//!
//! Everything lands in `<output_dir>/<run>/`, where `<run>` is the run
//! number taken from the container name.

use crate::output::read_overview;
use crate::Result;
use dcwire_core::{find_bad_wires, BadWire, N_SECTORS, N_SUPERLAYERS};
use std::collections::BTreeSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// CCDB status word of a bad wire; good wires carry 0.
pub const BAD_WIRE_STATUS: u32 = 112;
/// Layers per sector in the CCDB table.
pub const CCDB_LAYERS: u16 = 36;
/// Wires per layer in the CCDB table.
pub const CCDB_COMPONENTS: u16 = 112;

const WIRE_HEADER: &str = "Super Layer,Sector,Layer,Wire";
const RESULTS_DIR: &str = "results";

/// Files written for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub run: String,
    pub directory: PathBuf,
    pub bad_wires: Vec<BadWire>,
    /// Every file written, per-sector files first.
    pub files: Vec<PathBuf>,
}

/// Run label of a container: the digits ending its file stem, or the whole
/// stem when there are none.
#[must_use]
pub fn run_label(container: &Path) -> String {
    let stem = container
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        stem
    } else {
        stem[stem.len() - digits..].to_string()
    }
}

fn wire_row(wire: &BadWire) -> String {
    format!(
        "{},{},{},{}",
        wire.superlayer, wire.sector, wire.layer, wire.wire
    )
}

fn write_table<I>(path: &Path, header: &str, rows: I) -> Result<()>
where
    I: IntoIterator<Item = String>,
{
    let mut writer = BufWriter::new(fs::File::create(path)?);
    writeln!(writer, "{header}")?;
    for row in rows {
        writeln!(writer, "{row}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `results/SL{n}/BWsec{s}.csv` under `directory`.
///
/// Existing CSV files in each superlayer directory are removed first; a
/// sector without bad wires gets no file.
///
/// # Errors
/// Returns an error if a directory or file cannot be written.
#[allow(clippy::cast_possible_truncation)]
pub fn write_sector_files(bad: &[BadWire], directory: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for sl in 1..=N_SUPERLAYERS as u8 {
        let sl_dir = directory.join(RESULTS_DIR).join(format!("SL{sl}"));
        fs::create_dir_all(&sl_dir)?;
        for entry in fs::read_dir(&sl_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
                fs::remove_file(&path)?;
            }
        }

        for sec in 1..=N_SECTORS as u8 {
            let rows: Vec<String> = bad
                .iter()
                .filter(|w| w.superlayer == sl && w.sector == sec)
                .map(wire_row)
                .collect();
            if rows.is_empty() {
                continue;
            }
            let path = sl_dir.join(format!("BWsec{sec}.csv"));
            write_table(&path, WIRE_HEADER, rows)?;
            written.push(path);
        }
    }
    Ok(written)
}

/// Writes the summary and CCDB tables into `directory`.
///
/// # Errors
/// Returns an error if a file cannot be written.
#[allow(clippy::cast_possible_truncation)]
pub fn write_tables(bad: &[BadWire], directory: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(directory)?;
    let mut written = Vec::new();

    for sl in 1..=N_SUPERLAYERS as u8 {
        let path = directory.join(format!("BW_SL{sl}.dat"));
        let rows = bad.iter().filter(|w| w.superlayer == sl).map(wire_row);
        write_table(&path, WIRE_HEADER, rows)?;
        written.push(path);
    }

    let path = directory.join("BW_total.dat");
    write_table(&path, WIRE_HEADER, bad.iter().map(wire_row))?;
    written.push(path);

    let ccdb: BTreeSet<(u8, u16, u16)> = bad
        .iter()
        .map(|w| (w.sector, w.global_layer(), w.wire))
        .collect();

    let path = directory.join("BW_only_ccdb.dat");
    let rows = ccdb
        .iter()
        .map(|(s, l, c)| format!("{s},{l},{c},{BAD_WIRE_STATUS}"));
    write_table(&path, "sector,layer,component,status", rows)?;
    written.push(path);

    let path = directory.join("BW_ccdb.dat");
    let rows = (1..=N_SECTORS as u8).flat_map(|s| {
        let ccdb = &ccdb;
        (1..=CCDB_LAYERS).flat_map(move |l| {
            (1..=CCDB_COMPONENTS).map(move |c| {
                let status = if ccdb.contains(&(s, l, c)) {
                    BAD_WIRE_STATUS
                } else {
                    0
                };
                format!("{s} {l} {c} {status}")
            })
        })
    });
    write_table(&path, "sector layer component status", rows)?;
    written.push(path);

    Ok(written)
}

/// Selects the bad wires of one overview container and writes every table.
///
/// # Errors
/// Returns an error if the container cannot be read or lacks histograms, or
/// if an output file cannot be written.
pub fn process_status<P, Q>(container: P, output_dir: Q) -> Result<StatusReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let container = container.as_ref();
    let start = Instant::now();
    let grid = read_overview(container)?.into_grid()?;
    let bad_wires = find_bad_wires(&grid);

    let run = run_label(container);
    let directory = output_dir.as_ref().join(&run);
    fs::create_dir_all(&directory)?;
    let mut files = write_sector_files(&bad_wires, &directory)?;
    files.extend(write_tables(&bad_wires, &directory)?);

    log::info!(
        "run {run}: {} bad wires, {} files in {} ({:.2?})",
        bad_wires.len(),
        files.len(),
        directory.display(),
        start.elapsed()
    );
    Ok(StatusReport {
        run,
        directory,
        bad_wires,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn wire(superlayer: u8, sector: u8, layer: u8, wire: u16) -> BadWire {
        BadWire {
            superlayer,
            sector,
            layer,
            wire,
        }
    }

    #[test]
    fn test_run_label() {
        assert_eq!(run_label(Path::new("out/run5038.json")), "5038");
        assert_eq!(run_label(Path::new("out/run5038.evio.root")), "run5038.evio");
        assert_eq!(run_label(Path::new("fileA.json")), "fileA");
        assert_eq!(run_label(Path::new("12.h5")), "12");
    }

    #[test]
    fn test_sector_files_replace_stale_csv() {
        let dir = tempdir().unwrap();
        let sl2 = dir.path().join("results/SL2");
        fs::create_dir_all(&sl2).unwrap();
        fs::write(sl2.join("BWsec6.csv"), "old").unwrap();
        fs::write(sl2.join("keep.txt"), "other").unwrap();

        let bad = [wire(2, 1, 3, 17), wire(2, 1, 4, 18), wire(5, 6, 1, 99)];
        let written = write_sector_files(&bad, dir.path()).unwrap();
        assert_eq!(
            written,
            vec![
                sl2.join("BWsec1.csv"),
                dir.path().join("results/SL5/BWsec6.csv")
            ]
        );
        assert_eq!(
            fs::read_to_string(sl2.join("BWsec1.csv")).unwrap(),
            "Super Layer,Sector,Layer,Wire\n2,1,3,17\n2,1,4,18\n"
        );
        assert!(!sl2.join("BWsec6.csv").exists());
        assert!(sl2.join("keep.txt").exists());
        assert!(dir.path().join("results/SL1").is_dir());
    }

    #[test]
    fn test_tables() {
        let dir = tempdir().unwrap();
        let bad = [wire(1, 2, 6, 40), wire(3, 1, 2, 7), wire(3, 2, 1, 105)];
        let written = write_tables(&bad, dir.path()).unwrap();
        assert_eq!(written.len(), 9);

        let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read("BW_SL2.dat"), "Super Layer,Sector,Layer,Wire\n");
        assert_eq!(
            read("BW_SL3.dat"),
            "Super Layer,Sector,Layer,Wire\n3,1,2,7\n3,2,1,105\n"
        );
        assert_eq!(read("BW_total.dat").lines().count(), 4);
        assert_eq!(
            read("BW_only_ccdb.dat"),
            "sector,layer,component,status\n1,14,7,112\n2,6,40,112\n2,13,105,112\n"
        );

        let grid = read("BW_ccdb.dat");
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines.len(), 1 + 6 * 36 * 112);
        assert_eq!(lines[0], "sector layer component status");
        assert_eq!(lines[1], "1 1 1 0");
        assert_eq!(*lines.last().unwrap(), "6 36 112 0");
        let flagged: Vec<&str> = lines.iter().copied().filter(|l| l.ends_with(" 112")).collect();
        assert_eq!(flagged, vec!["1 14 7 112", "2 6 40 112", "2 13 105 112"]);
    }

    #[test]
    fn test_missing_container() {
        let dir = tempdir().unwrap();
        let err = process_status(dir.path().join("run1.json"), dir.path()).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
        assert!(!dir.path().join("1").exists());
    }
}

#![allow(clippy::cast_precision_loss, clippy::uninlined_format_args)]
use dcwire_core::{DcEvent, OccupancyAccumulator, OccupancyHistograms, RawHit, RawSegment};
use dcwire_hipo::{
    standard_dictionary, Compression, DcBankLayout, DcBankNames, Event, HipoWriter,
};
use dcwire_io::{
    generate_lists, process_directory, process_list_file, read_overview, Error, RunConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_run(path: &Path, run: &[DcEvent]) {
    let dictionary = standard_dictionary();
    let layout = DcBankLayout::resolve(&dictionary, &DcBankNames::default()).unwrap();
    let mut writer = HipoWriter::create(path, &dictionary, Compression::Lz4).unwrap();
    writer.set_events_per_record(16);
    let mut event = Event::new();
    for source in run {
        layout.write_event(source, &mut event).unwrap();
        writer.write_event(&event).unwrap();
    }
    writer.close().unwrap();
}

fn run_for(seed: i32, events: i32) -> Vec<DcEvent> {
    (0..events)
        .map(|i| {
            let n = seed * 31 + i;
            let hits = (0..1 + n % 4)
                .map(|k| RawHit::new(1 + n % 6, 1 + k % 6, 1 + (n + k) % 6, (n * 5 + k) % 112))
                .collect();
            let segments = vec![RawSegment::new(1 + (n + 2) % 6, 1 + n % 6, (n % 100) as f32 + 0.5)];
            DcEvent::new(hits, segments)
        })
        .collect()
}

fn expected_grid(runs: &[&[DcEvent]]) -> OccupancyHistograms {
    let mut acc = OccupancyAccumulator::new();
    for run in runs {
        for event in *run {
            acc.process_event(event);
        }
    }
    acc.finish().0
}

fn write_list(path: &Path, files: &[PathBuf]) {
    let text: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
    fs::write(path, text.join("\n")).unwrap();
}

#[test]
fn test_directory_scan_ignores_other_extensions() {
    let data = tempdir().unwrap();
    let lists = tempdir().unwrap();
    let out = tempdir().unwrap();

    let data_file = data.path().join("fileA.evio.hipo");
    let run = run_for(1, 40);
    write_run(&data_file, &run);
    write_list(&lists.path().join("listA.txt"), &[data_file]);
    fs::write(lists.path().join("notes.md"), "not a list").unwrap();

    let report = process_directory(lists.path(), out.path(), &RunConfig::default()).unwrap();
    assert!(report.is_success());
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.total_events(), 40);

    let outputs: Vec<PathBuf> = fs::read_dir(out.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(outputs, vec![out.path().join("fileA.json")]);

    let grid = read_overview(&outputs[0]).unwrap().into_grid().unwrap();
    assert_eq!(grid, expected_grid(&[&run]));
}

#[test]
fn test_output_named_after_first_listed_file() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    let first = data.path().join("run123.evio.0001.hipo");
    let second = data.path().join("run999.evio.0002.hipo");
    write_run(&first, &run_for(2, 10));
    write_run(&second, &run_for(3, 10));
    let list = data.path().join("run123.txt");
    write_list(&list, &[first, second]);

    let config = RunConfig::from_json(r#"{"output_extension": "root"}"#).unwrap();
    let outcome = process_list_file(&list, out.path(), &config).unwrap();
    assert_eq!(outcome.output, out.path().join("run123.root"));
    assert_eq!(outcome.files, 2);
    assert_eq!(outcome.statistics.events, 20);
    assert!(outcome.output.is_file());
    assert!(!out.path().join("run999.root").exists());
}

#[test]
fn test_merged_list_equals_sum_of_single_lists() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    let config = RunConfig::default();

    let runs: Vec<Vec<DcEvent>> = (0..3).map(|seed| run_for(seed, 25 + seed)).collect();
    let mut files = Vec::new();
    let mut summed = OccupancyHistograms::new();
    for (i, run) in runs.iter().enumerate() {
        let file = data.path().join(format!("part{i}.evio.hipo"));
        write_run(&file, run);

        let single = data.path().join(format!("single{i}.txt"));
        write_list(&single, std::slice::from_ref(&file));
        let outcome = process_list_file(&single, out.path(), &config).unwrap();
        let grid = read_overview(&outcome.output).unwrap().into_grid().unwrap();
        summed.merge(&grid).unwrap();
        files.push(file);
    }

    let merged_list = data.path().join("merged.txt");
    write_list(&merged_list, &files);
    let merged_out = out.path().join("merged");
    let outcome = process_list_file(&merged_list, &merged_out, &config).unwrap();
    assert_eq!(outcome.output, merged_out.join("part0.json"));
    let merged = read_overview(&outcome.output).unwrap().into_grid().unwrap();

    assert_eq!(merged, summed);
    let refs: Vec<&[DcEvent]> = runs.iter().map(Vec::as_slice).collect();
    assert_eq!(merged, expected_grid(&refs));
}

#[test]
fn test_failing_list_does_not_stop_batch() {
    let data = tempdir().unwrap();
    let lists = tempdir().unwrap();
    let out = tempdir().unwrap();

    let good = data.path().join("good.evio.hipo");
    write_run(&good, &run_for(4, 5));
    write_list(&lists.path().join("a.txt"), &[good]);
    write_list(&lists.path().join("b.txt"), &[data.path().join("missing.evio.hipo")]);
    fs::write(lists.path().join("c.txt"), "\n").unwrap();

    let report = process_directory(lists.path(), out.path(), &RunConfig::default()).unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.failed.len(), 2);
    assert!(report
        .failed
        .iter()
        .any(|(path, err)| path.ends_with("c.txt") && matches!(err, Error::EmptyList(_))));
    assert!(out.path().join("good.json").is_file());
    assert!(!out.path().join("missing.json").exists());
}

#[test]
fn test_out_of_range_records_are_counted() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    let file = data.path().join("bad.evio.hipo");
    let run = vec![DcEvent::new(
        vec![RawHit::new(1, 1, 1, 50), RawHit::new(7, 1, 1, 50), RawHit::new(1, 0, 1, 50)],
        vec![RawSegment::new(2, 9, 10.0)],
    )];
    write_run(&file, &run);
    let list = data.path().join("bad.txt");
    write_list(&list, &[file]);

    let outcome = process_list_file(&list, out.path(), &RunConfig::default()).unwrap();
    assert_eq!(outcome.statistics.hits, 1);
    assert_eq!(outcome.statistics.rejected_hits, 2);
    assert_eq!(outcome.statistics.rejected_segments, 1);

    let grid = read_overview(&outcome.output).unwrap().into_grid().unwrap();
    assert_eq!(grid.wire_in_layer(0, 0, 0).content_at(50.0), 1);
    assert_eq!(grid.layer_vs_wire_right(0).content_at(50.0, 1.0), 1);
}

#[test]
fn test_generated_lists_feed_the_batch() {
    let data = tempdir().unwrap();
    let lists = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::create_dir_all(data.path().join("5038")).unwrap();
    write_run(&data.path().join("5038/run5038.evio.00001.hipo"), &run_for(5, 12));
    write_run(&data.path().join("5038/run5038.evio.00002.hipo"), &run_for(6, 8));

    let generated = generate_lists(data.path(), lists.path()).unwrap();
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].path, lists.path().join("5038.txt"));

    let report = process_directory(lists.path(), out.path(), &RunConfig::default()).unwrap();
    assert_eq!(report.total_events(), 20);
    assert_eq!(report.processed[0].output, out.path().join("run5038.json"));
}

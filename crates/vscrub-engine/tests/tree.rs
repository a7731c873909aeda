use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use vscrub_domain::{LogContext, ReasonCode, ScrubConfig};
use vscrub_engine::{ArchiveWalker, ScrubError, Stage, TreeDriver, TreeError};
use vscrub_index::{IndexBuilder, SubstitutionIndex, SubstitutionPair};
use zip::ZipWriter;
use zip::write::FileOptions;

struct TestDir {
    path: PathBuf,
}

impl TestDir {
    fn new(label: &str) -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("vscrub_engine_test_{}_{}", std::process::id(), label));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    fn join(&self, rel: &str) -> PathBuf {
        self.path.join(rel)
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, bytes).expect("write file");
}

fn index() -> SubstitutionIndex {
    let mut builder = IndexBuilder::new();
    builder.push(SubstitutionPair::new("esx05.lab", "host-05"));
    builder.push(SubstitutionPair::new("vm-web-01", "vm-42"));
    builder.build().expect("build index")
}

fn small_zip(text: &[u8]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("a.log", FileOptions::default())
        .expect("start file");
    zip.write_all(text).expect("write");
    zip.finish().expect("finish zip").into_inner()
}

fn run_tree(
    config: &ScrubConfig,
    input: &Path,
    output: &Path,
) -> Result<vscrub_engine::BatchReport, TreeError> {
    run_tree_with(&index(), config, input, output)
}

fn run_tree_with(
    index: &SubstitutionIndex,
    config: &ScrubConfig,
    input: &Path,
    output: &Path,
) -> Result<vscrub_engine::BatchReport, TreeError> {
    let log = LogContext::unknown();
    let walker = ArchiveWalker::new(index, config, log);
    TreeDriver::new(walker, config.max_workers, log).run(input, output)
}

fn is_create_failure(outcome: &Result<vscrub_engine::WalkStats, ScrubError>) -> bool {
    matches!(
        outcome,
        Err(ScrubError::Io {
            stage: Stage::Create,
            ..
        })
    )
}

#[test]
fn output_paths_are_scrubbed() {
    let dir = TestDir::new("paths");
    let input = dir.join("in");
    let output = dir.join("out");
    write_file(&input.join("esx05.lab/log.txt"), b"esx05.lab ok\n");

    let report = run_tree(&ScrubConfig::default(), &input, &output).expect("run");

    assert!(report.is_clean());
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].relative_path, PathBuf::from("host-05/log.txt"));
    let scrubbed = fs::read(output.join("host-05/log.txt")).expect("read output");
    assert_eq!(scrubbed, b"host-05 ok\n".to_vec());
    assert!(!output.join("esx05.lab").exists());
}

#[test]
fn one_corrupt_file_does_not_stop_the_batch() {
    let dir = TestDir::new("partial");
    let input = dir.join("in");
    let output = dir.join("out");
    write_file(&input.join("1.log"), b"vm-web-01\n");
    write_file(&input.join("2.zip"), &small_zip(b"esx05.lab\n"));
    write_file(&input.join("3.zip"), b"PK\x03\x04 truncated");
    write_file(&input.join("4.log"), b"esx05.lab\n");
    write_file(&input.join("5.vmdk"), b"\x00esx05.lab\x00");

    let report = run_tree(&ScrubConfig::default(), &input, &output).expect("run");

    let names: Vec<_> = report
        .files
        .iter()
        .map(|f| f.relative_path.display().to_string())
        .collect();
    assert_eq!(names, ["1.log", "2.zip", "3.zip", "4.log", "5.vmdk"]);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.failed_count(), 1);

    let failed = report.failed().next().expect("one failure");
    assert_eq!(failed.relative_path, PathBuf::from("3.zip"));
    let err = failed.outcome.as_ref().unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::FormatError);

    assert_eq!(fs::read(output.join("1.log")).expect("1"), b"vm-42\n".to_vec());
    assert_eq!(fs::read(output.join("4.log")).expect("4"), b"host-05\n".to_vec());
    assert_eq!(
        fs::read(output.join("5.vmdk")).expect("5"),
        b"\x00esx05.lab\x00".to_vec()
    );
    assert!(zip::ZipArchive::new(fs::File::open(output.join("2.zip")).expect("2")).is_ok());
}

#[test]
fn parallel_workers_produce_the_same_tree() {
    let dir = TestDir::new("parallel");
    let input = dir.join("in");
    for i in 0..12 {
        write_file(
            &input.join(format!("esx05.lab/part-{i:02}.log")),
            format!("line {i} from vm-web-01\n").as_bytes(),
        );
    }

    let serial_out = dir.join("serial");
    let parallel_out = dir.join("parallel");
    let serial = run_tree(&ScrubConfig::default(), &input, &serial_out).expect("serial");
    let config = ScrubConfig {
        max_workers: 4,
        ..ScrubConfig::default()
    };
    let parallel = run_tree(&config, &input, &parallel_out).expect("parallel");

    let serial_paths: Vec<_> = serial.files.iter().map(|f| &f.relative_path).collect();
    let parallel_paths: Vec<_> = parallel.files.iter().map(|f| &f.relative_path).collect();
    assert_eq!(serial_paths, parallel_paths);
    assert_eq!(parallel.succeeded(), 12);
    for rel in serial_paths {
        assert_eq!(
            fs::read(serial_out.join(rel)).expect("serial file"),
            fs::read(parallel_out.join(rel)).expect("parallel file")
        );
    }
    assert_eq!(parallel.totals().lines_scrubbed, 12);
}

#[test]
fn existing_destination_files_are_truncated() {
    let dir = TestDir::new("truncate");
    let input = dir.join("in");
    let output = dir.join("out");
    write_file(&input.join("a.log"), b"short\n");
    write_file(&output.join("a.log"), b"a much longer stale file\n");

    run_tree(&ScrubConfig::default(), &input, &output).expect("run");
    assert_eq!(fs::read(output.join("a.log")).expect("read"), b"short\n".to_vec());
}

#[test]
fn missing_input_root_is_fatal() {
    let dir = TestDir::new("missing");
    let err = run_tree(
        &ScrubConfig::default(),
        &dir.join("absent"),
        &dir.join("out"),
    )
    .unwrap_err();
    assert!(matches!(err, TreeError::InputRoot { .. }));
}

#[test]
fn scrubbed_paths_that_leave_the_output_root_are_rejected() {
    let dir = TestDir::new("escape");
    let input = dir.join("in");
    let output = dir.join("out");
    let absolute_target = dir.join("abs-target");
    let absolute_token = absolute_target.to_str().expect("utf-8 temp path");

    let mut builder = IndexBuilder::new();
    builder.push(SubstitutionPair::new("esx05.lab", "../escaped"));
    builder.push(SubstitutionPair::new("vm-web-01", absolute_token));
    let index = builder.build().expect("build index");

    write_file(&input.join("esx05.lab/a.log"), b"esx05.lab\n");
    write_file(&input.join("ok.log"), b"fine\n");
    write_file(&input.join("vm-web-01.log"), b"vm-web-01\n");

    let report = run_tree_with(&index, &ScrubConfig::default(), &input, &output).expect("run");

    assert_eq!(report.files.len(), 3);
    assert_eq!(report.failed_count(), 2);
    assert!(is_create_failure(&report.files[0].outcome));
    assert!(report.files[1].outcome.is_ok());
    assert!(is_create_failure(&report.files[2].outcome));
    assert!(!report.is_clean());

    assert!(!dir.join("escaped").exists());
    assert!(!dir.join("abs-target.log").exists());
    assert_eq!(fs::read(output.join("ok.log")).expect("ok"), b"fine\n".to_vec());
}

#[test]
fn colliding_scrubbed_destinations_keep_the_first_file() {
    let dir = TestDir::new("collide");
    let input = dir.join("in");
    let output = dir.join("out");
    write_file(&input.join("esx05.lab/a.log"), b"first esx05.lab\n");
    write_file(&input.join("host-05/a.log"), b"second\n");

    for workers in [1, 3] {
        let config = ScrubConfig {
            max_workers: workers,
            ..ScrubConfig::default()
        };
        let report = run_tree(&config, &input, &output).expect("run");

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].relative_path, PathBuf::from("host-05/a.log"));
        assert_eq!(report.files[1].relative_path, PathBuf::from("host-05/a.log"));
        assert!(report.files[0].outcome.is_ok());
        assert!(is_create_failure(&report.files[1].outcome));
        let err = report.files[1].outcome.as_ref().unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::IoError);
        assert_eq!(
            fs::read(output.join("host-05/a.log")).expect("kept file"),
            b"first host-05\n".to_vec()
        );
    }
}

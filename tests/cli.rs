mod common;

use common::{FIXTURE, TestWorkspace, arg, fixture_path, run_eav};
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn clean_writes_csv_and_report() {
    let workspace = TestWorkspace::new();
    let output = workspace.file("cleaned.csv");
    let report = workspace.file("report.txt");
    run_eav()
        .args([
            "clean",
            "-i",
            arg(&fixture_path(FIXTURE)),
            "-o",
            arg(&output),
            "--report",
            arg(&report),
        ])
        .assert()
        .success();

    let cleaned = workspace.read("cleaned.csv");
    let mut lines = cleaned.lines();
    assert_eq!(
        lines.next(),
        Some(
            "timestamp,cylinder_number,customer,job_number,grain_screened,press,unit_number,\
             paper_mill_location,proof_cut,viscosity,humidity,band_type"
        )
    );
    assert_eq!(
        lines.next(),
        Some("1991-01-08,x126,tvguide,25503,true,821,2,northus,55,46,78,band")
    );
    assert_eq!(cleaned.lines().count(), 9);
    assert!(!cleaned.contains("k-mart"));
    assert!(cleaned.ends_with("\n,x999,sears,38000,false,815,9,northus,55,,80,band\n"));

    let report = workspace.read("report.txt");
    assert!(report.contains("[NULL_MGT] 8 '?' placeholder cell(s) set to unknown."));
    assert!(report.contains("[CLEANUP] 2 duplicate row(s) removed."));
}

#[test]
fn clean_then_load_then_query() {
    let workspace = TestWorkspace::new();
    let cleaned = workspace.file("cleaned.csv");
    let report = workspace.file("report.txt");
    let db = workspace.file("runs.db");
    run_eav()
        .args([
            "clean",
            "-i",
            arg(&fixture_path(FIXTURE)),
            "-o",
            arg(&cleaned),
            "--report",
            arg(&report),
        ])
        .assert()
        .success();
    run_eav()
        .args(["load", "-i", arg(&cleaned), "--db", arg(&db)])
        .assert()
        .success();

    run_eav()
        .args(["verify", "--db", arg(&db), "--json"])
        .assert()
        .success()
        .stdout(contains("\"string_values\": 62"))
        .stdout(contains("\"numeric_values\": 19"))
        .stdout(contains("\"value\": \"tvguide\""));

    run_eav()
        .args(["inspect", "--db", arg(&db), "--run-id", "6"])
        .assert()
        .success()
        .stdout(contains("paper_mill_location"))
        .stdout(contains("scandinavian"));

    run_eav()
        .args([
            "search",
            "--db",
            arg(&db),
            "--attribute",
            "customer",
            "--contains",
            "mart",
        ])
        .assert()
        .success()
        .stdout(contains("kmart"))
        .stdout(contains("tvguide").not());

    run_eav()
        .args([
            "search", "--db", arg(&db), "--attribute", "viscosity", "--min", "45", "--json",
        ])
        .assert()
        .success()
        .stdout(contains("\"run_id\": 1"))
        .stdout(contains("\"run_id\": 3").not());

    run_eav()
        .args([
            "frequency",
            "--db",
            arg(&db),
            "--attribute",
            "customer",
            "--top",
            "1",
        ])
        .assert()
        .success()
        .stdout(contains("kmart"))
        .stdout(contains("37.50%"));
}

#[test]
fn load_twice_without_replace_fails_and_with_replace_succeeds() {
    let workspace = TestWorkspace::new();
    let db = workspace.file("runs.db");
    let cleaned = workspace.write(
        "cleaned.csv",
        "timestamp,customer,viscosity\n1991-01-08,kmart,46\n,sears,\n",
    );
    run_eav()
        .args(["load", "-i", arg(&cleaned), "--db", arg(&db)])
        .assert()
        .success();
    run_eav()
        .args(["load", "-i", arg(&cleaned), "--db", arg(&db)])
        .assert()
        .failure()
        .stderr(contains("error:"));
    run_eav()
        .args(["load", "-i", arg(&cleaned), "--db", arg(&db), "--replace"])
        .assert()
        .success();

    run_eav()
        .args(["verify", "--db", arg(&db), "--json"])
        .assert()
        .success()
        .stdout(contains("\"runs\": 2"))
        .stdout(contains("\"string_attributes\": 1"));
}

#[test]
fn run_cleans_loads_and_exports_round_trip() {
    let workspace = TestWorkspace::new();
    let db = workspace.file("runs.db");
    let report = workspace.file("report.txt");
    let cleaned = workspace.file("cleaned.csv");
    let wide = workspace.file("wide.csv");
    run_eav()
        .args([
            "run",
            "-i",
            arg(&fixture_path(FIXTURE)),
            "--db",
            arg(&db),
            "-o",
            arg(&cleaned),
            "--report",
            arg(&report),
        ])
        .assert()
        .success();
    assert!(workspace.read("report.txt").contains("FINAL SUMMARY:"));

    run_eav()
        .args(["export", "--db", arg(&db), "-o", arg(&wide)])
        .assert()
        .success();
    let exported = workspace.read("wide.csv");
    let mut lines = exported.lines();
    assert_eq!(
        lines.next(),
        Some(
            "run_id,timestamp,cylinder_number,customer,job_number,grain_screened,press,\
             unit_number,paper_mill_location,band_type,proof_cut,viscosity,humidity"
        )
    );
    assert_eq!(
        lines.next(),
        Some("1,1991-01-08,x126,tvguide,25503,true,821,2,northus,band,55,46,78")
    );
    assert_eq!(exported.lines().count(), 9);
}

#[test]
fn inspect_unknown_run_reports_not_found() {
    let workspace = TestWorkspace::new();
    let db = workspace.file("runs.db");
    let cleaned = workspace.write("cleaned.csv", "customer\nkmart\nsears\n");
    run_eav()
        .args(["load", "-i", arg(&cleaned), "--db", arg(&db)])
        .assert()
        .success();
    run_eav()
        .args(["inspect", "--db", arg(&db), "--run-id", "42"])
        .assert()
        .failure()
        .stderr(contains("run 42 not found"));
}

#[test]
fn query_commands_require_an_existing_database() {
    let workspace = TestWorkspace::new();
    let db = workspace.file("missing.db");
    run_eav()
        .args(["verify", "--db", arg(&db)])
        .assert()
        .failure()
        .stderr(contains("does not exist"));
    assert!(!db.exists());
}

#[test]
fn config_command_writes_loadable_defaults() {
    let workspace = TestWorkspace::new();
    let path = workspace.file("pipeline.yaml");
    run_eav()
        .args(["config", "-o", arg(&path)])
        .assert()
        .success();
    let yaml = workspace.read("pipeline.yaml");
    assert!(yaml.contains("threshold: 0.85"));
    assert!(yaml.contains("humifity: humidity"));

    let config_path = workspace.write("edited.yaml", "placeholder: NA\n");
    let raw = workspace.write("raw.csv", "customer,press\nkmart,NA\nsears,802\n");
    let output = workspace.file("out.csv");
    let report = workspace.file("report.txt");
    run_eav()
        .args([
            "clean",
            "-i",
            arg(&raw),
            "-o",
            arg(&output),
            "--report",
            arg(&report),
            "-c",
            arg(&config_path),
        ])
        .assert()
        .success();
    assert!(workspace.read("report.txt").contains("1 'NA' placeholder cell(s)"));
}

#[test]
fn clean_rejects_unknown_encoding() {
    let workspace = TestWorkspace::new();
    let report = workspace.file("report.txt");
    run_eav()
        .args([
            "clean",
            "-i",
            arg(&fixture_path(FIXTURE)),
            "--report",
            arg(&report),
            "--input-encoding",
            "klingon",
        ])
        .assert()
        .failure()
        .stderr(contains("Unknown encoding"));
}

#[test]
fn run_writes_tab_separated_cleaned_output_for_tsv_path() {
    let workspace = TestWorkspace::new();
    let db = workspace.file("runs.db");
    let report = workspace.file("report.txt");
    let cleaned = workspace.file("cleaned.tsv");
    run_eav()
        .args([
            "run",
            "-i",
            arg(&fixture_path(FIXTURE)),
            "--db",
            arg(&db),
            "-o",
            arg(&cleaned),
            "--report",
            arg(&report),
        ])
        .assert()
        .success();
    let written = workspace.read("cleaned.tsv");
    let header = written.lines().next().expect("header line");
    assert!(header.starts_with("timestamp\tcylinder_number\tcustomer"));
    assert!(!header.contains(','));
}

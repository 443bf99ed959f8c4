mod common;

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use sheet_merge::{field::Field, learner::PatternTable};

use common::{TestWorkspace, arg, read_csv, read_xlsx};

fn two_overlapping_csvs(ws: &TestWorkspace) -> (std::path::PathBuf, std::path::PathBuf) {
    let a = ws.write("a.csv", "Телефон,ФИО,Комментарий\n100,A,x\n200,B,y\n");
    let b = ws.write("b.csv", "phone,name\n100,A2\n300,C\n");
    (a, b)
}

#[test]
fn inspect_lists_keyword_mappings() {
    let ws = TestWorkspace::new();
    let (a, b) = two_overlapping_csvs(&ws);
    cargo_bin_cmd!("sheet-merge")
        .args(["inspect", "-i", arg(&a), "-i", arg(&b), "--training-count", "1"])
        .assert()
        .success()
        .stdout(contains("phone (Телефон)"))
        .stdout(contains("name (ФИО)"))
        .stdout(contains("training"))
        .stdout(contains("keyword"));
}

#[test]
fn merge_without_auto_resolve_keeps_first_row_per_phone() {
    let ws = TestWorkspace::new();
    let (a, b) = two_overlapping_csvs(&ws);
    let output = ws.join("merged.csv");
    cargo_bin_cmd!("sheet-merge")
        .args(["merge", "-i", arg(&a), "-i", arg(&b), "-o", arg(&output)])
        .assert()
        .success();

    let rows = read_csv(&output);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0][0], "Телефон");
    assert_eq!(rows[0][1], "ФИО");
    assert_eq!(rows[1][..2], ["100", "A"]);
    assert_eq!(rows[2][..2], ["200", "B"]);
    assert_eq!(rows[3][..2], ["300", "C"]);
}

#[test]
fn merge_with_auto_resolve_writes_conflict_report() {
    let ws = TestWorkspace::new();
    let (a, b) = two_overlapping_csvs(&ws);
    let output = ws.join("merged.csv");
    let conflicts = ws.join("conflicts.csv");
    cargo_bin_cmd!("sheet-merge")
        .args([
            "merge",
            "-i",
            arg(&a),
            "-i",
            arg(&b),
            "-o",
            arg(&output),
            "--auto-resolve",
            "--include-source",
            "--conflicts",
            arg(&conflicts),
        ])
        .assert()
        .success();

    let rows = read_csv(&output);
    assert_eq!(rows[1][1], "A2");
    assert_eq!(rows[1][7], "b.csv");

    let report = read_csv(&conflicts);
    assert_eq!(report.len(), 2);
    assert_eq!(
        report[1][..8],
        ["0", "100", "a.csv", "b.csv", "resolved", "true", "new", "newest_source"]
    );
    assert_eq!(report[1][9], "b.csv");
}

#[test]
fn default_output_name_is_dated_xlsx() {
    let ws = TestWorkspace::new();
    let (a, b) = two_overlapping_csvs(&ws);
    let out_dir = ws.join("out");
    fs::create_dir(&out_dir).expect("create out dir");
    cargo_bin_cmd!("sheet-merge")
        .args(["merge", "-i", arg(&a), "-i", arg(&b), "--output-dir", arg(&out_dir)])
        .assert()
        .success();

    let names = fs::read_dir(&out_dir)
        .expect("list out dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("merged_data_"));
    assert!(names[0].ends_with(".xlsx"));
    assert_eq!(names[0].len(), "merged_data_2024-01-01.xlsx".len());
}

#[test]
fn richer_workbook_row_survives_auto_resolution() {
    let ws = TestWorkspace::new();
    let a = ws.write_xlsx(
        "a.xlsx",
        &["Телефон", "ФИО", "Оператор", "Регион", "Время"],
        &[&["79990001111", "Иван Иванов", "MTS", "Москва", "10:00"]],
    );
    let b = ws.write_xlsx("b.xlsx", &["phone", "name"], &[&["79990001111", "I."]]);
    let output = ws.join("merged.xlsx");
    let report = ws.join("report.json");
    cargo_bin_cmd!("sheet-merge")
        .args([
            "merge",
            "-i",
            arg(&a),
            "-i",
            arg(&b),
            "--auto-resolve",
            "-o",
            arg(&output),
            "--report",
            arg(&report),
        ])
        .assert()
        .success();

    let rows = read_xlsx(&output);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "Телефон");
    assert_eq!(rows[1][0], "79990001111");
    assert_eq!(rows[1][1], "Иван Иванов");

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("read report")).expect("json");
    assert_eq!(json["stats"]["most_complete"], 1);
    assert_eq!(json["conflicts"][0]["kept"], "existing");
    assert_eq!(json["rows"][0]["_source"], "a.xlsx");
}

#[test]
fn learned_patterns_map_later_files() {
    let ws = TestWorkspace::new();
    let train = ws.write("train.csv", "Тел.,Абонент\n100,Иван\n");
    let later = ws.write("later.csv", "тел. моб,абонент фио\n100,Пётр\n");
    let mappings = ws.write(
        "mappings.yml",
        "files:\n  train.csv:\n    \"Тел.\": phone\n    Абонент: name\n",
    );
    let patterns = ws.join("patterns.yml");
    cargo_bin_cmd!("sheet-merge")
        .args([
            "learn",
            "-i",
            arg(&train),
            "-i",
            arg(&later),
            "--training-count",
            "1",
            "--mappings",
            arg(&mappings),
            "-o",
            arg(&patterns),
        ])
        .assert()
        .success();

    let table = PatternTable::load(&patterns).expect("load patterns");
    assert_eq!(table.get("тел."), Some(Field::Phone));
    assert_eq!(table.get("абонент"), Some(Field::Name));

    let fresh = ws.write("fresh.csv", "phone\n1\n");
    let next = ws.write("next.csv", "ТЕЛ. домашний\n2\n");
    cargo_bin_cmd!("sheet-merge")
        .args([
            "inspect",
            "-i",
            arg(&fresh),
            "-i",
            arg(&next),
            "--training-count",
            "1",
            "--patterns",
            arg(&patterns),
            "--learn",
        ])
        .assert()
        .success()
        .stdout(contains("ТЕЛ. домашний  phone (Телефон)  learned"));
}

#[test]
fn manual_resolution_picks_new_row() {
    let ws = TestWorkspace::new();
    let (a, b) = two_overlapping_csvs(&ws);
    let output = ws.join("merged.csv");
    cargo_bin_cmd!("sheet-merge")
        .args([
            "merge",
            "-i",
            arg(&a),
            "-i",
            arg(&b),
            "--resolve",
            "0=new",
            "-o",
            arg(&output),
        ])
        .assert()
        .success();
    assert_eq!(read_csv(&output)[1][1], "A2");
}

#[test]
fn out_of_range_resolution_fails() {
    let ws = TestWorkspace::new();
    let (a, b) = two_overlapping_csvs(&ws);
    cargo_bin_cmd!("sheet-merge")
        .args([
            "merge",
            "-i",
            arg(&a),
            "-i",
            arg(&b),
            "--resolve",
            "5=new",
            "-o",
            arg(&ws.join("merged.csv")),
        ])
        .assert()
        .failure()
        .stderr(contains("out of range"));
}

#[test]
fn already_resolved_conflict_cannot_be_resolved_again() {
    let ws = TestWorkspace::new();
    let (a, b) = two_overlapping_csvs(&ws);
    cargo_bin_cmd!("sheet-merge")
        .args([
            "merge",
            "-i",
            arg(&a),
            "-i",
            arg(&b),
            "--auto-resolve",
            "--resolve",
            "0=existing",
            "-o",
            arg(&ws.join("merged.csv")),
        ])
        .assert()
        .failure()
        .stderr(contains("already resolved"));
}

#[test]
fn duplicate_file_names_are_rejected() {
    let ws = TestWorkspace::new();
    fs::create_dir(ws.join("x")).expect("dir x");
    fs::create_dir(ws.join("y")).expect("dir y");
    let first = ws.write("x/data.csv", "phone\n1\n");
    let second = ws.write("y/data.csv", "phone\n2\n");
    cargo_bin_cmd!("sheet-merge")
        .args([
            "merge",
            "-i",
            arg(&first),
            "-i",
            arg(&second),
            "-o",
            arg(&ws.join("merged.csv")),
        ])
        .assert()
        .failure()
        .stderr(contains("more than once"));
}

#[test]
fn unsupported_input_is_rejected() {
    let ws = TestWorkspace::new();
    let input = ws.write("data.json", "{}");
    cargo_bin_cmd!("sheet-merge")
        .args(["inspect", "-i", arg(&input)])
        .assert()
        .failure()
        .stderr(contains("unsupported input format"));
}

#[test]
fn reads_windows_1251_semicolon_csv() {
    let ws = TestWorkspace::new();
    let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode("Телефон;ФИО\n100;Иван\n");
    let path = ws.join("legacy.csv");
    fs::write(&path, &encoded).expect("write encoded csv");
    cargo_bin_cmd!("sheet-merge")
        .args([
            "inspect",
            "-i",
            arg(&path),
            "--delimiter",
            ";",
            "--input-encoding",
            "windows-1251",
        ])
        .assert()
        .success()
        .stdout(contains("name (ФИО)"));
}

#[test]
fn smart_resolution_enables_auto_resolve_and_previews() {
    let ws = TestWorkspace::new();
    let (a, b) = two_overlapping_csvs(&ws);
    cargo_bin_cmd!("sheet-merge")
        .args([
            "merge",
            "-i",
            arg(&a),
            "-i",
            arg(&b),
            "--smart-resolve",
            "--preview",
            "-o",
            arg(&ws.join("merged.csv")),
        ])
        .assert()
        .success()
        .stdout(contains("Total records: 3  Conflicts: 0  Auto-resolved: 1"))
        .stdout(contains("newest_source (by source recency): 1"));
}

use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;

const CATALOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<catalog>
  <section id=\"a\">
    <entry>one</entry>
    <entry>two</entry>
  </section>
  <section id=\"b\">
    <entry>three</entry>
    <entry>four</entry>
  </section>
</catalog>
";

fn cli() -> Command {
    Command::new(assert_cmd::cargo_bin!("xmlnav-cli"))
}

fn write_fixture(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, text).expect("write fixture");
    path.to_string_lossy().to_string()
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout is JSON")
}

#[test]
fn tree_prints_paths_and_lines() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(tmp.path(), "catalog.xml", CATALOG);

    let tree = stdout_json(cli().args(["tree", input.as_str()]));
    assert_eq!(tree["path"], "/catalog[1]");
    assert_eq!(tree["line_number"], 2);
    let second = &tree["children"][1];
    assert_eq!(second["path"], "/catalog[1]/section[2]");
    assert_eq!(second["line_number"], 7);
    assert_eq!(second["children"][0]["value"], "three");
}

#[test]
fn line_looks_up_an_index_aware_path() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(tmp.path(), "catalog.xml", CATALOG);

    let output = cli()
        .args(["line", "--xpath", "/catalog[1]/section[2]/entry[2]", input.as_str()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8_lossy(&output).trim(), "9");

    cli()
        .args(["line", "--xpath", "/catalog[1]/section[9]", input.as_str()])
        .assert()
        .code(1);
}

#[test]
fn repair_reads_stdin_and_closes_tags() {
    let output = assert_cmd::Command::new(assert_cmd::cargo_bin!("xmlnav-cli"))
        .arg("repair")
        .write_stdin("<root>\n  <item>\n    <name>Test</name>\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(
        String::from_utf8_lossy(&output),
        "<root>\n  <item>\n    <name>Test</name>\n  </item>\n</root>\n"
    );
}

#[test]
fn validate_exits_with_status_3_on_errors() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let good = write_fixture(tmp.path(), "good.xml", CATALOG);
    let bad = write_fixture(tmp.path(), "bad.xml", "<r><a></r>");

    let result = stdout_json(cli().args(["validate", good.as_str()]));
    assert_eq!(result["is_valid"], true);

    cli().args(["validate", bad.as_str()]).assert().code(3);
}

#[test]
fn split_then_inspect_parts() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(tmp.path(), "catalog.xml", CATALOG);
    let out = tmp.path().join("split");
    let out_str = out.to_string_lossy().to_string();

    let metadata = stdout_json(cli().args([
        "split",
        "--out",
        out_str.as_str(),
        "--threshold",
        "15",
        "--levels",
        "2",
        input.as_str(),
    ]));
    assert_eq!(metadata["total_parts"], 2);
    assert_eq!(metadata["original_file"], input.as_str());
    assert!(out.join("parts/part_001_section.xml").is_file());

    let info = stdout_json(cli().args(["parts", "info", out_str.as_str()]));
    assert_eq!(info["total_parts"], 2);

    let hits = stdout_json(cli().args(["parts", "search", "FOUR", out_str.as_str()]));
    assert_eq!(hits[0]["xpath"], "/catalog[1]/section[2]");

    let problems = stdout_json(cli().args(["parts", "validate", out_str.as_str()]));
    assert_eq!(problems, serde_json::json!({}));
}

#[test]
fn layout_prints_positions_for_limited_levels() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = write_fixture(tmp.path(), "catalog.xml", CATALOG);

    let positions = stdout_json(cli().args(["layout", "--depth", "2", input.as_str()]));
    let map = positions.as_object().expect("object");
    assert_eq!(map.len(), 3);
    assert_eq!(map["/catalog[1]"]["y"], 100.0);
    assert_eq!(map["/catalog[1]/section[1]"]["y"], 220.0);
}

#[test]
fn unknown_flags_print_usage() {
    cli().arg("--bogus").assert().code(2);
}

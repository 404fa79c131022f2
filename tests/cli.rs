use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("asset has a parent")).expect("create asset dir");
    fs::write(path, bytes).expect("write asset");
}

fn gear_assets(root: &Path) {
    let mut bin = Vec::new();
    for c in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&c.to_le_bytes());
    }
    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "name": "Gear1", "mesh": 0 }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0, 0, 0], "max": [1, 1, 0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteLength": {len} }}],
  "buffers": [{{ "uri": "gear.bin", "byteLength": {len} }}]
}}"#,
        len = bin.len()
    );
    write(root, "objects/gear/gear.gltf", json.as_bytes());
    write(root, "objects/gear/gear.bin", &bin);
}

fn summary(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("portfolio-stage").expect("binary exists");
    cmd.arg(root).arg("--summary-only");
    cmd
}

#[test]
fn empty_asset_dir_degrades_and_reports_final_cameras() {
    let dir = TempDir::new().expect("temp dir");
    summary(dir.path())
        .assert()
        .success()
        .stdout(contains("Loaded 0 of 7 assets (7 failed)"))
        .stdout(contains("Lattice: 240 cubes, 80 beams"))
        .stdout(contains(
            " - squares camera pos=(3.00, 0.00, -60.00) rot=(0.00, 0.00, -1.57)",
        ))
        .stdout(contains(
            " - landscape camera pos=(0.00, 0.00, 300.00) rot=(1.57, 0.00, 0.00)",
        ))
        .stdout(contains(" - face camera pos=(0.00, 0.00, 5.00)"));
}

#[test]
fn scroll_offset_selects_the_timeline_position() {
    let dir = TempDir::new().expect("temp dir");
    summary(dir.path())
        .args(["--scroll", "0"])
        .assert()
        .success()
        .stdout(contains("Scroll offset: 0 of 17280"))
        .stdout(contains(
            " - squares camera pos=(-3.00, 0.00, 100.00) rot=(0.95, -2.00, -4.50)",
        ))
        .stdout(contains(
            " - landscape camera pos=(0.00, -1700.00, 2500.00) rot=(3.14, 0.00, 0.00)",
        ));
}

#[test]
fn manifest_shrinks_the_lattice() {
    let dir = TempDir::new().expect("temp dir");
    write(
        dir.path(),
        "page.xml",
        br#"<page>
  <lattice><rows>2</rows></lattice>
  <starfield><count>100</count></starfield>
</page>"#,
    );
    summary(dir.path())
        .assert()
        .success()
        .stdout(contains("Lattice: 24 cubes, 8 beams"));
}

#[test]
fn gltf_with_sibling_buffer_loads() {
    let dir = TempDir::new().expect("temp dir");
    gear_assets(dir.path());
    summary(dir.path())
        .assert()
        .success()
        .stdout(contains("Loaded 1 of 7 assets (6 failed)"));
}

#[test]
fn malformed_manifest_is_an_error() {
    let dir = TempDir::new().expect("temp dir");
    write(dir.path(), "page.xml", b"<site/>");
    summary(dir.path())
        .assert()
        .failure()
        .stderr(contains("failed to parse page.xml"));
}

#[test]
fn rejects_bad_arguments() {
    Command::cargo_bin("portfolio-stage")
        .expect("binary exists")
        .assert()
        .failure()
        .stderr(contains("Usage: portfolio-stage <asset-dir>"));

    Command::cargo_bin("portfolio-stage")
        .expect("binary exists")
        .args([".", "--fast"])
        .assert()
        .failure()
        .stderr(contains("Unknown argument: --fast"));

    Command::cargo_bin("portfolio-stage")
        .expect("binary exists")
        .args([".", "--scroll", "down"])
        .assert()
        .failure()
        .stderr(contains("invalid scroll offset `down`"));
}

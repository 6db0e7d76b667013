use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

/// Helper function to run rawchart with arguments and optional stdin
fn run_rawchart(args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_rawchart"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn rawchart");

    if let Some(mut handle) = child.stdin.take() {
        if let Some(input) = stdin {
            handle
                .write_all(input.as_bytes())
                .expect("Failed to write to stdin");
        }
    }

    child.wait_with_output().expect("Failed to wait for rawchart")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

#[test]
fn test_histogram_png_from_file() {
    let input = fixture("values.csv");
    let output = run_rawchart(
        &[input.to_str().unwrap(), "--chart", "histogram", "--map", "value: height", "--set", "bins: 5"],
        None,
    );
    assert!(output.status.success(), "Failed: {}", stderr(&output));
    assert!(is_valid_png(&output.stdout), "Output is not a valid PNG");
}

#[test]
fn test_mosaic_svg_from_stdin() {
    let csv = std::fs::read_to_string(fixture("sales.csv")).unwrap();
    let output = run_rawchart(
        &[
            "--chart",
            "rawchart.mosaic",
            "--map",
            "column: region, row: product, size: amount, color: kind",
            "--format",
            "svg",
        ],
        Some(&csv),
    );
    assert!(output.status.success(), "Failed: {}", stderr(&output));
    let svg = String::from_utf8(output.stdout).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("north"));
}

#[test]
fn test_spiral_small_multiples_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("spiral.svg");
    let input = fixture("weather.csv");
    let output = run_rawchart(
        &[
            input.to_str().unwrap(),
            "--chart",
            "spiral",
            "--map",
            "date: day, value: rain, series: city",
            "--set",
            "columnsNumber: 2, color: scale(ordinal, \"schemeSet2\")",
            "--format",
            "svg",
            "--output",
            out.to_str().unwrap(),
        ],
        None,
    );
    assert!(output.status.success(), "Failed: {}", stderr(&output));
    assert!(output.stdout.is_empty());
    let svg = std::fs::read_to_string(&out).unwrap();
    assert!(svg.contains("Oslo"));
    assert!(svg.contains("Rome"));
}

#[test]
fn test_missing_dimension_exits_with_notice() {
    let input = fixture("sales.csv");
    let output = run_rawchart(&[input.to_str().unwrap(), "--chart", "mosaic", "--map", "column: region"], None);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let err = stderr(&output);
    assert!(err.contains("Missing required dimensions"), "stderr: {}", err);
    assert!(err.contains("row"));
}

#[test]
fn test_type_mismatch_is_reported() {
    let input = fixture("sales.csv");
    let output = run_rawchart(&[input.to_str().unwrap(), "--chart", "histogram", "--map", "value: region"], None);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Data type mismatch"));
}

#[test]
fn test_oversized_margins_fail_render() {
    let input = fixture("values.csv");
    let output = run_rawchart(
        &[input.to_str().unwrap(), "--map", "value: height", "--set", "marginTop: 400, marginBottom: 400"],
        None,
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Chart error"));
}

#[test]
fn test_bad_option_value_rejected() {
    let input = fixture("values.csv");
    let output = run_rawchart(&[input.to_str().unwrap(), "--map", "value: height", "--set", "bins: \"many\""], None);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("bins"));
}

#[test]
fn test_list_charts() {
    let output = run_rawchart(&["--list-charts"], None);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    for id in ["rawchart.histogram", "rawchart.mosaic", "rawchart.spiral"] {
        assert!(text.contains(id), "missing {}", id);
    }
}

#[test]
fn test_json_input() {
    let json = r#"[{"score": 3}, {"score": 8}, {"score": 5}, {"score": 1}]"#;
    let output = run_rawchart(&["--json", "--map", "value: score", "--format", "svg"], Some(json));
    assert!(output.status.success(), "Failed: {}", stderr(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("<svg"));
}

#[test]
fn test_save_and_reload_project() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("chart.json");
    let input = fixture("sales.csv");

    let saved = run_rawchart(
        &[
            input.to_str().unwrap(),
            "--chart",
            "mosaic",
            "--map",
            "column: region, row: product, size: amount",
            "--set",
            "showLabels: false",
            "--save-project",
            project.to_str().unwrap(),
            "--format",
            "svg",
        ],
        None,
    );
    assert!(saved.status.success(), "Failed: {}", stderr(&saved));

    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&project).unwrap()).unwrap();
    assert_eq!(doc["version"], "1.0");
    assert_eq!(doc["chart"], "rawchart.mosaic");
    assert_eq!(doc["visualOptions"]["showLabels"], false);

    let reloaded = run_rawchart(&["--project", project.to_str().unwrap(), "--format", "svg"], None);
    assert!(reloaded.status.success(), "Failed: {}", stderr(&reloaded));
    assert_eq!(saved.stdout, reloaded.stdout);
}

#[test]
fn test_invalid_project_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("broken.json");
    std::fs::write(&project, r#"{"version": "9.9", "chart": "rawchart.mosaic"}"#).unwrap();

    let output = run_rawchart(&["--project", project.to_str().unwrap()], None);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("version 9.9"));
}

#[test]
fn test_config_sets_export_size_and_format() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"export": {"width": 300, "height": 200, "type": "svg"}}"#).unwrap();
    let input = fixture("values.csv");

    let output = run_rawchart(
        &[input.to_str().unwrap(), "--map", "value: height", "--config", config.to_str().unwrap()],
        None,
    );
    assert!(output.status.success(), "Failed: {}", stderr(&output));
    let svg = String::from_utf8(output.stdout).unwrap();
    assert!(svg.contains("width=\"300\""));
    assert!(svg.contains("height=\"200\""));
}

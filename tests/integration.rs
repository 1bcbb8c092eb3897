/// Integration test suite: runs the compiled `provenance` binary against the C#
/// fixture project under `tests/fixtures/shop`.
///
/// The `CARGO_BIN_EXE_provenance` environment variable is set by Cargo during
/// `cargo test` to point to the compiled binary for the current profile.
use std::path::PathBuf;
use std::process::Command;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_provenance"))
}

fn fixture() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("shop")
        .to_string_lossy()
        .into_owned()
}

/// Run a provenance command and assert it exits successfully.
/// Returns stdout as a String.
fn run_success(args: &[&str]) -> String {
    let out = Command::new(binary())
        .args(args)
        .output()
        .expect("failed to invoke provenance binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        out.status.success(),
        "command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
        args,
        out.status,
        stdout,
        stderr
    );
    stdout
}

/// Run a provenance command and assert it exits with a non-zero status.
/// Returns (stdout, stderr) as Strings.
fn run_failure(args: &[&str]) -> (String, String) {
    let out = Command::new(binary())
        .args(args)
        .output()
        .expect("failed to invoke provenance binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        !out.status.success(),
        "command {:?} unexpectedly succeeded\nstdout: {}",
        args,
        stdout
    );
    (stdout, stderr)
}

// ---------------------------------------------------------------------------
// index
// ---------------------------------------------------------------------------

#[test]
fn test_index_json_output() {
    let root = fixture();
    let stdout = run_success(&["index", &root, "--json"]);
    let stats: serde_json::Value = serde_json::from_str(&stdout).expect("index --json emits JSON");
    // obj/ is build output and never indexed.
    assert_eq!(stats["file_count"], 2);
    assert_eq!(stats["types"], 4);
    assert_eq!(stats["skipped"], 0);
}

#[test]
fn test_index_human_summary() {
    let root = fixture();
    let stdout = run_success(&["index", &root]);
    assert!(stdout.starts_with("Indexed 2 files"), "unexpected summary: {stdout}");
}

// ---------------------------------------------------------------------------
// trail
// ---------------------------------------------------------------------------

#[test]
fn test_trail_private_parameter_resolves_to_argument() {
    let root = fixture();
    let stdout = run_success(&["trail", &root, "--expr", "count"]);
    assert!(
        stdout.contains("trail OrderService.cs:17 count: count Argument, 3 Constant"),
        "unexpected trail: {stdout}"
    );
    assert!(stdout.contains("1 expressions resolved"));
}

#[test]
fn test_trail_file_filter_and_json() {
    let root = fixture();
    let stdout = run_success(&[
        "trail",
        &root,
        "--expr",
        "new Clock()",
        "--file",
        "Report.cs",
        "--format",
        "json",
    ]);
    let results: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let results = results.as_array().expect("array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["line"], 9);
    assert_eq!(results[0]["trail"][0]["text"], "new Clock()");
    assert_eq!(results[0]["trail"][0]["source"], "Created");
}

#[test]
fn test_trail_regex_matches_every_creation() {
    let root = fixture();
    let stdout = run_success(&["trail", &root, "--expr", r"new \w+\(\)", "--regex"]);
    assert!(stdout.contains("3 expressions resolved"), "unexpected output: {stdout}");
}

#[test]
fn test_trail_with_generous_timeout_completes() {
    let root = fixture();
    let stdout = run_success(&["trail", &root, "--expr", "count", "--timeout-secs", "600"]);
    assert!(stdout.contains("1 expressions resolved"), "unexpected output: {stdout}");
}

#[test]
fn test_trail_no_match_fails() {
    let root = fixture();
    let (_stdout, stderr) = run_failure(&["trail", &root, "--expr", "doesNotExist"]);
    assert!(stderr.contains("no expression matches"), "unexpected stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// inject
// ---------------------------------------------------------------------------

#[test]
fn test_inject_constructor_creation_with_verify() {
    let root = fixture();
    let stdout = run_success(&["inject", &root, "--expr", "new Repository()", "--verify"]);
    assert!(
        stdout.contains("add parameter `Repository repository` to OrderService()"),
        "unexpected plan: {stdout}"
    );
    assert!(stdout.contains("verify ok: repository Injected"), "unexpected plan: {stdout}");
}

#[test]
fn test_inject_field_initializer_json() {
    let root = fixture();
    let stdout = run_success(&[
        "inject",
        &root,
        "--expr",
        "new Clock()",
        "--file",
        "OrderService.cs",
        "--format",
        "json",
    ]);
    let results: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let outcome = &results[0]["outcome"];
    assert_eq!(outcome["outcome"], "plan");
    assert_eq!(outcome["parameter"], "clock");
    let steps = results[0]["steps"].as_array().expect("steps");
    assert_eq!(steps[0], "remove the initializer of `clock`");
}

#[test]
fn test_inject_parameter_is_unsupported() {
    let root = fixture();
    let stdout = run_success(&["inject", &root, "--expr", "count"]);
    assert!(
        stdout.contains("unsupported: value is already injected"),
        "unexpected output: {stdout}"
    );
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

#[test]
fn test_scan_lists_candidates() {
    let root = fixture();
    let stdout = run_success(&["scan", &root]);
    assert!(stdout.contains("prefer-inject OrderService.cs:6 new Clock()"), "unexpected output: {stdout}");
    assert!(stdout.contains("prefer-inject OrderService.cs:10 new Repository()"));
    assert!(stdout.contains("3 candidates found"));
}

#[test]
fn test_scan_table_output() {
    let root = fixture();
    let stdout = run_success(&["scan", &root, "--format", "table"]);
    let header = stdout.lines().next().expect("header line");
    assert!(header.contains("FILE"));
    assert!(header.contains("EXPRESSION"));
}

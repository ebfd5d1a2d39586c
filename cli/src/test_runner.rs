use std::path::{Path, PathBuf};

use serde::Deserialize;

use journal::{DecodeError, Journal};

/// Expectations for one `.test.jnl` golden test, declared as TOML
/// frontmatter between `---` fences ahead of the journal text.
#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Expected canonical rendering of the decoded journal (trimmed
    /// comparison). Omit to only require that decoding succeeds.
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected decode error — the error's Display string must contain this
    /// substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If set, the decode error must occur on this 1-based line of the
    /// journal text.
    #[serde(default)]
    pub expect_error_line: Option<usize>,
}

/// Split a `.test.jnl` file into its TOML config and journal source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4; // skip \n---
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };

    let description = config.description.clone();

    let reason = match (Journal::parse(source), &config.expect_error) {
        (Ok(_), Some(expected)) => Some(format!(
            "expected error containing \"{}\", but decoding succeeded",
            expected
        )),
        (Ok(journal), None) => match &config.expect_output {
            Some(expected) => {
                let got = journal.to_string();
                if got.trim() == expected.trim() {
                    None
                } else {
                    Some(format!(
                        "output mismatch\n  expected: {}\n  actual:   {}",
                        expected.trim().replace('\n', "\n            "),
                        got.trim().replace('\n', "\n            ")
                    ))
                }
            }
            None => None,
        },
        (Err(err), Some(expected)) => {
            let err_str = err.to_string();
            if !err_str.contains(expected.as_str()) {
                Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, err_str
                ))
            } else {
                match (config.expect_error_line, &err) {
                    (Some(want), DecodeError::Entry { line, .. }) if *line != want => Some(
                        format!("expected error on line {}, got line {}", want, line),
                    ),
                    (Some(_), DecodeError::Entry { .. }) | (None, _) => None,
                    (Some(want), _) => Some(format!(
                        "expected error on line {}, but error has no line: {}",
                        want, err_str
                    )),
                }
            }
        }
        (Err(err), None) => Some(format!("unexpected decode error: {}", err)),
    };

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: match reason {
            Some(reason) => TestOutcome::Fail(reason),
            None => TestOutcome::Pass,
        },
    }
}

/// Discover `.test.jnl` files under `root`, sorted for stable output.
fn discover_tests(root: &Path) -> Vec<PathBuf> {
    let mut tests = Vec::new();
    collect_tests(root, &mut tests);
    tests.sort();
    tests
}

fn collect_tests(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".test.jnl") {
                out.push(path);
            }
        }
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

/// Run all `.test.jnl` files under `path` (or a single file).
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool) -> i32 {
    let tests = if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        discover_tests(path)
    };

    if tests.is_empty() {
        eprintln!("no .test.jnl files found in {}", path.display());
        return 1;
    }

    let mut failures: Vec<TestResult> = Vec::new();
    for test in &tests {
        let result = run_single_test(test);
        let label = result
            .description
            .clone()
            .unwrap_or_else(|| result.path.display().to_string());
        match &result.outcome {
            TestOutcome::Pass => eprintln!("  {}  {}", pass_label(no_color), label),
            TestOutcome::Fail(_) => {
                eprintln!("  {}  {}", fail_label(no_color), label);
                failures.push(result);
            }
        }
    }

    eprintln!();
    if !failures.is_empty() {
        eprintln!("failures:");
        eprintln!();
        for failure in &failures {
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
            eprintln!();
        }
    }

    let passed = tests.len() - failures.len();
    let status = if failures.is_empty() {
        if no_color { "ok" } else { "\x1b[32mok\x1b[0m" }
    } else if no_color {
        "FAILED"
    } else {
        "\x1b[31mFAILED\x1b[0m"
    };
    eprintln!(
        "test result: {}. {} passed, {} failed",
        status,
        passed,
        failures.len()
    );

    if failures.is_empty() { 0 } else { 1 }
}

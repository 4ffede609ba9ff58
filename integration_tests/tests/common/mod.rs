#![allow(dead_code)]

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use emissions_core::{EmissionsModel, ProjectionResult};
use emissions_schema::ScenarioRequest;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_request(relative: &str) -> Result<ScenarioRequest> {
    let path = fixture_path(relative);
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    ScenarioRequest::parse_str(&contents)
        .with_context(|| format!("invalid scenario request {}", path.display()))
}

pub fn run_fixture(relative: &str) -> Result<ProjectionResult> {
    let request = load_request(relative)?;
    EmissionsModel::builtin()
        .run(&request)
        .with_context(|| format!("scenario {relative} failed"))
}

pub fn assert_close(actual: f64, expected: f64, relative_tolerance: f64) {
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= relative_tolerance * scale,
        "expected {expected}, got {actual}"
    );
}

use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use serde_json::Value;

const SCHEMA_DIR: &str = "docs/schema";
const REQUEST_SCHEMA_FILE: &str = "scenario_request.schema.json";
const OUTPUT_SCHEMA_FILE: &str = "scenario_output.schema.json";
const FIXTURE_PATTERN: &str = "integration_tests/tests/fixtures/requests/*.json";

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("export-schema") => export_schema(args.next().map(PathBuf::from)),
        Some("validate-fixtures") => validate_fixtures(args.next().as_deref()),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(cmd) => {
            eprintln!("Unknown xtask '{cmd}'.");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask export-schema [OUT_DIR]");
    eprintln!("       cargo xtask validate-fixtures [GLOB]");
    eprintln!("       cargo xtask help");
}

fn export_schema(out_dir: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(SCHEMA_DIR));
    fs::create_dir_all(&out_dir)?;

    for (file, schema) in [
        (
            REQUEST_SCHEMA_FILE,
            serde_json::to_value(emissions_schema::request_schema())?,
        ),
        (
            OUTPUT_SCHEMA_FILE,
            serde_json::to_value(emissions_schema::output_schema())?,
        ),
    ] {
        let path = out_dir.join(file);
        fs::write(&path, serde_json::to_string_pretty(&schema)? + "\n")?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn validate_fixtures(pattern: Option<&str>) -> Result<(), Box<dyn Error>> {
    let schema = serde_json::to_value(emissions_schema::request_schema())?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| format!("request schema does not compile: {err}"))?;

    let pattern = pattern.unwrap_or(FIXTURE_PATTERN);
    let mut checked = 0usize;
    let mut failures = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry?;
        checked += 1;
        if let Err(problems) = validate_file(&compiled, &path) {
            failures.push((path, problems));
        }
    }

    for (path, problems) in &failures {
        eprintln!("{}:", path.display());
        for problem in problems {
            eprintln!("  {problem}");
        }
    }
    if checked == 0 {
        return Err(format!("no fixtures matched '{pattern}'").into());
    }
    if !failures.is_empty() {
        return Err(format!("{} of {checked} fixtures failed validation", failures.len()).into());
    }
    println!("Validated {checked} fixtures against the scenario request schema");
    Ok(())
}

/// Schema check followed by the request's own semantic validation.
fn validate_file(schema: &JSONSchema, path: &Path) -> Result<(), Vec<String>> {
    let contents = fs::read_to_string(path).map_err(|err| vec![err.to_string()])?;
    let instance: Value = serde_json::from_str(&contents).map_err(|err| vec![err.to_string()])?;

    if let Err(errors) = schema.validate(&instance) {
        let problems = errors
            .map(|error| format!("{}: {error}", error.instance_path))
            .collect();
        return Err(problems);
    }

    emissions_schema::ScenarioRequest::parse_str(&contents)
        .map(|_| ())
        .map_err(|err| err.errors().to_vec())
}

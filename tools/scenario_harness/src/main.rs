use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use emissions_core::{EmissionsModel, ProjectionResult};
use emissions_schema::ScenarioRequest;
use serde_json::{json, Value as JsonValue};

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs household emissions scenarios from JSON requests", long_about = None)]
struct Args {
    /// Scenario request JSON files; several files run as one parallel batch
    #[arg(required_unless_present = "schema")]
    requests: Vec<PathBuf>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Append cumulative baseline/policy comparison to each output
    #[arg(long)]
    compare: bool,

    /// Print the scenario request JSON schema and exit
    #[arg(long)]
    schema: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.schema {
        let schema = emissions_schema::request_schema();
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let requests = args
        .requests
        .iter()
        .map(|path| load_request(path))
        .collect::<Result<Vec<_>>>()?;

    let model = EmissionsModel::from_env();
    tracing::info!(
        target: "emissions::batch",
        countries = model.reference().country_names().count(),
        "scenario_harness.ready"
    );

    let results = model.run_batch(&requests);
    for (path, result) in args.requests.iter().zip(results) {
        let result =
            result.with_context(|| format!("Scenario {} failed", path.display()))?;
        let output = render(&result, args.compare)?;
        if args.pretty {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string(&output)?);
        }
    }

    Ok(())
}

fn load_request(path: &Path) -> Result<ScenarioRequest> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario request at {}", path.display()))?;
    ScenarioRequest::parse_str(&contents)
        .with_context(|| format!("Invalid scenario request at {}", path.display()))
}

fn render(result: &ProjectionResult, compare: bool) -> Result<JsonValue> {
    let mut output = serde_json::to_value(result.to_output())?;
    if compare {
        let comparison = match result.comparison() {
            Some(comparison) => serde_json::to_value(comparison)?,
            None => JsonValue::Null,
        };
        if let JsonValue::Object(map) = &mut output {
            map.insert("comparison".to_string(), comparison);
        } else {
            output = json!({ "output": output, "comparison": comparison });
        }
    }
    Ok(output)
}

//! Reader for the Cucumber JSON report format.
//!
//! A report is an array of features. Each feature holds `elements`
//! (scenarios and backgrounds), each element holds `steps`, and each step
//! carries a `result` with `status` and `duration` in nanoseconds.
//! Background steps are folded into the scenario that follows them, since
//! that is the scenario they ran for.

use super::{slug, Feature, Scenario, Step, StepResult};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct WireFeature {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    elements: Vec<WireElement>,
}

#[derive(Debug, Deserialize)]
struct WireElement {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    keyword: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    steps: Vec<WireStep>,
}

#[derive(Debug, Deserialize)]
struct WireStep {
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    rows: Option<Vec<WireRow>>,
    #[serde(default)]
    result: Option<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireRow {
    #[serde(default)]
    cells: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    duration: Option<Value>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Decode one Cucumber JSON document. Blank input yields no features.
pub fn parse_report(bytes: &[u8]) -> Result<Vec<Feature>, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let wire: Vec<WireFeature> = serde_json::from_slice(bytes)?;
    Ok(wire.into_iter().map(convert_feature).collect())
}

fn convert_feature(wire: WireFeature) -> Feature {
    let id = wire
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| slug(&wire.name));

    let mut elements = Vec::new();
    let mut background: Vec<Step> = Vec::new();

    for element in wire.elements {
        let steps: Vec<Step> = element.steps.into_iter().map(convert_step).collect();
        if element.kind.as_deref() == Some("background") {
            background = steps;
            continue;
        }

        let scenario_id = element
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("{};{}", id, slug(&element.name)));

        let mut all_steps = std::mem::take(&mut background);
        all_steps.extend(steps);

        elements.push(Scenario {
            id: scenario_id,
            name: element.name,
            keyword: element.keyword,
            steps: all_steps,
        });
    }

    Feature {
        id,
        name: wire.name,
        uri: wire.uri,
        elements,
    }
}

fn convert_step(wire: WireStep) -> Step {
    let result = match wire.result {
        Some(r) => StepResult {
            status: r.status.unwrap_or_default(),
            duration: r.duration,
            error_message: r.error_message,
        },
        // The runner never reached a definition for this step.
        None => StepResult {
            status: "undefined".to_string(),
            duration: None,
            error_message: None,
        },
    };

    Step {
        keyword: wire.keyword,
        name: wire.name,
        rows: wire
            .rows
            .map(|rows| rows.into_iter().map(|row| row.cells).collect()),
        result,
    }
}

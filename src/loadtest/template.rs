//! Run templates
//!
//! A run template is the scenario document posted to the backend. The target
//! URL is written into the first request of every scenario.

use reqwest::Url;
use serde_json::{json, Value};
use std::path::Path;

use crate::error::GateError;

/// Scenario document with request slots for the target URL
#[derive(Clone, Debug, PartialEq)]
pub struct RunTemplate {
    document: Value,
}

impl Default for RunTemplate {
    fn default() -> Self {
        Self {
            document: json!({
                "testName": "loadtest-gate",
                "testDescription": "Load test started by the deployment gate",
                "testTaskConfigs": [
                    { "concurrency": 5, "taskCount": 1, "region": "us-east-1" }
                ],
                "testScenario": {
                    "execution": [
                        { "ramp-up": "0m", "hold-for": "1m", "scenario": "sampleScenario" }
                    ],
                    "scenarios": {
                        "sampleScenario": {
                            "requests": [
                                { "url": "", "method": "GET", "body": {}, "headers": {} }
                            ]
                        }
                    }
                },
                "showLive": false,
                "testType": "simple",
                "fileType": "none",
                "regionalTaskDetails": {}
            }),
        }
    }
}

impl RunTemplate {
    /// Use a parsed JSON document as template
    pub fn from_value(document: Value) -> Result<Self, GateError> {
        let template = Self { document };
        if template.slot_count() == 0 {
            return Err(GateError::config(
                "run template has no testScenario.scenarios.<name>.requests[0] to target",
            ));
        }
        Ok(template)
    }

    /// Load a JSON template file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::config(format!("failed to read run template {}: {e}", path.display()))
        })?;
        let document = serde_json::from_str(&content).map_err(|e| {
            GateError::config(format!("run template {} is not valid JSON: {e}", path.display()))
        })?;
        Self::from_value(document)
    }

    /// Produce the request body for a run against `target`
    pub fn render(&self, target: &Url) -> Result<Value, GateError> {
        let mut document = self.document.clone();
        let mut injected = 0;

        if let Some(scenarios) = document
            .pointer_mut("/testScenario/scenarios")
            .and_then(Value::as_object_mut)
        {
            for scenario in scenarios.values_mut() {
                if let Some(request) = scenario
                    .pointer_mut("/requests/0")
                    .and_then(Value::as_object_mut)
                {
                    request.insert("url".to_string(), Value::String(target.to_string()));
                    injected += 1;
                }
            }
        }

        if injected == 0 {
            return Err(GateError::config("run template has no request slot for the target URL"));
        }
        Ok(document)
    }

    fn slot_count(&self) -> usize {
        self.document
            .pointer("/testScenario/scenarios")
            .and_then(Value::as_object)
            .map(|scenarios| {
                scenarios
                    .values()
                    .filter(|s| s.pointer("/requests/0").map_or(false, Value::is_object))
                    .count()
            })
            .unwrap_or(0)
    }
}

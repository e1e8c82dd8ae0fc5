//! Backend wire format
//!
//! Response documents of the scenarios API. Field names follow the backend
//! schema exactly (`testId`, `status`, `results.total.avg_rt`,
//! `results.total.fail`).

use serde::Deserialize;
use tracing::debug;

use crate::error::GateError;
use crate::models::{RunMetrics, RunStatus, TestRun};

#[derive(Debug, Deserialize)]
struct StartRunResponse {
    #[serde(rename = "testId")]
    test_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunStatusResponse {
    status: Option<String>,
    results: Option<RunResults>,
}

#[derive(Debug, Deserialize)]
struct RunResults {
    total: Option<TotalResults>,
}

#[derive(Debug, Deserialize)]
struct TotalResults {
    avg_rt: Option<f64>,
    fail: Option<f64>,
}

/// Extract the run identifier from a create-run response
pub fn parse_start_response(body: &str) -> Result<String, GateError> {
    let response: StartRunResponse = serde_json::from_str(body)
        .map_err(|e| GateError::malformed(format!("create-run response is not JSON: {e}"), body))?;

    response
        .test_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GateError::malformed("create-run response has no testId", body))
}

/// Build a run snapshot from a get-run response
pub fn parse_status_response(run_id: &str, body: &str) -> Result<TestRun, GateError> {
    let response: RunStatusResponse = serde_json::from_str(body)
        .map_err(|e| GateError::malformed(format!("run status response is not JSON: {e}"), body))?;

    let raw_status = response
        .status
        .ok_or_else(|| GateError::malformed("run status response has no status", body))?;
    let status = RunStatus::from_wire(&raw_status).ok_or_else(|| {
        GateError::malformed(format!("unknown run status {raw_status:?}"), body)
    })?;

    debug!("run {} reported status {:?}", run_id, raw_status);

    if status != RunStatus::Complete {
        return Ok(TestRun::without_metrics(run_id, status));
    }

    let total = response
        .results
        .and_then(|r| r.total)
        .ok_or_else(|| GateError::malformed("complete run has no results.total", body))?;

    let avg_rt = total
        .avg_rt
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| GateError::malformed("complete run has no valid avg_rt", body))?;
    let fail = total
        .fail
        .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
        .ok_or_else(|| GateError::malformed("complete run has no valid fail count", body))?;

    Ok(TestRun::complete(run_id, RunMetrics::new(avg_rt, fail as u64)))
}

/// Build a run snapshot from a saved get-run response
///
/// The run id is taken from the document's `testId` when present.
pub fn parse_saved_run(body: &str) -> Result<TestRun, GateError> {
    let response: StartRunResponse = serde_json::from_str(body)
        .map_err(|e| GateError::malformed(format!("saved run is not JSON: {e}"), body))?;

    let run_id = response
        .test_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| OFFLINE_RUN_ID.to_string());
    parse_status_response(&run_id, body)
}

/// Run id used for saved documents without a `testId`
pub const OFFLINE_RUN_ID: &str = "offline";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_response() {
        assert_eq!(parse_start_response(r#"{"testId":"Ab12Cd"}"#).unwrap(), "Ab12Cd");

        let err = parse_start_response(r#"{"message":"ok"}"#).unwrap_err();
        match err {
            GateError::MalformedResponse { payload, .. } => assert_eq!(payload, r#"{"message":"ok"}"#),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(parse_start_response("<html>").is_err());
        assert!(parse_start_response(r#"{"testId":""}"#).is_err());
    }

    #[test]
    fn test_parse_running_ignores_partial_results() {
        let run = parse_status_response(
            "abc",
            r#"{"status":"running","results":{"total":{"avg_rt":1.0}}}"#,
        )
        .unwrap();
        assert_eq!(run, TestRun::running("abc"));
    }

    #[test]
    fn test_parse_complete() {
        let body = r#"{
            "testId": "abc",
            "status": "complete",
            "results": {
                "total": { "avg_rt": 120, "fail": 2, "succ": 998, "throughput": 1000 }
            }
        }"#;
        let run = parse_status_response("abc", body).unwrap();
        assert_eq!(run, TestRun::complete("abc", RunMetrics::new(120.0, 2)));
    }

    #[test]
    fn test_parse_complete_without_metrics() {
        let err = parse_status_response("abc", r#"{"status":"complete"}"#).unwrap_err();
        assert!(matches!(err, GateError::MalformedResponse { .. }));

        let err = parse_status_response(
            "abc",
            r#"{"status":"complete","results":{"total":{"avg_rt":1.5}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GateError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_rejects_fractional_failures() {
        let body = r#"{"status":"complete","results":{"total":{"avg_rt":1.5,"fail":2.5}}}"#;
        assert!(parse_status_response("abc", body).is_err());
    }

    #[test]
    fn test_parse_failed_and_unknown() {
        let run = parse_status_response("abc", r#"{"status":"failed"}"#).unwrap();
        assert_eq!(run, TestRun::failed("abc"));

        let err = parse_status_response("abc", r#"{"status":"paused"}"#).unwrap_err();
        assert!(matches!(err, GateError::MalformedResponse { .. }));

        let err = parse_status_response("abc", r#"{}"#).unwrap_err();
        assert!(matches!(err, GateError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_saved_run() {
        let body = r#"{"testId":"abc","status":"complete","results":{"total":{"avg_rt":80,"fail":0}}}"#;
        let run = parse_saved_run(body).unwrap();
        assert_eq!(run, TestRun::complete("abc", RunMetrics::new(80.0, 0)));

        let run = parse_saved_run(r#"{"status":"failed"}"#).unwrap();
        assert_eq!(run, TestRun::failed(OFFLINE_RUN_ID));
    }
}

//! REST transport client for the Spectrum Scale management API
//! (`/scalemgmt/v2`).
//!
//! Authentication is a static basic token (base64 of `user:pass`)
//! validated once at startup against the `info` endpoint; there is no
//! automatic refresh. Mutating calls are asynchronous on the backend: the
//! response names a job which is then polled once per second until it
//! leaves the `RUNNING` state or the configured timeout elapses. A timeout
//! or a job ending `FAILED` is surfaced as an error, never assumed to be
//! success.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{debug, info};
use serde_json::Value;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::EssConfig;
use crate::errors::OpError;

const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Translate a management-API failure into the generic taxonomy. Single
/// translation point for this backend.
///
/// The API answers 400 for a lookup of an unknown object, so 400 and 404
/// both mean not-found on a GET. On mutating verbs a 400 is a bad request
/// and keeps its raw code and message.
pub fn classify_ess_error(
    method: &reqwest::Method,
    code: u16,
    message: &str,
    target: &str,
) -> OpError {
    match code {
        404 => OpError::NotFound(target.to_string()),
        400 if *method == reqwest::Method::GET => OpError::NotFound(target.to_string()),
        409 => OpError::AlreadyExists(target.to_string()),
        _ => OpError::backend(code, message.to_string()),
    }
}

/// Status values a management job moves through.
fn job_is_running(status: &str) -> bool {
    status.eq_ignore_ascii_case("RUNNING")
}

/// Seam between the storage adapters and the wire protocol.
pub trait EssRest {
    fn get(&self, path: &str) -> Result<Value, OpError>;
    fn post(&self, path: &str, body: &Value) -> Result<Value, OpError>;
    fn put(&self, path: &str, body: &Value) -> Result<Value, OpError>;
    fn delete(&self, path: &str) -> Result<Value, OpError>;

    /// Block until the job named in a mutating response has finished.
    fn wait_for_job(&self, response: &Value) -> Result<(), OpError>;
}

/// Connection to one Spectrum Scale management server.
pub struct EssClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
    job_timeout: Duration,
}

impl EssClient {
    /// Build the client and validate the token once against the `info`
    /// endpoint.
    pub fn connect(config: &EssConfig) -> Result<Self, OpError> {
        let http = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        let token = BASE64.encode(format!("{}:{}", config.username, config.password));
        let client = Self {
            http,
            base_url: format!("https://{}:{}/scalemgmt/v2", config.server, config.port),
            token,
            job_timeout: Duration::from_secs(config.job_timeout_secs),
        };

        client.get("info")?;
        info!(
            "authenticated against storage manager at {}:{}",
            config.server, config.port
        );
        Ok(client)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
        expected: &[u16],
    ) -> Result<Value, OpError> {
        debug!("ess {} {}", method, path);
        let mut builder = self
            .http
            .request(method.clone(), format!("{}/{}", self.base_url, path))
            .header("Authorization", format!("Basic {}", self.token))
            .header("Accept", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let parsed: Value = response.json().unwrap_or(Value::Null);

        if expected.contains(&status) {
            return Ok(parsed);
        }

        // On failure the body carries a status object with the backend's
        // own code and message; prefer those for diagnostics.
        let code = parsed
            .get("status")
            .and_then(|s| s.get("code"))
            .and_then(Value::as_u64)
            .map(|c| c as u16)
            .unwrap_or(status);
        let message = parsed
            .get("status")
            .and_then(|s| s.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("storage manager request failed")
            .to_string();
        Err(classify_ess_error(&method, code, &message, path))
    }

}

/// Poll a job through `fetch` until it leaves the `RUNNING` state.
///
/// `fetch` returns the `jobs/{id}` response body. A timeout is reported
/// as `OpError::Timeout`; a job finishing in any state other than
/// `COMPLETED` is reported as a backend fault carrying its stderr.
fn await_job<F>(fetch: F, job_id: u64, timeout: Duration) -> Result<(), OpError>
where
    F: Fn(u64) -> Result<Value, OpError>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let response = fetch(job_id)?;
        let job = response
            .get("jobs")
            .and_then(Value::as_array)
            .and_then(|jobs| jobs.first())
            .cloned()
            .unwrap_or(Value::Null);
        let status = job
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");

        if !job_is_running(status) {
            if status.eq_ignore_ascii_case("COMPLETED") {
                return Ok(());
            }
            let message = job
                .get("result")
                .and_then(|r| r.get("stderr"))
                .and_then(Value::as_array)
                .and_then(|lines| lines.first())
                .and_then(Value::as_str)
                .unwrap_or("management job failed")
                .to_string();
            return Err(OpError::backend(format!("job:{}", status), message));
        }

        if Instant::now() >= deadline {
            return Err(OpError::Timeout(job_id.to_string()));
        }
        thread::sleep(JOB_POLL_INTERVAL);
    }
}

impl EssRest for EssClient {
    fn get(&self, path: &str) -> Result<Value, OpError> {
        self.request(reqwest::Method::GET, path, None, &[200])
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value, OpError> {
        self.request(reqwest::Method::POST, path, Some(body), &[200, 201, 202])
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value, OpError> {
        self.request(reqwest::Method::PUT, path, Some(body), &[200, 201, 202])
    }

    fn delete(&self, path: &str) -> Result<Value, OpError> {
        self.request(reqwest::Method::DELETE, path, None, &[202, 204])
    }

    fn wait_for_job(&self, response: &Value) -> Result<(), OpError> {
        let job_id = response
            .get("jobs")
            .and_then(Value::as_array)
            .and_then(|jobs| jobs.first())
            .and_then(|job| job.get("jobId"))
            .and_then(Value::as_u64);
        match job_id {
            Some(id) => await_job(|id| self.get(&format!("jobs/{}", id)), id, self.job_timeout),
            // Some firmware levels answer synchronously with no job.
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use reqwest::Method;

    #[test]
    fn test_classify_400_on_get_is_not_found() {
        let e = classify_ess_error(
            &Method::GET,
            400,
            "invalid fileset",
            "filesystems/ess1/filesets/home",
        );
        assert!(matches!(e, OpError::NotFound(_)));
    }

    #[test]
    fn test_classify_400_on_mutation_keeps_raw_details() {
        // A rejected create is a bad request, not a missing object.
        let e = classify_ess_error(
            &Method::POST,
            400,
            "Invalid value in inodeSpace",
            "filesystems/ess1/filesets",
        );
        match e {
            OpError::Backend { code, message } => {
                assert_eq!(code, "400");
                assert_eq!(message, "Invalid value in inodeSpace");
            }
            other => panic!("expected backend fault, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_404_is_not_found_on_any_verb() {
        let e = classify_ess_error(&Method::DELETE, 404, "no such fileset", "jobs/1");
        assert!(matches!(e, OpError::NotFound(_)));
    }

    #[test]
    fn test_classify_409_is_already_exists() {
        let e = classify_ess_error(&Method::POST, 409, "fileset exists", "filesystems/ess1/filesets");
        assert!(matches!(e, OpError::AlreadyExists(_)));
    }

    #[test]
    fn test_classify_other_codes_keep_raw_details() {
        let e = classify_ess_error(&Method::GET, 500, "internal server error", "jobs/1");
        match e {
            OpError::Backend { code, message } => {
                assert_eq!(code, "500");
                assert_eq!(message, "internal server error");
            }
            other => panic!("expected backend fault, got {:?}", other),
        }
    }

    #[test]
    fn test_job_running_detection() {
        assert!(job_is_running("RUNNING"));
        assert!(job_is_running("running"));
        assert!(!job_is_running("COMPLETED"));
        assert!(!job_is_running("FAILED"));
    }

    fn job_response(status: &str) -> Value {
        serde_json::json!({"jobs": [{"jobId": 7, "status": status}]})
    }

    #[test]
    fn test_await_job_completed() {
        let result = await_job(|_| Ok(job_response("COMPLETED")), 7, Duration::from_secs(1));
        assert!(result.is_ok());
    }

    #[test]
    fn test_await_job_never_finishing_times_out() {
        let result = await_job(|_| Ok(job_response("RUNNING")), 7, Duration::ZERO);
        assert!(matches!(result, Err(OpError::Timeout(id)) if id == "7"));
    }

    #[test]
    fn test_await_job_failed_is_backend_fault() {
        let response = serde_json::json!({
            "jobs": [{
                "jobId": 7,
                "status": "FAILED",
                "result": {"stderr": ["mmcrfileset: permission denied"]}
            }]
        });
        let result = await_job(|_| Ok(response.clone()), 7, Duration::from_secs(1));
        match result {
            Err(OpError::Backend { code, message }) => {
                assert_eq!(code, "job:FAILED");
                assert!(message.contains("permission denied"));
            }
            other => panic!("expected backend fault, got {:?}", other),
        }
    }
}

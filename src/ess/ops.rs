//! Storage operation adapters.
//!
//! Paths follow the management API resource layout:
//! `filesystems/{fs}/filesets[/{name}[/link]]`, `filesystems/{fs}/quotas`
//! and `jobs/{id}`. The backend reports block quota values in KiB units;
//! adapters convert to bytes at the edge so callers only ever see bytes.

use serde_json::{json, Value};

use crate::errors::OpResult;
use crate::ess::client::EssRest;
use crate::request::{OpRequest, OutputBuilder};

fn kib_to_bytes(value: Option<u64>) -> u64 {
    value.unwrap_or(0) * 1024
}

fn bytes_to_kib(bytes: u64) -> u64 {
    bytes / 1024
}

fn quota_field(quota: &Value, key: &str) -> Option<u64> {
    quota.get(key).and_then(Value::as_u64)
}

/// Look up a fileset and its fileset-level quota.
///
/// Outputs: `path`, `created`, `usage_bytes`, `quota_bytes`,
/// `usage_files`, `quota_files`.
pub fn fileset_query(rest: &dyn EssRest, req: &OpRequest) -> OpResult {
    let filesystem = req.required_name("filesystem")?;
    let fileset = req.required_name("fileset")?;

    let response = rest.get(&format!(
        "filesystems/{}/filesets/{}",
        filesystem, fileset
    ))?;
    let config = response
        .get("filesets")
        .and_then(Value::as_array)
        .and_then(|f| f.first())
        .and_then(|f| f.get("config"))
        .cloned()
        .unwrap_or(Value::Null);

    let quotas = rest.get(&format!(
        "filesystems/{}/quotas?filter=objectName={}",
        filesystem, fileset
    ))?;
    let quota = quotas
        .get("quotas")
        .and_then(Value::as_array)
        .and_then(|q| q.first())
        .cloned()
        .unwrap_or(Value::Null);

    Ok(OutputBuilder::new()
        .field(
            "path",
            config.get("path").and_then(Value::as_str).unwrap_or_default(),
        )
        .field(
            "created",
            config
                .get("created")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        )
        .field("usage_bytes", kib_to_bytes(quota_field(&quota, "blockUsage")))
        .field("quota_bytes", kib_to_bytes(quota_field(&quota, "blockQuota")))
        .field("usage_files", quota_field(&quota, "filesUsage").unwrap_or(0))
        .field("quota_files", quota_field(&quota, "filesQuota").unwrap_or(0))
        .build())
}

/// Create a fileset under a parent inode space and wait for the backend
/// job to finish.
pub fn fileset_create(rest: &dyn EssRest, req: &OpRequest) -> OpResult {
    let filesystem = req.required_name("filesystem")?;
    let fileset = req.required_name("fileset")?;
    let path = req.required("path")?;
    let parent = req.required_name("parent")?;
    let owner = req.required("owner")?;
    let permissions = req.required("permissions")?;

    let body = json!({
        "filesetName": fileset,
        "path": path,
        "inodeSpace": parent,
        "owner": owner,
        "permissions": permissions,
    });
    let response = rest.post(&format!("filesystems/{}/filesets", filesystem), &body)?;
    rest.wait_for_job(&response)?;
    Ok(OutputBuilder::new().build())
}

/// Delete a fileset and wait for the backend job to finish.
pub fn fileset_delete(rest: &dyn EssRest, req: &OpRequest) -> OpResult {
    let filesystem = req.required_name("filesystem")?;
    let fileset = req.required_name("fileset")?;

    let response = rest.delete(&format!(
        "filesystems/{}/filesets/{}",
        filesystem, fileset
    ))?;
    rest.wait_for_job(&response)?;
    Ok(OutputBuilder::new().build())
}

/// Link a fileset into the namespace at `path`.
pub fn fileset_link(rest: &dyn EssRest, req: &OpRequest) -> OpResult {
    let filesystem = req.required_name("filesystem")?;
    let fileset = req.required_name("fileset")?;
    let path = req.required("path")?;

    let body = json!({ "path": path });
    let response = rest.post(
        &format!("filesystems/{}/filesets/{}/link", filesystem, fileset),
        &body,
    )?;
    rest.wait_for_job(&response)?;
    Ok(OutputBuilder::new().build())
}

/// Unlink a fileset from the namespace.
pub fn fileset_unlink(rest: &dyn EssRest, req: &OpRequest) -> OpResult {
    let filesystem = req.required_name("filesystem")?;
    let fileset = req.required_name("fileset")?;

    let response = rest.delete(&format!(
        "filesystems/{}/filesets/{}/link?force=true",
        filesystem, fileset
    ))?;
    rest.wait_for_job(&response)?;
    Ok(OutputBuilder::new().build())
}

/// Set the fileset quota. Caller supplies bytes and a file count; block
/// limits are sent to the backend in its KiB units.
pub fn quota_set(rest: &dyn EssRest, req: &OpRequest) -> OpResult {
    let filesystem = req.required_name("filesystem")?;
    let fileset = req.required_name("fileset")?;
    let quota_bytes = req.required_u64("quota_bytes")?;
    let quota_files = req.required_u64("quota_files")?;

    let block_limit = bytes_to_kib(quota_bytes);
    let body = json!({
        "operationType": "setQuota",
        "quotaType": "FILESET",
        "objectName": fileset,
        "blockSoftLimit": block_limit,
        "blockHardLimit": block_limit,
        "filesSoftLimit": quota_files,
        "filesHardLimit": quota_files,
    });
    let response = rest.post(&format!("filesystems/{}/quotas", filesystem), &body)?;
    rest.wait_for_job(&response)?;
    Ok(OutputBuilder::new().build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OpError;

    #[test]
    fn test_kib_conversion() {
        // blockUsage=100 in KiB units must come out as 102400 bytes.
        assert_eq!(kib_to_bytes(Some(100)), 102_400);
        assert_eq!(kib_to_bytes(None), 0);
        assert_eq!(bytes_to_kib(102_400), 100);
    }

    #[test]
    fn test_missing_fields_fail_before_any_request() {
        struct Unreachable;
        impl EssRest for Unreachable {
            fn get(&self, _: &str) -> Result<Value, OpError> {
                panic!("transport must not be reached")
            }
            fn post(&self, _: &str, _: &Value) -> Result<Value, OpError> {
                panic!("transport must not be reached")
            }
            fn put(&self, _: &str, _: &Value) -> Result<Value, OpError> {
                panic!("transport must not be reached")
            }
            fn delete(&self, _: &str) -> Result<Value, OpError> {
                panic!("transport must not be reached")
            }
            fn wait_for_job(&self, _: &Value) -> Result<(), OpError> {
                panic!("transport must not be reached")
            }
        }

        let req = OpRequest::from_json(r#"{"filesystem": "ess1"}"#).unwrap();
        let err = fileset_query(&Unreachable, &req).unwrap_err();
        assert!(matches!(err, OpError::MissingField(f) if f == "fileset"));
    }
}

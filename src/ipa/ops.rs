//! Identity operation adapters.
//!
//! Each function validates the named arguments of one operation, issues a
//! single RPC through [`IpaRpc`], and reshapes the backend attributes into
//! the operation's declared output fields.
//!
//! FreeIPA reports entry attributes as single-element string arrays
//! (`"uidnumber": ["1234"]`); `attr_first` unwraps that convention.

use serde_json::{Map, Value};

use crate::errors::{OpError, OpResult};
use crate::ipa::client::IpaRpc;
use crate::request::{OpRequest, OutputBuilder};

fn params() -> Map<String, Value> {
    Map::new()
}

fn param(map: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    map.insert(key.to_string(), value.into());
}

/// First element of a FreeIPA attribute array, as text.
fn attr_first<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    match entry.get(key) {
        Some(Value::Array(items)) => items.first().and_then(Value::as_str),
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// All elements of a FreeIPA attribute array, as text.
fn attr_all(entry: &Value, key: &str) -> Vec<String> {
    match entry.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

static NULL: Value = Value::Null;

/// Attribute array of the entry inside an RPC result
/// (`result.result.<key>`).
fn entry(result: &Value) -> &Value {
    result.get("result").unwrap_or(&NULL)
}

/// Classify one per-member failure reported by `group_add_member` /
/// `group_remove_member`. These arrive as human-readable text inside an
/// otherwise successful response, so wording is interpreted here and
/// nowhere else. Returns `None` when the failure means the desired state
/// already holds.
fn classify_member_failure(reason: &str, member: &str) -> Option<OpError> {
    let lower = reason.to_lowercase();
    if lower.contains("already") || lower.contains("not a member") {
        // Desired membership state already in effect; idempotent success.
        None
    } else if lower.contains("no matching") || lower.contains("no such") {
        Some(OpError::NotFound(member.to_string()))
    } else {
        Some(OpError::backend("member", reason.to_string()))
    }
}

/// Walk the `failed` map of a member operation and surface the first
/// failure that is not an idempotent no-op.
fn check_member_failures(result: &Value, member: &str) -> Result<(), OpError> {
    let failed = result
        .get("failed")
        .and_then(|f| f.get("member"))
        .and_then(Value::as_object);
    let Some(failed) = failed else {
        return Ok(());
    };

    for entries in failed.values() {
        let Some(entries) = entries.as_array() else {
            continue;
        };
        for pair in entries {
            // Each failure is a [name, reason] pair.
            let reason = pair
                .get(1)
                .and_then(Value::as_str)
                .unwrap_or("unspecified member failure");
            if let Some(error) = classify_member_failure(reason, member) {
                return Err(error);
            }
        }
    }
    Ok(())
}

/// Create a user. Outputs the assigned `uid` and `gid`.
pub fn user_create(rpc: &dyn IpaRpc, req: &OpRequest) -> OpResult {
    let user = req.required_name("user")?;
    let email = req.required_mail("email")?;
    let firstname = req.required("firstname")?;
    let lastname = req.required("lastname")?;

    let mut p = params();
    param(&mut p, "givenname", firstname);
    param(&mut p, "sn", lastname);
    param(&mut p, "cn", format!("{} {}", firstname, lastname));
    param(&mut p, "mail", email);

    let result = rpc.call("user_add", user, p)?;
    let entry = entry(&result);

    Ok(OutputBuilder::new()
        .field("uid", attr_first(entry, "uidnumber").unwrap_or_default())
        .field("gid", attr_first(entry, "gidnumber").unwrap_or_default())
        .build())
}

/// Look up a user and report its core attributes.
pub fn user_query(rpc: &dyn IpaRpc, req: &OpRequest) -> OpResult {
    let user = req.required_name("user")?;

    let result = rpc.call("user_show", user, params())?;
    let entry = entry(&result);

    Ok(OutputBuilder::new()
        .field("firstname", attr_first(entry, "givenname").unwrap_or_default())
        .field("lastname", attr_first(entry, "sn").unwrap_or_default())
        .field("email", attr_first(entry, "mail").unwrap_or_default())
        .field("sshkeys", attr_all(entry, "ipasshpubkey"))
        .field("uid", attr_first(entry, "uidnumber").unwrap_or_default())
        .field("gid", attr_first(entry, "gidnumber").unwrap_or_default())
        .build())
}

/// Modify user attributes. Only the supplied optional fields are sent;
/// with nothing to change the call is skipped entirely.
pub fn user_modify(rpc: &dyn IpaRpc, req: &OpRequest) -> OpResult {
    let user = req.required_name("user")?;

    let mut p = params();
    if let Some(email) = req.optional("email")? {
        if !crate::validate::validate_mail(email) {
            return Err(OpError::InvalidField("email".to_string()));
        }
        param(&mut p, "mail", email);
    }
    if let Some(firstname) = req.optional("firstname")? {
        param(&mut p, "givenname", firstname);
    }
    if let Some(lastname) = req.optional("lastname")? {
        param(&mut p, "sn", lastname);
    }
    if let Some(keys) = req.optional_strings("sshkeys")? {
        param(&mut p, "ipasshpubkey", keys);
    }

    if !p.is_empty() {
        rpc.call("user_mod", user, p)?;
    }
    Ok(OutputBuilder::new().build())
}

/// Delete a user.
pub fn user_delete(rpc: &dyn IpaRpc, req: &OpRequest) -> OpResult {
    let user = req.required_name("user")?;
    rpc.call("user_del", user, params())?;
    Ok(OutputBuilder::new().build())
}

/// Create a group. Outputs the assigned `gid`.
pub fn group_create(rpc: &dyn IpaRpc, req: &OpRequest) -> OpResult {
    let group = req.required_name("group")?;

    let mut p = params();
    if let Some(gid) = req.optional_u64("gid")? {
        param(&mut p, "gidnumber", gid);
    }

    let result = rpc.call("group_add", group, p)?;
    let entry = entry(&result);

    Ok(OutputBuilder::new()
        .field("gid", attr_first(entry, "gidnumber").unwrap_or_default())
        .build())
}

/// Look up a group: gid and user members.
pub fn group_query(rpc: &dyn IpaRpc, req: &OpRequest) -> OpResult {
    let group = req.required_name("group")?;

    let result = rpc.call("group_show", group, params())?;
    let entry = entry(&result);

    Ok(OutputBuilder::new()
        .field("gid", attr_first(entry, "gidnumber").unwrap_or_default())
        .field("members", attr_all(entry, "member_user"))
        .build())
}

/// Delete a group.
pub fn group_delete(rpc: &dyn IpaRpc, req: &OpRequest) -> OpResult {
    let group = req.required_name("group")?;
    rpc.call("group_del", group, params())?;
    Ok(OutputBuilder::new().build())
}

/// Add a user to a group. Adding an existing member is a no-op.
pub fn group_add_user(rpc: &dyn IpaRpc, req: &OpRequest) -> OpResult {
    let group = req.required_name("group")?;
    let user = req.required_name("user")?;

    let mut p = params();
    param(&mut p, "user", vec![user.to_string()]);

    let result = rpc.call("group_add_member", group, p)?;
    check_member_failures(&result, user)?;
    Ok(OutputBuilder::new().build())
}

/// Remove a user from a group. Removing a non-member is a no-op.
pub fn group_remove_user(rpc: &dyn IpaRpc, req: &OpRequest) -> OpResult {
    let group = req.required_name("group")?;
    let user = req.required_name("user")?;

    let mut p = params();
    param(&mut p, "user", vec![user.to_string()]);

    let result = rpc.call("group_remove_member", group, p)?;
    check_member_failures(&result, user)?;
    Ok(OutputBuilder::new().build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attr_first_unwraps_arrays() {
        let entry = json!({"uidnumber": ["1234"], "plain": "x"});
        assert_eq!(attr_first(&entry, "uidnumber"), Some("1234"));
        assert_eq!(attr_first(&entry, "plain"), Some("x"));
        assert_eq!(attr_first(&entry, "missing"), None);
    }

    #[test]
    fn test_member_failure_already_is_success() {
        assert!(classify_member_failure("This entry is already a member", "bob").is_none());
        assert!(classify_member_failure("bob is not a member", "bob").is_none());
    }

    #[test]
    fn test_member_failure_no_matching_is_not_found() {
        let e = classify_member_failure("no matching entry found", "bob").unwrap();
        assert!(matches!(e, OpError::NotFound(m) if m == "bob"));
    }

    #[test]
    fn test_member_failure_other_text_is_backend_fault() {
        let e = classify_member_failure("insufficient access rights", "bob").unwrap();
        assert!(matches!(e, OpError::Backend { .. }));
    }

    #[test]
    fn test_check_member_failures_scans_pairs() {
        let result = json!({
            "completed": 0,
            "failed": {"member": {"user": [["bob", "no matching entry found"]]}}
        });
        assert!(check_member_failures(&result, "bob").is_err());

        let ok = json!({
            "completed": 0,
            "failed": {"member": {"user": [["bob", "This entry is already a member"]]}}
        });
        assert!(check_member_failures(&ok, "bob").is_ok());
    }
}

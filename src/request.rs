//! Request/response value structures shared by all operation adapters.
//!
//! The calling framework hands each extension a JSON object of named
//! arguments; the adapter answers with a JSON object of named outputs.
//! Both sides are transient, request-scoped values.

use serde_json::{Map, Value};

use crate::errors::OpError;
use crate::validate::{validate_mail, validate_name};

/// Named output values of a successful operation.
pub type OpOutput = Map<String, Value>;

/// Caller-supplied named arguments of one operation request.
///
/// Accessors enforce the shared field contract: `required*` fails with
/// [`OpError::MissingField`] when the field is absent, and the typed
/// variants fail with [`OpError::InvalidField`] when the value is present
/// but malformed.
#[derive(Debug, Clone, Default)]
pub struct OpRequest {
    args: Map<String, Value>,
}

impl OpRequest {
    pub fn new(args: Map<String, Value>) -> Self {
        Self { args }
    }

    /// Parse a request from its JSON text form.
    pub fn from_json(text: &str) -> Result<Self, OpError> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(Self::new(map)),
            Ok(_) => Err(OpError::InvalidField("request".to_string())),
            Err(_) => Err(OpError::InvalidField("request".to_string())),
        }
    }

    fn raw(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Mandatory string field.
    pub fn required(&self, name: &str) -> Result<&str, OpError> {
        match self.raw(name) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s),
            Some(_) => Err(OpError::InvalidField(name.to_string())),
            None => Err(OpError::MissingField(name.to_string())),
        }
    }

    /// Mandatory field that must satisfy [`validate_name`].
    pub fn required_name(&self, name: &str) -> Result<&str, OpError> {
        let value = self.required(name)?;
        if validate_name(value) {
            Ok(value)
        } else {
            Err(OpError::InvalidField(name.to_string()))
        }
    }

    /// Mandatory field that must satisfy [`validate_mail`].
    pub fn required_mail(&self, name: &str) -> Result<&str, OpError> {
        let value = self.required(name)?;
        if validate_mail(value) {
            Ok(value)
        } else {
            Err(OpError::InvalidField(name.to_string()))
        }
    }

    /// Mandatory numeric field. Accepts a JSON number or a numeric string.
    pub fn required_u64(&self, name: &str) -> Result<u64, OpError> {
        match self.raw(name) {
            Some(Value::Number(n)) => {
                n.as_u64().ok_or_else(|| OpError::InvalidField(name.to_string()))
            }
            Some(Value::String(s)) => s
                .parse::<u64>()
                .map_err(|_| OpError::InvalidField(name.to_string())),
            Some(_) => Err(OpError::InvalidField(name.to_string())),
            None => Err(OpError::MissingField(name.to_string())),
        }
    }

    /// Optional string field; absent and JSON null both map to `None`.
    pub fn optional(&self, name: &str) -> Result<Option<&str>, OpError> {
        match self.raw(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(OpError::InvalidField(name.to_string())),
        }
    }

    /// Optional numeric field.
    pub fn optional_u64(&self, name: &str) -> Result<Option<u64>, OpError> {
        match self.raw(name) {
            None | Some(Value::Null) => Ok(None),
            _ => self.required_u64(name).map(Some),
        }
    }

    /// Optional array-of-strings field.
    pub fn optional_strings(&self, name: &str) -> Result<Option<Vec<String>>, OpError> {
        match self.raw(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s.clone()),
                        _ => return Err(OpError::InvalidField(name.to_string())),
                    }
                }
                Ok(Some(out))
            }
            Some(_) => Err(OpError::InvalidField(name.to_string())),
        }
    }
}

/// Convenience builder for an [`OpOutput`] mapping.
#[derive(Debug, Default)]
pub struct OutputBuilder {
    map: OpOutput,
}

impl OutputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.map.insert(name.to_string(), value.into());
        self
    }

    pub fn build(self) -> OpOutput {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> OpRequest {
        match value {
            Value::Object(map) => OpRequest::new(map),
            _ => panic!("test request must be an object"),
        }
    }

    #[test]
    fn test_required_missing_vs_invalid() {
        let req = request(json!({"user": "alice", "count": "abc"}));
        assert_eq!(req.required("user").unwrap(), "alice");
        assert!(matches!(
            req.required("email"),
            Err(OpError::MissingField(f)) if f == "email"
        ));
        assert!(matches!(
            req.required_u64("count"),
            Err(OpError::InvalidField(f)) if f == "count"
        ));
    }

    #[test]
    fn test_required_name_and_mail() {
        let req = request(json!({"user": "Alice", "email": "a@b.com"}));
        assert!(matches!(
            req.required_name("user"),
            Err(OpError::InvalidField(_))
        ));
        assert_eq!(req.required_mail("email").unwrap(), "a@b.com");
    }

    #[test]
    fn test_numeric_string_is_accepted() {
        let req = request(json!({"jobid": "12345", "credits": 1440}));
        assert_eq!(req.required_u64("jobid").unwrap(), 12345);
        assert_eq!(req.optional_u64("credits").unwrap(), Some(1440));
        assert_eq!(req.optional_u64("absent").unwrap(), None);
    }

    #[test]
    fn test_optional_strings() {
        let req = request(json!({"sshkeys": ["ssh-rsa AAA", "ssh-ed25519 BBB"]}));
        let keys = req.optional_strings("sshkeys").unwrap().unwrap();
        assert_eq!(keys.len(), 2);
        assert!(req.optional_strings("missing").unwrap().is_none());
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(OpRequest::from_json("[1,2]").is_err());
        assert!(OpRequest::from_json("{\"a\": 1}").is_ok());
    }
}

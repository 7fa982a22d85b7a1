//! JSON-RPC transport client for a FreeIPA server.
//!
//! FreeIPA exposes a session endpoint: credentials are posted once to
//! `/ipa/session/login_password` and the server answers with a session
//! cookie, after which method calls go to `/ipa/session/json`. The cookie
//! eventually expires; the server then answers 401 and the client
//! re-authenticates once with its cached credentials and retries the
//! request exactly once.

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::IpaConfig;
use crate::errors::OpError;

/// Error object reported by the FreeIPA RPC layer.
#[derive(Debug, Clone, Deserialize)]
pub struct IpaErrorInfo {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct IpaResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<IpaErrorInfo>,
}

/// Translate a FreeIPA RPC error into the generic taxonomy.
///
/// This is the single place where IPA error codes are interpreted;
/// adapters never branch on raw codes themselves.
pub fn classify_ipa_error(error: &IpaErrorInfo, item: &str) -> OpError {
    match error.code {
        4001 => OpError::NotFound(item.to_string()),
        4002 => OpError::AlreadyExists(item.to_string()),
        _ => OpError::backend(error.code, error.message.clone()),
    }
}

/// Seam between the identity adapters and the wire protocol. Production
/// code uses [`IpaClient`]; tests substitute a fake.
pub trait IpaRpc {
    /// Invoke one RPC method against `item` with extra named parameters,
    /// returning the `result` object of a successful response.
    fn call(&self, method: &str, item: &str, params: Map<String, Value>)
        -> Result<Value, OpError>;
}

/// Authenticated session against one FreeIPA server.
///
/// Constructed once per process and passed by reference into every
/// adapter call; the session cookie lives in the HTTP client's cookie
/// store.
pub struct IpaClient {
    http: reqwest::blocking::Client,
    base_url: String,
    username: String,
    password: String,
    api_version: String,
}

impl IpaClient {
    /// Build the HTTP client and perform the initial session login.
    pub fn connect(config: &IpaConfig) -> Result<Self, OpError> {
        let http = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        let client = Self {
            http,
            base_url: format!("https://{}/ipa", config.server),
            username: config.username.clone(),
            password: config.password.clone(),
            api_version: config.api_version.clone(),
        };
        client.login()?;
        info!("authenticated against FreeIPA at {}", config.server);
        Ok(client)
    }

    /// Post credentials to the session endpoint. The `referer` header is
    /// mandatory; FreeIPA rejects requests without it.
    fn login(&self) -> Result<(), OpError> {
        let response = self
            .http
            .post(format!("{}/session/login_password", self.base_url))
            .header("referer", &self.base_url)
            .header("Accept", "text/plain")
            .form(&[("user", self.username.as_str()), ("password", self.password.as_str())])
            .send()?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(OpError::backend(
                response.status().as_u16(),
                "identity server rejected login",
            ))
        }
    }

    fn send_rpc(&self, body: &Value) -> Result<reqwest::blocking::Response, OpError> {
        Ok(self
            .http
            .post(format!("{}/session/json", self.base_url))
            .header("referer", &self.base_url)
            .json(body)
            .send()?)
    }
}

impl IpaRpc for IpaClient {
    fn call(
        &self,
        method: &str,
        item: &str,
        params: Map<String, Value>,
    ) -> Result<Value, OpError> {
        let mut options = Map::new();
        options.insert("all".to_string(), Value::Bool(true));
        options.insert("raw".to_string(), Value::Bool(false));
        options.insert(
            "version".to_string(),
            Value::String(self.api_version.clone()),
        );
        options.extend(params);

        let body = json!({
            "id": 0,
            "method": method,
            "params": [[item], Value::Object(options)],
        });

        debug!("ipa rpc {} item={}", method, item);
        let mut response = self.send_rpc(&body)?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            // Session cookie expired; re-authenticate once and retry once.
            warn!("identity session expired, re-authenticating");
            self.login()?;
            response = self.send_rpc(&body)?;
        }

        if !response.status().is_success() {
            return Err(OpError::backend(
                response.status().as_u16(),
                format!("identity server rejected {}", method),
            ));
        }

        let parsed: IpaResponse = response.json()?;
        match parsed.error {
            Some(error) => Err(classify_ipa_error(&error, item)),
            None => Ok(parsed.result),
        }
    }
}

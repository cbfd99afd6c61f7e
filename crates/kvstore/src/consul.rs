//! Consul KV backend.
//!
//! Talks to the Consul HTTP API using blocking requests with a global
//! per-request deadline, so a hung agent cannot stall a poll forever.
//!
//! - `GET /v1/kv/<prefix>?keys&separator=/` lists direct children
//! - `GET /v1/kv/<key>?raw` reads one value
//! - `PUT /v1/kv/<key>` writes one value
//!
//! Values are stored as JSON text. A value that is not valid JSON comes
//! back as a JSON string so callers see a shape mismatch, not a crash.

use crate::error::{Error, Result};
use crate::{KvStore, normalize_prefix};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default address of a local Consul agent.
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8500";

/// Default deadline for a single KV request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking Consul KV client.
pub struct ConsulKv {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Base address, without trailing slash.
    address: String,
    /// ACL token sent as `X-Consul-Token`.
    token: Option<String>,
}

impl ConsulKv {
    /// Create a client for the agent at `address`.
    #[must_use]
    pub fn new(address: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        let address: String = address.into();

        Self {
            agent: ureq::Agent::new_with_config(config),
            address: address.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Get the base address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Build the API URL for a key or prefix.
    fn key_url(&self, key: &str) -> String {
        format!("{}/v1/kv/{}", self.address, key.trim_start_matches('/'))
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        match &self.token {
            Some(token) => request.header("X-Consul-Token", token),
            None => request,
        }
    }

    fn transport(&self, err: &ureq::Error) -> Error {
        Error::unreachable(&self.address, err.to_string())
    }
}

impl KvStore for ConsulKv {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let url = format!("{}?raw", self.key_url(key));
        log::trace!("GET {url}");

        let mut response = self
            .authorize(self.agent.get(&url))
            .call()
            .map_err(|e| self.transport(&e))?;

        match response.status().as_u16() {
            200 => {
                let body = response
                    .body_mut()
                    .read_to_string()
                    .map_err(|e| Error::InvalidResponse {
                        key: key.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(Some(decode_value(&body)))
            }
            404 => Ok(None),
            status => Err(Error::Status {
                key: key.to_string(),
                status,
            }),
        }
    }

    fn list(&self, prefix: &str) -> Result<BTreeMap<String, Value>> {
        let prefix = normalize_prefix(prefix);
        let url = format!("{}?keys&separator=/", self.key_url(&prefix));
        log::trace!("GET {url}");

        let mut response = self
            .authorize(self.agent.get(&url))
            .call()
            .map_err(|e| self.transport(&e))?;

        let keys: Vec<String> = match response.status().as_u16() {
            200 => response
                .body_mut()
                .read_json()
                .map_err(|e| Error::InvalidResponse {
                    key: prefix.clone(),
                    message: e.to_string(),
                })?,
            404 => return Ok(BTreeMap::new()),
            status => {
                return Err(Error::Status {
                    key: prefix,
                    status,
                });
            }
        };

        let mut entries = BTreeMap::new();
        for key in keys {
            let Some(relative) = relative_child(&prefix, &key) else {
                log::debug!("Ignoring nested key {key} under {prefix}");
                continue;
            };
            // A key deleted between listing and reading is simply gone
            if let Some(value) = self.get(&key)? {
                entries.insert(relative.to_string(), value);
            }
        }
        Ok(entries)
    }

    fn put(&self, key: &str, value: &Value) -> Result<()> {
        let url = self.key_url(key);
        let body = serde_json::to_string(value).map_err(|source| Error::Encode {
            key: key.to_string(),
            source,
        })?;
        log::trace!("PUT {url}");

        let response = self
            .authorize(self.agent.put(&url))
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|e| self.transport(&e))?;

        match response.status().as_u16() {
            200 => Ok(()),
            status => Err(Error::Status {
                key: key.to_string(),
                status,
            }),
        }
    }
}

/// Decode a raw stored value, falling back to a JSON string.
fn decode_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Strip `prefix` from a listed key, rejecting folders and nested keys.
fn relative_child<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let relative = key.strip_prefix(prefix)?;
    (!relative.is_empty() && !relative.contains('/')).then_some(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_url_normalizes_slashes() {
        let kv = ConsulKv::new("http://127.0.0.1:8500/", None, DEFAULT_TIMEOUT);
        assert_eq!(kv.address(), "http://127.0.0.1:8500");
        assert_eq!(
            kv.key_url("/nodes/testhost/testapp"),
            "http://127.0.0.1:8500/v1/kv/nodes/testhost/testapp"
        );
    }

    #[test]
    fn test_empty_token_is_dropped() {
        let kv = ConsulKv::new(DEFAULT_ADDRESS, Some(String::new()), DEFAULT_TIMEOUT);
        assert!(kv.token.is_none());
    }

    #[test]
    fn test_decode_value_json() {
        assert_eq!(
            decode_value(r#"{"cluster":"test"}"#),
            json!({"cluster": "test"})
        );
        assert_eq!(decode_value("34"), json!(34));
    }

    #[test]
    fn test_decode_value_non_json_becomes_string() {
        assert_eq!(decode_value("bogus"), json!("bogus"));
    }

    #[test]
    fn test_relative_child() {
        assert_eq!(
            relative_child("nodes/testhost/", "nodes/testhost/testapp"),
            Some("testapp")
        );
        assert_eq!(relative_child("nodes/testhost/", "nodes/testhost/"), None);
        assert_eq!(relative_child("nodes/testhost/", "nodes/testhost/sub/"), None);
        assert_eq!(relative_child("nodes/testhost/", "nodes/other/app"), None);
    }
}

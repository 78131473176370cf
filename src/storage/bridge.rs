//! Process-bridge backend
//!
//! On desktop builds the settings store lives in another process (the shell
//! that owns the disk). Each backend operation becomes one request/response
//! round trip over a [`BridgeTransport`] supplied by the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::KeyValueBackend;
use crate::error::{SettingsError, SettingsResult};
use crate::models::SettingsMap;

/// A request sent across the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeRequest {
    Get { key: String },
    GetAll,
    Set { entries: SettingsMap },
    Remove { key: String },
    Clear,
}

/// The reply to a [`BridgeRequest`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub fn with_value(value: Value) -> Self {
        Self {
            ok: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: None,
            error: Some(message.into()),
        }
    }
}

/// Request/response channel to the process that owns the store
pub trait BridgeTransport: Send {
    fn call(&self, request: BridgeRequest) -> SettingsResult<BridgeResponse>;
}

/// Backend that forwards every operation over a bridge
pub struct BridgeBackend<T: BridgeTransport> {
    transport: T,
}

impl<T: BridgeTransport> BridgeBackend<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    fn request(&self, request: BridgeRequest) -> SettingsResult<Option<Value>> {
        let response = self.transport.call(request)?;
        if response.ok {
            Ok(response.value)
        } else {
            Err(SettingsError::Bridge(
                response
                    .error
                    .unwrap_or_else(|| "request rejected without a reason".into()),
            ))
        }
    }
}

impl<T: BridgeTransport> KeyValueBackend for BridgeBackend<T> {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn get(&self, key: &str) -> SettingsResult<Option<Value>> {
        self.request(BridgeRequest::Get {
            key: key.to_string(),
        })
        .map(|value| value.filter(|v| !v.is_null()))
    }

    fn get_all(&self) -> SettingsResult<SettingsMap> {
        match self.request(BridgeRequest::GetAll)? {
            Some(Value::Object(map)) => Ok(map),
            None | Some(Value::Null) => Ok(SettingsMap::new()),
            Some(other) => Err(SettingsError::Bridge(format!(
                "expected an object from get_all, got {}",
                crate::models::value::type_name(&other)
            ))),
        }
    }

    fn set(&mut self, entries: &SettingsMap) -> SettingsResult<()> {
        self.request(BridgeRequest::Set {
            entries: entries.clone(),
        })
        .map(|_| ())
    }

    fn remove(&mut self, key: &str) -> SettingsResult<()> {
        self.request(BridgeRequest::Remove {
            key: key.to_string(),
        })
        .map(|_| ())
    }

    fn clear(&mut self) -> SettingsResult<()> {
        self.request(BridgeRequest::Clear).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use serde_json::json;
    use std::sync::Mutex;

    /// Loopback transport serving requests from an in-memory store
    struct Loopback {
        store: Mutex<MemoryBackend>,
    }

    impl BridgeTransport for Loopback {
        fn call(&self, request: BridgeRequest) -> SettingsResult<BridgeResponse> {
            let mut store = self.store.lock().unwrap();
            Ok(match request {
                BridgeRequest::Get { key } => {
                    BridgeResponse::with_value(store.get(&key)?.unwrap_or(Value::Null))
                }
                BridgeRequest::GetAll => BridgeResponse::with_value(Value::Object(store.get_all()?)),
                BridgeRequest::Set { entries } => {
                    store.set(&entries)?;
                    BridgeResponse::ok()
                }
                BridgeRequest::Remove { key } => {
                    store.remove(&key)?;
                    BridgeResponse::ok()
                }
                BridgeRequest::Clear => {
                    store.clear()?;
                    BridgeResponse::ok()
                }
            })
        }
    }

    struct Refusing;

    impl BridgeTransport for Refusing {
        fn call(&self, _request: BridgeRequest) -> SettingsResult<BridgeResponse> {
            Ok(BridgeResponse::failed("no handler registered"))
        }
    }

    #[test]
    fn test_round_trip_over_loopback() {
        let mut backend = BridgeBackend::new(Loopback {
            store: Mutex::new(MemoryBackend::new()),
        });

        let mut entries = SettingsMap::new();
        entries.insert("appearance.theme".into(), json!("light"));
        backend.set(&entries).unwrap();

        assert_eq!(backend.get("appearance.theme").unwrap(), Some(json!("light")));
        assert_eq!(backend.get("missing").unwrap(), None);
        assert_eq!(backend.get_all().unwrap().len(), 1);

        backend.clear().unwrap();
        assert!(backend.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_rejected_request_is_bridge_error() {
        let backend = BridgeBackend::new(Refusing);
        let err = backend.get_all().unwrap_err();
        assert!(matches!(err, SettingsError::Bridge(ref m) if m == "no handler registered"));
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_value(BridgeRequest::Remove { key: "a".into() }).unwrap();
        assert_eq!(json, json!({"op": "remove", "key": "a"}));
        let json = serde_json::to_value(BridgeRequest::GetAll).unwrap();
        assert_eq!(json, json!({"op": "get_all"}));
    }
}

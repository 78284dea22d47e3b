//! Session State Store: named variables, named connections and the active
//! connection for one shell process.
//!
//! The store never touches disk. [`Session::snapshot`] and
//! [`Session::from_snapshot`] convert to and from a plain JSON document that
//! a [`SnapshotStore`](crate::services::SnapshotStore) persists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::logging::timestamp_now;

/// Snapshot document format version.
pub const SNAPSHOT_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionVariable {
    pub name: String,
    pub value: Value,
    pub created_at: String,
    /// The input line that produced the value.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub alias: String,
    /// Blueprint-backed capability reference, e.g. `user:petstore`.
    pub source: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    variables: BTreeMap<String, SessionVariable>,
    connections: BTreeMap<String, Connection>,
    active: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    version: u64,
    #[serde(default)]
    variables: Vec<SessionVariable>,
    #[serde(default)]
    connections: Vec<Connection>,
    #[serde(default)]
    active: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Variables ──

    /// Bind `name`, replacing any previous value.
    pub fn set_variable(&mut self, name: &str, value: Value, source: &str) {
        log::debug!("bind variable '{name}'");
        self.variables.insert(
            name.to_string(),
            SessionVariable {
                name: name.to_string(),
                value,
                created_at: timestamp_now(),
                source: source.to_string(),
            },
        );
    }

    pub fn get_variable(&self, name: &str) -> Result<&Value, EngineError> {
        self.variables
            .get(name)
            .map(|v| &v.value)
            .ok_or_else(|| EngineError::UndefinedVariable(name.to_string()))
    }

    pub fn variable(&self, name: &str) -> Option<&SessionVariable> {
        self.variables.get(name)
    }

    /// All variables, sorted by name.
    pub fn list_variables(&self) -> impl Iterator<Item = &SessionVariable> {
        self.variables.values()
    }

    pub fn remove_variable(&mut self, name: &str) -> Result<SessionVariable, EngineError> {
        self.variables
            .remove(name)
            .ok_or_else(|| EngineError::UndefinedVariable(name.to_string()))
    }

    pub fn clear_variables(&mut self) -> usize {
        let n = self.variables.len();
        self.variables.clear();
        n
    }

    // ── Connections ──

    /// Store a connection and make it the active one.
    pub fn add_connection(&mut self, alias: &str, source: &str) -> &Connection {
        log::debug!("add connection '{alias}' -> {source}");
        self.active = Some(alias.to_string());
        self.connections.insert(
            alias.to_string(),
            Connection {
                alias: alias.to_string(),
                source: source.to_string(),
                created_at: timestamp_now(),
            },
        );
        &self.connections[alias]
    }

    pub fn connection(&self, alias: &str) -> Option<&Connection> {
        self.connections.get(alias)
    }

    pub fn list_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn remove_connection(&mut self, alias: &str) -> Option<Connection> {
        let removed = self.connections.remove(alias);
        if removed.is_some() && self.active.as_deref() == Some(alias) {
            self.active = None;
        }
        removed
    }

    pub fn active_connection(&self) -> Option<&Connection> {
        self.active.as_deref().and_then(|a| self.connections.get(a))
    }

    // ── Snapshot contract ──

    /// Serialize every variable and connection into a structured document.
    pub fn snapshot(&self) -> Value {
        let doc = SnapshotDocument {
            version: SNAPSHOT_VERSION,
            variables: self.variables.values().cloned().collect(),
            connections: self.connections.values().cloned().collect(),
            active: self.active.clone(),
        };
        serde_json::to_value(doc).unwrap_or(Value::Null)
    }

    /// Rebuild a session from a [`snapshot`](Self::snapshot) document.
    pub fn from_snapshot(doc: &Value) -> Result<Self, String> {
        let doc: SnapshotDocument =
            serde_json::from_value(doc.clone()).map_err(|e| format!("invalid snapshot: {e}"))?;
        if doc.version != SNAPSHOT_VERSION {
            return Err(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                doc.version
            ));
        }
        let variables = doc
            .variables
            .into_iter()
            .map(|v| (v.name.clone(), v))
            .collect();
        let connections: BTreeMap<String, Connection> = doc
            .connections
            .into_iter()
            .map(|c| (c.alias.clone(), c))
            .collect();
        let active = doc.active.filter(|a| connections.contains_key(a));
        Ok(Self {
            variables,
            connections,
            active,
        })
    }

    /// Replace the in-memory maps wholesale with the snapshot's contents.
    pub fn restore(&mut self, doc: &Value) -> Result<(), String> {
        *self = Self::from_snapshot(doc)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_overwrites() {
        let mut s = Session::new();
        s.set_variable("x", json!(1), "x = echo 1");
        s.set_variable("x", json!([1, 2]), "x = echo ...");
        assert_eq!(s.get_variable("x").unwrap(), &json!([1, 2]));
        assert_eq!(s.list_variables().count(), 1);
    }

    #[test]
    fn missing_variable_is_undefined() {
        let s = Session::new();
        assert_eq!(
            s.get_variable("nope"),
            Err(EngineError::UndefinedVariable("nope".into()))
        );
    }

    #[test]
    fn removing_active_connection_clears_it() {
        let mut s = Session::new();
        s.add_connection("api", "user:petstore");
        assert_eq!(s.active_connection().unwrap().alias, "api");
        s.remove_connection("api");
        assert!(s.active_connection().is_none());
    }

    #[test]
    fn snapshot_round_trip() {
        let mut s = Session::new();
        s.set_variable("pets", json!([{"name": "rex"}]), "pets = ...");
        s.set_variable("n", json!(3.5), "n = echo 3.5");
        s.add_connection("api", "user:petstore");
        let doc = s.snapshot();
        assert_eq!(doc["version"], 1);
        let back = Session::from_snapshot(&doc).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn restore_replaces_wholesale() {
        let mut a = Session::new();
        a.set_variable("keep", json!(1), "");
        let doc = a.snapshot();

        let mut b = Session::new();
        b.set_variable("gone", json!(2), "");
        b.add_connection("db", "user:pg");
        b.restore(&doc).unwrap();
        assert!(b.get_variable("gone").is_err());
        assert!(b.connection("db").is_none());
        assert_eq!(b.get_variable("keep").unwrap(), &json!(1));
    }

    #[test]
    fn bad_version_is_rejected() {
        let err = Session::from_snapshot(&json!({"version": 9})).unwrap_err();
        assert!(err.contains("version 9"));
    }
}

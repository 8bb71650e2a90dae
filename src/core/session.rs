//! Per-run session state
//!
//! A key/value map that every step of one run can read and write. Parallel
//! branches work on clones and hand back a delta that is merged afterwards.

use serde_json::{Map, Value};

/// Changes one session made relative to another
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDelta {
    /// Keys added or changed, with their new values
    pub set: Map<String, Value>,
    /// Keys present in the base but gone afterwards
    pub removed: Vec<String>,
}

impl SessionDelta {
    /// Check whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.removed.is_empty()
    }
}

/// Mutable key/value state scoped to a single run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    state: Map<String, Value>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Get a string value by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.state.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer value by key
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.state.get(key).and_then(|v| v.as_i64())
    }

    /// Set a value, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.state.insert(key.into(), value)
    }

    /// Remove a key
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.state.remove(key)
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Iterate over keys
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.state.keys()
    }

    /// Apply a delta: removals first, then writes
    pub fn apply(&mut self, delta: SessionDelta) {
        for key in &delta.removed {
            self.state.remove(key);
        }
        for (key, value) in delta.set {
            self.state.insert(key, value);
        }
    }

    /// Absorb an agent output.
    ///
    /// With an output key the whole output is stored under it; otherwise an
    /// object output has its keys merged in. Other outputs leave the state alone.
    pub fn absorb_output(&mut self, output_key: Option<&str>, output: &Value) {
        match (output_key, output) {
            (Some(key), _) => {
                self.state.insert(key.to_string(), output.clone());
            }
            (None, Value::Object(map)) => {
                for (key, value) in map {
                    self.state.insert(key.clone(), value.clone());
                }
            }
            _ => {}
        }
    }

    /// What changed since `base`: new or different entries, and removed keys
    pub fn delta_since(&self, base: &Session) -> SessionDelta {
        let set = self
            .state
            .iter()
            .filter(|(key, value)| base.state.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let removed = base
            .state
            .keys()
            .filter(|key| !self.state.contains_key(*key))
            .cloned()
            .collect();
        SessionDelta { set, removed }
    }

    /// Snapshot of the whole state as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absorb_object_output() {
        let mut session = Session::new();
        session.absorb_output(None, &json!({"x": 1, "y": "two"}));
        assert_eq!(session.get_i64("x"), Some(1));
        assert_eq!(session.get_str("y"), Some("two"));
    }

    #[test]
    fn test_absorb_with_output_key() {
        let mut session = Session::new();
        session.absorb_output(Some("raw_data"), &json!("HELLO"));
        assert_eq!(session.get_str("raw_data"), Some("HELLO"));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_absorb_scalar_without_key_is_ignored() {
        let mut session = Session::new();
        session.absorb_output(None, &json!("text"));
        assert!(session.is_empty());
    }

    #[test]
    fn test_delta_since() {
        let mut base = Session::new();
        base.set("keep", json!(1));
        base.set("change", json!(1));

        let mut branch = base.clone();
        branch.set("change", json!(2));
        branch.set("new", json!(3));

        let delta = branch.delta_since(&base);
        assert_eq!(delta.set.len(), 2);
        assert_eq!(delta.set.get("change"), Some(&json!(2)));
        assert_eq!(delta.set.get("new"), Some(&json!(3)));
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_delta_carries_removed_keys() {
        let mut base = Session::new();
        base.set("token", json!("secret"));
        base.set("keep", json!(1));

        let mut branch = base.clone();
        branch.remove("token");

        let delta = branch.delta_since(&base);
        assert!(delta.set.is_empty());
        assert_eq!(delta.removed, vec!["token".to_string()]);

        let mut merged = base.clone();
        merged.apply(delta);
        assert!(!merged.contains("token"));
        assert_eq!(merged.get_i64("keep"), Some(1));
    }

    #[test]
    fn test_unchanged_branch_has_empty_delta() {
        let mut base = Session::new();
        base.set("a", json!(1));
        assert!(base.clone().delta_since(&base).is_empty());
    }
}

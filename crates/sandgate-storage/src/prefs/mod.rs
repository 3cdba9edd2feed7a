//! Preference service
//!
//! Typed, registered preferences with three layers. The effective value of a
//! preference is the managed (policy) value if present, else the user value,
//! else the registered default. Only user values are persisted.

mod registrar;

pub use registrar::PrefChangeRegistrar;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::database::Database;
use crate::error::StorageError;
use crate::time::{null_time, time_to_value, value_to_time};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefKind {
    Boolean,
    Integer,
    Time,
    List,
    Dictionary,
}

impl PrefKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            PrefKind::Boolean => value.is_boolean(),
            PrefKind::Integer => value.is_i64(),
            PrefKind::Time => value_to_time(value).is_some(),
            PrefKind::List => value.is_array(),
            PrefKind::Dictionary => value.is_object(),
        }
    }
}

impl fmt::Display for PrefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrefKind::Boolean => "boolean",
            PrefKind::Integer => "integer",
            PrefKind::Time => "time",
            PrefKind::List => "list",
            PrefKind::Dictionary => "dictionary",
        };
        f.write_str(name)
    }
}

/// Handle returned by [`PrefService::add_pref_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefObserverId(u64);

type PrefCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct PrefObserver {
    id: PrefObserverId,
    name: String,
    callback: PrefCallback,
}

struct RegisteredPref {
    kind: PrefKind,
    default: Value,
}

#[derive(Default)]
struct PrefState {
    registry: HashMap<String, RegisteredPref>,
    user: HashMap<String, Value>,
    managed: HashMap<String, Value>,
}

impl PrefState {
    fn effective(&self, name: &str) -> Option<&Value> {
        self.managed
            .get(name)
            .or_else(|| self.user.get(name))
            .or_else(|| self.registry.get(name).map(|pref| &pref.default))
    }

    fn check(&self, name: &str, value: &Value) -> Result<&RegisteredPref> {
        let pref = self
            .registry
            .get(name)
            .ok_or_else(|| StorageError::UnregisteredPref(name.to_string()))?;
        if !pref.kind.accepts(value) {
            return Err(StorageError::TypeMismatch {
                name: name.to_string(),
                expected: pref.kind,
            });
        }
        Ok(pref)
    }
}

struct Inner {
    state: RwLock<PrefState>,
    observers: RwLock<Vec<PrefObserver>>,
    next_observer_id: AtomicU64,
    db: Option<Database>,
}

/// Shared handle to a profile's preferences. Clones observe the same state.
#[derive(Clone)]
pub struct PrefService {
    inner: Arc<Inner>,
}

impl PrefService {
    /// Preferences that live only in memory.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Preferences persisted to `db`. Stored values are picked up as each
    /// preference is registered.
    pub fn with_database(db: Database) -> Self {
        Self::build(Some(db))
    }

    fn build(db: Option<Database>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(PrefState::default()),
                observers: RwLock::new(Vec::new()),
                next_observer_id: AtomicU64::new(1),
                db,
            }),
        }
    }

    // === Registration ===

    pub fn register_boolean_pref(&self, name: &str, default: bool) -> Result<()> {
        self.register(name, PrefKind::Boolean, Value::Bool(default))
    }

    pub fn register_integer_pref(&self, name: &str, default: i64) -> Result<()> {
        self.register(name, PrefKind::Integer, Value::from(default))
    }

    pub fn register_time_pref(&self, name: &str, default: DateTime<Utc>) -> Result<()> {
        self.register(name, PrefKind::Time, time_to_value(default))
    }

    pub fn register_list_pref(&self, name: &str) -> Result<()> {
        self.register(name, PrefKind::List, Value::Array(Vec::new()))
    }

    pub fn register_dictionary_pref(&self, name: &str) -> Result<()> {
        self.register(name, PrefKind::Dictionary, Value::Object(Map::new()))
    }

    fn register(&self, name: &str, kind: PrefKind, default: Value) -> Result<()> {
        let persisted = self.load_persisted(name, kind)?;

        let mut state = self.inner.state.write();
        if state.registry.contains_key(name) {
            return Err(StorageError::DuplicateRegistration(name.to_string()));
        }
        state
            .registry
            .insert(name.to_string(), RegisteredPref { kind, default });
        if let Some(value) = persisted {
            state.user.insert(name.to_string(), value);
        }

        tracing::debug!(pref = %name, %kind, "Registered preference");
        Ok(())
    }

    fn load_persisted(&self, name: &str, kind: PrefKind) -> Result<Option<Value>> {
        let Some(db) = &self.inner.db else {
            return Ok(None);
        };
        let Some(raw) = db.get_setting(name)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if kind.accepts(&value) => Ok(Some(value)),
            Ok(_) | Err(_) => {
                tracing::warn!(pref = %name, %kind, "Ignoring persisted value of unexpected shape");
                Ok(None)
            }
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.state.read().registry.contains_key(name)
    }

    // === Reads ===

    /// The effective value, or `None` if `name` is not registered.
    pub fn get_value(&self, name: &str) -> Option<Value> {
        self.inner.state.read().effective(name).cloned()
    }

    pub fn get_boolean(&self, name: &str) -> bool {
        self.read(name, PrefKind::Boolean, Value::as_bool)
            .unwrap_or(false)
    }

    pub fn get_integer(&self, name: &str) -> i64 {
        self.read(name, PrefKind::Integer, Value::as_i64).unwrap_or(0)
    }

    pub fn get_time(&self, name: &str) -> DateTime<Utc> {
        self.read(name, PrefKind::Time, value_to_time)
            .unwrap_or_else(null_time)
    }

    pub fn get_list(&self, name: &str) -> Vec<Value> {
        self.read(name, PrefKind::List, |value| value.as_array().cloned())
            .unwrap_or_default()
    }

    pub fn get_dict(&self, name: &str) -> Map<String, Value> {
        self.read(name, PrefKind::Dictionary, |value| value.as_object().cloned())
            .unwrap_or_default()
    }

    fn read<T>(&self, name: &str, kind: PrefKind, extract: impl Fn(&Value) -> Option<T>) -> Option<T> {
        let state = self.inner.state.read();
        let Some(value) = state.effective(name) else {
            tracing::warn!(pref = %name, "Read of unregistered preference");
            return None;
        };
        let extracted = extract(value);
        if extracted.is_none() {
            tracing::warn!(pref = %name, expected = %kind, "Preference read with the wrong type");
        }
        extracted
    }

    pub fn has_user_value(&self, name: &str) -> bool {
        self.inner.state.read().user.contains_key(name)
    }

    // === Writes ===

    pub fn set_boolean(&self, name: &str, value: bool) -> Result<()> {
        self.set_value(name, Value::Bool(value))
    }

    pub fn set_integer(&self, name: &str, value: i64) -> Result<()> {
        self.set_value(name, Value::from(value))
    }

    pub fn set_time(&self, name: &str, value: DateTime<Utc>) -> Result<()> {
        self.set_value(name, time_to_value(value))
    }

    /// Set the user value. Setting a preference back to its default drops the
    /// user value entirely.
    pub fn set_value(&self, name: &str, value: Value) -> Result<()> {
        let changed = {
            let mut state = self.inner.state.write();
            self.commit(&mut state, name, value)?
        };

        if changed {
            self.notify(name);
        }
        Ok(())
    }

    /// Store `value` as the user value while the state lock is held. Returns
    /// whether the effective value changed.
    fn commit(&self, state: &mut PrefState, name: &str, value: Value) -> Result<bool> {
        let is_default = state.check(name, &value)?.default == value;
        let before = state.effective(name).cloned();

        if is_default {
            self.persist(name, None)?;
            state.user.remove(name);
        } else {
            self.persist(name, Some(&value))?;
            state.user.insert(name.to_string(), value);
        }

        Ok(before.as_ref() != state.effective(name))
    }

    /// Drop the user value so the default (or managed value) applies again.
    pub fn clear_pref(&self, name: &str) -> Result<()> {
        let changed = {
            let mut state = self.inner.state.write();
            if !state.registry.contains_key(name) {
                return Err(StorageError::UnregisteredPref(name.to_string()));
            }
            let before = state.effective(name).cloned();
            self.persist(name, None)?;
            state.user.remove(name);
            before.as_ref() != state.effective(name)
        };

        if changed {
            self.notify(name);
        }
        Ok(())
    }

    /// Edit a list preference in place. The edited list is committed once,
    /// after `edit` returns. The whole update holds the state lock, so `edit`
    /// must not call back into this service.
    pub fn update_list<F, T>(&self, name: &str, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Value>) -> T,
    {
        self.update(name, PrefKind::List, |value| match value {
            Value::Array(items) => Some(edit(items)),
            _ => None,
        })
    }

    /// Edit a dictionary preference in place. The edited dictionary is
    /// committed once, after `edit` returns.
    pub fn update_dict<F, T>(&self, name: &str, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Map<String, Value>) -> T,
    {
        self.update(name, PrefKind::Dictionary, |value| match value {
            Value::Object(entries) => Some(edit(entries)),
            _ => None,
        })
    }

    fn update<F, T>(&self, name: &str, kind: PrefKind, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Value) -> Option<T>,
    {
        let (result, changed) = {
            let mut state = self.inner.state.write();
            let pref = state
                .registry
                .get(name)
                .ok_or_else(|| StorageError::UnregisteredPref(name.to_string()))?;
            let mismatch = || StorageError::TypeMismatch {
                name: name.to_string(),
                expected: pref.kind,
            };
            if pref.kind != kind {
                return Err(mismatch());
            }

            let mut value = state
                .user
                .get(name)
                .cloned()
                .unwrap_or_else(|| pref.default.clone());
            let result = edit(&mut value).ok_or_else(mismatch)?;
            let changed = self.commit(&mut state, name, value)?;
            (result, changed)
        };

        if changed {
            self.notify(name);
        }
        Ok(result)
    }

    fn persist(&self, name: &str, value: Option<&Value>) -> Result<()> {
        let Some(db) = &self.inner.db else {
            return Ok(());
        };
        match value {
            Some(value) => db.set_setting(name, &serde_json::to_string(value)?),
            None => db.delete_setting(name).map(|_| ()),
        }
    }

    // === Managed (policy) layer ===

    pub fn set_managed_value(&self, name: &str, value: Value) -> Result<()> {
        let changed = {
            let mut state = self.inner.state.write();
            state.check(name, &value)?;
            let before = state.effective(name).cloned();
            state.managed.insert(name.to_string(), value);
            before.as_ref() != state.effective(name)
        };

        tracing::info!(pref = %name, "Preference is now policy managed");
        if changed {
            self.notify(name);
        }
        Ok(())
    }

    pub fn remove_managed_value(&self, name: &str) {
        let changed = {
            let mut state = self.inner.state.write();
            let before = state.effective(name).cloned();
            state.managed.remove(name);
            before.as_ref() != state.effective(name)
        };

        if changed {
            self.notify(name);
        }
    }

    pub fn is_managed_preference(&self, name: &str) -> bool {
        self.inner.state.read().managed.contains_key(name)
    }

    // === Observation ===

    /// Invoke `callback` with the preference name whenever the effective
    /// value of `name` changes. Callbacks run synchronously on the writing
    /// thread once the write has landed.
    pub fn add_pref_observer<F>(&self, name: &str, callback: F) -> PrefObserverId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = PrefObserverId(self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed));
        self.inner.observers.write().push(PrefObserver {
            id,
            name: name.to_string(),
            callback: Arc::new(callback),
        });
        id
    }

    pub fn remove_pref_observer(&self, id: PrefObserverId) -> bool {
        let mut observers = self.inner.observers.write();
        let before = observers.len();
        observers.retain(|observer| observer.id != id);
        observers.len() != before
    }

    fn notify(&self, name: &str) {
        let callbacks: Vec<PrefCallback> = self
            .inner
            .observers
            .read()
            .iter()
            .filter(|observer| observer.name == name)
            .map(|observer| Arc::clone(&observer.callback))
            .collect();

        for callback in callbacks {
            callback(name);
        }
    }
}

impl Default for PrefService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use serde_json::json;

    fn registered() -> PrefService {
        let prefs = PrefService::new();
        prefs.register_boolean_pref("sandbox.enabled", true).unwrap();
        prefs.register_integer_pref("cookies.mode", 0).unwrap();
        prefs.register_time_pref("topics.since", null_time()).unwrap();
        prefs.register_list_pref("topics.blocked").unwrap();
        prefs.register_dictionary_pref("fledge.blocked").unwrap();
        prefs
    }

    #[test]
    fn test_defaults_apply_until_set() {
        let prefs = registered();
        assert!(prefs.get_boolean("sandbox.enabled"));
        assert_eq!(prefs.get_integer("cookies.mode"), 0);
        assert_eq!(prefs.get_time("topics.since"), null_time());
        assert!(prefs.get_list("topics.blocked").is_empty());
        assert!(prefs.get_dict("fledge.blocked").is_empty());

        prefs.set_boolean("sandbox.enabled", false).unwrap();
        prefs.set_integer("cookies.mode", 1).unwrap();
        assert!(!prefs.get_boolean("sandbox.enabled"));
        assert_eq!(prefs.get_integer("cookies.mode"), 1);
    }

    #[test]
    fn test_setting_the_default_drops_the_user_value() {
        let prefs = registered();
        prefs.set_boolean("sandbox.enabled", false).unwrap();
        assert!(prefs.has_user_value("sandbox.enabled"));

        prefs.set_boolean("sandbox.enabled", true).unwrap();
        assert!(!prefs.has_user_value("sandbox.enabled"));
    }

    #[test]
    fn test_rejects_unregistered_and_mistyped_writes() {
        let prefs = registered();
        assert!(matches!(
            prefs.set_boolean("missing", true),
            Err(StorageError::UnregisteredPref(_))
        ));
        assert!(matches!(
            prefs.set_value("sandbox.enabled", json!("yes")),
            Err(StorageError::TypeMismatch { .. })
        ));
        assert!(matches!(
            prefs.register_boolean_pref("sandbox.enabled", false),
            Err(StorageError::DuplicateRegistration(_))
        ));
        // Unregistered reads fall back to the zero value.
        assert!(!prefs.get_boolean("missing"));
    }

    #[test]
    fn test_managed_value_wins_over_user_value() {
        let prefs = registered();
        prefs.set_boolean("sandbox.enabled", true).unwrap();
        prefs
            .set_managed_value("sandbox.enabled", Value::Bool(false))
            .unwrap();

        assert!(prefs.is_managed_preference("sandbox.enabled"));
        assert!(!prefs.get_boolean("sandbox.enabled"));

        prefs.remove_managed_value("sandbox.enabled");
        assert!(prefs.get_boolean("sandbox.enabled"));
    }

    #[test]
    fn test_scoped_updates_commit_once() {
        let prefs = registered();
        let writes = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&writes);
        prefs.add_pref_observer("topics.blocked", move |_| *counter.lock() += 1);

        let appended = prefs
            .update_list("topics.blocked", |list| {
                list.push(json!(1));
                list.push(json!(2));
                list.len()
            })
            .unwrap();

        assert_eq!(appended, 2);
        assert_eq!(prefs.get_list("topics.blocked"), vec![json!(1), json!(2)]);
        assert_eq!(*writes.lock(), 1);

        prefs
            .update_dict("fledge.blocked", |dict| {
                dict.insert("example.com".into(), json!("0"));
            })
            .unwrap();
        assert!(prefs.get_dict("fledge.blocked").contains_key("example.com"));

        assert!(matches!(
            prefs.update_list("fledge.blocked", |_| ()),
            Err(StorageError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_concurrent_scoped_updates_keep_every_edit() {
        let prefs = registered();
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let prefs = prefs.clone();
                std::thread::spawn(move || {
                    prefs
                        .update_list("topics.blocked", |list| list.push(json!(i)))
                        .unwrap();
                    prefs
                        .update_dict("fledge.blocked", |dict| {
                            dict.insert(format!("site{i}.test"), json!("0"));
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(prefs.get_list("topics.blocked").len(), 32);
        assert_eq!(prefs.get_dict("fledge.blocked").len(), 32);
    }

    #[test]
    fn test_observers_fire_only_on_effective_change() {
        let prefs = registered();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = prefs.add_pref_observer("sandbox.enabled", move |name| {
            sink.lock().push(name.to_string())
        });

        prefs.set_boolean("sandbox.enabled", true).unwrap(); // unchanged
        prefs.set_boolean("sandbox.enabled", false).unwrap();
        prefs.set_integer("cookies.mode", 2).unwrap(); // other pref
        assert_eq!(seen.lock().as_slice(), ["sandbox.enabled"]);

        assert!(prefs.remove_pref_observer(id));
        prefs.set_boolean("sandbox.enabled", true).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_observers_may_read_back_during_notification() {
        let prefs = registered();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let reader = prefs.clone();
        prefs.add_pref_observer("cookies.mode", move |name| {
            *sink.lock() = Some(reader.get_integer(name));
        });

        prefs.set_integer("cookies.mode", 1).unwrap();
        assert_eq!(*seen.lock(), Some(1));
    }

    #[test]
    fn test_user_values_persist_across_services() {
        let db = Database::open_in_memory().unwrap();
        let since = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        {
            let prefs = PrefService::with_database(db.clone());
            prefs.register_boolean_pref("sandbox.enabled", true).unwrap();
            prefs.register_time_pref("topics.since", null_time()).unwrap();
            prefs.set_boolean("sandbox.enabled", false).unwrap();
            prefs.set_time("topics.since", since).unwrap();
        }

        let prefs = PrefService::with_database(db.clone());
        prefs.register_boolean_pref("sandbox.enabled", true).unwrap();
        prefs.register_time_pref("topics.since", null_time()).unwrap();
        assert!(!prefs.get_boolean("sandbox.enabled"));
        assert_eq!(prefs.get_time("topics.since"), since);

        prefs.clear_pref("sandbox.enabled").unwrap();
        assert_eq!(db.get_setting("sandbox.enabled").unwrap(), None);
    }

    #[test]
    fn test_malformed_persisted_values_are_ignored() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("sandbox.enabled", "\"maybe\"").unwrap();
        db.set_setting("topics.blocked", "not json").unwrap();

        let prefs = PrefService::with_database(db);
        prefs.register_boolean_pref("sandbox.enabled", true).unwrap();
        prefs.register_list_pref("topics.blocked").unwrap();

        assert!(prefs.get_boolean("sandbox.enabled"));
        assert!(prefs.get_list("topics.blocked").is_empty());
    }
}

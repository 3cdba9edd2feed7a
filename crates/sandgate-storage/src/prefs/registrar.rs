//! Scoped preference observation

use super::{PrefObserverId, PrefService};

/// A set of preference observers that are removed together when the
/// registrar is dropped.
pub struct PrefChangeRegistrar {
    prefs: PrefService,
    observers: Vec<(String, PrefObserverId)>,
}

impl PrefChangeRegistrar {
    pub fn new(prefs: &PrefService) -> Self {
        Self {
            prefs: prefs.clone(),
            observers: Vec::new(),
        }
    }

    pub fn add<F>(&mut self, name: &str, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = self.prefs.add_pref_observer(name, callback);
        self.observers.push((name.to_string(), id));
    }

    pub fn remove(&mut self, name: &str) {
        let prefs = &self.prefs;
        self.observers.retain(|(observed, id)| {
            if observed == name {
                prefs.remove_pref_observer(*id);
                false
            } else {
                true
            }
        });
    }

    pub fn remove_all(&mut self) {
        for (_, id) in self.observers.drain(..) {
            self.prefs.remove_pref_observer(id);
        }
    }

    pub fn is_observed(&self, name: &str) -> bool {
        self.observers.iter().any(|(observed, _)| observed == name)
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl Drop for PrefChangeRegistrar {
    fn drop(&mut self) {
        self.remove_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_drop_unregisters_observers() {
        let prefs = PrefService::new();
        prefs.register_boolean_pref("a", false).unwrap();
        prefs.register_boolean_pref("b", false).unwrap();

        let hits = Arc::new(Mutex::new(0));
        {
            let mut registrar = PrefChangeRegistrar::new(&prefs);
            let counter = Arc::clone(&hits);
            registrar.add("a", move |_| *counter.lock() += 1);
            let counter = Arc::clone(&hits);
            registrar.add("b", move |_| *counter.lock() += 1);
            assert!(registrar.is_observed("a"));

            prefs.set_boolean("a", true).unwrap();
            registrar.remove("b");
            assert!(!registrar.is_observed("b"));
            prefs.set_boolean("b", true).unwrap();
            assert_eq!(*hits.lock(), 1);
        }

        prefs.set_boolean("a", false).unwrap();
        assert_eq!(*hits.lock(), 1);
    }
}

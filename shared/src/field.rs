//! Authority-owned state that is pushed to observers on change
//!
//! A [`ReplicatedField`] exists once per copy of an entity. The authority's copy
//! is the only one that accepts [`ReplicatedField::set`]; every write bumps a
//! version number and produces a [`FieldUpdate`] for the transport to fan out.
//! Observer copies accept updates through [`ReplicatedField::apply`] and drop
//! anything that is not newer than what they already hold, which keeps a single
//! field in issue order even when the transport duplicates or reorders packets.
//!
//! Every copy, the authority's included, runs the registered reaction whenever
//! its value changes. Presentation side effects (display name, tint, health bar)
//! live in that reaction.

use crate::error::{CoreError, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A versioned value as sent from the authority to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate<T> {
    pub version: u32,
    pub value: T,
}

type Reaction<T> = Box<dyn FnMut(&T) + Send + Sync>;

pub struct ReplicatedField<T> {
    role: Role,
    value: T,
    version: u32,
    reaction: Option<Reaction<T>>,
}

impl<T: Clone> ReplicatedField<T> {
    /// Creates the canonical copy held by the authority
    pub fn authority(value: T) -> Self {
        Self {
            role: Role::Authority,
            value,
            version: 1,
            reaction: None,
        }
    }

    /// Creates an observer copy from the value received on initial sync
    pub fn observer(initial: FieldUpdate<T>) -> Self {
        Self {
            role: Role::Observer,
            value: initial.value,
            version: initial.version,
            reaction: None,
        }
    }

    /// Registers the callback run on this copy whenever the value changes
    pub fn on_change<F>(&mut self, reaction: F)
    where
        F: FnMut(&T) + Send + Sync + 'static,
    {
        self.reaction = Some(Box::new(reaction));
    }

    /// Runs the reaction with the current value
    pub fn fire(&mut self) {
        if let Some(reaction) = self.reaction.as_mut() {
            reaction(&self.value);
        }
    }

    /// Writes a new canonical value and returns the update to send to observers
    pub fn set(&mut self, value: T) -> Result<FieldUpdate<T>, CoreError> {
        self.role.require_authority("ReplicatedField::set")?;

        self.version += 1;
        self.value = value;
        self.fire();

        Ok(self.snapshot())
    }

    /// Applies an update from the authority
    ///
    /// Returns `Ok(false)` when the update is stale or a duplicate.
    pub fn apply(&mut self, update: FieldUpdate<T>) -> Result<bool, CoreError> {
        if self.role == Role::Authority {
            return Err(CoreError::RemoteWrite {
                operation: "ReplicatedField::apply",
            });
        }

        if update.version <= self.version {
            return Ok(false);
        }

        self.version = update.version;
        self.value = update.value;
        self.fire();

        Ok(true)
    }

    pub fn snapshot(&self) -> FieldUpdate<T> {
        FieldUpdate {
            version: self.version,
            value: self.value.clone(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl<T: fmt::Debug> fmt::Debug for ReplicatedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatedField")
            .field("role", &self.role)
            .field("value", &self.value)
            .field("version", &self.version)
            .field("has_reaction", &self.reaction.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(&T) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &T| sink.lock().unwrap().push(value.clone()))
    }

    #[test]
    fn test_authority_set_bumps_version_and_reacts() {
        let (seen, reaction) = recorder::<i32>();
        let mut field = ReplicatedField::authority(100);
        field.on_change(reaction);

        let update = field.set(80).unwrap();

        assert_eq!(update, FieldUpdate { version: 2, value: 80 });
        assert_eq!(*field.get(), 80);
        assert_eq!(*seen.lock().unwrap(), vec![80]);
    }

    #[test]
    fn test_observer_cannot_set() {
        let mut field = ReplicatedField::observer(FieldUpdate { version: 1, value: 100 });

        let err = field.set(0).unwrap_err();

        assert!(matches!(err, CoreError::AuthorityViolation { .. }));
        assert_eq!(*field.get(), 100);
        assert_eq!(field.version(), 1);
    }

    #[test]
    fn test_authority_rejects_remote_update() {
        let mut field = ReplicatedField::authority(String::from("Wizard1"));

        let result = field.apply(FieldUpdate {
            version: 9,
            value: String::from("Cheater"),
        });

        assert!(matches!(result, Err(CoreError::RemoteWrite { .. })));
        assert_eq!(field.get(), "Wizard1");
    }

    #[test]
    fn test_observer_applies_in_order_and_drops_stale() {
        let (seen, reaction) = recorder::<i32>();
        let mut field = ReplicatedField::observer(FieldUpdate { version: 1, value: 100 });
        field.on_change(reaction);

        assert!(field.apply(FieldUpdate { version: 3, value: 60 }).unwrap());
        // Arrives late, older than what we hold
        assert!(!field.apply(FieldUpdate { version: 2, value: 80 }).unwrap());
        // Duplicate delivery
        assert!(!field.apply(FieldUpdate { version: 3, value: 60 }).unwrap());

        assert_eq!(*field.get(), 60);
        assert_eq!(*seen.lock().unwrap(), vec![60]);
    }

    #[test]
    fn test_fire_replays_current_value_for_late_joiner() {
        let (seen, reaction) = recorder::<i32>();
        let mut field = ReplicatedField::observer(FieldUpdate { version: 5, value: 40 });
        field.on_change(reaction);

        field.fire();

        assert_eq!(*seen.lock().unwrap(), vec![40]);
    }

    #[test]
    fn test_snapshot_matches_authority_state() {
        let mut authority = ReplicatedField::authority(100);
        authority.set(80).unwrap();
        authority.set(60).unwrap();

        let mut observer = ReplicatedField::observer(FieldUpdate { version: 1, value: 100 });
        observer.apply(authority.snapshot()).unwrap();

        assert_eq!(*observer.get(), 60);
        assert_eq!(observer.version(), authority.version());
    }
}

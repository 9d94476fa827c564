//! Roles and the error taxonomy of the entity state core

use crate::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which side of the replication model a copy of state lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The single source of truth (server/host)
    Authority,
    /// A read-mostly replica fed by the authority
    Observer,
}

impl Role {
    /// Fails with [`CoreError::AuthorityViolation`] unless this is the authority
    pub fn require_authority(self, operation: &'static str) -> Result<(), CoreError> {
        match self {
            Role::Authority => Ok(()),
            Role::Observer => Err(CoreError::AuthorityViolation {
                operation,
                role: self,
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Authority => write!(f, "authority"),
            Role::Observer => write!(f, "observer"),
        }
    }
}

/// Errors raised by the entity state core
///
/// Redundant transitions (damaging a dead entity, dying twice, a second win)
/// are defined no-ops and never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A mutating operation was invoked on a copy that does not own the state
    #[error("{operation} may only run on the authority (current role: {role})")]
    AuthorityViolation {
        operation: &'static str,
        role: Role,
    },

    /// A replicated update was fed into the authority's canonical copy
    #[error("{operation} may only run on an observer copy")]
    RemoteWrite { operation: &'static str },

    /// The entity is not part of this session
    #[error("Entity {0} is not known to this session")]
    UnknownEntity(EntityId),
}

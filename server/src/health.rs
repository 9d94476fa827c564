//! Authoritative damage application and death detection

use log::debug;
use shared::{CoreError, EntityView, FieldChange};

/// Outcome of one damage call
#[derive(Debug, Clone, PartialEq)]
pub struct DamageReport {
    /// Whether this hit ended the entity's life
    pub died: bool,
    /// The health update to replicate; `None` when the hit was dropped
    pub change: Option<FieldChange>,
}

impl DamageReport {
    fn dropped() -> Self {
        Self {
            died: false,
            change: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthController {
    max_health: i32,
    damage_per_hit: i32,
}

impl HealthController {
    pub fn new(max_health: i32, damage_per_hit: i32) -> Self {
        Self {
            max_health,
            damage_per_hit,
        }
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    pub fn damage_per_hit(&self) -> i32 {
        self.damage_per_hit
    }

    /// Applies one hit to the authority's copy of an entity
    ///
    /// Hits on an entity already at or below zero are dropped, so a life can
    /// only end once. The stored health never goes below zero.
    pub fn take_damage(&self, view: &mut EntityView) -> Result<DamageReport, CoreError> {
        view.role().require_authority("take_damage")?;

        let current = view.health();
        if current <= 0 {
            debug!("Entity {} is already down, dropping hit", view.id());
            return Ok(DamageReport::dropped());
        }

        let remaining = current - self.damage_per_hit;
        let died = remaining <= 0;
        let change = view.set_health(remaining.max(0))?;

        Ok(DamageReport {
            died,
            change: Some(change),
        })
    }

    /// Puts an entity back at full health; `None` if it already was
    pub fn restore(&self, view: &mut EntityView) -> Result<Option<FieldChange>, CoreError> {
        view.role().require_authority("restore_health")?;

        if view.health() == self.max_health {
            return Ok(None);
        }

        view.set_health(self.max_health).map(Some)
    }
}

//! Authority-side half of the death/respawn cycle
//!
//! Every copy runs its own death and respawn presentation (see
//! [`shared::EntityView`]). The authority additionally owns the respawn timer:
//! one per dead entity, cancelled when the entity leaves or the match restarts.

use crate::health::HealthController;
use crate::scheduler::{Scheduler, TimedAction, TimerHandle};
use log::debug;
use shared::{CoreError, EntityId, EntityView, FieldChange, LifecycleState, SpawnPoint};
use std::collections::HashMap;
use std::time::Duration;

/// What a completed respawn needs to tell observers
#[derive(Debug, Clone, PartialEq)]
pub struct RespawnReport {
    pub health: Option<FieldChange>,
    pub spawn: SpawnPoint,
}

#[derive(Debug)]
pub struct LifecycleController {
    respawn_delay: Duration,
    pending: HashMap<EntityId, TimerHandle>,
}

impl LifecycleController {
    pub fn new(respawn_delay: Duration) -> Self {
        Self {
            respawn_delay,
            pending: HashMap::new(),
        }
    }

    pub fn respawn_delay(&self) -> Duration {
        self.respawn_delay
    }

    /// Schedules the respawn of an entity that just died at `now`
    pub fn schedule_respawn(
        &mut self,
        entity: EntityId,
        now: Duration,
        scheduler: &mut Scheduler,
    ) -> TimerHandle {
        self.cancel(entity, scheduler);

        let handle = scheduler.schedule(now + self.respawn_delay, TimedAction::Respawn { entity });
        self.pending.insert(entity, handle);
        handle
    }

    /// Cancels a pending respawn; returns false if none was pending
    pub fn cancel(&mut self, entity: EntityId, scheduler: &mut Scheduler) -> bool {
        match self.pending.remove(&entity) {
            Some(handle) => scheduler.cancel(handle),
            None => false,
        }
    }

    pub fn cancel_all(&mut self, scheduler: &mut Scheduler) {
        for (_, handle) in self.pending.drain() {
            scheduler.cancel(handle);
        }
    }

    pub fn pending_respawn(&self, entity: EntityId) -> Option<TimerHandle> {
        self.pending.get(&entity).copied()
    }

    /// Brings a dead entity back on the authority's copy
    ///
    /// Returns `None` when the entity is not dead any more; a respawn that
    /// lost the race against a match restart is a no-op.
    pub fn respawn(
        &mut self,
        view: &mut EntityView,
        health: &HealthController,
        spawn: SpawnPoint,
    ) -> Result<Option<RespawnReport>, CoreError> {
        view.role().require_authority("respawn")?;
        self.pending.remove(&view.id());

        if view.state() != LifecycleState::Dead {
            debug!("Entity {} is {:?}, skipping respawn", view.id(), view.state());
            return Ok(None);
        }

        let change = health.restore(view)?;
        view.respawn(&spawn);

        Ok(Some(RespawnReport {
            health: change,
            spawn,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::sinks::{Cue, RecordingSinks, SinkEvent};
    use shared::{Color, Control};

    fn ghost(health: i32, recorder: &RecordingSinks) -> EntityView {
        EntityView::authority(
            4,
            "Wizard4".to_string(),
            Color::for_entity(4),
            health,
            Control::Ghost,
            recorder.sinks(),
        )
    }

    #[test]
    fn test_respawn_scheduled_after_delay() {
        let mut scheduler = Scheduler::new();
        let mut lifecycle = LifecycleController::new(Duration::from_secs(4));

        let handle = lifecycle.schedule_respawn(4, Duration::from_secs(10), &mut scheduler);

        assert_eq!(scheduler.deadline(handle), Some(Duration::from_secs(14)));
        assert_eq!(lifecycle.pending_respawn(4), Some(handle));
    }

    #[test]
    fn test_rescheduling_replaces_pending_timer() {
        let mut scheduler = Scheduler::new();
        let mut lifecycle = LifecycleController::new(Duration::from_secs(4));

        let first = lifecycle.schedule_respawn(4, Duration::from_secs(0), &mut scheduler);
        let second = lifecycle.schedule_respawn(4, Duration::from_secs(1), &mut scheduler);

        assert!(!scheduler.is_pending(first));
        assert!(scheduler.is_pending(second));
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_cancel_on_leave() {
        let mut scheduler = Scheduler::new();
        let mut lifecycle = LifecycleController::new(Duration::from_secs(4));
        lifecycle.schedule_respawn(4, Duration::ZERO, &mut scheduler);

        assert!(lifecycle.cancel(4, &mut scheduler));
        assert!(!lifecycle.cancel(4, &mut scheduler));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_respawn_restores_health_and_presentation() {
        let recorder = RecordingSinks::new();
        let health = HealthController::new(100, 20);
        let mut lifecycle = LifecycleController::new(Duration::from_secs(4));
        let mut view = ghost(0, &recorder);
        view.die();
        recorder.clear();

        let spawn = SpawnPoint::new((3.0, 0.0, 4.0), 45.0);
        let report = lifecycle.respawn(&mut view, &health, spawn).unwrap().unwrap();

        assert_eq!(report.spawn, spawn);
        assert!(report.health.is_some());
        assert_eq!(view.health(), 100);
        assert!(view.is_alive());
        assert_eq!(recorder.count(&SinkEvent::Trigger(Cue::Restart)), 1);
    }

    #[test]
    fn test_respawn_of_living_entity_is_noop() {
        let recorder = RecordingSinks::new();
        let health = HealthController::new(100, 20);
        let mut lifecycle = LifecycleController::new(Duration::from_secs(4));
        let mut view = ghost(100, &recorder);

        let report = lifecycle
            .respawn(&mut view, &health, SpawnPoint::default())
            .unwrap();

        assert!(report.is_none());
        assert!(view.is_alive());
    }
}

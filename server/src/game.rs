//! The authoritative session: every entity, timer and match rule of one server
//!
//! `GameState` owns the canonical copy of each entity and is only ever touched
//! from the server loop. Each operation mutates state, runs the reaction on the
//! authority's own copy, and queues the notifications observers need in an
//! outbox that the network layer drains once per tick.

use crate::health::HealthController;
use crate::lifecycle::LifecycleController;
use crate::match_controller::{MatchController, MatchPhase, MatchState};
use crate::registry::EntityRegistry;
use crate::scheduler::{Scheduler, TimedAction};
use log::{debug, error, info};
use shared::sinks::{LobbyManager, Sinks, SpawnProvider};
use shared::{
    default_name, Color, Control, CoreError, EntityId, EntityView, FieldChange, GameConfig, Packet,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const MAX_NAME_LEN: usize = 24;

/// Builds the presentation sinks for the authority's own copy of an entity
pub type SinkFactory = Box<dyn Fn(EntityId) -> Sinks + Send + Sync>;

/// Who a queued packet is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Only(EntityId),
    AllExcept(EntityId),
}

#[derive(Debug, Clone)]
pub struct Outbound {
    pub target: Target,
    pub packet: Packet,
}

pub struct GameState {
    pub tick: u32,
    config: GameConfig,
    now: Duration,
    next_entity_id: EntityId,
    entities: HashMap<EntityId, EntityView>,
    registry: EntityRegistry,
    scheduler: Scheduler,
    health: HealthController,
    lifecycle: LifecycleController,
    matches: MatchController,
    kills: HashMap<EntityId, u32>,
    spawns: Arc<dyn SpawnProvider>,
    lobby: Arc<dyn LobbyManager>,
    sink_factory: SinkFactory,
    outbox: Vec<Outbound>,
}

impl GameState {
    pub fn new(
        config: GameConfig,
        spawns: Arc<dyn SpawnProvider>,
        lobby: Arc<dyn LobbyManager>,
    ) -> Self {
        Self {
            tick: 0,
            health: HealthController::new(config.max_health, config.damage_per_hit),
            lifecycle: LifecycleController::new(config.respawn_delay),
            matches: MatchController::new(config.lobby_return_delay),
            config,
            now: Duration::ZERO,
            next_entity_id: 1,
            entities: HashMap::new(),
            registry: EntityRegistry::new(),
            scheduler: Scheduler::new(),
            kills: HashMap::new(),
            spawns,
            lobby,
            sink_factory: Box::new(Sinks::logging),
            outbox: Vec::new(),
        }
    }

    /// Replaces the sinks used for the authority's own presentation
    pub fn with_sink_factory(mut self, factory: SinkFactory) -> Self {
        self.sink_factory = factory;
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current session clock
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityView> {
        self.entities.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn kills(&self, id: EntityId) -> u32 {
        self.kills.get(&id).copied().unwrap_or(0)
    }

    pub fn phase(&self) -> MatchPhase {
        self.matches.phase()
    }

    pub fn match_id(&self) -> u32 {
        self.matches.match_id()
    }

    pub fn match_state(&self) -> Option<&MatchState> {
        self.matches.result()
    }

    /// When the pending respawn of `id` is due, if one is pending
    pub fn respawn_deadline(&self, id: EntityId) -> Option<Duration> {
        self.lifecycle
            .pending_respawn(id)
            .and_then(|handle| self.scheduler.deadline(handle))
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    /// Adds a new entity to the session
    ///
    /// `controlled` is false for ghosts, which have no owning client. A
    /// controlled joiner is sent the full state of every entity, itself
    /// included, before any later change reaches it.
    pub fn join(&mut self, name: Option<String>, controlled: bool) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;

        let name = sanitize_name(name, id);
        let control = if controlled {
            Control::Remote
        } else {
            Control::Ghost
        };

        let view = EntityView::authority(
            id,
            name,
            Color::for_entity(id),
            self.config.max_health,
            control,
            (self.sink_factory)(id),
        );
        let snapshot = view.snapshot();

        info!("{} joined as entity {} ({:?})", view.name(), id, control);

        self.entities.insert(id, view);
        self.registry.register(id);
        self.kills.insert(id, 0);

        if controlled {
            for other in self.registry.snapshot() {
                if let Some(existing) = self.entities.get(&other) {
                    let entity = existing.snapshot();
                    self.send(Target::Only(id), Packet::Spawn { entity });
                }
            }
        }

        self.send(Target::AllExcept(id), Packet::Spawn { entity: snapshot });

        if self.matches.phase() != MatchPhase::Running {
            if let Some(result) = self.matches.result().cloned() {
                self.join_finished_match(id, controlled, &result);
            }
        }

        id
    }

    /// Brings a joiner in line with a match that already has a winner
    fn join_finished_match(&mut self, id: EntityId, controlled: bool, result: &MatchState) {
        debug!(
            "Entity {} joined after {} won, holding it until the next match",
            id, result.winner_name
        );

        if let Some(view) = self.entities.get_mut(&id) {
            view.on_game_over(result.winner_id, &result.winner_name);
        }

        let game_over = |entity| Packet::GameOver {
            entity,
            winner_id: result.winner_id,
            winner_name: result.winner_name.clone(),
        };

        if controlled {
            for other in self.registry.snapshot() {
                self.send(Target::Only(id), game_over(other));
            }
        }
        self.send(Target::AllExcept(id), game_over(id));
    }

    /// Removes an entity and cancels anything still scheduled for it
    pub fn leave(&mut self, id: EntityId) -> bool {
        self.lifecycle.cancel(id, &mut self.scheduler);
        self.registry.unregister(id);
        self.kills.remove(&id);

        match self.entities.remove(&id) {
            Some(view) => {
                info!("{} (entity {}) left", view.name(), id);
                self.send(Target::All, Packet::Despawn { entity: id });
                true
            }
            None => false,
        }
    }

    pub fn set_name(&mut self, id: EntityId, name: String) -> Result<(), CoreError> {
        let name = sanitize_name(Some(name), id);
        let change = self.view_mut(id)?.set_name(name)?;
        self.replicate(id, change);
        Ok(())
    }

    pub fn set_color(&mut self, id: EntityId, color: Color) -> Result<(), CoreError> {
        let change = self.view_mut(id)?.set_color(color)?;
        self.replicate(id, change);
        Ok(())
    }

    /// Applies one hit to `id`; returns whether it died from it
    pub fn take_damage(&mut self, id: EntityId) -> Result<bool, CoreError> {
        let view = self
            .entities
            .get_mut(&id)
            .ok_or(CoreError::UnknownEntity(id))?;

        let report = self.health.take_damage(view)?;
        let Some(change) = report.change else {
            return Ok(false);
        };

        view.on_damaged(report.died);

        self.replicate(id, change);
        self.send(
            Target::All,
            Packet::Damaged {
                entity: id,
                died: report.died,
            },
        );

        if report.died {
            self.lifecycle
                .schedule_respawn(id, self.now, &mut self.scheduler);
            info!(
                "Entity {} died, respawning in {:.1}s",
                id,
                self.lifecycle.respawn_delay().as_secs_f32()
            );
        }

        Ok(report.died)
    }

    /// A client reports that `shooter` hit `target`
    ///
    /// Hits outside a running match, from or on a dead entity, or on oneself
    /// are ignored. A kill scores for the shooter; reaching the score limit
    /// wins the match.
    pub fn record_hit(&mut self, shooter: EntityId, target: EntityId) -> Result<bool, CoreError> {
        let shooter_alive = self
            .entities
            .get(&shooter)
            .ok_or(CoreError::UnknownEntity(shooter))?
            .is_alive();
        let target_alive = self
            .entities
            .get(&target)
            .ok_or(CoreError::UnknownEntity(target))?
            .is_alive();

        if self.matches.phase() != MatchPhase::Running
            || shooter == target
            || !shooter_alive
            || !target_alive
        {
            debug!("Ignoring hit {} -> {}", shooter, target);
            return Ok(false);
        }

        let died = self.take_damage(target)?;

        if died {
            let score = self.kills.entry(shooter).or_insert(0);
            *score += 1;
            let score = *score;
            info!("Entity {} scored ({}/{})", shooter, score, self.config.score_to_win);

            if score >= self.config.score_to_win {
                self.won(shooter)?;
            }
        }

        Ok(died)
    }

    /// Ends the match in favour of `winner` and tells every registered entity
    ///
    /// Returns false if the match was already decided.
    pub fn won(&mut self, winner: EntityId) -> Result<bool, CoreError> {
        let view = self
            .entities
            .get(&winner)
            .ok_or(CoreError::UnknownEntity(winner))?;
        view.role().require_authority("won")?;

        let result = MatchState {
            winner_id: winner,
            winner_name: view.name().to_string(),
        };
        let winner_name = result.winner_name.clone();

        let Some(recipients) =
            self.matches
                .won(result, &self.registry, self.now, &mut self.scheduler)
        else {
            return Ok(false);
        };

        for id in recipients {
            let Some(view) = self.entities.get_mut(&id) else {
                debug!("Entity {} left before the game-over broadcast", id);
                continue;
            };
            view.on_game_over(winner, &winner_name);

            self.send(
                Target::All,
                Packet::GameOver {
                    entity: id,
                    winner_id: winner,
                    winner_name: winner_name.clone(),
                },
            );
        }

        Ok(true)
    }

    /// Starts a new match: scores reset, everyone back at full health and visible
    pub fn start_match(&mut self) {
        self.matches.start_match(&mut self.scheduler);
        self.lifecycle.cancel_all(&mut self.scheduler);

        for score in self.kills.values_mut() {
            *score = 0;
        }

        for id in self.registry.snapshot() {
            let alive = match self.entities.get(&id) {
                Some(view) => view.is_alive(),
                None => continue,
            };

            if alive {
                self.restore_health(id);
            } else {
                self.respawn(id);
            }
        }

        for view in self.entities.values_mut() {
            view.on_match_started();
        }
        self.send(Target::All, Packet::MatchStarted);
    }

    /// Moves the session clock to `now` and runs every timer that became due
    pub fn advance(&mut self, now: Duration) {
        if now < self.now {
            return;
        }
        self.now = now;

        for (_, action) in self.scheduler.take_due(now) {
            match action {
                TimedAction::Respawn { entity } => {
                    if self.matches.phase() == MatchPhase::Running {
                        self.respawn(entity);
                    } else {
                        // The next match brings the dead back
                        debug!("Match over, entity {} stays down", entity);
                        self.lifecycle.cancel(entity, &mut self.scheduler);
                    }
                }
                TimedAction::ReturnToLobby { match_id } => {
                    self.matches.return_to_lobby(match_id, self.lobby.as_ref());
                }
            }
        }
    }

    /// Full state of every entity, for periodic resync
    pub fn sync_packet(&self) -> Packet {
        let entities = self
            .registry
            .snapshot()
            .into_iter()
            .filter_map(|id| self.entities.get(&id).map(EntityView::snapshot))
            .collect();

        Packet::Snapshot { entities }
    }

    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    fn respawn(&mut self, id: EntityId) -> bool {
        let spawn = self.spawns.spawn_point();

        let Some(view) = self.entities.get_mut(&id) else {
            debug!("Entity {} is gone, dropping respawn", id);
            return false;
        };

        let report = match self.lifecycle.respawn(view, &self.health, spawn) {
            Ok(Some(report)) => report,
            Ok(None) => return false,
            Err(e) => {
                error!("Failed to respawn entity {}: {}", id, e);
                return false;
            }
        };

        if let Some(change) = report.health {
            self.replicate(id, change);
        }
        self.send(
            Target::All,
            Packet::Respawned {
                entity: id,
                spawn: report.spawn,
            },
        );

        info!("Entity {} respawned", id);
        true
    }

    fn restore_health(&mut self, id: EntityId) {
        let Some(view) = self.entities.get_mut(&id) else {
            return;
        };

        match self.health.restore(view) {
            Ok(Some(change)) => self.replicate(id, change),
            Ok(None) => {}
            Err(e) => error!("Failed to restore health of entity {}: {}", id, e),
        }
    }

    fn view_mut(&mut self, id: EntityId) -> Result<&mut EntityView, CoreError> {
        self.entities
            .get_mut(&id)
            .ok_or(CoreError::UnknownEntity(id))
    }

    fn replicate(&mut self, entity: EntityId, change: FieldChange) {
        self.send(Target::All, Packet::FieldChanged { entity, change });
    }

    fn send(&mut self, target: Target, packet: Packet) {
        self.outbox.push(Outbound { target, packet });
    }
}

fn sanitize_name(name: Option<String>, id: EntityId) -> String {
    match name.map(|name| name.trim().to_string()) {
        Some(name) if !name.is_empty() => name.chars().take(MAX_NAME_LEN).collect(),
        _ => default_name(id),
    }
}

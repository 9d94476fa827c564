//! One copy of a player entity
//!
//! The same type backs the authority's own copy (authority-role fields) and
//! every observer's replica (observer-role fields). Mutation of replicated
//! state goes through the fields; everything else here is the reaction each
//! copy runs when a notification reaches it.

use crate::error::{CoreError, Role};
use crate::field::{FieldUpdate, ReplicatedField};
use crate::lifecycle::{LifecycleEvent, LifecycleState};
use crate::sinks::{Cue, Scope, Sinks};
use crate::{Color, EntityId, SpawnPoint};
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEAD_STATUS: &str = "You're dead!";
pub const WIN_STATUS: &str = "You're the Best Wizard!";

pub fn loss_status(winner_name: &str) -> String {
    format!("You Lost!\n{} is the Best Wizard!", winner_name)
}

/// Who drives an entity, from the point of view of one copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    /// Driven by the human operating this process
    Local,
    /// Driven by some other process
    Remote,
    /// No owning client at all
    Ghost,
}

impl Control {
    fn plays_own_cues(self) -> bool {
        matches!(self, Control::Local | Control::Ghost)
    }
}

/// Full replicated state of one entity, as sent on join and resync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub controlled: bool,
    pub name: FieldUpdate<String>,
    pub color: FieldUpdate<Color>,
    pub health: FieldUpdate<i32>,
    pub alive: bool,
    /// Deaths so far; orders lifecycle state between snapshots
    pub deaths: u32,
}

/// A change to one replicated field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldChange {
    Name(FieldUpdate<String>),
    Color(FieldUpdate<Color>),
    Health(FieldUpdate<i32>),
}

#[derive(Debug)]
pub struct EntityView {
    id: EntityId,
    control: Control,
    name: ReplicatedField<String>,
    color: ReplicatedField<Color>,
    health: ReplicatedField<i32>,
    state: LifecycleState,
    deaths: u32,
    shown: bool,
    sinks: Sinks,
}

impl EntityView {
    /// Creates the authority's canonical copy of a freshly joined entity
    pub fn authority(
        id: EntityId,
        name: String,
        color: Color,
        health: i32,
        control: Control,
        sinks: Sinks,
    ) -> Self {
        let mut view = Self {
            id,
            control,
            name: ReplicatedField::authority(name),
            color: ReplicatedField::authority(color),
            health: ReplicatedField::authority(health),
            state: LifecycleState::Alive,
            deaths: 0,
            shown: false,
            sinks,
        };
        view.start();
        view
    }

    /// Creates an observer replica from a full snapshot
    ///
    /// `local_id` is the entity this process drives, if any.
    pub fn from_snapshot(snapshot: EntitySnapshot, local_id: Option<EntityId>, sinks: Sinks) -> Self {
        let control = if Some(snapshot.id) == local_id {
            Control::Local
        } else if snapshot.controlled {
            Control::Remote
        } else {
            Control::Ghost
        };

        let mut view = Self {
            id: snapshot.id,
            control,
            name: ReplicatedField::observer(snapshot.name),
            color: ReplicatedField::observer(snapshot.color),
            health: ReplicatedField::observer(snapshot.health),
            state: if snapshot.alive {
                LifecycleState::Alive
            } else {
                LifecycleState::Dead
            },
            deaths: snapshot.deaths,
            shown: false,
            sinks,
        };
        view.start();
        view
    }

    /// Wires the field reactions and brings the presentation in line with the state
    fn start(&mut self) {
        let render = self.sinks.render.clone();
        self.name.on_change(move |name| render.set_display_name(name));

        let render = self.sinks.render.clone();
        self.color.on_change(move |color| render.set_tint_color(*color));

        if self.control == Control::Local {
            let hud = self.sinks.hud.clone();
            self.health.on_change(move |health| hud.set_health(*health));
        }

        self.name.fire();
        self.color.fire();
        self.health.fire();

        if self.state.is_alive() {
            self.enable();
        } else {
            self.disable();
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn control(&self) -> Control {
        self.control
    }

    pub fn is_local(&self) -> bool {
        self.control == Control::Local
    }

    pub fn role(&self) -> Role {
        self.health.role()
    }

    pub fn name(&self) -> &str {
        self.name.get()
    }

    pub fn color(&self) -> Color {
        *self.color.get()
    }

    pub fn health(&self) -> i32 {
        *self.health.get()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    pub fn deaths(&self) -> u32 {
        self.deaths
    }

    /// Whether the shared visuals are currently switched on
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn set_name(&mut self, name: String) -> Result<FieldChange, CoreError> {
        self.name.set(name).map(FieldChange::Name)
    }

    pub fn set_color(&mut self, color: Color) -> Result<FieldChange, CoreError> {
        self.color.set(color).map(FieldChange::Color)
    }

    pub fn set_health(&mut self, health: i32) -> Result<FieldChange, CoreError> {
        self.health.set(health).map(FieldChange::Health)
    }

    /// Applies a field change pushed by the authority
    pub fn apply(&mut self, change: FieldChange) -> Result<bool, CoreError> {
        match change {
            FieldChange::Name(update) => self.name.apply(update),
            FieldChange::Color(update) => self.color.apply(update),
            FieldChange::Health(update) => self.health.apply(update),
        }
    }

    /// Applies a resync snapshot
    ///
    /// Stale fields are skipped. A missed death is replayed only while the
    /// entity is still down; one already followed by a respawn just catches up
    /// the count. A snapshot older than the last death this copy saw never
    /// revives it.
    pub fn apply_snapshot(&mut self, snapshot: EntitySnapshot) -> Result<(), CoreError> {
        self.name.apply(snapshot.name)?;
        self.color.apply(snapshot.color)?;
        self.health.apply(snapshot.health)?;

        if snapshot.deaths < self.deaths {
            return Ok(());
        }

        if snapshot.deaths > self.deaths {
            if !snapshot.alive && self.is_alive() {
                self.die();
            }
            self.deaths = snapshot.deaths;
        }

        if snapshot.alive && !self.is_alive() {
            self.revive(None);
        }

        Ok(())
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id,
            controlled: self.control != Control::Ghost,
            name: self.name.snapshot(),
            color: self.color.snapshot(),
            health: self.health.snapshot(),
            alive: self.state.is_alive(),
            deaths: self.deaths,
        }
    }

    /// Switches this entity's visuals on
    pub fn enable(&mut self) {
        let sinks = &self.sinks;
        sinks.presentation.set_active(Scope::Shared, true);

        if self.is_local() {
            sinks.hud.initialize();
            sinks.camera.set_free_camera_active(false);
            sinks.presentation.set_active(Scope::Local, true);
        } else {
            sinks.presentation.set_active(Scope::Remote, true);
        }

        self.shown = true;
    }

    /// Switches this entity's visuals off
    pub fn disable(&mut self) {
        let sinks = &self.sinks;
        sinks.presentation.set_active(Scope::Shared, false);

        if self.is_local() {
            sinks.hud.hide_reticule();
            sinks.camera.set_free_camera_active(true);
            sinks.presentation.set_active(Scope::Local, false);
        } else {
            sinks.presentation.set_active(Scope::Remote, false);
        }

        self.shown = false;
    }

    /// Runs the death presentation; a no-op unless currently alive
    pub fn die(&mut self) -> bool {
        let Some(dying) = self.state.transition(LifecycleEvent::Die) else {
            debug!("Entity {} is already {:?}, ignoring death", self.id, self.state);
            return false;
        };
        self.state = dying;
        self.deaths += 1;

        if self.control.plays_own_cues() {
            self.sinks.presentation.trigger(Cue::Died);
        }

        if self.is_local() {
            self.sinks.hud.write_status(DEAD_STATUS);
            self.sinks.hud.play_death_audio();
        }

        self.disable();

        if let Some(dead) = self.state.transition(LifecycleEvent::DeathPresented) {
            self.state = dead;
        }
        true
    }

    /// Brings the entity back at `spawn`; a no-op unless currently dead
    pub fn respawn(&mut self, spawn: &SpawnPoint) -> bool {
        self.revive(Some(spawn))
    }

    fn revive(&mut self, spawn: Option<&SpawnPoint>) -> bool {
        let Some(alive) = self.state.transition(LifecycleEvent::Respawn) else {
            debug!("Entity {} is {:?}, ignoring respawn", self.id, self.state);
            return false;
        };

        if self.control.plays_own_cues() {
            self.sinks.presentation.trigger(Cue::Restart);
        }

        if let (true, Some(spawn)) = (self.is_local(), spawn) {
            self.sinks.render.move_to(spawn);
        }

        self.enable();
        self.state = alive;
        true
    }

    /// Reaction to a damage notification
    pub fn on_damaged(&mut self, died: bool) {
        if self.is_local() {
            self.sinks.hud.flash_damage();
        }

        if died {
            self.die();
        }
    }

    /// Reaction to the end-of-match notification
    pub fn on_game_over(&mut self, winner_id: EntityId, winner_name: &str) {
        self.disable();
        self.sinks.camera.release_cursor();

        if self.is_local() {
            if self.id == winner_id {
                self.sinks.hud.write_status(WIN_STATUS);
            } else {
                self.sinks.hud.write_status(&loss_status(winner_name));
            }
        }
    }

    /// Reaction to a new match starting; living entities hidden by game over reappear
    pub fn on_match_started(&mut self) {
        if self.is_alive() && !self.shown {
            self.enable();
        }
    }
}

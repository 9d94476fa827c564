//! Narrow interfaces to the presentation collaborators
//!
//! The core never renders, animates or plays audio itself. It calls these sinks
//! and leaves the rest to whatever front end is attached. Each copy of an entity
//! gets its own [`Sinks`] bundle at construction time.

use crate::{Color, EntityId, SpawnPoint};
use log::{debug, info};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Which group of visuals a toggle applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Seen by every observer of the entity
    Shared,
    /// Only on the copy driven by this process (first-person parts, HUD)
    Local,
    /// Only on copies driven by someone else (third-person model, health bar)
    Remote,
}

/// Animation cues fired on lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Died,
    Restart,
}

pub trait PresentationSink: Send + Sync {
    fn set_active(&self, scope: Scope, active: bool);
    fn trigger(&self, cue: Cue);
}

pub trait HudSink: Send + Sync {
    fn initialize(&self);
    fn hide_reticule(&self);
    fn set_health(&self, health: i32);
    fn write_status(&self, text: &str);
    fn flash_damage(&self);
    fn play_death_audio(&self);
}

pub trait CameraSink: Send + Sync {
    fn set_free_camera_active(&self, active: bool);
    fn release_cursor(&self);
}

pub trait RenderSink: Send + Sync {
    fn set_display_name(&self, name: &str);
    fn set_tint_color(&self, color: Color);
    fn move_to(&self, spawn: &SpawnPoint);
}

/// Hands out spawn points; used by the authority only
pub trait SpawnProvider: Send + Sync {
    fn spawn_point(&self) -> SpawnPoint;
}

/// Session/lobby collaborator told to end the match
pub trait LobbyManager: Send + Sync {
    fn return_all_to_lobby(&self);
}

/// The per-copy sink bundle
#[derive(Clone)]
pub struct Sinks {
    pub presentation: Arc<dyn PresentationSink>,
    pub hud: Arc<dyn HudSink>,
    pub camera: Arc<dyn CameraSink>,
    pub render: Arc<dyn RenderSink>,
}

impl Sinks {
    /// Uses one backend for every sink
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: PresentationSink + HudSink + CameraSink + RenderSink + 'static,
    {
        Self {
            presentation: backend.clone(),
            hud: backend.clone(),
            camera: backend.clone(),
            render: backend,
        }
    }

    /// Sinks that only write to the log
    pub fn logging(entity: EntityId) -> Self {
        Self::from_backend(Arc::new(LogSinks::new(entity)))
    }
}

impl fmt::Debug for Sinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sinks")
    }
}

/// Log-backed sinks for headless processes
#[derive(Debug, Clone)]
pub struct LogSinks {
    entity: EntityId,
}

impl LogSinks {
    pub fn new(entity: EntityId) -> Self {
        Self { entity }
    }
}

impl PresentationSink for LogSinks {
    fn set_active(&self, scope: Scope, active: bool) {
        debug!("[{}] {:?} visuals active: {}", self.entity, scope, active);
    }

    fn trigger(&self, cue: Cue) {
        debug!("[{}] animation cue {:?}", self.entity, cue);
    }
}

impl HudSink for LogSinks {
    fn initialize(&self) {
        debug!("[{}] HUD initialized", self.entity);
    }

    fn hide_reticule(&self) {
        debug!("[{}] reticule hidden", self.entity);
    }

    fn set_health(&self, health: i32) {
        info!("[{}] health: {}", self.entity, health);
    }

    fn write_status(&self, text: &str) {
        info!("[{}] {}", self.entity, text.replace('\n', " "));
    }

    fn flash_damage(&self) {
        debug!("[{}] damage flash", self.entity);
    }

    fn play_death_audio(&self) {
        debug!("[{}] death audio", self.entity);
    }
}

impl CameraSink for LogSinks {
    fn set_free_camera_active(&self, active: bool) {
        debug!("[{}] free camera active: {}", self.entity, active);
    }

    fn release_cursor(&self) {
        debug!("[{}] cursor released", self.entity);
    }
}

impl RenderSink for LogSinks {
    fn set_display_name(&self, name: &str) {
        debug!("[{}] display name: {}", self.entity, name);
    }

    fn set_tint_color(&self, color: Color) {
        debug!("[{}] tint: {:?}", self.entity, color);
    }

    fn move_to(&self, spawn: &SpawnPoint) {
        debug!(
            "[{}] moved to {:?} facing {:.1}",
            self.entity, spawn.position, spawn.yaw
        );
    }
}

/// One recorded sink call
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    SetActive(Scope, bool),
    Trigger(Cue),
    HudInitialize,
    HideReticule,
    SetHealth(i32),
    WriteStatus(String),
    FlashDamage,
    PlayDeathAudio,
    FreeCamera(bool),
    ReleaseCursor,
    DisplayName(String),
    Tint(Color),
    MoveTo(SpawnPoint),
}

/// Sinks that remember every call, for tests and tooling
#[derive(Debug, Clone, Default)]
pub struct RecordingSinks {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sinks(&self) -> Sinks {
        Sinks::from_backend(Arc::new(self.clone()))
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Every status line written to the HUD, oldest first
    pub fn statuses(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::WriteStatus(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &SinkEvent) -> usize {
        self.lock().iter().filter(|event| *event == wanted).count()
    }

    fn record(&self, event: SinkEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SinkEvent>> {
        // A panicking test thread must not hide the events from the others
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PresentationSink for RecordingSinks {
    fn set_active(&self, scope: Scope, active: bool) {
        self.record(SinkEvent::SetActive(scope, active));
    }

    fn trigger(&self, cue: Cue) {
        self.record(SinkEvent::Trigger(cue));
    }
}

impl HudSink for RecordingSinks {
    fn initialize(&self) {
        self.record(SinkEvent::HudInitialize);
    }

    fn hide_reticule(&self) {
        self.record(SinkEvent::HideReticule);
    }

    fn set_health(&self, health: i32) {
        self.record(SinkEvent::SetHealth(health));
    }

    fn write_status(&self, text: &str) {
        self.record(SinkEvent::WriteStatus(text.to_string()));
    }

    fn flash_damage(&self) {
        self.record(SinkEvent::FlashDamage);
    }

    fn play_death_audio(&self) {
        self.record(SinkEvent::PlayDeathAudio);
    }
}

impl CameraSink for RecordingSinks {
    fn set_free_camera_active(&self, active: bool) {
        self.record(SinkEvent::FreeCamera(active));
    }

    fn release_cursor(&self) {
        self.record(SinkEvent::ReleaseCursor);
    }
}

impl RenderSink for RecordingSinks {
    fn set_display_name(&self, name: &str) {
        self.record(SinkEvent::DisplayName(name.to_string()));
    }

    fn set_tint_color(&self, color: Color) {
        self.record(SinkEvent::Tint(color));
    }

    fn move_to(&self, spawn: &SpawnPoint) {
        self.record(SinkEvent::MoveTo(*spawn));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sinks_share_one_log() {
        let recorder = RecordingSinks::new();
        let sinks = recorder.sinks();

        sinks.presentation.set_active(Scope::Shared, true);
        sinks.hud.write_status("You're dead!");
        sinks.camera.set_free_camera_active(true);
        sinks.render.set_display_name("Wizard1");

        assert_eq!(
            recorder.events(),
            vec![
                SinkEvent::SetActive(Scope::Shared, true),
                SinkEvent::WriteStatus("You're dead!".to_string()),
                SinkEvent::FreeCamera(true),
                SinkEvent::DisplayName("Wizard1".to_string()),
            ]
        );
        assert_eq!(recorder.statuses(), vec!["You're dead!".to_string()]);
    }

    #[test]
    fn test_recording_sinks_clear() {
        let recorder = RecordingSinks::new();
        recorder.sinks().hud.flash_damage();
        recorder.sinks().hud.flash_damage();

        assert_eq!(recorder.count(&SinkEvent::FlashDamage), 2);

        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}

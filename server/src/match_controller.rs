//! Win handling, game-over fan-out and the delayed return to the lobby

use crate::registry::EntityRegistry;
use crate::scheduler::{Scheduler, TimedAction, TimerHandle};
use log::{debug, info};
use shared::sinks::LobbyManager;
use shared::EntityId;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Running,
    GameOver,
    Lobby,
}

/// Result of a finished match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    pub winner_id: EntityId,
    pub winner_name: String,
}

#[derive(Debug)]
pub struct MatchController {
    lobby_return_delay: Duration,
    match_id: u32,
    phase: MatchPhase,
    result: Option<MatchState>,
    lobby_timer: Option<TimerHandle>,
}

impl MatchController {
    pub fn new(lobby_return_delay: Duration) -> Self {
        Self {
            lobby_return_delay,
            match_id: 1,
            phase: MatchPhase::Running,
            result: None,
            lobby_timer: None,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn match_id(&self) -> u32 {
        self.match_id
    }

    pub fn result(&self) -> Option<&MatchState> {
        self.result.as_ref()
    }

    pub fn lobby_timer(&self) -> Option<TimerHandle> {
        self.lobby_timer
    }

    /// Ends the running match in favour of `winner`
    ///
    /// Returns every entity that must be told, taken from a snapshot of the
    /// registry, or `None` if this match already has a winner.
    pub fn won(
        &mut self,
        winner: MatchState,
        registry: &EntityRegistry,
        now: Duration,
        scheduler: &mut Scheduler,
    ) -> Option<Vec<EntityId>> {
        if self.phase != MatchPhase::Running {
            debug!(
                "Match {} already decided, ignoring win by {}",
                self.match_id, winner.winner_id
            );
            return None;
        }

        info!(
            "Match {} won by {} ({})",
            self.match_id, winner.winner_name, winner.winner_id
        );

        self.phase = MatchPhase::GameOver;
        self.result = Some(winner);
        self.lobby_timer = Some(scheduler.schedule(
            now + self.lobby_return_delay,
            TimedAction::ReturnToLobby {
                match_id: self.match_id,
            },
        ));

        Some(registry.snapshot())
    }

    /// Runs a due lobby-return timer; stale timers do nothing
    pub fn return_to_lobby(&mut self, match_id: u32, lobby: &dyn LobbyManager) -> bool {
        if match_id != self.match_id || self.phase != MatchPhase::GameOver {
            debug!("Ignoring lobby return for stale match {}", match_id);
            return false;
        }

        self.lobby_timer = None;
        self.phase = MatchPhase::Lobby;
        info!("Match {} over, returning everyone to the lobby", match_id);
        lobby.return_all_to_lobby();
        true
    }

    /// Starts a fresh match, cancelling a lobby return still pending
    pub fn start_match(&mut self, scheduler: &mut Scheduler) -> u32 {
        if let Some(handle) = self.lobby_timer.take() {
            scheduler.cancel(handle);
        }

        self.match_id += 1;
        self.phase = MatchPhase::Running;
        self.result = None;
        info!("Match {} started", self.match_id);
        self.match_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLobby {
        calls: AtomicUsize,
    }

    impl LobbyManager for CountingLobby {
        fn return_all_to_lobby(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn winner(id: EntityId) -> MatchState {
        MatchState {
            winner_id: id,
            winner_name: format!("Wizard{}", id),
        }
    }

    fn registry_of(ids: &[EntityId]) -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        for id in ids {
            registry.register(*id);
        }
        registry
    }

    #[test]
    fn test_won_returns_every_registered_entity() {
        let mut scheduler = Scheduler::new();
        let mut matches = MatchController::new(Duration::from_secs(7));
        let registry = registry_of(&[1, 2, 7]);

        let recipients = matches
            .won(winner(7), &registry, Duration::from_secs(30), &mut scheduler)
            .unwrap();

        assert_eq!(recipients, vec![1, 2, 7]);
        assert_eq!(matches.phase(), MatchPhase::GameOver);
        assert_eq!(matches.result(), Some(&winner(7)));

        let timer = matches.lobby_timer().unwrap();
        assert_eq!(scheduler.deadline(timer), Some(Duration::from_secs(37)));
    }

    #[test]
    fn test_second_win_is_ignored() {
        let mut scheduler = Scheduler::new();
        let mut matches = MatchController::new(Duration::from_secs(7));
        let registry = registry_of(&[1, 2]);

        matches.won(winner(1), &registry, Duration::ZERO, &mut scheduler);
        let second = matches.won(winner(2), &registry, Duration::ZERO, &mut scheduler);

        assert!(second.is_none());
        assert_eq!(matches.result().unwrap().winner_id, 1);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_lobby_return_happens_once() {
        let mut scheduler = Scheduler::new();
        let mut matches = MatchController::new(Duration::from_secs(7));
        let lobby = CountingLobby::default();
        matches.won(winner(1), &registry_of(&[1]), Duration::ZERO, &mut scheduler);

        assert!(matches.return_to_lobby(1, &lobby));
        assert!(!matches.return_to_lobby(1, &lobby));

        assert_eq!(lobby.calls.load(Ordering::SeqCst), 1);
        assert_eq!(matches.phase(), MatchPhase::Lobby);
    }

    #[test]
    fn test_new_match_cancels_pending_lobby_return() {
        let mut scheduler = Scheduler::new();
        let mut matches = MatchController::new(Duration::from_secs(7));
        let lobby = CountingLobby::default();
        matches.won(winner(1), &registry_of(&[1]), Duration::ZERO, &mut scheduler);

        let next = matches.start_match(&mut scheduler);

        assert_eq!(next, 2);
        assert!(scheduler.is_empty());
        assert_eq!(matches.phase(), MatchPhase::Running);
        assert!(matches.result().is_none());
        // A timer that slipped through still cannot end the new match
        assert!(!matches.return_to_lobby(1, &lobby));
        assert_eq!(lobby.calls.load(Ordering::SeqCst), 0);
    }
}

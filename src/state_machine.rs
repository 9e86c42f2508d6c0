use serde::{Deserialize, Serialize};

/// States shared by every robot kind; the transitions between them are per kind.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum EnemyState {
    Idle,
    Moving,
    Turning,
    Attacking,
}

/// How long timed states last, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateDurations {
    pub idle_ms: u64,
    pub turn_ms: u64,
    pub attack_ms: u64,
}

impl StateDurations {
    /// `None` for states that only end on a trigger.
    pub fn for_state(&self, state: EnemyState) -> Option<u64> {
        match state {
            EnemyState::Idle => Some(self.idle_ms),
            EnemyState::Turning => Some(self.turn_ms),
            EnemyState::Attacking => Some(self.attack_ms),
            EnemyState::Moving => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Guards one spot, alternating attacks and turns.
    Standing,
    /// Patrols a ledge, turning at edges and walls, stopping to attack.
    Moving,
}

/// Timing state owned by each robot: when the current state began and where the
/// robot is in its behavior cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BehaviorContext {
    pub state_start_ms: u64,
    pub step: u8,
}

impl BehaviorContext {
    pub fn new(now_ms: u64) -> Self {
        Self {
            state_start_ms: now_ms,
            step: 0,
        }
    }

    pub fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.state_start_ms)
    }
}

impl EnemyKind {
    /// Level-file marker factory.
    pub fn from_marker(c: char) -> Option<Self> {
        match c {
            'R' => Some(EnemyKind::Standing),
            'M' => Some(EnemyKind::Moving),
            _ => None,
        }
    }

    pub fn durations(self) -> StateDurations {
        match self {
            EnemyKind::Standing => StateDurations {
                idle_ms: 1000,
                turn_ms: 500,
                attack_ms: 750,
            },
            EnemyKind::Moving => StateDurations {
                idle_ms: 500,
                turn_ms: 500,
                attack_ms: 750,
            },
        }
    }

    pub fn initial_state(self) -> EnemyState {
        match self {
            EnemyKind::Standing => EnemyState::Idle,
            EnemyKind::Moving => EnemyState::Moving,
        }
    }

    /// Attack box width and height.
    pub fn attack_box_size(self) -> (f32, f32) {
        match self {
            EnemyKind::Standing => (40.0, 12.0),
            EnemyKind::Moving => (24.0, 12.0),
        }
    }

    /// Next state and step once a timed state runs out.
    ///
    /// Standing: Idle(0) → Attacking(1) → Idle(2) → Turning(3) → Idle(0).
    /// Moving: Idle(1) → Attacking(2) → Moving(0); Turning(3) → Moving(0).
    pub fn next_state_after(self, state: EnemyState, step: u8) -> (EnemyState, u8) {
        match self {
            EnemyKind::Standing => match (state, step) {
                (EnemyState::Idle, 2) => (EnemyState::Turning, 3),
                (EnemyState::Idle, _) => (EnemyState::Attacking, 1),
                (EnemyState::Attacking, _) => (EnemyState::Idle, 2),
                (EnemyState::Turning, _) | (EnemyState::Moving, _) => (EnemyState::Idle, 0),
            },
            EnemyKind::Moving => match state {
                EnemyState::Idle => (EnemyState::Attacking, 2),
                EnemyState::Attacking | EnemyState::Turning | EnemyState::Moving => {
                    (EnemyState::Moving, 0)
                }
            },
        }
    }

    /// Reaction while Moving when the player enters the attack box.
    pub fn on_player_spotted(self) -> Option<(EnemyState, u8)> {
        match self {
            EnemyKind::Standing => None,
            EnemyKind::Moving => Some((EnemyState::Idle, 1)),
        }
    }

    /// Reaction while Moving at a ledge edge or wall.
    pub fn on_obstacle(self) -> Option<(EnemyState, u8)> {
        match self {
            EnemyKind::Standing => None,
            EnemyKind::Moving => Some((EnemyState::Turning, 3)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standing_cycle_visits_each_step_once() {
        let kind = EnemyKind::Standing;
        let mut state = kind.initial_state();
        let mut step = 0;
        let mut seen = Vec::new();
        for _ in 0..4 {
            let next = kind.next_state_after(state, step);
            state = next.0;
            step = next.1;
            seen.push((state, step));
        }
        assert_eq!(
            seen,
            vec![
                (EnemyState::Attacking, 1),
                (EnemyState::Idle, 2),
                (EnemyState::Turning, 3),
                (EnemyState::Idle, 0),
            ]
        );
    }

    #[test]
    fn moving_robot_returns_to_patrol() {
        let kind = EnemyKind::Moving;
        let spotted = kind.on_player_spotted().expect("reacts to player");
        assert_eq!(spotted, (EnemyState::Idle, 1));
        let attack = kind.next_state_after(spotted.0, spotted.1);
        assert_eq!(attack, (EnemyState::Attacking, 2));
        assert_eq!(kind.next_state_after(attack.0, attack.1), (EnemyState::Moving, 0));
        let turn = kind.on_obstacle().expect("turns at obstacles");
        assert_eq!(kind.next_state_after(turn.0, turn.1), (EnemyState::Moving, 0));
    }

    #[test]
    fn standing_robot_has_no_patrol_reactions() {
        assert!(EnemyKind::Standing.on_player_spotted().is_none());
        assert!(EnemyKind::Standing.on_obstacle().is_none());
    }

    #[test]
    fn moving_state_is_untimed() {
        let durations = EnemyKind::Moving.durations();
        assert_eq!(durations.for_state(EnemyState::Moving), None);
        assert_eq!(durations.for_state(EnemyState::Idle), Some(500));
        assert_eq!(EnemyKind::Standing.durations().for_state(EnemyState::Idle), Some(1000));
    }

    #[test]
    fn markers_map_to_kinds() {
        assert_eq!(EnemyKind::from_marker('R'), Some(EnemyKind::Standing));
        assert_eq!(EnemyKind::from_marker('M'), Some(EnemyKind::Moving));
        assert_eq!(EnemyKind::from_marker('#'), None);
    }

    #[test]
    fn elapsed_never_underflows() {
        let ctx = BehaviorContext::new(500);
        assert_eq!(ctx.elapsed(400), 0);
        assert_eq!(ctx.elapsed(900), 400);
    }
}

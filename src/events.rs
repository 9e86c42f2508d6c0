use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

const MAX_EVENTS: usize = 500;

#[derive(Serialize, Clone, Debug)]
pub struct GameEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
}

/// Change notifications for observers. Observers read `recent` and `revision`; nothing
/// in here feeds back into the simulation.
#[derive(Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    revision: u64,
    last_overflow_log_frame: u64,
}

impl GameEventBus {
    pub fn emit(&mut self, name: impl Into<String>, data: serde_json::Value) {
        self.recent.push_back(GameEvent {
            name: name.into(),
            data,
            frame: self.frame,
        });
        self.revision = self.revision.saturating_add(1);
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= 120 {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "[Robotower events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    /// Bumped after every tick that mutated observable state.
    pub fn mark_changed(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Events emitted at or after `frame`.
    pub fn since(&self, frame: u64) -> impl Iterator<Item = &GameEvent> {
        self.recent.iter().filter(move |ev| ev.frame >= frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_tracks_dropped_events() {
        let mut bus = GameEventBus::default();
        for i in 0..(MAX_EVENTS + 25) {
            bus.emit("test", serde_json::json!({ "i": i }));
        }
        assert_eq!(bus.recent.len(), MAX_EVENTS);
        assert_eq!(bus.dropped_events, 25);
        assert_eq!(bus.revision(), (MAX_EVENTS + 25) as u64);
    }

    #[test]
    fn since_filters_by_frame() {
        let mut bus = GameEventBus::default();
        bus.emit("early", serde_json::json!({}));
        bus.frame = 4;
        bus.emit("late", serde_json::json!({}));
        let names: Vec<&str> = bus.since(3).map(|ev| ev.name.as_str()).collect();
        assert_eq!(names, vec!["late"]);
    }
}

use serde::Serialize;

/// A transient message. Shown from `shown_at_ms` for `duration_ms`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Popup {
    pub text: String,
    pub shown_at_ms: u64,
    pub duration_ms: u64,
}

impl Popup {
    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.shown_at_ms) >= self.duration_ms
    }
}

/// Single popup slot. A new message cancels and replaces the current one, so an old
/// message's timeout can never hide its successor.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Notifications {
    current: Option<Popup>,
}

impl Notifications {
    pub fn show(&mut self, text: impl Into<String>, now_ms: u64, duration_ms: u64) {
        self.current = Some(Popup {
            text: text.into(),
            shown_at_ms: now_ms,
            duration_ms,
        });
    }

    pub fn visible(&self, now_ms: u64) -> Option<&Popup> {
        self.current.as_ref().filter(|popup| !popup.expired(now_ms))
    }

    /// Drops the popup once its time is up. Returns whether it was removed.
    pub fn expire(&mut self, now_ms: u64) -> bool {
        if self.current.as_ref().is_some_and(|popup| popup.expired(now_ms)) {
            self.current = None;
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum TerminalOption {
    ResetLifts,
    FreezeEnemies,
    LogOff,
}

impl TerminalOption {
    pub const ALL: [TerminalOption; 3] = [
        TerminalOption::ResetLifts,
        TerminalOption::FreezeEnemies,
        TerminalOption::LogOff,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TerminalOption::ResetLifts => "Reset lifts",
            TerminalOption::FreezeEnemies => "Freeze robots",
            TerminalOption::LogOff => "Log off",
        }
    }
}

/// Cursor over the security terminal's fixed option list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TerminalMenu {
    pub selected: usize,
}

impl TerminalMenu {
    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1).min(TerminalOption::ALL.len() - 1);
    }

    pub fn selected_option(&self) -> TerminalOption {
        TerminalOption::ALL[self.selected.min(TerminalOption::ALL.len() - 1)]
    }
}

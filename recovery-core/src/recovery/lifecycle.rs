// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! App session lifecycle.
//!
//! The host app reports foreground/background transitions here; the
//! recovery syncer pauses polling while the app is in the background.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppSessionState {
    Foreground,
    Background,
}

/// Shared handle on the app's session state. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct AppSessionLifecycle {
    state_tx: Arc<watch::Sender<AppSessionState>>,
}

impl AppSessionLifecycle {
    pub fn new(initial: AppSessionState) -> Self {
        let (state_tx, _) = watch::channel(initial);
        AppSessionLifecycle {
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn state(&self) -> AppSessionState {
        *self.state_tx.borrow()
    }

    pub fn is_foreground(&self) -> bool {
        self.state() == AppSessionState::Foreground
    }

    pub fn set_state(&self, state: AppSessionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(?state, "App session state changed");
        }
    }

    pub fn enter_foreground(&self) {
        self.set_state(AppSessionState::Foreground);
    }

    pub fn enter_background(&self) {
        self.set_state(AppSessionState::Background);
    }

    pub fn subscribe(&self) -> watch::Receiver<AppSessionState> {
        self.state_tx.subscribe()
    }
}

impl Default for AppSessionLifecycle {
    fn default() -> Self {
        AppSessionLifecycle::new(AppSessionState::Foreground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let lifecycle = AppSessionLifecycle::default();
        let other = lifecycle.clone();
        other.enter_background();
        assert_eq!(lifecycle.state(), AppSessionState::Background);
        assert!(!lifecycle.is_foreground());
    }

    #[test]
    fn test_only_changes_notify() {
        let lifecycle = AppSessionLifecycle::default();
        let rx = lifecycle.subscribe();

        lifecycle.enter_foreground();
        assert!(!rx.has_changed().unwrap());

        lifecycle.enter_background();
        assert!(rx.has_changed().unwrap());
    }
}

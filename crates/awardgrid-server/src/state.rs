//! Shared application state.

use awardgrid_browser::{ChromiumLauncher, PageLauncher};
use awardgrid_search::SearchOrchestrator;
use std::sync::{Arc, RwLock};

/// The production launcher behind every endpoint.
pub type AppLauncher = ChromiumLauncher;

/// The page type producers drive in production.
pub type AppPage = <ChromiumLauncher as PageLauncher>::Page;

/// Everything a search request needs, built once at startup.
pub struct SearchContext {
    pub orchestrator: SearchOrchestrator<AppLauncher>,
}

/// Global state shared across all handlers.
///
/// The context is `None` until initialization finishes; requests arriving
/// before that are answered with a service-unavailable error.
pub struct AppState {
    context: RwLock<Option<Arc<SearchContext>>>,
}

impl AppState {
    /// Fresh state with no context installed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: RwLock::new(None),
        }
    }

    /// Install the initialized search context.
    pub fn install(&self, context: Arc<SearchContext>) {
        *self
            .context
            .write()
            .expect("RwLock poisoned: another thread panicked while holding the lock") =
            Some(context);
    }

    /// The current context, if initialization has completed.
    pub fn context(&self) -> Option<Arc<SearchContext>> {
        self.context
            .read()
            .expect("RwLock poisoned: another thread panicked while holding the lock")
            .clone()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_starts_uninitialized() {
        let state = AppState::new();
        assert!(state.context().is_none());
    }
}

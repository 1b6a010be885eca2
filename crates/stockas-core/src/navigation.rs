//! Navigation primitive invoked when a session cannot be recovered.
//!
//! The core never decides how a redirect is rendered; it only names the
//! route. UI shells and the CLI supply their own [`Navigator`].

use std::sync::{Arc, Mutex};

use tracing::info;

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Logs navigation requests and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, route: &str) {
        info!(route, "Navigation requested");
    }
}

/// Records every requested route. Clones share the same history.
#[derive(Debug, Default, Clone)]
pub struct NavigationLog {
    routes: Arc<Mutex<Vec<String>>>,
}

impl NavigationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.routes.lock().ok().and_then(|r| r.last().cloned())
    }

    pub fn clear(&self) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.clear();
        }
    }
}

impl Navigator for NavigationLog {
    fn navigate(&self, route: &str) {
        info!(route, "Navigation requested");
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route.to_string());
        }
    }
}

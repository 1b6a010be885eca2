//! Route-change gate.
//!
//! Decides on every route transition whether the route is reachable with the
//! current session or must redirect. Protected content should not be shown
//! until the first check has completed (`is_auth_checked`).

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::RouteConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Redirect policy for a route given the session state.
///
/// | authenticated | auth page | protected | action             |
/// |---------------|-----------|-----------|--------------------|
/// | no            | -         | yes       | redirect sign-in   |
/// | yes           | yes       | -         | redirect landing   |
/// | any           | no        | no        | allow              |
pub fn decide(is_auth: bool, is_auth_page: bool, is_protected: bool, routes: &RouteConfig) -> GuardDecision {
    if !is_auth && is_protected {
        GuardDecision::Redirect(routes.sign_in.clone())
    } else if is_auth && is_auth_page {
        GuardDecision::Redirect(routes.landing.clone())
    } else {
        GuardDecision::Allow
    }
}

pub struct SessionGuard {
    api: ApiClient,
    routes: RouteConfig,
    auth_checked: AtomicBool,
}

impl SessionGuard {
    pub fn new(api: ApiClient, routes: RouteConfig) -> Self {
        Self {
            api,
            routes,
            auth_checked: AtomicBool::new(false),
        }
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    /// Evaluate `pathname`, perform any redirect through the navigator, and
    /// mark the auth check as complete.
    pub async fn check(&self, pathname: &str) -> GuardDecision {
        let decision = self.evaluate(pathname).await;
        self.auth_checked.store(true, Ordering::Release);

        if let GuardDecision::Redirect(ref route) = decision {
            self.api.navigator().navigate(route);
        }
        decision
    }

    async fn evaluate(&self, pathname: &str) -> GuardDecision {
        if let Err(e) = self.api.ensure_fresh_session().await {
            warn!(error = %e, pathname, "Session refresh failed during route check");
            // Already on sign-in: redirecting again would loop
            return if pathname == self.routes.sign_in {
                GuardDecision::Allow
            } else {
                GuardDecision::Redirect(self.routes.sign_in.clone())
            };
        }

        let is_auth = self.api.is_authenticated();
        let is_auth_page = self.routes.is_auth_page(pathname);
        let is_protected = self.routes.is_protected(pathname);
        debug!(pathname, is_auth, is_auth_page, is_protected, "Route check");

        decide(is_auth, is_auth_page, is_protected, &self.routes)
    }

    pub fn is_auth_checked(&self) -> bool {
        self.auth_checked.load(Ordering::Acquire)
    }

    /// Protected routes render nothing until the first check completes.
    pub fn should_render(&self, pathname: &str) -> bool {
        self.is_auth_checked() || !self.routes.is_protected(pathname)
    }
}

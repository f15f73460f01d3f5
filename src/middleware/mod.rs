//! Portal session gating for Axum.
//!
//! Runs the same [`SessionGate`](crate::SessionGate) as client pages, keyed
//! on an encrypted session cookie that holds the provider access token.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use axum::middleware::from_fn_with_state;
//! use portal_gate::Requirement;
//! use portal_gate::middleware::{PortalConfig, portal_routes, require_access};
//!
//! // 1. Configure from environment
//! let config = PortalConfig::from_env()?;
//!
//! // 2. Mount sign-in / register / forgot-password / sign-out routes
//! let (auth, portal) = portal_routes(config);
//!
//! // 3. Guard pages
//! let pages = axum::Router::new()
//!     .route("/portal/dashboard.html", get(dashboard))
//!     .route_layer(from_fn_with_state(portal.guard(Requirement::approved()), require_access));
//!
//! let app = auth.merge(pages);
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod guard;
mod routes;
mod state;
mod types;

pub use config::PortalConfig;
pub use error::AuthError;
pub use extractor::PortalUser;
pub use guard::{AccessGuard, require_access};
pub use routes::{PortalHandle, portal_routes};

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;

#![doc = include_str!("../README.md")]

#[cfg(feature = "client")]
pub mod client;
pub mod destinations;
pub mod error;
pub mod events;
pub mod gate;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod page;
pub mod provider;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "client")]
pub use client::{ProviderClient, ProviderConfig, SignUpMetadata, SignUpOutcome, TokenSession};
pub use destinations::Destinations;
pub use error::{BoxError, Error};
pub use events::{SessionChange, SessionEvent, SessionEvents, SignOutWatch, sign_out_redirect};
pub use gate::{Decision, DenyCause, Evaluation, GatePolicy, Requirement, SessionGate, decide};
pub use page::{GuardState, Navigator, PageGuard};
pub use provider::IdentityProvider;
pub use types::{Identity, Profile, Session, UserId};

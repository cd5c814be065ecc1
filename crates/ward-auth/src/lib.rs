//! Authentication and authorization for Ward.
//!
//! The pieces, leaves first:
//!
//! - [`token::TokenCodec`] signs and verifies bearer tokens.
//! - [`password::PasswordVerifier`] checks a username and password and
//!   audits the attempt.
//! - [`delegation::DelegationAuthority`] manages care-team grants.
//! - [`engine::AccessPolicyEngine`] decides, per request, whether the caller
//!   satisfies an endpoint's [`ward_core::policy::Policy`].
//! - [`guard`] plugs the engine into axum as route middleware.
//! - [`session::SessionManager`] and [`routes`] handle login, refresh and
//!   logout.

pub mod credentials;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod guard;
pub mod password;
pub mod routes;
pub mod session;
pub mod token;

pub use error::{AuthError, Result};
pub use guard::{AuthState, Caller, GuardState, enforce};
pub use token::TokenCodec;

//! Authentication module for managing the dashboard session.
//!
//! This module provides:
//! - `claims`: credential expiry inspection (pure, no I/O)
//! - `store`: two-slot credential persistence behind the `TokenStore` trait
//! - `guard`: the mount-scoped session guard gating protected content
//!
//! Credentials are written by the sign-in flow; the guard only ever renews
//! the access slot or clears everything.

pub mod claims;
pub mod guard;
pub mod store;

pub use guard::{Render, SessionGuard};
pub use store::{FileTokenStore, TokenStore};

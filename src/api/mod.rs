//! REST API client module for the campusdesk backend.
//!
//! This module provides the `RenewalClient` used by the session guard to
//! silently exchange a refresh credential for a new access credential.
//!
//! The backend uses JWT bearer token authentication; every other endpoint
//! (tickets, messaging, notifications) is consumed by the dashboard shell
//! and is out of scope here.

pub mod client;
pub mod error;

pub use client::{HttpRenewalClient, RenewalClient};
pub use error::ApiError;

//! Business logic services.
//!
//! Services coordinate between repositories and the catalog.

pub mod auth;
pub mod checkout;

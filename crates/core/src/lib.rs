//! ShopSmarter Core - Shared domain types.
//!
//! This crate provides the types used across ShopSmarter components:
//! - `server` - Recommendation API and account backend
//! - `cli` - Dataset preparation, catalog embedding and migrations
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Repositories bind the raw values (`as_i64()`,
//! `as_str()`) and rebuild the newtypes from rows.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, usernames, emails and prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

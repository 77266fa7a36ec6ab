//! ShopSmarter server library.
//!
//! The recommendation API and account backend as a library, so the
//! binaries and integration tests share the same router.
//!
//! # Modules
//!
//! - [`ai`] - Vision embeddings, image descriptions, query refinement, keywords
//! - [`catalog`] - The in-memory product catalog
//! - [`recommend`] - Ranking and the recommendation pipeline
//! - [`db`] - `SQLite` repositories for accounts, wishlists, carts, preferences
//! - [`routes`] / [`app`] - HTTP handlers and router assembly

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod ai;
pub mod app;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod recommend;
pub mod routes;
pub mod services;
pub mod state;

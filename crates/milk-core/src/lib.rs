//! milk-core - Core library for Milk Me Not
//!
//! This crate contains the typed models, the Supabase REST/auth/storage
//! clients, and the client-side logic (product search aggregation, update
//! notices, request caching) shared by every Milk Me Not interface.

pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod platform;
pub mod rating;
pub mod rest;
pub mod search;
pub mod services;
pub mod storage;
pub mod toast;
pub mod util;
pub mod version;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use models::{ProductId, SearchResult, VersionDescriptor};

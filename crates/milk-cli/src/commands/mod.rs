pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod feed;
pub mod info;
pub mod lookup;
pub mod notifications;
pub mod product;
pub mod profile;
pub mod rate;
pub mod search;
pub mod stats;
pub mod update;

//! Bin Collector Library
//!
//! Fetches a waste collection schedule on a fixed interval, keeps the latest
//! good result in memory, and serves it as an HTML page and a JSON API.

pub mod cache;
pub mod cli;
pub mod data;
pub mod refresh;
pub mod server;

//! reelpress library
//!
//! Exposes the cache, resolvers and batch driver for the binary and for
//! integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod migrate;
pub mod resolve;

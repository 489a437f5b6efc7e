//! Core types, collaborator traits and orchestration for the Covenant
//! contract service.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! record store, the object-storage gateway and the question-answering agent
//! are all reached through traits defined here and injected at startup.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod agent;
pub mod bridge;
pub mod caller;
pub mod chat;
pub mod contract;
pub mod error;
pub mod recipient;
pub mod service;
pub mod storage;
pub mod store;

pub use error::{Error, Result};

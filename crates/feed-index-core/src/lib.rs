//! # Feed Index Core
//!
//! Shared, runtime-agnostic logic for Feed Index: item models, the store
//! abstraction, the ranked keyword search algorithm, and structured
//! timeline decoding.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Storage backends live behind the
//! [`store::Store`] trait; [`store::memory::InMemoryStore`] is provided
//! for tests and embedders.

pub mod feed;
pub mod models;
pub mod search;
pub mod store;

//! Terminal Pokédex backed by PokeAPI.
//!
//! ```text
//! list page → enrich (detail + type relations, batched) → cache → viewer
//!                                                           ↑
//!                                                     favorites store
//! ```
//!
//! - [`api`]: the [`PokeApi`](api::PokeApi) seam and its reqwest implementation
//! - [`enrich`]: batched enrichment of stubs into display-ready entries
//! - [`fetch`]: refresh job, on-disk entry cache, shared progress state
//! - [`favorites`]: favorites set with atomic updates
//! - [`catalog`]: filtering, sorting and paging
//! - [`sprites`]: sprite download and thumbnails
//! - [`ui`]: the ratatui viewer

pub mod api;
pub mod catalog;
pub mod config;
pub mod enrich;
pub mod error;
pub mod favorites;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod sprites;
pub mod ui;
pub mod utils;

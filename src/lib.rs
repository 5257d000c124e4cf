#![forbid(unsafe_code)]

//! Public entry point for the cinewrap crate.
//!
//! The backend binary is a thin layer over these modules: configuration, the
//! TMDB client, the normalizer that reshapes upstream JSON, the response cache
//! and the axum router tying them together.

pub mod cache;
pub mod config;
pub mod error;
pub mod normalize;
pub mod server;
pub mod tmdb;

//! Ember Core - Foundational types for the Ember particle engine
//!
//! This crate provides the types that all other Ember crates depend on:
//! - `ParticleId` - Globally unique, spawn-ordered particle identifiers
//! - `Vec3`, `Color` - Value types used by configuration and policies
//! - Error types and Result alias

mod error;
mod id;
mod types;

pub use error::{EmberError, Result};
pub use id::ParticleId;
pub use types::{Color, Vec3};

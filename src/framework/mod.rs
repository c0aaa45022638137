//! Generic actor framework for resource management.
//!
//! This module provides the core building blocks for creating type-safe
//! repositories that own an ordered collection of entities and serve CRUD
//! operations through a mailbox.
//!
//! # Main Components
//!
//! - [`ActorEntity`] - Trait that resource types implement to be managed by actors
//! - [`ResourceActor`] - Generic actor that owns the ordered store
//! - [`ResourceClient`] - Typed handle that sends requests to the actor
//! - [`FrameworkError`] - Common error types
//!
//! # Testing
//!
//! See [`mock`] module for utilities to test callers without spawning full actors.

pub mod core;
pub mod mock;

// Re-export core types for convenience
pub use core::*;

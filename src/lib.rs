#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Resource Cluster
//!
//! > **A small CRUD service for tagged, counted resources, served by a pool of worker processes.**
//!
//! Each worker owns an in-memory repository run as an actor. A supervisor
//! launches the workers and keeps track of them, and a front dispatcher is
//! the single public listener, streaming every request to a ready worker.
//!
//! ```text
//! client ──▶ dispatcher :4000 ──▶ worker :4001 ──▶ router ──▶ repository actor
//!                         └─────▶ worker :4002 ──▶ router ──▶ repository actor
//! ```
//!
//! ## ⚠️ Deployment Constraint
//!
//! Workers share nothing. A resource created through one worker cannot be read,
//! updated or deleted through another. With round-robin balancing and more than
//! one worker, consecutive requests land on different stores. Run with
//! `WORKERS=1`, use `BALANCE=fixed`, or use `serve` mode when clients need to
//! see their own writes.
//!
//! ## 🏗️ Design Notes
//!
//! ### 1. One Actor per Store
//! The repository is a [`ResourceActor`](framework::ResourceActor): a Tokio task
//! that owns the ordered store and handles one message at a time. Concurrent
//! requests queue on its mailbox instead of contending for a lock, so every
//! operation is atomic with respect to the others.
//!
//! ### 2. Type-Safe Error Handling
//! Each layer has its own `thiserror` enum ([`FrameworkError`](framework::FrameworkError),
//! [`RepositoryError`](resource_actor::RepositoryError), [`ApiError`](http::ApiError)),
//! converted with `From` as errors cross a layer. Only [`ApiError`](http::ApiError)
//! knows about status codes.
//!
//! ### 3. Streaming Dispatch
//! The dispatcher hands hyper the inbound body stream and returns the worker's
//! response stream unchanged, so nothing is buffered in the middle.
//!
//! ### 4. Observability
//! `tracing` everywhere with structured fields. See the [`lifecycle::tracing`]
//! module for details.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`framework`])
//! The generic `ResourceActor<T>` and its `ResourceClient<T>`, plus [`framework::mock`]
//! for testing callers without a running actor.
//!
//! ### 2. The Resource ([`domain`], [`resource_actor`], [`clients`])
//! The `Resource` type, its validation rules and the [`Repository`](clients::Repository)
//! handle that the HTTP layer talks to.
//!
//! ### 3. The Worker ([`http`])
//! Routing, body limits, JSON responses with CORS headers, and the hyper server loop.
//!
//! ### 4. The Cluster ([`lifecycle`], [`dispatcher`], [`config`])
//! Worker supervision, selection policies, request forwarding and configuration.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Dispatcher on :4000, workers on :4001..
//! cargo run
//!
//! # One process, no workers
//! cargo run -- serve
//!
//! # Two workers that come back after crashing
//! WORKERS=2 cargo run -- --restart
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod clients;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod framework;
pub mod http;
pub mod lifecycle;
pub mod resource_actor;

//! Shared test utilities for the modrepo workspace.
//!
//! This crate provides in-memory doubles for the resolver's boundaries and
//! small builders for resources. It is a dev-dependency only, never
//! published.
//!
//! # Modules
//!
//! - [`installer`]: [`RecordingInstaller`], an in-memory platform that
//!   records every call and can be told to fail
//! - [`catalog`]: [`MemoryLoader`], a catalog loader backed by a map
//! - [`fixtures`]: resource, capability and requirement builders

pub mod catalog;
pub mod fixtures;
pub mod installer;

pub use catalog::MemoryLoader;
pub use installer::RecordingInstaller;

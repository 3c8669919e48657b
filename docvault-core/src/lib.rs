#![doc = "docvault-core: core pipeline library for docvault."]

//! This crate contains the document pipeline: markdown classification, the
//! document model, layout and PDF rendering with a guaranteed fallback path,
//! storage key generation, the object-store contract and the invocation handler.
//! Cloud-specific storage clients live in the `docvault` crate.
//!
//! # Usage
//! Add this as a dependency for rendering, key generation and publish orchestration.

pub mod config;
pub mod contract;
pub mod document;
pub mod error;
pub mod fallback;
pub mod handler;
pub mod keys;
pub mod layout;
pub mod markdown;
pub mod memory_store;
pub mod metrics;
pub mod publish;
pub mod render;

//! Ambiance deck library - declarative environments rendered onto Stream Deck keys.
//!
//! This library exposes the core of the `ambiance` CLI for use in tests
//! and other applications.
//!
//! # Modules
//!
//! - `config`: Document loading, typed model and strict validation
//! - `resolve`: Image components to raw bytes
//! - `render`: Icon plus label to a device-native key image
//! - `device`: Transports, exclusive sessions and background workers
//! - `dispatch`: Environment to key synchronization
//! - `error`: Error types with user-recoverable hints
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod image_ops;
pub mod logging;
pub mod render;
pub mod resolve;

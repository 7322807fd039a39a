//! # wbgate Domain
//!
//! Domain types shared by every wbgate crate.
//!
//! This crate contains:
//! - API categories and their quotas
//! - The server-side task model (`TaskHandle`, `TaskStatus`, `TaskReport`)
//! - Transport-neutral request/response types
//! - Configuration structures and constants
//! - The workspace error type and `Result` alias
//!
//! ## Architecture
//! - No dependencies on other wbgate crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;

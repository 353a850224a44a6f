// src/exec/mod.rs

//! Script execution layer.
//!
//! - [`step`] defines the ordered [`Script`] and working-directory helpers.
//! - [`runner`] issues the steps over a [`crate::transport::Connection`] and
//!   aggregates their output.

pub mod runner;
pub mod step;

pub use runner::CommandRunner;
pub use step::{Script, Step};

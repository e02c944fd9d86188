//! Test Helper Utilities
//!
//! Shared fixtures for paperflow-dedupe integration tests

#![allow(dead_code)]

pub mod records;

pub use records::{attachment, note, paper, pdf, LibraryBuilder};

//! dnr-shield Filter List Compiler
//!
//! This crate compiles EasyList-style filter lists into declarative
//! net request block rules.

pub mod parser;

pub use parser::compile;

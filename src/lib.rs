//! Client for the SPIRE database of microbial metagenome samples.
//!
//! [`study::Study`] and [`sample::Sample`] fetch their tables lazily through an
//! injected [`client::SpireClient`] and keep each one for their lifetime.

mod cache;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod output;
pub mod reconstruct;
pub mod sample;
pub mod store;
pub mod study;
pub mod table;
pub mod view;

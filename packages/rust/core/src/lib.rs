//! Core reconciliation pipeline for crmsync.
//!
//! This crate ties together fetching, field extraction, the contact cascade,
//! history merging, keyword classification and CSV output into one run
//! (see [`pipeline::run_sync`]).

pub mod classify;
pub mod matcher;
pub mod merge;
pub mod output;
pub mod pipeline;

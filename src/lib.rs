//! Review of siftr TCP logs.
//!
//! A log is framed into header, body and footer lines, its flows are
//! registered from the footer (or inferred from the body for logs without a
//! flow list) and each requested flow is rescanned into plot-ready series.

pub mod analysis;
pub mod configuration;
pub mod controller;
pub mod decoding;
pub mod error_handling;
pub mod extraction;
pub mod flow_registry;
pub mod log_framing;
pub mod schema;
pub mod storage;

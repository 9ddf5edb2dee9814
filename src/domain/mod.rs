//! Core domain types and logic.

pub mod error;
pub mod table;
pub mod cleaning;
pub mod normalizer;
pub mod frame;
pub mod merge;
pub mod calendar;
pub mod features;
pub mod dataset;
pub mod model;
pub mod tuning;
pub mod pruning;
pub mod evaluation;
pub mod forecast;
pub mod registry;
pub mod pipeline;
pub mod config_validation;

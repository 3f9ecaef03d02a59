//! Domain library for the wine-tourism sustainability self-assessment
//! service: questionnaire structure, scoring, tier classification, the
//! assessment session flow, and the ports it talks through.

pub mod assessment;
pub mod backend;
pub mod config;
pub mod error;
pub mod storage;
pub mod telemetry;

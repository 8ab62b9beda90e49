//! ETL stages: deterministic cleaning, non-mutating validation, and the
//! orchestrator sequencing them between the raw and clean stores.

pub mod cleaner;
pub mod pipeline;
pub mod validator;

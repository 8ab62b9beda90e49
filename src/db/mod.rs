//! File-backed sqlite stores: the raw store is the scrape/ETL handoff
//! boundary, the clean store is what dashboards and models read.

pub mod clean;
pub mod raw;

pub mod batch;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod report;
pub mod storage;
pub mod task_api;

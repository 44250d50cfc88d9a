pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod workers;

pub use workers::{default_handlers, JobExecution, JobHandler, Worker};

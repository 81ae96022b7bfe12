pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod result;
pub mod runner;
pub mod session;

pub mod api;
pub mod board;
pub mod cli;
pub mod config;
pub mod session;
pub mod task;

pub mod agent;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mutation;
pub mod server;

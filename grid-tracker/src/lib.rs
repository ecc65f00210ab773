pub mod balancer;
pub mod config;
pub mod error;
pub mod handlers;
pub mod history;
pub mod server;
pub mod shard;
pub mod state;

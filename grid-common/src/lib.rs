pub mod client;
pub mod config;
pub mod identity;
pub mod metrics;
pub mod ring;
pub mod rpc;
pub mod shutdown;

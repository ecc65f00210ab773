mod app;
mod rpc;

pub use app::add_routes;

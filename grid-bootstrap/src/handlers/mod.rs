mod app;
mod join;

pub use app::add_routes;

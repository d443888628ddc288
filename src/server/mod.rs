//! Gateway server: shared state and the connection accept loop

pub mod http;

pub use http::{run, serve, AppState};

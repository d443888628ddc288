//! Portcullis - a login gate in front of any HTTP application
//!
//! Every request must carry a valid session cookie before it is forwarded
//! to the protected upstream. Sessions are stateless: the browser holds a
//! sealed token and the gateway keeps no session table.
//!
//! ## Components
//!
//! - **Credential Validator**: checks the single configured account
//! - **Session Codec / Manager**: seals, issues, revokes and reads session cookies
//! - **Auth Gate**: forwards authenticated requests, redirects the rest to login
//! - **Forwarder**: streaming reverse proxy to the target application

pub mod auth;
pub mod config;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod session;
pub mod types;

pub use config::{Args, GatewayConfig};
pub use server::{run, serve, AppState};
pub use types::{GatewayError, Result};

//! Development server with live reload.

pub mod reload;
pub mod server;

pub use reload::{LiveReload, ReloadMessage};
pub use server::{DevServer, ServeError, ServerHandle};

//! HTTP front end of the snip URL shortener.

pub mod app;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod model;
pub mod state;
pub mod subnet;

pub use app::App;
pub use error::{AppError, Result};
pub use state::AppState;
pub use subnet::TrustedSubnet;

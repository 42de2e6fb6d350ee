//! Authentication module for the blog server
//!
//! Salted password checks, signed session cookies and the gate that
//! decides which identity a request acts as.

pub mod gate;
pub mod handlers;
mod service;
mod session;

pub use gate::{Credentials, RequestGate};
pub use service::{compute_hash, generate_salt, AuthService, SALT_LENGTH};
pub use session::{Claims, Identity, SessionManager, SESSION_COOKIE};

//! Types stored in the visitor session.

pub mod session;

pub use session::{AdminSession, OfferShown, keys as session_keys};

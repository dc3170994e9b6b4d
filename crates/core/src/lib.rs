//! Second Chance Core - Shared types and checkout navigation logic.
//!
//! This crate provides the pieces used across all Second Chance components:
//! - `storefront` - Public checkout funnel and admin panel
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure state machines - no I/O, no
//! database access, no HTTP clients. The exit-intent guard talks to the
//! outside world exclusively through the [`exit_intent::NavigationHistory`]
//! trait, so it can be driven by a browser command buffer in production and
//! by a fake history stack in tests.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, slugs and statuses
//! - [`exit_intent`] - Back-button interception and the fallback offer

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod exit_intent;
pub mod types;

pub use types::*;

//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `admin_auth` - Admin password hashing and verification (Argon2id)
//! - `analytics` - TikTok pixel ID cache and beacon events
//! - `checkout` - Order creation and Stripe session orchestration
//! - `exit_guard` - Registry of mounted checkout views and their guards
//! - `stripe` - Stripe REST API client

pub mod admin_auth;
pub mod analytics;
pub mod checkout;
pub mod exit_guard;
pub mod stripe;

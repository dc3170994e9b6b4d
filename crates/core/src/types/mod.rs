//! Core types for Second Chance.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod customer;
pub mod email;
pub mod id;
pub mod price;
pub mod slug;
pub mod status;

pub use customer::{CustomerName, CustomerNameError};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
pub use slug::{Slug, SlugError};
pub use status::*;

//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Returns the content hash of a fingerprinted static asset.
///
/// Usage in templates: `{{ "css"|asset_hash }}`, `{{ "exit-intent"|asset_hash }}`,
/// `{{ "pixel"|asset_hash }}`, `{{ "admin"|asset_hash }}`
#[askama::filter_fn]
pub fn asset_hash(asset: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(match asset.to_string().as_str() {
        "css" => env!("CSS_HASH"),
        "exit-intent" => env!("EXIT_INTENT_JS_HASH"),
        "pixel" => env!("PIXEL_JS_HASH"),
        "admin" => env!("ADMIN_JS_HASH"),
        _ => "",
    })
}

//! Build script for the storefront crate.
//!
//! Computes content hashes for the static assets referenced by templates so
//! that their URLs change whenever the file does (`/static/css/main.css?v=…`).

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Static assets to fingerprint: (path under `static/`, env var name).
const ASSETS: &[(&str, &str)] = &[
    ("css/main.css", "CSS_HASH"),
    ("js/exit-intent.js", "EXIT_INTENT_JS_HASH"),
    ("js/pixel.js", "PIXEL_JS_HASH"),
    ("js/admin.js", "ADMIN_JS_HASH"),
];

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let static_dir = Path::new(&manifest_dir).join("static");

    for (relative, var) in ASSETS {
        hash_asset(&static_dir.join(relative), var);
    }
}

/// Hash one asset and export the first 8 hex chars as `var`.
fn hash_asset(path: &Path, var: &str) {
    println!("cargo:rerun-if-changed={}", path.display());

    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", path.display());
            println!("cargo:rustc-env={var}=dev");
            return;
        }
    };

    let hash = format!("{:x}", Sha256::digest(&content));
    let short_hash = hash.get(..8).unwrap_or(&hash);

    println!("cargo:rustc-env={var}={short_hash}");
}

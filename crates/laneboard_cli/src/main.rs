//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `laneboard_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    // Tiny probe validating core crate wiring independently from any UI
    // embedding.
    println!("laneboard_core ping={}", laneboard_core::ping());
    println!("laneboard_core version={}", laneboard_core::core_version());
}

//! # gatehouse_core
//!
//! Core domain logic for Gatehouse.

pub mod audit;
pub mod auth;
pub mod ids;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}

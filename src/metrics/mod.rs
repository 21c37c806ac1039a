//! Metrics export.
//!
//! Validation results can be pushed to a Prometheus Push Gateway so expiry
//! and domain mismatches show up on existing dashboards.
//!
//! # Submodules
//!
//! - `prom` - Prometheus Push Gateway integration

pub mod prom;

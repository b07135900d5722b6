//! # OpenTelemetry Metrics Module
//!
//! Metrics for the sidecar runtime core, organized by domain:
//! - `pubsub`: bulk subscription ingress counters and latency
//! - `actors`: actor timer firing and active timer gauges
//!
//! Instruments are created from the global meter provider. Until the host
//! process installs a provider they are no-ops, so library users and tests
//! need no exporter.
//!
//! ## Usage
//!
//! ```rust
//! use sidecar_core::metrics::pubsub;
//! use opentelemetry::KeyValue;
//!
//! pubsub::bulk_ingress_entries_total().add(
//!     3,
//!     &[
//!         KeyValue::new("topic", "orders"),
//!         KeyValue::new("status", "success"),
//!     ],
//! );
//! ```

pub mod actors;
pub mod pubsub;

/// Instrumentation scope shared by every meter in this crate
pub const METER_SCOPE: &str = "sidecar-runtime-core";

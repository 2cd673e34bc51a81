//! `reach-runtime` – process-level wiring around the arm layer
//!
//! # Modules
//!
//! - [`robot`] – [`Robot`][robot::Robot]: builds the left and right
//!   [`Arm`][reach_hal::Arm] of one robot from a parameter store and an
//!   endpoint factory, and closes both on shutdown.
//! - [`connections`] –
//!   [`wait_for_connections`][connections::wait_for_connections]: polls a set
//!   of endpoints at start-up until all answer or a deadline passes.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to enable export.

pub mod connections;
pub mod robot;
pub mod telemetry;

pub use connections::wait_for_connections;
pub use robot::Robot;
pub use telemetry::{TracerProviderGuard, init_tracing};

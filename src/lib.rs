//! # IoT Sensor Rig Simulator
//!
//! A concurrent simulation of a small fleet of sensor boards streaming their
//! readings to a telemetry sink.
//!
//! ## Features
//!
//! - **Environmental rigs**: per-board gas (LPG, CO, smoke) and particle
//!   (PM1.0, PM2.5, PM10) streams with anomaly injection and alert flags
//! - **Motion capture unit**: PIR detector handing motion ids to a camera
//!   through a bounded, lossy queue, plus an independent camera stream
//! - **Reading store**: latest reading per stream, readable while the fleet runs
//! - **Publish gateway**: pluggable sink (MQTT, in-memory, null) that degrades
//!   to silence when disconnected and reconnects on its own
//! - **Reproducible runs**: every generator draws from a seedable random source
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rigsim::{Simulation, SimulationConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut simulation = Simulation::headless(SimulationConfig::default())?;
//! simulation.start().await?;
//!
//! tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! if let Some(rig) = simulation.snapshot_rig(1) {
//!     println!("last gas reading: {:?}", rig.last_gas);
//! }
//!
//! simulation.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`simulation`] - Lifecycle owner and public API
//! - [`rig`] / [`capture`] - Composition of generators per board
//! - [`generator`] - Periodic task driving one sensor model
//! - [`sensors`] - Randomized reading models
//! - [`handoff`] - Bounded motion → camera queue
//! - [`store`] - Latest-reading cache
//! - [`gateway`] - Publish boundary and sink implementations

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]

pub mod capture;
pub mod config;
pub mod gateway;
pub mod generator;
pub mod handoff;
pub mod readings;
pub mod rig;
pub mod sensors;
pub mod shutdown;
pub mod simulation;
pub mod store;

// Re-export main public types for convenience
pub use config::SimulationConfig;
pub use gateway::{MemoryPublisher, MqttPublisher, NullPublisher, Publisher};
pub use readings::{CaptureUnitSnapshot, Reading, RigSnapshot};
pub use simulation::{LifecycleError, LifecycleState, Simulation};
pub use store::{ReadingStore, StoreReader};

//! Device abstraction, Bluetooth policy engine, and main-thread message
//! bus for an audio server.
//!
//! Three layers, each independently testable:
//! - [`iodev`] / [`devlist`]: hardware-agnostic playback/capture devices,
//!   their nodes, buffers, and volume/gain math.
//! - [`bluetooth`]: the BT device registry and the policy engine driving
//!   connection-watch, profile-switch, and suspend FSMs against it.
//! - [`msgbus`] / [`timer`]: the single-threaded glue a binary's main
//!   loop uses to drive both of the above without blocking on I/O.

pub mod bluetooth;
pub mod config;
pub mod devlist;
pub mod ids;
pub mod iodev;
pub mod metrics;
pub mod msgbus;
pub mod rate_estimate;
pub mod timer;

pub use config::ServerConfig;
pub use devlist::DeviceList;
pub use ids::{BtPath, DeviceId};
pub use msgbus::{Command, MainMessage, MessageBus, MessageSender};
pub use rate_estimate::RateEstimator;
pub use timer::{HasTimers, TimerManager};

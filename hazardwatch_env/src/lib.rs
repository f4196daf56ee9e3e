//! HazardWatch Environment Abstraction Layer
//!
//! This crate provides the boundary between the tracking engine and the
//! outside world. The engine never talks to a location sensor directly; it
//! subscribes to a [`PositionSource`] and receives fixes through callbacks.
//!
//! # Sources
//!
//! - **Production**: [`ChannelSource`] - fixes pushed through a Tokio channel
//!   by whatever owns the sensor (GNSS daemon, platform bridge, replay file)
//! - **Testing / Simulation**: [`ManualSource`] - fixes and failures injected
//!   synchronously, fully deterministic
//!
//! # Example
//!
//! ```ignore
//! use hazardwatch_env::{ManualSource, PositionFix, PositionSource, SourceOptions};
//!
//! let source = ManualSource::new();
//! let sub = source.subscribe(
//!     SourceOptions::default(),
//!     Box::new(|fix| println!("fix: {fix}")),
//!     Box::new(|err| eprintln!("source failed: {err}")),
//! )?;
//!
//! source.emit(PositionFix::new(19.0493847, 72.8941718, 0));
//! sub.cancel();
//! ```

mod channel;
mod context;
mod error;
mod manual;
mod source;
mod tokio_impl;
mod types;

pub use channel::{ChannelSource, FixSender};
pub use context::HazardContext;
pub use error::SourceError;
pub use manual::ManualSource;
pub use source::{CancelFlag, ErrorCallback, FixCallback, PositionSource, SourceOptions, Subscription};
pub use tokio_impl::TokioContext;
pub use types::{PositionFix, SubscriptionId};

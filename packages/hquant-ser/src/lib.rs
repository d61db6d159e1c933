//! Incremental time-series store with a dependency-driven indicator engine.
//!
//! A [`Ser`] holds rows at strictly increasing millisecond timestamps and
//! named columns ([`Var`]s). Indicators read a base series and write result
//! vars, recomputing only from the earliest changed row. A [`SerContext`]
//! ties one quote series to its indicators, observers and event queue; a
//! [`Workspace`] holds many of them behind per-series locks and composes
//! coarser series from finer ones. The [`nn`] module adds a small
//! multilayer perceptron for auxiliary predictions.

mod types;
pub use types::*;

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub mod frequency;
pub mod vec;

pub mod event;
pub mod indicator;
pub mod ser;

pub mod compose;
pub mod context;
pub mod graph;
pub mod workspace;

pub mod feed;
pub mod nn;

pub use compose::Composer;
pub use config::EngineConfig;
pub use context::{IngestReport, SerContext};
pub use event::{EventFilter, OwnerId, SerEvent, SerEventKind, SubscriptionId};
pub use frequency::{Calendar, Frequency, Unit};
pub use graph::{IndicatorGraph, Vertex};
pub use indicator::{Indicator, IndicatorDescriptor, IndicatorId, IndicatorKind, Opt, Placement};
pub use ser::{Ser, SerArena, SerId, SerItem, SerKey, Var};
pub use vec::DefaultVec;
pub use workspace::Workspace;

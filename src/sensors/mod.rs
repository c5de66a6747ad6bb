//! Measurement inputs.
//!
//! The jig has a single kind of sensor: an edge counter on a looped-back
//! signal, sampled over a fixed window.  See [`edge_rate`].

pub mod edge_rate;

pub use edge_rate::{EdgeCounter, RateConsumer, RateWindow, Reading};

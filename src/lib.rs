//! A polyphonic synthesizer built on a small audio node graph.
//!
//! [`graph`] holds the nodes and renders them, [`context`] drives a graph
//! from the sound card, and [`engine`] turns note and parameter events into
//! per-note voices in the graph.

pub mod audio;
pub mod config;
pub mod context;
pub mod controller;
pub mod engine;
pub mod graph;
pub mod keyboard;
pub mod synth;
pub mod util;

use crate::graph::{AudioGraph, Compressor, GraphError, NodeId};

pub const COMPRESSOR_THRESHOLD_DB: f32 = -50.0;

/// The shared end of the graph: every voice feeds the compressor, which
/// feeds the master gain, which feeds the destination.
#[derive(Copy, Clone, Debug)]
pub struct OutputChain {
    compressor: NodeId,
    master: NodeId,
    destination: NodeId,
}

impl OutputChain {
    pub fn build(graph: &mut AudioGraph, master_volume: f32) -> Result<Self, GraphError> {
        // The low threshold keeps many summed partials from clipping.
        let mut compressor = Compressor::new(graph.sample_rate());
        compressor.set_threshold(COMPRESSOR_THRESHOLD_DB);

        let compressor = graph.add_compressor(compressor);
        let master = graph.add_gain(master_volume);
        let destination = graph.destination();

        graph.connect(compressor, master)?;
        graph.connect(master, destination)?;

        Ok(Self {
            compressor,
            master,
            destination,
        })
    }

    /// Where voices connect.
    pub fn input(&self) -> NodeId {
        self.compressor
    }

    pub fn master(&self) -> NodeId {
        self.master
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }
}

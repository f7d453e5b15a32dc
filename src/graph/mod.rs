//! A small audio graph in the spirit of the browser's Web Audio API.
//!
//! Nodes live in an arena owned by [`AudioGraph`] and are addressed by
//! [`NodeId`]. Connections are stored at graph level and always point from a
//! producer to a consumer: either a node's signal input or one of its
//! automatable parameters. Nothing is collected implicitly; stopping an
//! oscillator and removing nodes are explicit calls.

pub mod compressor;
pub mod oscillator;
pub mod param;
pub mod shaper;

use std::error::Error;
use std::fmt;

use slotmap::{new_key_type, SecondaryMap, SlotMap};

pub use compressor::Compressor;
pub use oscillator::{Oscillator, OscillatorType};
pub use param::AudioParam;
pub use shaper::{pulse_curve, WaveShaper};

new_key_type! {
    pub struct NodeId;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GraphError {
    UnknownNode,
    /// The destination has no output to connect from.
    NoOutput,
    NoSuchParam(ParamKind),
    Cycle,
    NotAnOscillator,
    AlreadyStarted,
    NotStarted,
    AlreadyStopped,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::UnknownNode => write!(f, "node does not exist"),
            GraphError::NoOutput => write!(f, "node has no output"),
            GraphError::NoSuchParam(kind) => write!(f, "node has no {:?} parameter", kind),
            GraphError::Cycle => write!(f, "connection would create a cycle"),
            GraphError::NotAnOscillator => write!(f, "node is not an oscillator"),
            GraphError::AlreadyStarted => write!(f, "oscillator was already started"),
            GraphError::NotStarted => write!(f, "oscillator was never started"),
            GraphError::AlreadyStopped => write!(f, "oscillator was already stopped"),
        }
    }
}

impl Error for GraphError {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Frequency,
    Gain,
}

/// Where a connection lands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Input(NodeId),
    Param(NodeId, ParamKind),
}

impl Target {
    fn node(&self) -> NodeId {
        match *self {
            Target::Input(id) | Target::Param(id, _) => id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Gain {
    pub gain: AudioParam,
}

#[derive(Clone, Debug)]
pub enum Node {
    Oscillator(Oscillator),
    Gain(Gain),
    WaveShaper(WaveShaper),
    Compressor(Compressor),
    Destination,
}

impl Node {
    fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
        match (self, kind) {
            (Node::Oscillator(osc), ParamKind::Frequency) => Some(&mut osc.frequency),
            (Node::Gain(g), ParamKind::Gain) => Some(&mut g.gain),
            _ => None,
        }
    }

    fn has_param(&self, kind: ParamKind) -> bool {
        matches!(
            (self, kind),
            (Node::Oscillator(_), ParamKind::Frequency) | (Node::Gain(_), ParamKind::Gain)
        )
    }
}

#[derive(Copy, Clone, Debug)]
struct Edge {
    from: NodeId,
    to: Target,
}

/// Per-frame accumulators for one node.
#[derive(Copy, Clone, Debug, Default)]
struct Inputs {
    signal: f32,
    modulation: f32,
}

/// One node in evaluation order together with where its output goes.
#[derive(Clone, Debug)]
struct Step {
    id: NodeId,
    targets: Vec<Target>,
}

pub struct AudioGraph {
    sample_rate: f32,
    frame: u64,
    nodes: SlotMap<NodeId, Node>,
    edges: Vec<Edge>,
    destination: NodeId,

    plan: Option<Vec<Step>>,
    scratch: SecondaryMap<NodeId, Inputs>,
}

impl AudioGraph {
    pub fn new(sample_rate: f32) -> Self {
        let mut nodes = SlotMap::with_key();
        let destination = nodes.insert(Node::Destination);

        Self {
            sample_rate,
            frame: 0,
            nodes,
            edges: Vec::new(),
            destination,
            plan: None,
            scratch: SecondaryMap::new(),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Context time in seconds: frames rendered so far over the sample rate.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    fn add(&mut self, node: Node) -> NodeId {
        self.plan = None;
        self.nodes.insert(node)
    }

    pub fn add_oscillator(&mut self, kind: OscillatorType, frequency: f32) -> NodeId {
        self.add(Node::Oscillator(Oscillator::new(kind, frequency)))
    }

    pub fn add_gain(&mut self, gain: f32) -> NodeId {
        self.add(Node::Gain(Gain {
            gain: AudioParam::new(gain),
        }))
    }

    pub fn add_wave_shaper(&mut self, curve: Vec<f32>) -> NodeId {
        self.add(Node::WaveShaper(WaveShaper::new(curve)))
    }

    pub fn add_compressor(&mut self, compressor: Compressor) -> NodeId {
        self.add(Node::Compressor(compressor))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn oscillator(&self, id: NodeId) -> Option<&Oscillator> {
        match self.nodes.get(id) {
            Some(Node::Oscillator(osc)) => Some(osc),
            _ => None,
        }
    }

    pub fn oscillator_mut(&mut self, id: NodeId) -> Option<&mut Oscillator> {
        match self.nodes.get_mut(id) {
            Some(Node::Oscillator(osc)) => Some(osc),
            _ => None,
        }
    }

    pub fn gain(&self, id: NodeId) -> Option<&Gain> {
        match self.nodes.get(id) {
            Some(Node::Gain(g)) => Some(g),
            _ => None,
        }
    }

    pub fn wave_shaper(&self, id: NodeId) -> Option<&WaveShaper> {
        match self.nodes.get(id) {
            Some(Node::WaveShaper(s)) => Some(s),
            _ => None,
        }
    }

    pub fn wave_shaper_mut(&mut self, id: NodeId) -> Option<&mut WaveShaper> {
        match self.nodes.get_mut(id) {
            Some(Node::WaveShaper(s)) => Some(s),
            _ => None,
        }
    }

    pub fn compressor(&self, id: NodeId) -> Option<&Compressor> {
        match self.nodes.get(id) {
            Some(Node::Compressor(c)) => Some(c),
            _ => None,
        }
    }

    pub fn param_mut(&mut self, id: NodeId, kind: ParamKind) -> Option<&mut AudioParam> {
        self.nodes.get_mut(id).and_then(|n| n.param_mut(kind))
    }

    /// Connect the output of `from` to the signal input of `to`.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.add_edge(from, Target::Input(to))
    }

    /// Connect the output of `from` to a parameter of `to`; the signal is
    /// added to the parameter's intrinsic value.
    pub fn connect_param(
        &mut self,
        from: NodeId,
        to: NodeId,
        kind: ParamKind,
    ) -> Result<(), GraphError> {
        let node = self.nodes.get(to).ok_or(GraphError::UnknownNode)?;
        if !node.has_param(kind) {
            return Err(GraphError::NoSuchParam(kind));
        }
        self.add_edge(from, Target::Param(to, kind))
    }

    fn add_edge(&mut self, from: NodeId, to: Target) -> Result<(), GraphError> {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to.node()) {
            return Err(GraphError::UnknownNode);
        }
        if from == self.destination {
            return Err(GraphError::NoOutput);
        }
        if self.reaches(to.node(), from) {
            return Err(GraphError::Cycle);
        }

        self.edges.push(Edge { from, to });
        self.plan = None;
        Ok(())
    }

    /// Whether `to` can be reached from `from` by following connections.
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = SecondaryMap::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if seen.insert(id, ()).is_some() {
                continue;
            }
            stack.extend(
                self.edges
                    .iter()
                    .filter(|e| e.from == id)
                    .map(|e| e.to.node()),
            );
        }
        false
    }

    /// Targets the output of `id` is connected to.
    pub fn outputs(&self, id: NodeId) -> impl Iterator<Item = Target> + '_ {
        self.edges.iter().filter(move |e| e.from == id).map(|e| e.to)
    }

    /// Drop every outgoing connection of `id`.
    pub fn disconnect(&mut self, id: NodeId) {
        self.edges.retain(|e| e.from != id);
        self.plan = None;
    }

    /// Remove a node together with every connection into or out of it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        if id == self.destination {
            return None;
        }
        let node = self.nodes.remove(id)?;
        self.edges.retain(|e| e.from != id && e.to.node() != id);
        self.plan = None;
        Some(node)
    }

    pub fn start(&mut self, id: NodeId, when: f64) -> Result<(), GraphError> {
        self.oscillator_mut(id)
            .ok_or(GraphError::NotAnOscillator)?
            .start(when)
    }

    pub fn stop(&mut self, id: NodeId, when: f64) -> Result<(), GraphError> {
        self.oscillator_mut(id)
            .ok_or(GraphError::NotAnOscillator)?
            .stop(when)
    }

    /// Kahn's algorithm over every connection, parameters included.
    fn build_plan(&self) -> Vec<Step> {
        let mut indegree: SecondaryMap<NodeId, usize> =
            self.nodes.keys().map(|id| (id, 0)).collect();
        for edge in &self.edges {
            if let Some(d) = indegree.get_mut(edge.to.node()) {
                *d += 1;
            }
        }

        let mut ready: Vec<NodeId> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| id)
            .collect();
        let mut plan = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop() {
            let targets: Vec<Target> = self.outputs(id).collect();
            for target in &targets {
                if let Some(d) = indegree.get_mut(target.node()) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(target.node());
                    }
                }
            }
            plan.push(Step { id, targets });
        }

        plan
    }

    /// Render one frame and return the destination's sample.
    pub fn render_frame(&mut self) -> f32 {
        if self.plan.is_none() {
            self.plan = Some(self.build_plan());
            self.scratch = self.nodes.keys().map(|id| (id, Inputs::default())).collect();
        }

        let time = self.current_time();
        let sample_rate = self.sample_rate;
        let Self {
            nodes,
            plan,
            scratch,
            ..
        } = &mut *self;
        let plan = plan.as_deref().unwrap_or_default();

        for step in plan {
            if let Some(inputs) = scratch.get_mut(step.id) {
                *inputs = Inputs::default();
            }
        }

        let mut out = 0.0;
        for step in plan {
            let inputs = scratch.get(step.id).copied().unwrap_or_default();
            let value = match nodes.get_mut(step.id) {
                Some(Node::Oscillator(osc)) => {
                    osc.next_sample(time, sample_rate, inputs.modulation)
                }
                Some(Node::Gain(g)) => inputs.signal * g.gain.computed(time, inputs.modulation),
                Some(Node::WaveShaper(s)) => s.shape(inputs.signal),
                Some(Node::Compressor(c)) => c.process(inputs.signal),
                Some(Node::Destination) => {
                    out = inputs.signal;
                    continue;
                }
                None => continue,
            };

            for target in &step.targets {
                if let Some(acc) = scratch.get_mut(target.node()) {
                    match target {
                        Target::Input(_) => acc.signal += value,
                        Target::Param(..) => acc.modulation += value,
                    }
                }
            }
        }

        self.frame += 1;
        out.clamp(-1.0, 1.0)
    }

    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.render_frame();
        }
    }
}

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Context, Result};
use cpal::traits::*;
use cpal::SampleFormat;
use tracing::info;

use crate::audio;
use crate::graph::AudioGraph;
use crate::util::log_if_error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

#[derive(Debug)]
pub enum ContextError {
    Closed,
    Play(cpal::PlayStreamError),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Closed => write!(f, "audio context is closed"),
            ContextError::Play(err) => write!(f, "could not start output stream: {}", err),
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ContextError::Closed => None,
            ContextError::Play(err) => Some(err),
        }
    }
}

enum Backend {
    Device(cpal::Stream),
    Detached,
    Closed,
}

/// Owns the audio graph and the device stream that renders it.
///
/// A context starts out suspended, the same way a browser holds audio back
/// until the user interacts with the page; [`AudioContext::resume`] starts
/// the stream. Time only advances while frames are rendered.
pub struct AudioContext {
    graph: Arc<Mutex<AudioGraph>>,
    state: ContextState,
    backend: Backend,
}

impl AudioContext {
    /// Open the default output device of the default host.
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no output device available"))?;

        let supported_config = device
            .supported_output_configs()
            .context("error while querying configs")?
            .next()
            .ok_or_else(|| anyhow!("no supported output config"))?
            .with_max_sample_rate();

        let sample_format = supported_config.sample_format();
        let config: cpal::StreamConfig = supported_config.into();

        info!(
            "audio device: {}, {} Hz, {} channels, {:?}",
            device.name().unwrap_or_default(),
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        let graph = Arc::new(Mutex::new(AudioGraph::new(config.sample_rate.0 as f32)));
        let stream = match sample_format {
            SampleFormat::F32 => audio::build_stream::<f32>(&device, &config, graph.clone()),
            SampleFormat::I16 => audio::build_stream::<i16>(&device, &config, graph.clone()),
            SampleFormat::U16 => audio::build_stream::<u16>(&device, &config, graph.clone()),
        }?;

        // Some hosts run a stream as soon as it is built.
        log_if_error("failed to pause new output stream", stream.pause());

        Ok(Self {
            graph,
            state: ContextState::Suspended,
            backend: Backend::Device(stream),
        })
    }

    /// A context with no device behind it. Frames are pulled with
    /// [`AudioContext::render`].
    pub fn detached(sample_rate: f32) -> Self {
        Self {
            graph: Arc::new(Mutex::new(AudioGraph::new(sample_rate))),
            state: ContextState::Suspended,
            backend: Backend::Detached,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn graph(&self) -> MutexGuard<'_, AudioGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_time(&self) -> f64 {
        self.graph().current_time()
    }

    pub fn sample_rate(&self) -> f32 {
        self.graph().sample_rate()
    }

    pub fn resume(&mut self) -> Result<(), ContextError> {
        match self.state {
            ContextState::Running => return Ok(()),
            ContextState::Closed => return Err(ContextError::Closed),
            ContextState::Suspended => {}
        }

        if let Backend::Device(stream) = &self.backend {
            stream.play().map_err(ContextError::Play)?;
        }
        self.state = ContextState::Running;
        info!("audio context resumed");
        Ok(())
    }

    /// Stop the stream and release the device. The graph stays readable but
    /// is never rendered again.
    pub fn close(&mut self) {
        self.backend = Backend::Closed;
        self.state = ContextState::Closed;
    }

    /// Render frames by hand. Outputs silence unless the context runs.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.state != ContextState::Running {
            out.fill(0.0);
            return;
        }
        self.graph().render(out);
    }
}

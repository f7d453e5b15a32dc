use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use cpal::traits::*;
use tracing::error;

use crate::graph::AudioGraph;


/// Build an output stream that pulls every frame from the graph. The graph
/// is mono; each frame is copied to every device channel. The stream is
/// returned without being played.
pub fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    graph: Arc<Mutex<AudioGraph>>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample,
{
    let channels = (config.channels as usize).max(1);
    let err_fn = |err| error!("an error occurred on stream: {}", err);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut graph = graph.lock().unwrap_or_else(PoisonError::into_inner);

            for frame in data.chunks_mut(channels) {
                let value = graph.render_frame();
                for sample in frame.iter_mut() {
                    *sample = cpal::Sample::from(&value);
                }
            }
        },
        err_fn,
    )?;

    Ok(stream)
}

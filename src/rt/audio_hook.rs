//! The host-agnostic entry point the audio thread actually calls: wraps
//! [`MixGraph::render`] in an allocation guard so any allocation reachable from the
//! render path becomes an immediate panic in debug builds rather than an occasional
//! underrun no one can reproduce.

use crate::rt::buffer::AudioBufMut;
use crate::rt::mix_graph::MixGraph;

pub struct AudioHook {
    graph: MixGraph,
}

impl AudioHook {
    pub fn new(graph: MixGraph) -> Self {
        Self { graph }
    }

    /// Called once per device callback block with an interleaved buffer at the
    /// configured channel count and the device frame index of the block's first frame.
    pub fn render(&mut self, device_frame: i64, data: &mut [f32], frame_count: usize, channel_count: usize) {
        let mut out = AudioBufMut::new(data, frame_count, channel_count);
        assert_no_alloc::assert_no_alloc(|| self.graph.render(device_frame, &mut out));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::RtCommand;
    use crate::error::DriftUnrecoverable;
    use crate::timeline::MasterClock;
    use std::sync::Arc;

    #[test]
    fn render_does_not_allocate_with_no_voices() {
        let clock = Arc::new(MasterClock::new(48000, 84.0));
        let (_command_tx, command_rx) = crossbeam_channel::unbounded::<RtCommand>();
        let (notify_tx, _notify_rx) = crossbeam_channel::unbounded::<DriftUnrecoverable>();
        let graph = MixGraph::new(clock, command_rx, notify_tx, 2);
        let mut hook = AudioHook::new(graph);
        let mut data = vec![0.0f32; 256];
        hook.render(0, &mut data, 128, 2);
    }
}

//! The audio-thread object: owns every active voice, drains commands at the top of
//! each callback, and sums voices into the output buffer.

use crate::control::{RtCommand, MAX_VOICES};
use crate::error::DriftUnrecoverable;
use crate::metrics_util::measure_time;
use crate::rt::buffer::AudioBufMut;
use crate::rt::voice::{Voice, VoiceState};
use crate::timeline::MasterClock;
use crate::rt_debug;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;

pub struct MixGraph {
    clock: Arc<MasterClock>,
    command_rx: Receiver<RtCommand>,
    notify_tx: Sender<DriftUnrecoverable>,
    voices: Vec<Voice>,
    scratch: Vec<f32>,
    voice_scratch: Vec<f32>,
    master_gain: f32,
    channel_count: usize,
}

impl MixGraph {
    pub fn new(
        clock: Arc<MasterClock>,
        command_rx: Receiver<RtCommand>,
        notify_tx: Sender<DriftUnrecoverable>,
        channel_count: usize,
    ) -> Self {
        Self {
            clock,
            command_rx,
            notify_tx,
            voices: Vec::with_capacity(MAX_VOICES),
            scratch: vec![0.0; channel_count],
            voice_scratch: vec![0.0; channel_count],
            master_gain: 1.0,
            channel_count,
        }
    }

    /// Renders one device callback block into `out`, advancing the master clock first.
    /// Must only ever be called from the audio thread.
    pub fn render(&mut self, device_frame: i64, out: &mut AudioBufMut) {
        measure_time("mix_graph.render", || {
            self.drain_commands();
            self.clock.publish_now_frame(device_frame);
            out.clear();
            for i in 0..out.frame_count() {
                self.scratch.fill(0.0);
                for voice in &mut self.voices {
                    self.voice_scratch.fill(0.0);
                    voice.render_frame(device_frame + i as i64, &mut self.voice_scratch);
                    for (acc, sample) in self.scratch.iter_mut().zip(self.voice_scratch.iter()) {
                        *acc += sample;
                    }
                }
                for c in 0..self.channel_count {
                    out.set_sample(i, c, self.scratch[c]);
                }
            }
            let master_gain = self.master_gain;
            out.modify_frames(|s| (s * master_gain).clamp(-1.0, 1.0));
            self.voices.retain(|v| v.state() != VoiceState::Removed);
        })
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: RtCommand) {
        match command {
            RtCommand::AddVoice(voice) => {
                if self.voices.len() < MAX_VOICES {
                    self.voices.push(*voice);
                }
            }
            RtCommand::RemoveVoice(id) => self.with_voice(id, Voice::request_remove),
            RtCommand::SetStartFrame { id, start_frame } => {
                self.with_voice(id, |v| v.set_start_frame(start_frame))
            }
            RtCommand::Reseek { id, start_frame, phase } => {
                let buffer_frames = self
                    .voices
                    .iter()
                    .find(|v| v.id() == id)
                    .map(|v| v.buffer_frames());
                if let Some(buffer_frames) = buffer_frames {
                    self.with_voice(id, |v| {
                        v.set_start_frame(start_frame);
                        v.seek_to_phase(phase, buffer_frames);
                    });
                }
            }
            RtCommand::GiveUp(id) => {
                self.with_voice(id, Voice::request_remove);
                rt_debug!(voice_id = id, "dropping voice after unrecoverable drift");
                let _ = self.notify_tx.try_send(DriftUnrecoverable { loop_id: id });
            }
            RtCommand::SetVoiceGain(id, gain) => self.with_voice(id, |v| v.set_gain(gain)),
            RtCommand::SetVoiceRateMode(id, mode) => self.with_voice(id, |v| v.set_rate_mode(mode)),
            RtCommand::SetVoiceTempo(id, bpm) => {
                let device_sample_rate = self.clock.device_sample_rate();
                self.with_voice(id, |v| v.reconfigure_rate(bpm, device_sample_rate));
            }
            RtCommand::SetMasterGain(gain) => self.master_gain = gain,
        }
    }

    fn with_voice(&mut self, id: u32, f: impl FnOnce(&mut Voice)) {
        if let Some(voice) = self.voices.iter_mut().find(|v| v.id() == id) {
            f(voice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PcmBuffer;
    use crate::rt::supplier::chain::RateMode;
    use std::sync::Arc;

    fn voice(id: u32) -> Voice {
        Voice::new(
            id,
            84.0,
            Arc::new(PcmBuffer {
                sample_rate: 48000,
                channel_count: 1,
                channels: vec![vec![1.0; 48000]],
            }),
            1,
            RateMode::Varispeed,
            8,
            4,
            1.0,
        )
    }

    fn graph() -> (MixGraph, Sender<RtCommand>, Receiver<DriftUnrecoverable>) {
        let clock = Arc::new(MasterClock::new(48000, 84.0));
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (notify_tx, notify_rx) = crossbeam_channel::unbounded();
        (MixGraph::new(clock, command_rx, notify_tx, 1), command_tx, notify_rx)
    }

    #[test]
    fn renders_silence_with_no_voices() {
        let (mut g, _tx, _rx) = graph();
        let mut backing = vec![1.0f32; 4];
        let mut buf = AudioBufMut::new(&mut backing, 4, 1);
        g.render(0, &mut buf);
        assert_eq!(buf.get_sample(0, 0), 0.0);
    }

    #[test]
    fn add_voice_command_is_applied_before_render() {
        let (mut g, tx, _rx) = graph();
        let mut v = voice(1);
        v.set_start_frame(0);
        v.reconfigure_rate(84.0, 48000.0);
        tx.send(RtCommand::AddVoice(Box::new(v))).unwrap();
        let mut backing = vec![0.0f32; 4];
        let mut buf = AudioBufMut::new(&mut backing, 4, 1);
        g.render(0, &mut buf);
        assert!(buf.get_sample(0, 0) != 0.0);
    }

    #[test]
    fn give_up_notifies_and_removes_voice() {
        let (mut g, tx, rx) = graph();
        let mut v = voice(1);
        v.set_start_frame(0);
        v.reconfigure_rate(84.0, 48000.0);
        tx.send(RtCommand::AddVoice(Box::new(v))).unwrap();
        let mut backing = vec![0.0f32; 2];
        let mut buf = AudioBufMut::new(&mut backing, 2, 1);
        g.render(0, &mut buf);
        tx.send(RtCommand::GiveUp(1)).unwrap();
        g.render(2, &mut buf);
        assert!(matches!(rx.try_recv(), Ok(DriftUnrecoverable { loop_id: 1 })));
    }

    #[test]
    fn master_gain_is_applied_and_clipped() {
        let (mut g, tx, _rx) = graph();
        let mut v = voice(1);
        v.set_start_frame(0);
        v.reconfigure_rate(84.0, 48000.0);
        tx.send(RtCommand::AddVoice(Box::new(v))).unwrap();
        tx.send(RtCommand::SetMasterGain(5.0)).unwrap();
        let mut backing = vec![0.0f32; 2];
        let mut buf = AudioBufMut::new(&mut backing, 2, 1);
        g.render(0, &mut buf);
        assert!(buf.get_sample(0, 0) <= 1.0);
    }
}

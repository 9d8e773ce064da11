//! Microphone capture through cpal.
//!
//! The device callback converts whatever it delivers to PCM16 at the
//! device's own rate, down-mixed to the configured channel count, and hands
//! byte chunks to the reader over a bounded channel.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::codec::AudioSource;
use crate::config::RecordConfig;
use crate::error::{RecordError, RecordResult};

/// Chunks buffered between the device callback and the reader.
const CHUNK_BACKLOG: usize = 64;

pub struct CpalSource {
    // Dropping the stream stops capture.
    _stream: cpal::Stream,
    rx: Receiver<Vec<u8>>,
    leftover: Vec<u8>,
    sample_rate: u32,
    channels: u16,
}

/// Open the default input device. Matches [`crate::AudioOpener`].
pub fn open_default_input(cfg: &RecordConfig) -> RecordResult<Box<dyn AudioSource>> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RecordError::audio("no input device"))?;
    let supported = device
        .default_input_config()
        .map_err(|e| RecordError::audio(format!("input config: {e}")))?;
    let sample_rate = supported.sample_rate().0;
    let in_channels = usize::from(supported.channels().max(1));
    let out_channels = cfg.audio_channels.clamp(1, 2);
    let config: cpal::StreamConfig = supported.clone().into();

    let (tx, rx) = channel::bounded::<Vec<u8>>(CHUNK_BACKLOG);
    let err_fn = |err| log::warn!("Audio input error: {err}");
    let out = usize::from(out_channels);

    let stream = match supported.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _| push_pcm16(data, in_channels, out, &tx),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _| push_pcm16(data, in_channels, out, &tx),
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _| push_pcm16(data, in_channels, out, &tx),
            err_fn,
            None,
        ),
        fmt => return Err(RecordError::audio(format!("unsupported sample format: {fmt:?}"))),
    }
    .map_err(|e| RecordError::audio(format!("build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| RecordError::audio(format!("start input stream: {e}")))?;

    log::info!("Capturing from {:?}", device.name().unwrap_or_default());
    Ok(Box::new(CpalSource {
        _stream: stream,
        rx,
        leftover: Vec::new(),
        sample_rate,
        channels: out_channels,
    }))
}

fn push_pcm16<T>(data: &[T], in_channels: usize, out_channels: usize, tx: &Sender<Vec<u8>>)
where
    T: Sample + Copy,
    f32: cpal::FromSample<T>,
{
    let mut bytes = Vec::with_capacity(data.len() / in_channels * out_channels * 2);
    for frame in data.chunks(in_channels) {
        if out_channels == 1 || frame.len() < 2 {
            let mono = frame.iter().map(|s| s.to_sample::<f32>()).sum::<f32>() / frame.len() as f32;
            for _ in 0..out_channels {
                bytes.extend_from_slice(&to_i16(mono).to_le_bytes());
            }
        } else {
            for s in &frame[..2] {
                bytes.extend_from_slice(&to_i16(s.to_sample::<f32>()).to_le_bytes());
            }
        }
    }
    // A full backlog means the reader stalled; drop rather than block the device.
    let _ = tx.try_send(bytes);
}

fn to_i16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl AudioSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> RecordResult<usize> {
        if self.leftover.is_empty() {
            match self.rx.recv_timeout(timeout) {
                Ok(chunk) => self.leftover = chunk,
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(RecordError::audio("input stream closed")),
            }
        }
        // Whole frames only, so timestamps stay sample-aligned.
        let frame = 2 * usize::from(self.channels);
        let n = (self.leftover.len().min(buf.len()) / frame) * frame;
        buf[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_input_downmixes_to_mono() {
        let (tx, rx) = channel::bounded(1);
        push_pcm16(&[1.0f32, 0.0, -1.0, -1.0], 2, 1, &tx);
        let bytes = rx.recv().unwrap();
        let samples: Vec<i16> = bytes.chunks(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect();
        assert_eq!(samples, vec![i16::MAX / 2, -i16::MAX]);
    }
}

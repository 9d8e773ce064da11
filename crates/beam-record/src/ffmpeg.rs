//! FFmpeg backend: H.264 video, AAC audio, container chosen from the path.
//!
//! FFmpeg wants every stream declared before the header is written, so the
//! factory opens the output context first and each encoder adds its own
//! stream. The muxer then only maps announced formats onto those streams.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::{self, Pixel, Sample};
use ffmpeg::software::scaling;
use ffmpeg::{codec, encoder, frame, ChannelLayout, Packet, Rational, Rescale};

use crate::codec::{
    AudioEncoder, AudioOpener, BufferFlags, EncodedBuffer, Encoder, EncoderFactory, EncoderOutput, Muxer,
    TrackFormat, TrackKind, VideoEncoder,
};
use crate::config::RecordConfig;
use crate::error::{RecordError, RecordResult};

const MICROS: Rational = Rational(1, 1_000_000);

struct Output {
    octx: format::context::Output,
    streams: [Option<usize>; 2],
}

type SharedOutput = Arc<Mutex<Output>>;

fn lock(output: &SharedOutput) -> RecordResult<MutexGuard<'_, Output>> {
    output.lock().map_err(|_| RecordError::muxer("output context poisoned"))
}

fn ff(context: &str) -> impl Fn(ffmpeg::Error) -> RecordError + '_ {
    move |e| RecordError::encoder(format!("{context}: {e}"))
}

#[derive(Default)]
pub struct FfmpegFactory {
    output: Option<SharedOutput>,
}

impl FfmpegFactory {
    pub fn new() -> RecordResult<Self> {
        ffmpeg::init().map_err(|e| RecordError::unavailable(format!("ffmpeg init failed: {e}")))?;
        Ok(Self::default())
    }

    fn output(&self) -> RecordResult<SharedOutput> {
        self.output
            .clone()
            .ok_or(RecordError::State("muxer must be created before encoders"))
    }
}

impl EncoderFactory for FfmpegFactory {
    fn create_muxer(&mut self, path: &Path) -> RecordResult<Box<dyn Muxer>> {
        let octx = format::output(&path).map_err(|e| RecordError::muxer(format!("cannot create output: {e}")))?;
        let shared = Arc::new(Mutex::new(Output { octx, streams: [None, None] }));
        self.output = Some(Arc::clone(&shared));
        Ok(Box::new(FfmpegMuxer { output: shared }))
    }

    fn create_video(&mut self, width: u32, height: u32, cfg: &RecordConfig) -> RecordResult<Box<dyn VideoEncoder>> {
        let shared = self.output()?;
        let mut out = lock(&shared)?;
        let codec = encoder::find(codec::Id::H264).ok_or_else(|| RecordError::unavailable("H264 codec not found"))?;
        let global_header = out.octx.format().flags().contains(format::flag::Flags::GLOBAL_HEADER);

        let mut enc = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(ff("video encoder"))?;
        enc.set_width(width);
        enc.set_height(height);
        enc.set_format(Pixel::YUV420P);
        enc.set_time_base(MICROS);
        enc.set_frame_rate(Some(Rational::new(cfg.fps as i32, 1)));
        enc.set_bit_rate(cfg.video_bit_rate);
        enc.set_gop(cfg.fps * cfg.i_frame_interval_secs);
        // dts == pts keeps the per-track timestamp floor valid.
        enc.set_max_b_frames(0);
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let enc = enc.open_as(codec).map_err(ff("open video encoder"))?;

        let mut stream = out.octx.add_stream(codec).map_err(ff("add video stream"))?;
        stream.set_parameters(&enc);
        let index = stream.index();
        out.streams[TrackKind::Video.slot()] = Some(index);

        let scaler = scaling::Context::get(
            Pixel::RGBA,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(ff("scaler"))?;

        Ok(Box::new(FfmpegVideoEncoder {
            enc,
            scaler,
            width,
            height,
            announced: false,
            finished: false,
        }))
    }

    fn audio_opener(&mut self) -> Option<AudioOpener> {
        #[cfg(feature = "capture")]
        {
            Some(Box::new(crate::capture::open_default_input))
        }
        #[cfg(not(feature = "capture"))]
        {
            None
        }
    }

    fn create_audio(&mut self, sample_rate: u32, channels: u16, cfg: &RecordConfig) -> RecordResult<Box<dyn AudioEncoder>> {
        let shared = self.output()?;
        let mut out = lock(&shared)?;
        let codec = encoder::find(codec::Id::AAC).ok_or_else(|| RecordError::unavailable("AAC codec not found"))?;
        let global_header = out.octx.format().flags().contains(format::flag::Flags::GLOBAL_HEADER);
        let layout = if channels >= 2 { ChannelLayout::STEREO } else { ChannelLayout::MONO };

        let mut enc = codec::context::Context::new_with_codec(codec)
            .encoder()
            .audio()
            .map_err(ff("audio encoder"))?;
        enc.set_rate(sample_rate as i32);
        enc.set_channel_layout(layout);
        enc.set_format(Sample::F32(format::sample::Type::Planar));
        enc.set_bit_rate(cfg.audio_bit_rate);
        enc.set_time_base(Rational::new(1, sample_rate as i32));
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let enc = enc.open_as(codec).map_err(ff("open audio encoder"))?;

        let mut stream = out.octx.add_stream(codec).map_err(ff("add audio stream"))?;
        stream.set_parameters(&enc);
        let index = stream.index();
        out.streams[TrackKind::Audio.slot()] = Some(index);

        let frame_size = match enc.frame_size() {
            0 => 1024,
            n => n as usize,
        };
        let planes = usize::from(channels.clamp(1, 2));
        Ok(Box::new(FfmpegAudioEncoder {
            enc,
            layout,
            sample_rate,
            in_channels: usize::from(channels.max(1)),
            planes: vec![Vec::new(); planes],
            frame_size,
            next_sample: None,
            announced: false,
            finished: false,
        }))
    }
}

/// Map a receive result onto the polled-output model.
fn receive(enc: &mut encoder::Encoder, time_base: Rational) -> RecordResult<EncoderOutput> {
    let mut packet = Packet::empty();
    match enc.receive_packet(&mut packet) {
        Ok(()) => {
            let pts = packet.pts().unwrap_or(0).rescale(time_base, MICROS);
            Ok(EncoderOutput::Buffer(EncodedBuffer {
                data: packet.data().unwrap_or_default().to_vec(),
                pts_us: pts,
                flags: BufferFlags { key_frame: packet.is_key(), ..BufferFlags::default() },
            }))
        }
        Err(ffmpeg::Error::Eof) => Ok(EncoderOutput::Buffer(EncodedBuffer::end_of_stream(0))),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => Ok(EncoderOutput::TryAgainLater),
        Err(e) => Err(RecordError::encoder(format!("receive packet: {e}"))),
    }
}

struct FfmpegVideoEncoder {
    enc: encoder::Video,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    announced: bool,
    finished: bool,
}

impl Encoder for FfmpegVideoEncoder {
    fn dequeue_output(&mut self, _timeout: Duration) -> RecordResult<EncoderOutput> {
        if !self.announced {
            self.announced = true;
            return Ok(EncoderOutput::FormatChanged(TrackFormat::Video {
                codec: "h264".into(),
                width: self.width,
                height: self.height,
            }));
        }
        receive(&mut self.enc, MICROS)
    }

    fn signal_end_of_stream(&mut self) -> RecordResult<()> {
        if std::mem::replace(&mut self.finished, true) {
            return Ok(());
        }
        self.enc.send_eof().map_err(ff("send eof"))
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    fn queue_frame(&mut self, rgba: &[u8], pts_us: i64) -> RecordResult<()> {
        let row = self.width as usize * 4;
        if rgba.len() != row * self.height as usize {
            return Err(RecordError::encoder("frame size does not match encoder"));
        }
        let mut src = frame::Video::new(Pixel::RGBA, self.width, self.height);
        let stride = src.stride(0);
        let plane = src.data_mut(0);
        for (y, line) in rgba.chunks_exact(row).enumerate() {
            plane[y * stride..y * stride + row].copy_from_slice(line);
        }

        let mut dst = frame::Video::new(Pixel::YUV420P, self.width, self.height);
        self.scaler.run(&src, &mut dst).map_err(ff("scale"))?;
        dst.set_pts(Some(pts_us));
        self.enc.send_frame(&dst).map_err(ff("send frame"))
    }
}

struct FfmpegAudioEncoder {
    enc: encoder::Audio,
    layout: ChannelLayout,
    sample_rate: u32,
    in_channels: usize,
    planes: Vec<Vec<f32>>,
    frame_size: usize,
    next_sample: Option<i64>,
    announced: bool,
    finished: bool,
}

impl FfmpegAudioEncoder {
    fn time_base(&self) -> Rational {
        Rational::new(1, self.sample_rate as i32)
    }

    /// Send whole codec frames; with `flush`, also the short remainder.
    fn send_ready(&mut self, flush: bool) -> RecordResult<()> {
        loop {
            let available = self.planes[0].len();
            let n = if available >= self.frame_size {
                self.frame_size
            } else if flush && available > 0 {
                available
            } else {
                return Ok(());
            };
            let mut frame = frame::Audio::new(Sample::F32(format::sample::Type::Planar), n, self.layout);
            frame.set_rate(self.sample_rate);
            for (ch, plane) in self.planes.iter_mut().enumerate() {
                frame.plane_mut::<f32>(ch)[..n].copy_from_slice(&plane[..n]);
                plane.drain(..n);
            }
            let pts = self.next_sample.unwrap_or(0);
            frame.set_pts(Some(pts));
            self.next_sample = Some(pts + n as i64);
            self.enc.send_frame(&frame).map_err(ff("send audio frame"))?;
        }
    }
}

impl Encoder for FfmpegAudioEncoder {
    fn dequeue_output(&mut self, _timeout: Duration) -> RecordResult<EncoderOutput> {
        if !self.announced {
            self.announced = true;
            return Ok(EncoderOutput::FormatChanged(TrackFormat::Audio {
                codec: "aac".into(),
                sample_rate: self.sample_rate,
                channels: self.planes.len() as u16,
            }));
        }
        let time_base = self.time_base();
        receive(&mut self.enc, time_base)
    }

    fn signal_end_of_stream(&mut self) -> RecordResult<()> {
        if std::mem::replace(&mut self.finished, true) {
            return Ok(());
        }
        self.send_ready(true)?;
        self.enc.send_eof().map_err(ff("send audio eof"))
    }
}

impl AudioEncoder for FfmpegAudioEncoder {
    fn queue_pcm(&mut self, pcm: &[u8], pts_us: i64) -> RecordResult<()> {
        if self.next_sample.is_none() {
            self.next_sample = Some(pts_us.rescale(MICROS, self.time_base()));
        }
        for frame in pcm.chunks_exact(2 * self.in_channels) {
            for (ch, plane) in self.planes.iter_mut().enumerate() {
                // Extra input channels fold into the last plane.
                let src = ch.min(self.in_channels - 1);
                let s = i16::from_le_bytes([frame[2 * src], frame[2 * src + 1]]);
                plane.push(f32::from(s) / 32768.0);
            }
        }
        self.send_ready(false)
    }
}

struct FfmpegMuxer {
    output: SharedOutput,
}

impl Muxer for FfmpegMuxer {
    fn add_track(&mut self, format: &TrackFormat) -> RecordResult<usize> {
        let out = lock(&self.output)?;
        out.streams[format.kind().slot()]
            .ok_or_else(|| RecordError::muxer(format!("no {} stream was declared", format.kind())))
    }

    fn start(&mut self) -> RecordResult<()> {
        let mut out = lock(&self.output)?;
        out.octx
            .write_header()
            .map_err(|e| RecordError::muxer(format!("write header: {e}")))
    }

    fn write_sample(&mut self, track: usize, buffer: &EncodedBuffer) -> RecordResult<()> {
        let mut out = lock(&self.output)?;
        let time_base = out
            .octx
            .stream(track)
            .map(|s| s.time_base())
            .ok_or_else(|| RecordError::muxer(format!("unknown stream {track}")))?;
        let ts = buffer.pts_us.rescale(MICROS, time_base);
        let mut packet = Packet::copy(&buffer.data);
        packet.set_pts(Some(ts));
        packet.set_dts(Some(ts));
        packet.set_stream(track);
        if buffer.flags.key_frame {
            packet.set_flags(codec::packet::Flags::KEY);
        }
        packet
            .write_interleaved(&mut out.octx)
            .map_err(|e| RecordError::muxer(format!("write packet: {e}")))
    }

    fn stop(&mut self) -> RecordResult<()> {
        let mut out = lock(&self.output)?;
        out.octx
            .write_trailer()
            .map_err(|e| RecordError::muxer(format!("write trailer: {e}")))
    }
}

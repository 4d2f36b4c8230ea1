use ffmpeg_next::format::sample::Type as SampleLayout;
use ffmpeg_next::format::Sample;
use ffmpeg_next::util::frame::audio::Audio;
use ffmpeg_next::{ChannelLayout, Rational};

use crate::shared::audio_chunk::AudioChunk;
use crate::shared::constants::DEFAULT_AUDIO_FRAME_SIZE;
use crate::shared::media_time::MediaTime;
use crate::shared::writer_configuration::{AudioCodec, AudioSettings};
use crate::writer::infrastructure::container_error::ContainerError;
use crate::writer::infrastructure::ffmpeg_packets::write_packets;

/// Drift between a chunk's timestamp and the running sample count, in
/// sample frames, that is absorbed without resyncing.
const RESYNC_TOLERANCE: i64 = 32;

/// One audio stream in an output context.
///
/// Capture chunks rarely match the encoder's frame size, so samples are
/// buffered and re-cut into encoder-sized frames. Timestamps count samples,
/// and every chunk is checked against its own time: gaps left by dropped
/// chunks are filled with silence or skipped over, and overlapping samples
/// are discarded.
pub struct FfmpegAudioEncoder {
    encoder: ffmpeg_next::codec::encoder::audio::Encoder,
    codec: AudioCodec,
    stream_index: usize,
    sample_rate: u32,
    channels: u16,
    layout: ChannelLayout,
    format: Sample,
    frame_size: usize,
    pending: Vec<f32>,
    next_pts: Option<i64>,
}

// Safety: see FfmpegVideoEncoder; ownership moves to the mux thread once.
unsafe impl Send for FfmpegAudioEncoder {}

impl FfmpegAudioEncoder {
    pub fn open(
        octx: &mut ffmpeg_next::format::context::Output,
        settings: &AudioSettings,
    ) -> Result<Self, ContainerError> {
        let (codec_id, format) = match settings.codec {
            AudioCodec::Aac => (
                ffmpeg_next::codec::Id::AAC,
                Sample::F32(SampleLayout::Planar),
            ),
            AudioCodec::LinearPcm => (
                ffmpeg_next::codec::Id::PCM_S16LE,
                Sample::I16(SampleLayout::Packed),
            ),
        };
        let codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or_else(|| ContainerError::EncoderNotFound(settings.codec.to_string()))?;

        let layout = match settings.channels {
            1 => ChannelLayout::MONO,
            _ => ChannelLayout::STEREO,
        };

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let mut ost = octx.add_stream(Some(codec))?;
        let stream_index = ost.index();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .audio()?;

        encoder_ctx.set_rate(settings.sample_rate as i32);
        encoder_ctx.set_channel_layout(layout);
        encoder_ctx.set_format(format);
        encoder_ctx.set_time_base(Rational(1, settings.sample_rate as i32));
        if settings.codec == AudioCodec::Aac {
            encoder_ctx.set_bit_rate(settings.bit_rate as usize);
        }
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_as(codec)?;
        ost.set_parameters(&encoder);

        let frame_size = match encoder.frame_size() {
            0 => DEFAULT_AUDIO_FRAME_SIZE,
            n => n as usize,
        };

        log::debug!(
            "Opened {} encoder {} Hz x{}, {} samples per frame",
            settings.codec,
            settings.sample_rate,
            settings.channels,
            frame_size
        );

        Ok(Self {
            encoder,
            codec: settings.codec,
            stream_index,
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            layout,
            format,
            frame_size,
            pending: Vec::with_capacity(frame_size * settings.channels as usize * 2),
            next_pts: None,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Buffers `chunk` and encodes every complete frame.
    pub fn encode(
        &mut self,
        chunk: &AudioChunk,
        time: MediaTime,
        octx: &mut ffmpeg_next::format::context::Output,
    ) -> Result<(), ContainerError> {
        if chunk.sample_rate() != self.sample_rate || chunk.channels() != self.channels {
            return Err(ContainerError::AudioFormatMismatch {
                rate: self.sample_rate,
                channels: self.channels,
                actual_rate: chunk.sample_rate(),
                actual_channels: chunk.channels(),
            });
        }

        let chunk_pts = time
            .checked_rescale(self.sample_rate as i32)
            .ok_or(ContainerError::TimestampOutOfRange(time))?;
        let channels = self.channels as usize;

        let Some(next_pts) = self.next_pts else {
            self.next_pts = Some(chunk_pts);
            self.pending.extend_from_slice(chunk.samples());
            return self.send_full_frames(octx);
        };

        let expected = next_pts + (self.pending.len() / channels) as i64;
        let drift = chunk_pts - expected;
        let mut samples = chunk.samples();

        if drift > RESYNC_TOLERANCE {
            self.fill_gap(drift, chunk_pts, octx)?;
        } else if drift < -RESYNC_TOLERANCE {
            let overlap = (-drift) as usize;
            if overlap >= chunk.frames() {
                log::trace!("Audio chunk at {time} lies entirely before the written audio");
                return Ok(());
            }
            log::trace!("Skipping {overlap} overlapping audio frames at {time}");
            samples = &samples[overlap * channels..];
        }

        self.pending.extend_from_slice(samples);
        self.send_full_frames(octx)
    }

    /// Covers `gap` missing sample frames ending at `resume_pts`. Short gaps
    /// become silence; longer ones close the current frame and move the
    /// timeline forward.
    fn fill_gap(
        &mut self,
        gap: i64,
        resume_pts: i64,
        octx: &mut ffmpeg_next::format::context::Output,
    ) -> Result<(), ContainerError> {
        let channels = self.channels as usize;
        if gap <= self.frame_size as i64 {
            log::trace!("Filling {gap} missing audio frames with silence");
            self.pending
                .resize(self.pending.len() + gap as usize * channels, 0.0);
            return Ok(());
        }

        log::debug!("Audio resumes {gap} frames late, restarting at pts {resume_pts}");
        if !self.pending.is_empty() {
            self.pending.resize(self.frame_size * channels, 0.0);
            self.send_full_frames(octx)?;
        }
        self.next_pts = Some(resume_pts);
        Ok(())
    }

    fn send_full_frames(
        &mut self,
        octx: &mut ffmpeg_next::format::context::Output,
    ) -> Result<(), ContainerError> {
        let per_frame = self.frame_size * self.channels as usize;
        while self.pending.len() >= per_frame {
            let samples: Vec<f32> = self.pending.drain(..per_frame).collect();
            self.send(&samples, octx)?;
        }
        Ok(())
    }

    /// Encodes the buffered remainder and flushes the encoder.
    pub fn finish(
        &mut self,
        octx: &mut ffmpeg_next::format::context::Output,
    ) -> Result<(), ContainerError> {
        if !self.pending.is_empty() {
            let samples = std::mem::take(&mut self.pending);
            self.send(&samples, octx)?;
        }
        self.encoder.send_eof()?;
        self.drain(octx)
    }

    /// `samples` are interleaved.
    fn send(
        &mut self,
        samples: &[f32],
        octx: &mut ffmpeg_next::format::context::Output,
    ) -> Result<(), ContainerError> {
        let channels = self.channels as usize;
        let frames = samples.len() / channels;

        let mut frame = Audio::new(self.format, frames, self.layout);
        frame.set_rate(self.sample_rate);
        frame.set_pts(self.next_pts);

        match self.codec {
            AudioCodec::Aac => {
                for channel in 0..channels {
                    let plane = frame.data_mut(channel);
                    let source = samples.iter().skip(channel).step_by(channels);
                    for (dst, sample) in plane.chunks_exact_mut(4).zip(source) {
                        dst.copy_from_slice(&sample.to_ne_bytes());
                    }
                }
            }
            AudioCodec::LinearPcm => {
                let plane = frame.data_mut(0);
                for (dst, sample) in plane.chunks_exact_mut(2).zip(samples) {
                    dst.copy_from_slice(&to_i16(*sample).to_ne_bytes());
                }
            }
        }

        self.encoder.send_frame(&frame)?;
        self.next_pts = self.next_pts.map(|pts| pts + frames as i64);
        self.drain(octx)
    }

    fn drain(&mut self, octx: &mut ffmpeg_next::format::context::Output) -> Result<(), ContainerError> {
        write_packets(
            &mut self.encoder,
            octx,
            self.stream_index,
            Rational(1, self.sample_rate as i32),
        )
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

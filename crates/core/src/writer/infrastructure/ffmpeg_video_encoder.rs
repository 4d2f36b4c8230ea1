use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::Rational;

use crate::shared::constants::VIDEO_TIMESCALE;
use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::media_time::MediaTime;
use crate::shared::writer_configuration::{VideoCodec, VideoSettings};
use crate::writer::infrastructure::container_error::ContainerError;
use crate::writer::infrastructure::ffmpeg_packets::write_packets;

type Geometry = (PixelFormat, u32, u32);

/// One video stream in an output context: converts raw frames to the
/// encoder's pixel format at the configured size and encodes them.
pub struct FfmpegVideoEncoder {
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: Option<(Geometry, scaling::Context)>,
    stream_index: usize,
    width: u32,
    height: u32,
    pixel: Pixel,
    last_pts: Option<i64>,
}

// Safety: the encoder is owned by exactly one thread at a time, first the
// session's control thread, then the mux thread.
unsafe impl Send for FfmpegVideoEncoder {}

impl FfmpegVideoEncoder {
    /// Adds a stream for `settings` to `octx` and opens its encoder.
    pub fn open(
        octx: &mut ffmpeg_next::format::context::Output,
        settings: &VideoSettings,
    ) -> Result<Self, ContainerError> {
        let (codec_id, pixel) = match settings.codec {
            VideoCodec::H264 => (ffmpeg_next::codec::Id::H264, Pixel::YUV420P),
            VideoCodec::Hevc => (ffmpeg_next::codec::Id::HEVC, Pixel::YUV420P),
            VideoCodec::Mpeg4 => (ffmpeg_next::codec::Id::MPEG4, Pixel::YUV420P),
            VideoCodec::Mjpeg => (ffmpeg_next::codec::Id::MJPEG, Pixel::YUVJ420P),
        };
        let codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or_else(|| ContainerError::EncoderNotFound(settings.codec.to_string()))?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let mut ost = octx.add_stream(Some(codec))?;
        let stream_index = ost.index();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        encoder_ctx.set_width(settings.width);
        encoder_ctx.set_height(settings.height);
        encoder_ctx.set_format(pixel);
        encoder_ctx.set_time_base(Rational(1, VIDEO_TIMESCALE));
        encoder_ctx.set_frame_rate(Some(Rational(settings.frame_rate as i32, 1)));
        encoder_ctx.set_bit_rate(settings.bit_rate as usize);
        encoder_ctx.set_gop(settings.max_keyframe_interval);
        // Frames arrive live; reordering would need lookahead we do not have.
        encoder_ctx.set_max_b_frames(0);

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);
        ost.set_time_base(Rational(1, VIDEO_TIMESCALE));

        log::debug!(
            "Opened {} encoder {}x{} @ {} fps, {} bit/s",
            settings.codec,
            settings.width,
            settings.height,
            settings.frame_rate,
            settings.bit_rate
        );

        Ok(Self {
            encoder,
            scaler: None,
            stream_index,
            width: settings.width,
            height: settings.height,
            pixel,
            last_pts: None,
        })
    }

    /// Encodes `frame` at `time` (relative to the session origin). Frames
    /// whose millisecond tick is not after the previous frame's are skipped.
    pub fn encode(
        &mut self,
        frame: &Frame,
        time: MediaTime,
        octx: &mut ffmpeg_next::format::context::Output,
    ) -> Result<(), ContainerError> {
        let pts = time
            .checked_rescale(VIDEO_TIMESCALE)
            .ok_or(ContainerError::TimestampOutOfRange(time))?;
        if self.last_pts.is_some_and(|last| pts <= last) {
            log::trace!("Skipping video frame that maps onto tick {pts}");
            return Ok(());
        }

        let expected = frame.row_bytes() * frame.height() as usize;
        if frame.data().len() != expected || expected == 0 {
            return Err(ContainerError::InvalidFrame {
                expected,
                actual: frame.data().len(),
            });
        }

        let mut src = Video::new(source_pixel(frame.pixel_format()), frame.width(), frame.height());
        let row_bytes = frame.row_bytes();
        let stride = src.stride(0);
        let plane = src.data_mut(0);
        for (row, line) in frame.data().chunks_exact(row_bytes).enumerate() {
            let start = row * stride;
            plane[start..start + row_bytes].copy_from_slice(line);
        }

        let mut converted = Video::empty();
        self.scaler_for(frame)?.run(&src, &mut converted)?;
        converted.set_pts(Some(pts));

        self.encoder.send_frame(&converted)?;
        self.last_pts = Some(pts);
        self.drain(octx)
    }

    /// Flushes delayed packets. No frames may follow.
    pub fn finish(
        &mut self,
        octx: &mut ffmpeg_next::format::context::Output,
    ) -> Result<(), ContainerError> {
        self.encoder.send_eof()?;
        self.drain(octx)
    }

    fn drain(&mut self, octx: &mut ffmpeg_next::format::context::Output) -> Result<(), ContainerError> {
        write_packets(
            &mut self.encoder,
            octx,
            self.stream_index,
            Rational(1, VIDEO_TIMESCALE),
        )
    }

    /// Converter from the frame's geometry, rebuilt whenever it changes.
    fn scaler_for(&mut self, frame: &Frame) -> Result<&mut scaling::Context, ContainerError> {
        let geometry = (frame.pixel_format(), frame.width(), frame.height());
        match &mut self.scaler {
            Some((current, scaler)) if *current == geometry => Ok(scaler),
            slot => {
                let scaler = scaling::Context::get(
                    source_pixel(frame.pixel_format()),
                    frame.width(),
                    frame.height(),
                    self.pixel,
                    self.width,
                    self.height,
                    scaling::Flags::BILINEAR,
                )?;
                log::debug!(
                    "Video converter set up for {}x{} {:?} input",
                    frame.width(),
                    frame.height(),
                    frame.pixel_format()
                );
                Ok(&mut slot.insert((geometry, scaler)).1)
            }
        }
    }
}

fn source_pixel(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgra => Pixel::BGRA,
    }
}

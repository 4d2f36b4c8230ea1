use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::shared::camera_error::BoxError;
use crate::shared::constants::{AUDIO_QUEUE_CAPACITY, VIDEO_QUEUE_CAPACITY};
use crate::shared::media_time::MediaTime;
use crate::shared::sample_buffer::{MediaKind, SampleBuffer, SamplePayload};
use crate::shared::writer_configuration::{AudioSettings, VideoSettings};
use crate::writer::domain::container_writer::{ContainerWriter, ContainerWriterFactory};
use crate::writer::domain::track_input::TrackInput;
use crate::writer::infrastructure::container_error::ContainerError;
use crate::writer::infrastructure::container_format::ContainerFormat;
use crate::writer::infrastructure::ffmpeg_audio_encoder::FfmpegAudioEncoder;
use crate::writer::infrastructure::ffmpeg_video_encoder::FfmpegVideoEncoder;

enum MuxMessage {
    Sample {
        buffer: SampleBuffer,
        time: MediaTime,
    },
    Finish,
}

/// Creates FFmpeg-backed containers at a fixed output path.
pub struct FfmpegContainerWriterFactory {
    output_path: PathBuf,
    format: Option<ContainerFormat>,
}

impl FfmpegContainerWriterFactory {
    /// The container format is inferred from the file extension.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            format: None,
        }
    }

    pub fn with_format(output_path: impl Into<PathBuf>, format: ContainerFormat) -> Self {
        Self {
            output_path: output_path.into(),
            format: Some(format),
        }
    }

    fn open(&self) -> Result<FfmpegContainerWriter, ContainerError> {
        ffmpeg_next::init()?;

        let format = match self.format {
            Some(format) => format,
            None => ContainerFormat::from_path(&self.output_path)?,
        };

        if self.output_path.exists() {
            log::debug!("Removing stale output {}", self.output_path.display());
            std::fs::remove_file(&self.output_path).map_err(|source| {
                ContainerError::RemoveStale {
                    path: self.output_path.clone(),
                    source,
                }
            })?;
        }

        let octx = ffmpeg_next::format::output_as(&self.output_path, format.muxer_name())?;
        Ok(FfmpegContainerWriter::new(self.output_path.clone(), format, octx))
    }
}

impl ContainerWriterFactory for FfmpegContainerWriterFactory {
    fn create_writer(&self) -> Result<Box<dyn ContainerWriter>, BoxError> {
        Ok(Box::new(self.open()?))
    }

    fn output_path(&self) -> PathBuf {
        self.output_path.clone()
    }
}

/// Everything the mux thread owns once writing starts.
struct Muxer {
    octx: ffmpeg_next::format::context::Output,
    video: Option<(FfmpegVideoEncoder, Arc<AtomicUsize>)>,
    audio: Option<(FfmpegAudioEncoder, Arc<AtomicUsize>)>,
}

// Safety: the output context is moved into the mux thread and never touched
// by any other thread afterwards.
unsafe impl Send for Muxer {}

impl Muxer {
    fn run(mut self, rx: crossbeam_channel::Receiver<MuxMessage>) -> Result<(), ContainerError> {
        let mut first_error: Option<ContainerError> = None;

        for message in rx {
            let (buffer, time) = match message {
                MuxMessage::Sample { buffer, time } => (buffer, time),
                MuxMessage::Finish => break,
            };
            let kind = buffer.kind();
            if first_error.is_none() {
                if let Err(e) = self.encode(buffer, time) {
                    log::error!("Failed to encode {kind} sample at {time}: {e}");
                    first_error = Some(e);
                }
            }
            self.release(kind);
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        if let Some((encoder, _)) = self.video.as_mut() {
            encoder.finish(&mut self.octx)?;
        }
        if let Some((encoder, _)) = self.audio.as_mut() {
            encoder.finish(&mut self.octx)?;
        }
        self.octx.write_trailer()?;
        Ok(())
    }

    fn encode(&mut self, buffer: SampleBuffer, time: MediaTime) -> Result<(), ContainerError> {
        match (buffer.into_payload(), &mut self.video, &mut self.audio) {
            (SamplePayload::Video(frame), Some((encoder, _)), _) => {
                encoder.encode(&frame, time, &mut self.octx)
            }
            (SamplePayload::Audio(chunk), _, Some((encoder, _))) => {
                encoder.encode(&chunk, time, &mut self.octx)
            }
            // Track inputs only send their own kind.
            _ => Ok(()),
        }
    }

    fn release(&self, kind: MediaKind) {
        let slot = match kind {
            MediaKind::Video => self.video.as_ref().map(|(_, n)| n),
            MediaKind::Audio => self.audio.as_ref().map(|(_, n)| n),
        };
        if let Some(in_flight) = slot {
            in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Writes one movie file with FFmpeg.
///
/// Inputs hand samples to a dedicated mux thread through one FIFO channel,
/// so appends never wait on encoding. Each input tracks how many of its
/// samples are still queued and reports not ready at its capacity.
pub struct FfmpegContainerWriter {
    path: PathBuf,
    format: ContainerFormat,
    octx: Option<ffmpeg_next::format::context::Output>,
    video: Option<(FfmpegVideoEncoder, Arc<AtomicUsize>)>,
    audio: Option<(FfmpegAudioEncoder, Arc<AtomicUsize>)>,
    tx: crossbeam_channel::Sender<MuxMessage>,
    rx: Option<crossbeam_channel::Receiver<MuxMessage>>,
    mux_handle: Option<JoinHandle<Result<(), ContainerError>>>,
}

// Safety: the output context and encoders are used by one thread at a time
// and handed to the mux thread as a unit.
unsafe impl Send for FfmpegContainerWriter {}

impl FfmpegContainerWriter {
    fn new(
        path: PathBuf,
        format: ContainerFormat,
        octx: ffmpeg_next::format::context::Output,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            path,
            format,
            octx: Some(octx),
            video: None,
            audio: None,
            tx,
            rx: Some(rx),
            mux_handle: None,
        }
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    fn octx_for_setup(
        &mut self,
        kind: MediaKind,
    ) -> Result<&mut ffmpeg_next::format::context::Output, ContainerError> {
        let attached = match kind {
            MediaKind::Video => self.video.is_some(),
            MediaKind::Audio => self.audio.is_some(),
        };
        if attached {
            return Err(ContainerError::DuplicateInput(kind));
        }
        if self.mux_handle.is_some() {
            return Err(ContainerError::AlreadyStarted);
        }
        self.octx.as_mut().ok_or(ContainerError::AlreadyStarted)
    }

    fn track_input(
        &self,
        kind: MediaKind,
        capacity: usize,
        in_flight: Arc<AtomicUsize>,
    ) -> FfmpegTrackInput {
        FfmpegTrackInput {
            kind,
            tx: Some(self.tx.clone()),
            in_flight,
            capacity,
        }
    }

    /// Stops the mux thread, if any, and waits for it.
    fn stop_muxer(&mut self) -> Option<Result<(), ContainerError>> {
        let handle = self.mux_handle.take()?;
        let _ = self.tx.send(MuxMessage::Finish);
        Some(handle.join().unwrap_or(Err(ContainerError::MuxerPanicked)))
    }
}

impl ContainerWriter for FfmpegContainerWriter {
    fn output_path(&self) -> &Path {
        &self.path
    }

    fn add_video_input(&mut self, settings: &VideoSettings) -> Result<Box<dyn TrackInput>, BoxError> {
        if !self.format.supports_video(settings.codec) {
            return Err(ContainerError::IncompatibleCodec {
                kind: MediaKind::Video,
                codec: settings.codec.to_string(),
                format: self.format,
            }
            .into());
        }
        settings.validate()?;

        let octx = self.octx_for_setup(MediaKind::Video)?;
        let encoder = FfmpegVideoEncoder::open(octx, settings)?;
        let in_flight = Arc::new(AtomicUsize::new(0));
        self.video = Some((encoder, in_flight.clone()));
        Ok(Box::new(self.track_input(
            MediaKind::Video,
            VIDEO_QUEUE_CAPACITY,
            in_flight,
        )))
    }

    fn add_audio_input(&mut self, settings: &AudioSettings) -> Result<Box<dyn TrackInput>, BoxError> {
        if !self.format.supports_audio(settings.codec) {
            return Err(ContainerError::IncompatibleCodec {
                kind: MediaKind::Audio,
                codec: settings.codec.to_string(),
                format: self.format,
            }
            .into());
        }
        settings.validate()?;

        let octx = self.octx_for_setup(MediaKind::Audio)?;
        let encoder = FfmpegAudioEncoder::open(octx, settings)?;
        let in_flight = Arc::new(AtomicUsize::new(0));
        self.audio = Some((encoder, in_flight.clone()));
        Ok(Box::new(self.track_input(
            MediaKind::Audio,
            AUDIO_QUEUE_CAPACITY,
            in_flight,
        )))
    }

    fn start_writing(&mut self) -> Result<(), BoxError> {
        if self.mux_handle.is_some() {
            return Err(ContainerError::AlreadyStarted.into());
        }
        let (Some(mut octx), Some(rx)) = (self.octx.take(), self.rx.take()) else {
            return Err(ContainerError::AlreadyStarted.into());
        };

        octx.write_header()?;

        let muxer = Muxer {
            octx,
            video: self.video.take(),
            audio: self.audio.take(),
        };
        let handle = std::thread::Builder::new()
            .name("movie-muxer".to_string())
            .spawn(move || muxer.run(rx))?;
        self.mux_handle = Some(handle);

        log::debug!("Writing {} container {}", self.format, self.path.display());
        Ok(())
    }

    fn start_session_at(&mut self, origin: MediaTime) {
        log::debug!("Session origin at {origin} maps to zero in {}", self.path.display());
    }

    fn finish_writing(mut self: Box<Self>) -> Result<PathBuf, BoxError> {
        match self.stop_muxer() {
            Some(result) => result?,
            None => return Err(ContainerError::NotStarted.into()),
        }
        Ok(self.path.clone())
    }

    fn cancel_writing(mut self: Box<Self>) {
        if let Some(Err(e)) = self.stop_muxer() {
            log::debug!("Muxer error while cancelling: {e}");
        }
        // Closes the file before it is removed.
        self.octx = None;
        self.video = None;
        self.audio = None;
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::warn!("Failed to remove cancelled output {}: {e}", self.path.display());
            }
        }
    }
}

impl Drop for FfmpegContainerWriter {
    fn drop(&mut self) {
        if let Some(Err(e)) = self.stop_muxer() {
            log::warn!("Container {} dropped with muxer error: {e}", self.path.display());
        }
    }
}

/// Hands samples for one track to the mux thread.
pub struct FfmpegTrackInput {
    kind: MediaKind,
    tx: Option<crossbeam_channel::Sender<MuxMessage>>,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
}

impl TrackInput for FfmpegTrackInput {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn is_ready_for_more_media_data(&self) -> bool {
        self.tx.is_some() && self.in_flight.load(Ordering::Acquire) < self.capacity
    }

    fn append(&mut self, buffer: SampleBuffer, time: MediaTime) -> Result<(), BoxError> {
        if buffer.kind() != self.kind {
            return Err(ContainerError::WrongMediaKind {
                expected: self.kind,
                actual: buffer.kind(),
            }
            .into());
        }
        let tx = self
            .tx
            .as_ref()
            .ok_or(ContainerError::InputFinished(self.kind))?;
        if self.in_flight.load(Ordering::Acquire) >= self.capacity {
            return Err(ContainerError::QueueFull(self.kind).into());
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        if tx.send(MuxMessage::Sample { buffer, time }).is_err() {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            return Err(ContainerError::MuxerStopped.into());
        }
        Ok(())
    }

    fn mark_as_finished(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatch_queue::DispatchQueue;
    use crate::shared::audio_chunk::AudioChunk;
    use crate::shared::frame::Frame;
    use crate::shared::writer_configuration::{AudioCodec, VideoCodec, WriterConfiguration};
    use crate::writer::domain::movie_writer_delegate::MovieWriterDelegate;
    use crate::writer::movie_writer::MovieWriter;
    use std::time::Duration;

    // --- Helpers ---

    fn video_settings(codec: VideoCodec) -> VideoSettings {
        VideoSettings {
            codec,
            width: 160,
            height: 120,
            bit_rate: 400_000,
            frame_rate: 30,
            max_keyframe_interval: 30,
        }
    }

    fn audio_settings(codec: AudioCodec) -> AudioSettings {
        AudioSettings {
            codec,
            sample_rate: 44_100,
            channels: 1,
            bit_rate: 64_000,
        }
    }

    fn frame_at(index: i64) -> SampleBuffer {
        SampleBuffer::video(
            Frame::solid_rgb(160, 120, [128, 128, 128]),
            MediaTime::new(index, 30),
        )
    }

    /// Chunk `index` of a 440 Hz mono tone cut into `frames`-sample chunks.
    fn tone(index: i64, frames: usize) -> AudioChunk {
        let samples = (0..frames)
            .map(|i| {
                let t = (index as usize * frames + i) as f32 / 44_100.0;
                (t * 440.0 * std::f32::consts::TAU).sin() * 0.5
            })
            .collect();
        AudioChunk::new(samples, 44_100, 1).unwrap()
    }

    fn tone_offset(index: i64, frames: usize) -> MediaTime {
        MediaTime::new(index * frames as i64, 44_100)
    }

    fn tone_at(index: i64, frames: usize) -> SampleBuffer {
        SampleBuffer::audio(tone(index, frames), tone_offset(index, frames))
    }

    fn open(path: &Path) -> Box<dyn ContainerWriter> {
        FfmpegContainerWriterFactory::new(path)
            .create_writer()
            .unwrap()
    }

    /// Streams in the written file: (medium, packet count).
    fn stream_packet_counts(path: &Path) -> Vec<(ffmpeg_next::media::Type, usize)> {
        ffmpeg_next::init().unwrap();
        let mut ictx = ffmpeg_next::format::input(&path).unwrap();
        let mut streams: Vec<_> = ictx
            .streams()
            .map(|s| (s.parameters().medium(), 0usize))
            .collect();
        for (stream, _packet) in ictx.packets() {
            streams[stream.index()].1 += 1;
        }
        streams
    }

    fn video_dimensions(path: &Path) -> (u32, u32) {
        let ictx = ffmpeg_next::format::input(&path).unwrap();
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .unwrap();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .unwrap()
            .decoder()
            .video()
            .unwrap();
        (decoder.width(), decoder.height())
    }

    /// (pts in milliseconds, payload) of every packet, in file order.
    fn packets(path: &Path) -> Vec<(i64, Vec<u8>)> {
        ffmpeg_next::init().unwrap();
        let mut ictx = ffmpeg_next::format::input(&path).unwrap();
        let packets = ictx
            .packets()
            .filter_map(|(stream, packet)| {
                let pts = packet.pts()?;
                let time_base = stream.time_base();
                let ticks = pts * time_base.numerator() as i64;
                let millis = MediaTime::new(ticks, time_base.denominator()).rescale(1000);
                Some((millis, packet.data().unwrap_or_default().to_vec()))
            })
            .collect();
        packets
    }

    /// `samples` at 44.1 kHz, rounded to milliseconds.
    fn millis(samples: i64) -> i64 {
        MediaTime::new(samples, 44_100).rescale(1000)
    }

    /// Writes 1024-sample LPCM tone chunks to Matroska, skipping some.
    fn write_tone_chunks(path: &Path, indices: &[i64]) {
        let mut writer = open(path);
        let mut audio = writer
            .add_audio_input(&audio_settings(AudioCodec::LinearPcm))
            .unwrap();
        writer.start_writing().unwrap();
        for &i in indices {
            append_when_ready(&mut audio, tone_at(i, 1024));
        }
        audio.mark_as_finished();
        writer.finish_writing().unwrap();
    }

    /// Appends at the buffer's own time once the input has room.
    fn append_when_ready(input: &mut Box<dyn TrackInput>, buffer: SampleBuffer) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !input.is_ready_for_more_media_data() {
            assert!(std::time::Instant::now() < deadline, "input never became ready");
            std::thread::sleep(Duration::from_millis(1));
        }
        let time = buffer.presentation_time();
        input.append(buffer, time).unwrap();
    }

    // --- Setup ---

    #[test]
    fn test_unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = FfmpegContainerWriterFactory::new(dir.path().join("out.avi")).create_writer();
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_format_overrides_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        let factory = FfmpegContainerWriterFactory::with_format(&path, ContainerFormat::Matroska);
        let writer = factory.open().unwrap();
        assert_eq!(writer.format(), ContainerFormat::Matroska);
        assert_eq!(factory.output_path(), path);
    }

    #[test]
    fn test_stale_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        std::fs::write(&path, b"left over from an earlier run").unwrap();

        let writer = open(&path);
        writer.cancel_writing();
        assert!(!path.exists());
    }

    #[test]
    fn test_incompatible_video_codec_for_mp4() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(&dir.path().join("out.mp4"));
        let err = writer
            .add_video_input(&video_settings(VideoCodec::Mjpeg))
            .err()
            .unwrap();
        assert!(err.to_string().contains("MP4"));
        writer.cancel_writing();
    }

    #[test]
    fn test_incompatible_audio_codec_for_mp4() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(&dir.path().join("out.mp4"));
        assert!(writer
            .add_audio_input(&audio_settings(AudioCodec::LinearPcm))
            .is_err());
        writer.cancel_writing();
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(&dir.path().join("out.mov"));
        let settings = VideoSettings {
            width: 0,
            ..video_settings(VideoCodec::Mpeg4)
        };
        assert!(writer.add_video_input(&settings).is_err());
        writer.cancel_writing();
    }

    #[test]
    fn test_duplicate_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(&dir.path().join("out.mov"));
        writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();
        assert!(writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .is_err());
        writer.cancel_writing();
    }

    #[test]
    fn test_inputs_rejected_after_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(&dir.path().join("out.mov"));
        let _video = writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();
        writer.start_writing().unwrap();
        assert!(writer
            .add_audio_input(&audio_settings(AudioCodec::Aac))
            .is_err());
        writer.cancel_writing();
    }

    #[test]
    fn test_finish_without_start_fails() {
        let dir = tempfile::tempdir().unwrap();
        let writer = open(&dir.path().join("out.mov"));
        assert!(writer.finish_writing().is_err());
    }

    // --- Track input ---

    #[test]
    fn test_input_not_ready_at_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(&dir.path().join("out.mov"));
        let mut video = writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();

        // Nothing drains the queue before start_writing.
        for i in 0..VIDEO_QUEUE_CAPACITY as i64 {
            assert!(video.is_ready_for_more_media_data());
            video.append(frame_at(i), MediaTime::new(i, 30)).unwrap();
        }
        assert!(!video.is_ready_for_more_media_data());
        assert!(video.append(frame_at(99), MediaTime::new(99, 30)).is_err());
        writer.cancel_writing();
    }

    #[test]
    fn test_input_rejects_other_kind() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(&dir.path().join("out.mov"));
        let mut video = writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();
        assert_eq!(video.kind(), MediaKind::Video);
        assert!(video.append(tone_at(0, 1024), MediaTime::ZERO).is_err());
        writer.cancel_writing();
    }

    #[test]
    fn test_finished_input_refuses_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(&dir.path().join("out.mov"));
        let mut video = writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();
        video.mark_as_finished();
        assert!(!video.is_ready_for_more_media_data());
        assert!(video.append(frame_at(0), MediaTime::ZERO).is_err());
        writer.cancel_writing();
    }

    // --- Writing ---

    #[test]
    fn test_writes_video_track() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        let mut writer = open(&path);
        let mut video = writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();
        writer.start_writing().unwrap();
        writer.start_session_at(MediaTime::new(1234, 30));

        for i in 0..10 {
            append_when_ready(&mut video, frame_at(i));
        }
        video.mark_as_finished();

        assert_eq!(writer.finish_writing().unwrap(), path);
        let streams = stream_packet_counts(&path);
        assert_eq!(streams, vec![(ffmpeg_next::media::Type::Video, 10)]);
        assert_eq!(video_dimensions(&path), (160, 120));
    }

    #[test]
    fn test_frames_on_same_tick_are_collapsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.mkv");
        let mut writer = open(&path);
        let mut video = writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();
        writer.start_writing().unwrap();

        // 0 ms, 0.2 ms (same tick), 33 ms
        for time in [
            MediaTime::ZERO,
            MediaTime::new(1, 5000),
            MediaTime::new(1, 30),
        ] {
            let buffer = SampleBuffer::video(Frame::solid_rgb(160, 120, [20, 40, 60]), time);
            video.append(buffer, time).unwrap();
        }
        video.mark_as_finished();
        writer.finish_writing().unwrap();

        assert_eq!(stream_packet_counts(&path), vec![(ffmpeg_next::media::Type::Video, 2)]);
    }

    #[test]
    fn test_frames_are_scaled_to_configured_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaled.mov");
        let mut writer = open(&path);
        let mut video = writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();
        writer.start_writing().unwrap();

        let frames = [
            Frame::solid_rgb(320, 240, [200, 10, 10]),
            Frame::new(vec![255; 64 * 48 * 4], 64, 48, crate::shared::frame::PixelFormat::Bgra),
        ];
        for (i, frame) in frames.into_iter().enumerate() {
            let time = MediaTime::new(i as i64, 30);
            append_when_ready(&mut video, SampleBuffer::video(frame, time));
        }
        video.mark_as_finished();
        writer.finish_writing().unwrap();

        assert_eq!(video_dimensions(&path), (160, 120));
    }

    #[test]
    fn test_writes_video_and_aac_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("av.mp4");
        let mut writer = open(&path);
        let mut video = writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();
        let mut audio = writer
            .add_audio_input(&audio_settings(AudioCodec::Aac))
            .unwrap();
        writer.start_writing().unwrap();

        for i in 0..10 {
            video.append(frame_at(i), MediaTime::new(i, 30)).unwrap_or(());
            let chunk = tone_at(i, 1470);
            let time = chunk.presentation_time();
            audio.append(chunk, time).unwrap_or(());
            std::thread::sleep(Duration::from_millis(2));
        }
        video.mark_as_finished();
        audio.mark_as_finished();
        writer.finish_writing().unwrap();

        let streams = stream_packet_counts(&path);
        assert_eq!(streams.len(), 2);
        assert!(streams
            .iter()
            .any(|(medium, n)| *medium == ffmpeg_next::media::Type::Video && *n > 0));
        assert!(streams
            .iter()
            .any(|(medium, n)| *medium == ffmpeg_next::media::Type::Audio && *n > 0));
    }

    #[test]
    fn test_writes_linear_pcm_in_quicktime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcm.mov");
        let mut writer = open(&path);
        let mut audio = writer
            .add_audio_input(&audio_settings(AudioCodec::LinearPcm))
            .unwrap();
        writer.start_writing().unwrap();
        for i in 0..4 {
            append_when_ready(&mut audio, tone_at(i, 512));
        }
        audio.mark_as_finished();
        writer.finish_writing().unwrap();

        let streams = stream_packet_counts(&path);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].0, ffmpeg_next::media::Type::Audio);
        assert!(streams[0].1 > 0);
    }

    #[test]
    fn test_dropped_audio_chunk_is_filled_with_silence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gap.mkv");
        write_tone_chunks(&path, &[0, 1, 3, 4]);

        let packets = packets(&path);
        let times: Vec<i64> = packets.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            times,
            (0..5).map(|i| millis(i * 1024)).collect::<Vec<_>>()
        );
        assert!(packets[2].1.iter().all(|b| *b == 0));
        assert!(packets[3].1.iter().any(|b| *b != 0));
    }

    #[test]
    fn test_long_audio_gap_moves_timeline_forward() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long-gap.mkv");
        write_tone_chunks(&path, &[0, 1, 6, 7]);

        let times: Vec<i64> = packets(&path).iter().map(|(t, _)| *t).collect();
        assert_eq!(
            times,
            [0, 1, 6, 7].iter().map(|i| millis(i * 1024)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_mismatched_audio_fails_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.mov");
        let mut writer = open(&path);
        let mut audio = writer
            .add_audio_input(&audio_settings(AudioCodec::Aac))
            .unwrap();
        writer.start_writing().unwrap();
        let stereo = SampleBuffer::audio(
            AudioChunk::silence(1024, 48_000, 2).unwrap(),
            MediaTime::ZERO,
        );
        audio.append(stereo, MediaTime::ZERO).unwrap();
        audio.mark_as_finished();

        let err = writer.finish_writing().unwrap_err();
        assert!(err.to_string().contains("48000 Hz"));
    }

    #[test]
    fn test_cancel_after_start_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cancel.mkv");
        let mut writer = open(&path);
        let mut video = writer
            .add_video_input(&video_settings(VideoCodec::Mpeg4))
            .unwrap();
        writer.start_writing().unwrap();
        video.append(frame_at(0), MediaTime::ZERO).unwrap();

        writer.cancel_writing();
        assert!(!path.exists());
        assert!(video.append(frame_at(1), MediaTime::new(1, 30)).is_err());
    }

    // --- Through the movie writer ---

    struct ChannelDelegate(crossbeam_channel::Sender<PathBuf>);

    impl MovieWriterDelegate for ChannelDelegate {
        fn did_write_movie(&self, output: &Path) {
            let _ = self.0.send(output.to_path_buf());
        }
    }

    #[test]
    fn test_movie_writer_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.mov");
        let configuration = WriterConfiguration::new(
            Some(video_settings(VideoCodec::Mpeg4)),
            Some(audio_settings(AudioCodec::Aac)),
        )
        .unwrap();
        let writer = MovieWriter::with_output(
            configuration,
            &path,
            DispatchQueue::new("test.e2e").unwrap(),
        );
        let (tx, rx) = crossbeam_channel::bounded(1);
        let delegate: Arc<dyn MovieWriterDelegate> = Arc::new(ChannelDelegate(tx));
        writer.set_delegate(&delegate);

        writer.start_writing().unwrap();
        let t0 = MediaTime::new(3_600, 1);
        for i in 0..10 {
            let video_time = t0.checked_add(MediaTime::new(i, 30)).unwrap();
            writer.process_sample_buffer(SampleBuffer::video(
                Frame::solid_rgb(160, 120, [0, 90, 180]),
                video_time,
            ));
            let audio_time = t0.checked_add(tone_offset(i, 1470)).unwrap();
            writer.process_sample_buffer(SampleBuffer::audio(tone(i, 1470), audio_time));
            std::thread::sleep(Duration::from_millis(5));
        }
        writer.stop_writing();

        let written = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(written, path);
        assert!(!writer.is_writing());

        let stats = writer.stats();
        assert!(stats.video.appended > 0);
        let streams = stream_packet_counts(&path);
        let video_packets = streams
            .iter()
            .find(|(medium, _)| *medium == ffmpeg_next::media::Type::Video)
            .map(|(_, n)| *n)
            .unwrap();
        assert_eq!(video_packets as u64, stats.video.appended);
    }
}

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use movie_writer_core::capture::domain::capture_format::{CaptureFormat, FrameRateRange};
use movie_writer_core::capture::frame_rate_selector::{
    select_format_for_frame_rate, supports_high_frame_rate,
};
use movie_writer_core::dispatch::dispatch_queue::DispatchQueue;
use movie_writer_core::shared::audio_chunk::{AudioChunk, AudioChunkError};
use movie_writer_core::shared::camera_error::FinalizationError;
use movie_writer_core::shared::constants::{
    DEFAULT_AUDIO_FRAME_SIZE, HIGH_FRAME_RATE_THRESHOLD, MAX_VIDEO_FRAME_RATE,
};
use movie_writer_core::shared::frame::Frame;
use movie_writer_core::shared::media_time::MediaTime;
use movie_writer_core::shared::sample_buffer::SampleBuffer;
use movie_writer_core::shared::writer_configuration::{
    AudioCodec, AudioSettings, VideoCodec, VideoSettings, WriterConfiguration,
};
use movie_writer_core::writer::domain::movie_writer_delegate::MovieWriterDelegate;
use movie_writer_core::writer::movie_writer::MovieWriter;

/// Capture timestamps start here, as a camera clock would be mid-uptime.
const CAPTURE_CLOCK_BASE_SECS: i64 = 5_000;
const TONE_HZ: f32 = 440.0;
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(60);

/// Records a synthetic camera and microphone into a movie file.
#[derive(Parser)]
#[command(name = "movie-writer")]
struct Cli {
    /// Output movie (.mov, .mp4, .m4v or .mkv).
    output: PathBuf,

    /// Recording length in seconds.
    #[arg(long, default_value = "3.0")]
    duration: f64,

    /// Capture frame rate (overrides the configuration).
    #[arg(long)]
    fps: Option<u32>,

    /// Encoded width in pixels (overrides the configuration).
    #[arg(long)]
    width: Option<u32>,

    /// Encoded height in pixels (overrides the configuration).
    #[arg(long)]
    height: Option<u32>,

    /// Video codec: h264, hevc, mpeg4 or mjpeg.
    #[arg(long)]
    video_codec: Option<String>,

    /// Audio codec: aac or lpcm.
    #[arg(long)]
    audio_codec: Option<String>,

    /// Record audio only.
    #[arg(long)]
    no_video: bool,

    /// Record video only.
    #[arg(long)]
    no_audio: bool,

    /// JSON writer configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Highest frame rate the simulated camera supports.
    #[arg(long, default_value = "60")]
    capture_max_fps: f64,
}

/// Forwards the finalization outcome to the waiting main thread.
struct CompletionSignal {
    tx: crossbeam_channel::Sender<Result<PathBuf, String>>,
}

impl MovieWriterDelegate for CompletionSignal {
    fn did_write_movie(&self, output: &Path) {
        let _ = self.tx.send(Ok(output.to_path_buf()));
    }

    fn did_fail_writing(&self, error: &FinalizationError) {
        let _ = self.tx.send(Err(error.to_string()));
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let configuration = build_configuration(&cli)?;
    if let Some(video) = configuration.video() {
        check_capture_format(video.frame_rate as f64, cli.capture_max_fps)?;
    }

    let queue = DispatchQueue::new("movie-writer.finalize")?;
    let writer = Arc::new(MovieWriter::with_output(
        configuration.clone(),
        &cli.output,
        queue,
    ));

    let (tx, done_rx) = crossbeam_channel::bounded(1);
    let delegate: Arc<dyn MovieWriterDelegate> = Arc::new(CompletionSignal { tx });
    writer.set_delegate(&delegate);

    writer.start_writing()?;
    log::info!("Recording {:.1}s to {}", cli.duration, cli.output.display());

    let duration = Duration::from_secs_f64(cli.duration);
    let mut producers = Vec::new();
    if let Some(video) = configuration.video().cloned() {
        let writer = writer.clone();
        producers.push(
            thread::Builder::new()
                .name("video-producer".to_string())
                .spawn(move || produce_video(&writer, &video, duration))?,
        );
    }
    if let Some(audio) = configuration.audio().cloned() {
        let writer = writer.clone();
        producers.push(
            thread::Builder::new()
                .name("audio-producer".to_string())
                .spawn(move || produce_audio(&writer, &audio, duration))?,
        );
    }
    for producer in producers {
        if producer.join().is_err() {
            log::warn!("A producer thread panicked");
        }
    }

    writer.stop_writing();
    let written = done_rx
        .recv_timeout(FINALIZE_TIMEOUT)
        .map_err(|_| "timed out waiting for the movie to be finalized")??;

    log::info!("{}", writer.stats().summary_string());
    log::info!("Output written to {}", written.display());
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.no_video && cli.no_audio {
        return Err("--no-video and --no-audio cannot both be set".into());
    }
    if !(cli.duration > 0.0 && cli.duration.is_finite()) {
        return Err(format!(
            "Duration must be a positive number of seconds, got {}",
            cli.duration
        )
        .into());
    }
    if let Some(fps) = cli.fps {
        if !(1..=MAX_VIDEO_FRAME_RATE).contains(&fps) {
            return Err(format!(
                "Frame rate must be between 1 and {MAX_VIDEO_FRAME_RATE}, got {fps}"
            )
            .into());
        }
    }
    if cli.capture_max_fps <= 0.0 {
        return Err(format!(
            "Capture max fps must be positive, got {}",
            cli.capture_max_fps
        )
        .into());
    }
    if let Some(ref codec) = cli.video_codec {
        parse_video_codec(codec)?;
    }
    if let Some(ref codec) = cli.audio_codec {
        parse_audio_codec(codec)?;
    }
    if let Some(ref path) = cli.config {
        if !path.exists() {
            return Err(format!("Configuration file not found: {}", path.display()).into());
        }
    }
    Ok(())
}

/// Tracks and settings from the configuration file (or both tracks with
/// defaults), with command-line overrides applied.
fn build_configuration(cli: &Cli) -> Result<WriterConfiguration, Box<dyn std::error::Error>> {
    let base = match cli.config {
        Some(ref path) => WriterConfiguration::from_json_file(path)?,
        None => WriterConfiguration::default(),
    };

    let mut video = base.video().filter(|_| !cli.no_video).cloned();
    if let Some(video) = video.as_mut() {
        if let Some(fps) = cli.fps {
            video.frame_rate = fps;
        }
        if let Some(width) = cli.width {
            video.width = width;
        }
        if let Some(height) = cli.height {
            video.height = height;
        }
        if let Some(ref codec) = cli.video_codec {
            video.codec = parse_video_codec(codec)?;
        }
    }

    let mut audio = base.audio().filter(|_| !cli.no_audio).cloned();
    if let Some(audio) = audio.as_mut() {
        if let Some(ref codec) = cli.audio_codec {
            audio.codec = parse_audio_codec(codec)?;
        }
    }

    Ok(WriterConfiguration::new(video, audio)?)
}

fn parse_video_codec(name: &str) -> Result<VideoCodec, String> {
    match name.to_ascii_lowercase().as_str() {
        "h264" => Ok(VideoCodec::H264),
        "hevc" | "h265" => Ok(VideoCodec::Hevc),
        "mpeg4" => Ok(VideoCodec::Mpeg4),
        "mjpeg" => Ok(VideoCodec::Mjpeg),
        _ => Err(format!(
            "Video codec must be one of: h264, hevc, mpeg4, mjpeg, got '{name}'"
        )),
    }
}

fn parse_audio_codec(name: &str) -> Result<AudioCodec, String> {
    match name.to_ascii_lowercase().as_str() {
        "aac" => Ok(AudioCodec::Aac),
        "lpcm" | "pcm" => Ok(AudioCodec::LinearPcm),
        _ => Err(format!("Audio codec must be one of: aac, lpcm, got '{name}'")),
    }
}

/// Formats a typical camera exposes; the last one reaches `max_fps`.
fn simulated_capture_formats(max_fps: f64) -> Vec<CaptureFormat> {
    vec![
        CaptureFormat::new(640, 480, vec![FrameRateRange::new(1.0, 30.0)]),
        CaptureFormat::new(1920, 1080, vec![FrameRateRange::new(1.0, 30.0)]),
        CaptureFormat::new(
            1280,
            720,
            vec![FrameRateRange::new(1.0, max_fps.max(HIGH_FRAME_RATE_THRESHOLD))],
        ),
    ]
}

fn check_capture_format(fps: f64, max_fps: f64) -> Result<(), Box<dyn std::error::Error>> {
    let formats = simulated_capture_formats(max_fps);
    if fps > HIGH_FRAME_RATE_THRESHOLD && !supports_high_frame_rate(&formats) {
        log::warn!("Simulated camera has no high-frame-rate format");
    }
    let selection = select_format_for_frame_rate(&formats, fps)?;
    let format = &formats[selection.format_index];
    log::info!(
        "Capture format {}x{} at {} fps (frame duration {})",
        format.width,
        format.height,
        selection.frame_rate,
        selection.frame_duration
    );
    Ok(())
}

fn produce_video(writer: &MovieWriter, settings: &VideoSettings, duration: Duration) {
    let Ok(timescale) = i32::try_from(settings.frame_rate) else {
        log::error!("Frame rate {} is out of range", settings.frame_rate);
        return;
    };
    let fps = timescale as i64;
    let total = (duration.as_secs_f64() * fps as f64).round() as i64;
    let start = Instant::now();

    for index in 0..total {
        pace(start, Duration::from_secs_f64(index as f64 / fps as f64));
        let time = MediaTime::new(CAPTURE_CLOCK_BASE_SECS * fps + index, timescale);
        let frame = test_pattern(settings.width, settings.height, index);
        writer.process_sample_buffer(SampleBuffer::video(frame, time));
    }
    log::debug!("Video producer sent {total} frames");
}

fn produce_audio(writer: &MovieWriter, settings: &AudioSettings, duration: Duration) {
    let rate = settings.sample_rate as i64;
    let chunk_frames = DEFAULT_AUDIO_FRAME_SIZE as i64;
    let total = (duration.as_secs_f64() * rate as f64 / chunk_frames as f64).ceil() as i64;
    let start = Instant::now();

    for index in 0..total {
        let offset = index * chunk_frames;
        pace(start, Duration::from_secs_f64(offset as f64 / rate as f64));
        let time = MediaTime::new(CAPTURE_CLOCK_BASE_SECS * rate + offset, rate as i32);
        let chunk = match tone(offset, DEFAULT_AUDIO_FRAME_SIZE, settings) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::error!("Audio producer stopped: {e}");
                return;
            }
        };
        writer.process_sample_buffer(SampleBuffer::audio(chunk, time));
    }
    log::debug!("Audio producer sent {total} chunks");
}

fn pace(start: Instant, due: Duration) {
    if let Some(wait) = due.checked_sub(start.elapsed()) {
        thread::sleep(wait);
    }
}

/// Gray frame with a bright bar sweeping left to right.
fn test_pattern(width: u32, height: u32, index: i64) -> Frame {
    let mut frame = Frame::solid_rgb(width, height, [40, 40, 40]);
    let bar_width = (width / 16).max(1) as usize;
    let bar_x = (index as usize * 4) % width as usize;
    let row_bytes = frame.row_bytes();
    for row in frame.data_mut().chunks_exact_mut(row_bytes) {
        for x in bar_x..(bar_x + bar_width).min(width as usize) {
            row[x * 3..x * 3 + 3].copy_from_slice(&[230, 200, 40]);
        }
    }
    frame
}

/// `frames` samples of a sine tone starting at sample `offset`, copied to
/// every channel.
fn tone(
    offset: i64,
    frames: usize,
    settings: &AudioSettings,
) -> Result<AudioChunk, AudioChunkError> {
    let channels = settings.channels as usize;
    let rate = settings.sample_rate as f32;
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = (offset + i as i64) as f32 / rate;
        let value = (t * TONE_HZ * std::f32::consts::TAU).sin() * 0.3;
        samples.extend(std::iter::repeat(value).take(channels));
    }
    AudioChunk::new(samples, settings.sample_rate, settings.channels)
}

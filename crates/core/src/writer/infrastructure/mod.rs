pub mod container_error;
pub mod container_format;
pub mod ffmpeg_audio_encoder;
pub mod ffmpeg_container_writer;
mod ffmpeg_packets;
pub mod ffmpeg_video_encoder;

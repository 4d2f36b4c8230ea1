use ffmpeg_next::Rational;

use crate::writer::infrastructure::container_error::ContainerError;

/// Moves every packet the encoder has ready into the output, rescaled from
/// the encoder time base to the stream's.
pub(crate) fn write_packets(
    encoder: &mut ffmpeg_next::codec::encoder::Encoder,
    octx: &mut ffmpeg_next::format::context::Output,
    stream_index: usize,
    encoder_time_base: Rational,
) -> Result<(), ContainerError> {
    let stream_time_base = octx
        .stream(stream_index)
        .map(|s| s.time_base())
        .ok_or(ContainerError::MissingStream(stream_index))?;

    let mut encoded = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(stream_index);
        encoded.rescale_ts(encoder_time_base, stream_time_base);
        encoded.write_interleaved(octx)?;
    }
    Ok(())
}

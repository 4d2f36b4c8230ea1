/// Byte layout of a raw video frame handed over by a capture callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgra,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Bgra => 4,
        }
    }
}

/// A single uncompressed video frame: contiguous pixels in row-major order,
/// no row padding.
///
/// The writing core treats pixel data as opaque; conversion to the encoder's
/// pixel format happens in the container backend.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * pixel_format.bytes_per_pixel(),
            "data length must equal width * height * bytes per pixel"
        );
        Self {
            data,
            width,
            height,
            pixel_format,
        }
    }

    /// A frame filled with one RGB color.
    pub fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(data, width, height, PixelFormat::Rgb24)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Length in bytes of one row of pixels.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.pixel_format.bytes_per_pixel()
    }
}

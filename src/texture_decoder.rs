use crate::bc;
use crate::TextureDecodeError;

type Result<T> = std::result::Result<T, TextureDecodeError>;

/// Storage format of a texture's pixel payload. Values outside the three
/// formats this reader decodes are kept as [`PixelFormat::Unrecognized`] so
/// the rest of a package stays inspectable; decoding one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Uncompressed BGRA8.
    Color,
    Bc1,
    Bc3,
    Unrecognized(u32),
}

impl PixelFormat {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => PixelFormat::Color,
            28 => PixelFormat::Bc1,
            32 => PixelFormat::Bc3,
            other => PixelFormat::Unrecognized(other),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            PixelFormat::Color => 1,
            PixelFormat::Bc1 => 28,
            PixelFormat::Bc3 => 32,
            PixelFormat::Unrecognized(value) => value,
        }
    }
}

/// Decodes one stored image (or one depth slice of a volume texture) into
/// tightly packed RGBA8 pixels, red in the lowest byte.
pub fn decode(data: &[u8], width: usize, height: usize, format: PixelFormat) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Color => decode_bgra(data, width, height),
        PixelFormat::Bc1 => decode_blocks(data, width, height, bc::BC1_BLOCK_SIZE, |block, pixels| {
            bc::decode_bc1_block(block, pixels, false)
        }),
        PixelFormat::Bc3 => decode_blocks(data, width, height, bc::BC3_BLOCK_SIZE, bc::decode_bc3_block),
        PixelFormat::Unrecognized(value) => Err(TextureDecodeError::UnsupportedTextureFormat(value)),
    }
}

fn decode_bgra(data: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let expected = width * height * 4;
    if data.len() < expected {
        return Err(TextureDecodeError::InputDataTooSmall {
            expected,
            actual: data.len(),
        });
    }

    let mut pixels = Vec::with_capacity(expected);
    for pixel in data[..expected].chunks_exact(4) {
        pixels.extend_from_slice(&[pixel[2], pixel[1], pixel[0], pixel[3]]);
    }
    Ok(pixels)
}

/// Walks the image in 4x4 blocks, decoding each into a scratch buffer and
/// blitting it in with clipping along the right and bottom edges.
fn decode_blocks<F>(
    data: &[u8],
    width: usize,
    height: usize,
    block_size: usize,
    decode_block: F,
) -> Result<Vec<u8>>
where
    F: Fn(&[u8], &mut bc::BlockPixels),
{
    let blocks_x = (width + 3) / 4;
    let blocks_y = (height + 3) / 4;
    let expected = blocks_x * blocks_y * block_size;
    if data.len() < expected {
        return Err(TextureDecodeError::InputDataTooSmall {
            expected,
            actual: data.len(),
        });
    }

    let mut pixels = vec![0u8; width * height * 4];
    let mut scratch: bc::BlockPixels = [[0; 4]; 16];
    for block_y in 0..blocks_y {
        for block_x in 0..blocks_x {
            let offset = (block_y * blocks_x + block_x) * block_size;
            decode_block(&data[offset..offset + block_size], &mut scratch);

            let rows = (height - block_y * 4).min(4);
            let columns = (width - block_x * 4).min(4);
            for row in 0..rows {
                for column in 0..columns {
                    let source = scratch[row * 4 + column];
                    let index = ((block_y * 4 + row) * width + block_x * 4 + column) * 4;
                    pixels[index..index + 4].copy_from_slice(&source);
                }
            }
        }
    }
    Ok(pixels)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn color_repacks_bgra_to_rgba() {
        let data = [
            0x01, 0x02, 0x03, 0x04, // b g r a
            0x05, 0x06, 0x07, 0x08,
        ];
        let pixels = decode(&data, 2, 1, PixelFormat::Color).unwrap();
        assert_eq!(vec![0x03, 0x02, 0x01, 0x04, 0x07, 0x06, 0x05, 0x08], pixels);
    }

    #[test]
    fn unrecognized_formats_fail_on_decode() {
        let result = decode(&[], 4, 4, PixelFormat::from_u32(21));
        assert!(matches!(
            result,
            Err(TextureDecodeError::UnsupportedTextureFormat(21))
        ));
    }

    #[test]
    fn short_input_is_rejected() {
        let result = decode(&[0u8; 7], 4, 4, PixelFormat::Bc1);
        assert!(matches!(
            result,
            Err(TextureDecodeError::InputDataTooSmall {
                expected: 8,
                actual: 7,
            })
        ));
    }

    #[test]
    fn bc1_image_spanning_multiple_blocks() {
        // left block solid white, right block solid black
        let mut data = Vec::new();
        data.extend_from_slice(&[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x55, 0x55, 0x55, 0x55]);
        let pixels = decode(&data, 8, 4, PixelFormat::Bc1).unwrap();

        for row in 0..4 {
            for column in 0..8 {
                let index = (row * 8 + column) * 4;
                let expected = if column < 4 { 0xFF } else { 0x00 };
                assert_eq!(expected, pixels[index]);
                assert_eq!(0xFF, pixels[index + 3]);
            }
        }
    }

    #[test]
    fn odd_sizes_clip_at_the_edges() {
        // 6x3 pixels still need a full 2x1 grid of blocks
        let mut data = Vec::new();
        for _ in 0..2 {
            data.extend_from_slice(&[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        }
        let pixels = decode(&data, 6, 3, PixelFormat::Bc1).unwrap();
        assert_eq!(6 * 3 * 4, pixels.len());
        for pixel in pixels.chunks_exact(4) {
            assert_eq!([0xFF, 0xFF, 0xFF, 0xFF], *pixel);
        }
    }

    #[test]
    fn bc3_image_decodes_alpha_per_block() {
        let mut block = [0u8; 16];
        block[0] = 0x80; // flat alpha 0x80
        block[8] = 0xFF;
        block[9] = 0xFF;
        let pixels = decode(&block, 4, 4, PixelFormat::Bc3).unwrap();
        for pixel in pixels.chunks_exact(4) {
            assert_eq!([0xFF, 0xFF, 0xFF, 0x80], *pixel);
        }
    }
}

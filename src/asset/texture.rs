use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::texture_decoder::{self, PixelFormat};
use crate::{TextureDecodeError, XnbError};

type Result<T> = std::result::Result<T, XnbError>;

#[derive(Debug)]
pub struct Texture2D {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub mips: Vec<Vec<u8>>,
}

impl Texture2D {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let format = read_pixel_format(reader)?;
        let width = reader.read_u32::<LittleEndian>()?;
        let height = reader.read_u32::<LittleEndian>()?;
        let mips = read_mips(reader)?;
        Ok(Texture2D {
            format,
            width,
            height,
            mips,
        })
    }

    /// Decodes one mip level to RGBA8 pixels.
    pub fn decode_mip(&self, level: usize) -> std::result::Result<Vec<u8>, TextureDecodeError> {
        let mip = self
            .mips
            .get(level)
            .ok_or(TextureDecodeError::NoSuchMipLevel(level, self.mips.len()))?;
        let width = self.width.checked_shr(level as u32).unwrap_or(0).max(1);
        let height = self.height.checked_shr(level as u32).unwrap_or(0).max(1);
        texture_decoder::decode(mip, width as usize, height as usize, self.format)
    }
}

/// Volume texture. Each stored mip holds `depth` slices back to back;
/// decode a slice by handing its rows to [`texture_decoder::decode`].
#[derive(Debug)]
pub struct Texture3D {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mips: Vec<Vec<u8>>,
}

impl Texture3D {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let format = read_pixel_format(reader)?;
        let width = reader.read_u32::<LittleEndian>()?;
        let height = reader.read_u32::<LittleEndian>()?;
        let depth = reader.read_u32::<LittleEndian>()?;
        let mips = read_mips(reader)?;
        Ok(Texture3D {
            format,
            width,
            height,
            depth,
            mips,
        })
    }
}

fn read_pixel_format(reader: &mut impl Read) -> Result<PixelFormat> {
    let value = reader.read_u32::<LittleEndian>()?;
    let format = PixelFormat::from_u32(value);
    if let PixelFormat::Unrecognized(value) = format {
        log::warn!("texture stores pixel format {} which this reader cannot decode", value);
    }
    Ok(format)
}

fn read_mips(reader: &mut impl Read) -> Result<Vec<Vec<u8>>> {
    let mip_count = reader.read_u32::<LittleEndian>()?;
    let mut mips = Vec::with_capacity(mip_count as usize);
    for _ in 0..mip_count {
        let size = reader.read_u32::<LittleEndian>()?;
        let mut mip = vec![0u8; size as usize];
        reader.read_exact(&mut mip)?;
        mips.push(mip);
    }
    Ok(mips)
}

use std::borrow::Cow;
use std::io::{Cursor, Read};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::asset::{Asset, TypeReader};
use crate::io_ext::ContentReadExt;
use crate::lzx::Lzx;
use crate::XnbError;

type Result<T> = std::result::Result<T, XnbError>;

/// All packages in this family compress against a 64 KiB window.
const WINDOW_BITS: u32 = 16;
/// Frames without an explicit size prefix decompress to 32 KiB.
const DEFAULT_FRAME_SIZE: usize = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    WindowsPhone,
    Xbox360,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Xna31,
    Xna40,
}

#[derive(Debug)]
pub struct Header {
    pub platform: Platform,
    pub version: Version,
    pub hi_def: bool,
    pub compressed: bool,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

/// An XNB content package: the parsed header plus the raw payload bytes
/// following it. Decompression and asset parsing are separate steps so a
/// caller can inspect headers cheaply.
pub struct Xnb {
    header: Header,
    data: Vec<u8>,
}

impl Xnb {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let mut magic = [0u8; 3];
        reader.read_exact(&mut magic)?;
        if &magic != b"XNB" {
            return Err(XnbError::NotAnXnbFile);
        }

        let platform = match reader.read_u8()? {
            b'w' => Platform::Windows,
            b'm' => Platform::WindowsPhone,
            b'x' => Platform::Xbox360,
            value => return Err(XnbError::UnknownPlatform(value)),
        };

        let version = match reader.read_u8()? {
            4 => Version::Xna31,
            5 => Version::Xna40,
            value => return Err(XnbError::UnknownVersion(value)),
        };
        if version != Version::Xna31 {
            return Err(XnbError::UnsupportedVersion(version));
        }

        let flags = reader.read_u8()?;
        let hi_def = flags & 0x01 != 0;
        let compressed = flags & 0x80 != 0;

        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = if compressed {
            reader.read_u32::<LittleEndian>()?
        } else {
            0
        };

        // the declared size covers the header itself
        let header_size = if compressed { 14 } else { 10 };
        let data_size = compressed_size
            .checked_sub(header_size)
            .ok_or(XnbError::NotAnXnbFile)?;
        let mut data = Vec::with_capacity(data_size as usize);
        reader.take(data_size as u64).read_to_end(&mut data)?;

        Ok(Xnb {
            header: Header {
                platform,
                version,
                hi_def,
                compressed,
                compressed_size,
                uncompressed_size,
            },
            data,
        })
    }

    /// The decompressed payload. Compressed packages run every frame through
    /// one LZX decoder; uncompressed packages hand back the stored bytes.
    pub fn decompress(&self) -> Result<Cow<'_, [u8]>> {
        if !self.header.compressed {
            return Ok(Cow::from(self.data.as_slice()));
        }

        let mut lzx = Lzx::new(WINDOW_BITS)?;
        let mut cursor = Cursor::new(self.data.as_slice());
        let mut decompressed = Vec::with_capacity(self.header.uncompressed_size as usize);

        while (cursor.position() as usize) < self.data.len() {
            let frame_size;
            let block_size;
            if cursor.read_u8()? == 0xFF {
                frame_size = cursor.read_u16::<BigEndian>()? as usize;
                block_size = cursor.read_u16::<BigEndian>()? as usize;
            } else {
                cursor.set_position(cursor.position() - 1);
                block_size = cursor.read_u16::<BigEndian>()? as usize;
                frame_size = DEFAULT_FRAME_SIZE;
            }
            if block_size == 0 || frame_size == 0 {
                break;
            }

            // trailing bits of a block belong to the next frame's alignment,
            // so the cursor advances by the declared size, not by however
            // much the decoder consumed
            let next_frame = cursor.position() + block_size as u64;
            lzx.decompress(&mut cursor, block_size, &mut decompressed, frame_size)?;
            cursor.set_position(next_frame);
        }

        if decompressed.len() != self.header.uncompressed_size as usize {
            return Err(XnbError::DecompressedSizeMismatch {
                expected: self.header.uncompressed_size,
                actual: decompressed.len(),
            });
        }
        Ok(Cow::from(decompressed))
    }

    /// Decompresses the payload and parses the asset graph out of it.
    pub fn read_content(&self) -> Result<XnbContent> {
        let payload = self.decompress()?;
        let mut cursor = Cursor::new(payload.as_ref());

        let reader_count = cursor.read_7bit_encoded_i32()?;
        let mut type_readers = Vec::with_capacity(reader_count.max(0) as usize);
        for _ in 0..reader_count {
            type_readers.push(TypeReader::read(&mut cursor)?);
        }

        let shared_count = cursor.read_7bit_encoded_i32()?;
        let primary = Asset::read(&mut cursor, &type_readers)?;

        let mut shared = Vec::with_capacity(shared_count.max(0) as usize);
        for index in 0..shared_count {
            if cursor.position() as usize >= payload.len() {
                log::debug!(
                    "package declares {} shared assets but the stream ends after {}",
                    shared_count,
                    index
                );
                break;
            }
            shared.push(Asset::read(&mut cursor, &type_readers)?);
        }

        log::debug!(
            "read {:?} package: {} type readers, primary {}, {} shared assets",
            self.header.platform,
            type_readers.len(),
            primary.kind_name(),
            shared.len()
        );

        Ok(XnbContent {
            type_readers,
            primary,
            shared,
        })
    }
}

/// A fully parsed asset graph: the primary asset and any shared assets that
/// follow it, with the type reader table they were decoded against.
#[derive(Debug)]
pub struct XnbContent {
    pub type_readers: Vec<TypeReader>,
    pub primary: Asset,
    pub shared: Vec<Asset>,
}

#[cfg(test)]
mod test {
    use super::*;

    const TEXTURE_2D_READER: &str = "Microsoft.Xna.Framework.Content.Texture2DReader";
    const STRING_READER: &str = "Microsoft.Xna.Framework.Content.StringReader";

    fn uncompressed_xnb(payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![b'X', b'N', b'B', b'w', 4, 0];
        bytes.extend_from_slice(&(10 + payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn push_string(bytes: &mut Vec<u8>, value: &str) {
        bytes.push(value.len() as u8);
        bytes.extend_from_slice(value.as_bytes());
    }

    fn push_type_reader(bytes: &mut Vec<u8>, name: &str) {
        push_string(bytes, name);
        bytes.extend_from_slice(&0i32.to_le_bytes());
    }

    #[test]
    fn header_happy_path_uncompressed() {
        let bytes = [0x58, 0x4E, 0x42, 0x77, 0x04, 0x00, 0x0A, 0x00, 0x00, 0x00];
        let xnb = Xnb::read(&mut &bytes[..]).unwrap();
        let header = xnb.header();
        assert_eq!(Platform::Windows, header.platform);
        assert_eq!(Version::Xna31, header.version);
        assert!(!header.hi_def);
        assert!(!header.compressed);
        assert_eq!(10, header.compressed_size);
        assert_eq!(0, header.uncompressed_size);
        assert!(xnb.data().is_empty());
    }

    #[test]
    fn header_happy_path_compressed() {
        let mut bytes = vec![
            0x58, 0x4E, 0x42, 0x77, 0x04, 0x81, 0x1C, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00,
        ];
        bytes.extend_from_slice(&[0u8; 14]);
        let xnb = Xnb::read(&mut bytes.as_slice()).unwrap();
        let header = xnb.header();
        assert!(header.hi_def);
        assert!(header.compressed);
        assert_eq!(28, header.compressed_size);
        assert_eq!(4096, header.uncompressed_size);
        assert_eq!(14, xnb.data().len());
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let bytes = [0x41, 0x42, 0x43, 0x77, 0x04, 0x00, 0x0A, 0x00, 0x00, 0x00];
        assert!(matches!(
            Xnb::read(&mut &bytes[..]),
            Err(XnbError::NotAnXnbFile)
        ));
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let bytes = [0x58, 0x4E, 0x42, b'q', 0x04, 0x00, 0x0A, 0x00, 0x00, 0x00];
        assert!(matches!(
            Xnb::read(&mut &bytes[..]),
            Err(XnbError::UnknownPlatform(0x71))
        ));
    }

    #[test]
    fn later_format_versions_are_not_coerced() {
        let bytes = [0x58, 0x4E, 0x42, 0x77, 0x05, 0x00, 0x0A, 0x00, 0x00, 0x00];
        assert!(matches!(
            Xnb::read(&mut &bytes[..]),
            Err(XnbError::UnsupportedVersion(Version::Xna40))
        ));

        let bytes = [0x58, 0x4E, 0x42, 0x77, 0x09, 0x00, 0x0A, 0x00, 0x00, 0x00];
        assert!(matches!(
            Xnb::read(&mut &bytes[..]),
            Err(XnbError::UnknownVersion(9))
        ));
    }

    #[test]
    fn uncompressed_payload_passes_through_byte_for_byte() {
        let payload = [1u8, 2, 3, 4, 5];
        let bytes = uncompressed_xnb(&payload);
        let xnb = Xnb::read(&mut bytes.as_slice()).unwrap();
        assert_eq!(&payload, xnb.decompress().unwrap().as_ref());
    }

    /// One explicit-size frame holding a single uncompressed LZX block with
    /// the five bytes "hello", followed by a zero terminator frame.
    #[test]
    fn compressed_payload_decodes_frame_by_frame() {
        let mut block = vec![
            0x00, 0x30, // intel bit 0, block kind 3, high bits of the length
            0x50, 0x00, // rest of the 24-bit length (5) and pair padding
        ];
        for _ in 0..3 {
            block.extend_from_slice(&1u32.to_le_bytes()); // r0 r1 r2
        }
        block.extend_from_slice(b"hello");
        assert_eq!(21, block.len());

        let mut data = vec![0xFF, 0x00, 0x05]; // frame size 5
        data.extend_from_slice(&(block.len() as u16).to_be_bytes());
        data.extend_from_slice(&block);
        data.extend_from_slice(&[0xFF, 0x00, 0x00, 0x00, 0x00]); // terminator

        let mut bytes = vec![b'X', b'N', b'B', b'w', 4, 0x80];
        bytes.extend_from_slice(&(14 + data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&data);

        let xnb = Xnb::read(&mut bytes.as_slice()).unwrap();
        assert_eq!(b"hello", xnb.decompress().unwrap().as_ref());
    }

    /// A frame without the 0xFF prefix decompresses to the default 32 KiB.
    #[test]
    fn frames_without_a_size_prefix_use_the_default() {
        let payload: Vec<u8> = (0..0x8000u32).map(|i| (i % 251) as u8).collect();

        let mut block = vec![
            0x08, 0x30, // intel bit 0, block kind 3, length 0x8000
            0x00, 0x00,
        ];
        for _ in 0..3 {
            block.extend_from_slice(&1u32.to_le_bytes());
        }
        block.extend_from_slice(&payload);

        let mut data = (block.len() as u16).to_be_bytes().to_vec();
        data.extend_from_slice(&block);

        let mut bytes = vec![b'X', b'N', b'B', b'w', 4, 0x80];
        bytes.extend_from_slice(&(14 + data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);

        let xnb = Xnb::read(&mut bytes.as_slice()).unwrap();
        assert_eq!(payload, xnb.decompress().unwrap().as_ref());
    }

    #[test]
    fn content_parses_a_texture_through_the_reader_table() {
        let mut payload = vec![0x01]; // one type reader
        push_type_reader(&mut payload, TEXTURE_2D_READER);
        payload.push(0x00); // no shared assets
        payload.push(0x01); // primary asset type id 1
        payload.extend_from_slice(&1u32.to_le_bytes()); // color format
        payload.extend_from_slice(&0u32.to_le_bytes()); // width
        payload.extend_from_slice(&0u32.to_le_bytes()); // height
        payload.extend_from_slice(&0u32.to_le_bytes()); // no mips

        let bytes = uncompressed_xnb(&payload);
        let xnb = Xnb::read(&mut bytes.as_slice()).unwrap();
        let content = xnb.read_content().unwrap();
        assert_eq!(1, content.type_readers.len());
        assert!(content.shared.is_empty());
        match &content.primary {
            crate::asset::Asset::Texture2D(texture) => {
                assert_eq!(0, texture.width);
                assert_eq!(0, texture.height);
                assert!(texture.mips.is_empty());
            }
            other => panic!("expected a Texture2D, got {}", other.kind_name()),
        }
    }

    #[test]
    fn shared_assets_parse_like_the_primary() {
        let mut payload = vec![0x01];
        push_type_reader(&mut payload, STRING_READER);
        payload.push(0x01); // one shared asset
        payload.push(0x01);
        push_string(&mut payload, "primary");
        payload.push(0x01);
        push_string(&mut payload, "shared");

        let bytes = uncompressed_xnb(&payload);
        let xnb = Xnb::read(&mut bytes.as_slice()).unwrap();
        let content = xnb.read_content().unwrap();
        match &content.primary {
            crate::asset::Asset::String(value) => assert_eq!("primary", value),
            other => panic!("expected a String, got {}", other.kind_name()),
        }
        assert_eq!(1, content.shared.len());
        match &content.shared[0] {
            crate::asset::Asset::String(value) => assert_eq!("shared", value),
            other => panic!("expected a String, got {}", other.kind_name()),
        }
    }

    #[test]
    fn content_parses_a_level_model_graph() {
        let mut payload = vec![0x03];
        push_type_reader(&mut payload, "Magicka.ContentReaders.LevelModelReader");
        push_type_reader(&mut payload, "PolygonHead.Pipeline.BiTreeModelReader");
        push_type_reader(
            &mut payload,
            "Microsoft.Xna.Framework.Content.ListReader`1[[Microsoft.Xna.Framework.Vector3, Microsoft.Xna.Framework]]",
        );
        payload.push(0x00); // no shared assets
        payload.push(0x01); // primary: level model

        payload.push(0x02); // bi tree model asset
        payload.extend_from_slice(&0i32.to_le_bytes()); // no trees

        payload.extend_from_slice(&0i32.to_le_bytes()); // animated parts
        payload.extend_from_slice(&0i32.to_le_bytes()); // lights
        payload.extend_from_slice(&0i32.to_le_bytes()); // effect storages
        payload.extend_from_slice(&0i32.to_le_bytes()); // physics entities
        payload.extend_from_slice(&0i32.to_le_bytes()); // liquids
        payload.extend_from_slice(&0i32.to_le_bytes()); // force fields

        payload.push(0x01); // collision slot 0 present
        payload.push(0x03); // list-typed triangle mesh
        payload.extend_from_slice(&1u32.to_le_bytes());
        for value in [1.0f32, 2.0, 3.0] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        payload.extend_from_slice(&1u32.to_le_bytes());
        for index in [0u32, 0, 0] {
            payload.extend_from_slice(&index.to_le_bytes());
        }
        payload.extend_from_slice(&[0x00; 9]); // remaining slots empty
        payload.push(0x00); // no camera mesh

        payload.extend_from_slice(&0i32.to_le_bytes()); // trigger areas
        payload.extend_from_slice(&1i32.to_le_bytes()); // one locator
        push_string(&mut payload, "spawn");
        for i in 0..16 {
            payload.extend_from_slice(&(i as f32).to_le_bytes());
        }
        payload.extend_from_slice(&1.5f32.to_le_bytes());

        payload.extend_from_slice(&0u16.to_le_bytes()); // nav mesh vertices
        payload.extend_from_slice(&0u16.to_le_bytes()); // nav mesh triangles

        let bytes = uncompressed_xnb(&payload);
        let xnb = Xnb::read(&mut bytes.as_slice()).unwrap();
        let content = xnb.read_content().unwrap();
        match &content.primary {
            crate::asset::Asset::LevelModel(level) => {
                assert!(level.model.trees.is_empty());
                assert_eq!(1, level.collision_meshes.len());
                assert_eq!(1, level.collision_meshes[0].vertices.len());
                assert_eq!(1, level.collision_meshes[0].indices.len());
                assert!(level.camera_mesh.is_none());
                assert_eq!(1, level.locators.len());
                assert_eq!("spawn", level.locators[0].name);
                assert_eq!(1.5, level.locators[0].radius);
                assert!(level.nav_mesh.vertices.is_empty());
            }
            other => panic!("expected a LevelModel, got {}", other.kind_name()),
        }
    }

    #[test]
    fn missing_shared_assets_stop_at_end_of_stream() {
        let mut payload = vec![0x01];
        push_type_reader(&mut payload, STRING_READER);
        payload.push(0x02); // two declared, none stored
        payload.push(0x01);
        push_string(&mut payload, "primary");

        let bytes = uncompressed_xnb(&payload);
        let xnb = Xnb::read(&mut bytes.as_slice()).unwrap();
        let content = xnb.read_content().unwrap();
        assert!(content.shared.is_empty());
    }
}

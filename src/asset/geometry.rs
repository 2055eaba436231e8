use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use strum_macros::FromRepr;

use crate::io_ext::ContentReadExt;
use crate::XnbError;

type Result<T> = std::result::Result<T, XnbError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexDeclaration {
    pub elements: Vec<VertexElement>,
}

impl VertexDeclaration {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let num_elements = reader.read_u32::<LittleEndian>()? as usize;
        let mut elements = Vec::with_capacity(num_elements);
        for _ in 0..num_elements {
            elements.push(VertexElement::read(reader)?);
        }
        Ok(VertexDeclaration { elements })
    }

    pub fn stride(&self) -> usize {
        self.elements
            .iter()
            .map(|element| element.offset as usize + element.format.size())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexElement {
    pub stream: u16,
    pub offset: u16,
    pub format: ElementFormat,
    pub method: ElementMethod,
    pub usage: ElementUsage,
    pub usage_index: u8,
}

impl VertexElement {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let stream = reader.read_u16::<LittleEndian>()?;
        let offset = reader.read_u16::<LittleEndian>()?;
        let format = ElementFormat::read(reader)?;
        let method = ElementMethod::read(reader)?;
        let usage = ElementUsage::read(reader)?;
        let usage_index = reader.read_u8()?;
        Ok(VertexElement {
            stream,
            offset,
            format,
            method,
            usage,
            usage_index,
        })
    }
}

#[repr(u8)]
#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementFormat {
    Single,
    Vector2,
    Vector3,
    Vector4,
    Color,
    Byte4,
    Short2,
    Short4,
    Rgba32,
    NormalizedShort2,
    NormalizedShort4,
    Rgb32,
    Rgba64,
    UInt40,
    Normalized40,
    HalfVector2,
    HalfVector4,
}

impl ElementFormat {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let value = reader.read_u8()?;
        ElementFormat::from_repr(value)
            .ok_or(XnbError::UnknownVertexElementField("format", value))
    }

    pub fn size(self) -> usize {
        match self {
            ElementFormat::Single => 4,
            ElementFormat::Vector2 => 8,
            ElementFormat::Vector3 => 12,
            ElementFormat::Vector4 => 16,
            ElementFormat::Color => 4,
            ElementFormat::Byte4 => 4,
            ElementFormat::Short2 => 4,
            ElementFormat::Short4 => 8,
            ElementFormat::Rgba32 => 4,
            ElementFormat::NormalizedShort2 => 4,
            ElementFormat::NormalizedShort4 => 8,
            ElementFormat::Rgb32 => 4,
            ElementFormat::Rgba64 => 8,
            ElementFormat::UInt40 => 4,
            ElementFormat::Normalized40 => 4,
            ElementFormat::HalfVector2 => 4,
            ElementFormat::HalfVector4 => 8,
        }
    }
}

#[repr(u8)]
#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementMethod {
    Default,
    UV = 4,
    LookUp = 5,
    LookUpPresampled = 6,
}

impl ElementMethod {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let value = reader.read_u8()?;
        ElementMethod::from_repr(value)
            .ok_or(XnbError::UnknownVertexElementField("method", value))
    }
}

#[repr(u8)]
#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementUsage {
    Position,
    BlendWeight,
    BlendIndices,
    Normal,
    PointSize,
    TextureCoordinate,
    Tangent,
    Binormal,
    TessellateFactor,
    Color = 10,
    Fog,
    Depth,
    Sample,
}

impl ElementUsage {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let value = reader.read_u8()?;
        ElementUsage::from_repr(value)
            .ok_or(XnbError::UnknownVertexElementField("usage", value))
    }
}

#[derive(Debug)]
pub struct VertexBuffer {
    pub data: Vec<u8>,
}

impl VertexBuffer {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let size = reader.read_u32::<LittleEndian>()? as usize;
        let mut data = vec![0; size];
        reader.read_exact(&mut data)?;
        Ok(VertexBuffer { data })
    }
}

#[derive(Debug)]
pub struct IndexBuffer {
    pub is_16_bit: bool,
    pub data: Vec<u8>,
}

impl IndexBuffer {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let is_16_bit = reader.read_bool()?;
        let size = reader.read_u32::<LittleEndian>()? as usize;
        let mut data = vec![0; size];
        reader.read_exact(&mut data)?;
        Ok(IndexBuffer { is_16_bit, data })
    }

    pub fn index_count(&self) -> usize {
        let index_size = if self.is_16_bit { 2 } else { 4 };
        self.data.len() / index_size
    }
}

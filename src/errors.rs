use thiserror::Error;

#[derive(Error, Debug)]
pub enum XnbError {
    #[error("Not an XNB file.")]
    NotAnXnbFile,

    #[error("Unknown target platform '0x{0:02X}'.")]
    UnknownPlatform(u8),

    #[error("Unknown format version '{0}'.")]
    UnknownVersion(u8),

    #[error("Format version {0:?} is not supported by this reader.")]
    UnsupportedVersion(crate::xnb::Version),

    #[error("Decompressed payload is {actual} bytes, header declared {expected}.")]
    DecompressedSizeMismatch { expected: u32, actual: usize },

    #[error("No type reader is implemented for '{0}'.")]
    UnimplementedTypeReader(String),

    #[error("Asset type id {0} is out of range for {1} recorded type readers.")]
    TypeIdOutOfRange(i32, usize),

    #[error("Expected {expected} asset, found {found}.")]
    UnexpectedAssetType {
        expected: &'static str,
        found: String,
    },

    #[error("7-bit encoded integer ran past its maximum width.")]
    VarintTooLong,

    #[error("Unknown vertex element field '{0}' with value '{1}'.")]
    UnknownVertexElementField(&'static str, u8),

    #[error("Unknown light field '{0}' with value '{1}'.")]
    UnknownLightField(&'static str, u32),

    #[error("Unknown collision material '{0}'.")]
    UnknownCollisionMaterial(u8),

    #[error("Unknown movement properties '0b{0:08b}'.")]
    UnknownMovementProperties(u8),

    #[error(transparent)]
    Lzx(#[from] LzxError),

    #[error(transparent)]
    BadString(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum LzxError {
    #[error("Window size of 2^{0} is outside the supported range.")]
    InvalidWindowSize(u32),

    #[error("Invalid block kind '{0}'.")]
    InvalidBlock(u8),

    #[error("Compressed data ran past the declared block boundary (read to {actual}, boundary at {expected}).")]
    BufferOverrun { expected: usize, actual: usize },

    #[error("Failed to decode a Huffman symbol.")]
    ReadHuffSymFailed,

    #[error("Huffman code lengths overran the decode table.")]
    TableOverrun,

    #[error("Huffman code lengths do not describe a full decode table.")]
    ErroneousTable,

    #[error("Decoder reached an impossible state.")]
    SomethingBad,

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum TextureDecodeError {
    #[error("Pixel format '{0}' cannot be decoded to RGBA.")]
    UnsupportedTextureFormat(u32),

    #[error("Pixel data is {actual} bytes, the image needs at least {expected}.")]
    InputDataTooSmall { expected: usize, actual: usize },

    #[error("Mip level {0} does not exist ({1} levels recorded).")]
    NoSuchMipLevel(usize, usize),
}

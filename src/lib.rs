mod bc;
mod bit_buffer;
mod errors;
mod io_ext;
mod lzx;
mod texture_decoder;

pub mod asset;
pub mod xnb;

pub use io_ext::ContentReadExt;
pub use lzx::Lzx;
pub use texture_decoder::decode;
pub use texture_decoder::PixelFormat;
pub use xnb::{Header, Platform, Version, Xnb, XnbContent};

pub use asset::{Asset, TypeReader};

pub use errors::{LzxError, TextureDecodeError, XnbError};

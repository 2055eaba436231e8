use std::io::{Cursor, Seek, SeekFrom};

use crate::LzxError;

type Result<T> = std::result::Result<T, LzxError>;

/// 32-bit bit reservoir over a byte source. Bytes enter two at a time as a
/// little-endian pair injected below any bits already buffered; bits leave
/// from the high side. Refills past the end of the source read as zero so
/// table construction may look ahead of the final frame; the decoder checks
/// the source position against the declared block boundary itself.
pub struct BitBuffer<'a, 'b> {
    source: &'a mut Cursor<&'b [u8]>,
    buffer: u32,
    bits_left: u32,
}

impl<'a, 'b> BitBuffer<'a, 'b> {
    pub fn new(source: &'a mut Cursor<&'b [u8]>) -> Self {
        BitBuffer {
            source,
            buffer: 0,
            bits_left: 0,
        }
    }

    pub fn ensure(&mut self, bits: u32) {
        while self.bits_left < bits {
            let lo = self.next_byte() as u32;
            let hi = self.next_byte() as u32;
            self.buffer |= ((hi << 8) | lo) << (32 - 16 - self.bits_left);
            self.bits_left += 16;
        }
    }

    pub fn peek(&self, bits: u32) -> u32 {
        if bits == 0 {
            0
        } else {
            self.buffer >> (32 - bits)
        }
    }

    pub fn consume(&mut self, bits: u32) {
        self.buffer <<= bits;
        self.bits_left -= bits;
    }

    pub fn read_bits(&mut self, bits: u32) -> u32 {
        if bits == 0 {
            return 0;
        }
        self.ensure(bits);
        let value = self.peek(bits);
        self.consume(bits);
        value
    }

    pub fn clear(&mut self) {
        self.buffer = 0;
        self.bits_left = 0;
    }

    pub fn bits_left(&self) -> u32 {
        self.bits_left
    }

    /// The raw reservoir contents, high bit first. Used by the Huffman
    /// walker to follow code bits below the root-table width.
    pub fn raw(&self) -> u32 {
        self.buffer
    }

    pub fn position(&self) -> usize {
        self.source.position() as usize
    }

    /// Steps the source back over the last byte pair. Used to realign on an
    /// uncompressed block when the reservoir holds a full unread pair.
    pub fn rewind_pair(&mut self) -> Result<()> {
        self.source.seek(SeekFrom::Current(-2))?;
        Ok(())
    }

    pub fn source(&mut self) -> &mut Cursor<&'b [u8]> {
        self.source
    }

    fn next_byte(&mut self) -> u8 {
        let data = *self.source.get_ref();
        let position = self.source.position() as usize;
        if position < data.len() {
            self.source.set_position(position as u64 + 1);
            data[position]
        } else {
            self.source.set_position(position as u64 + 1);
            0
        }
    }
}

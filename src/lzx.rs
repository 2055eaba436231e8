use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::bit_buffer::BitBuffer;
use crate::LzxError;

type Result<T> = std::result::Result<T, LzxError>;

const MIN_MATCH: usize = 2;
const NUM_CHARS: usize = 256;
const PRETREE_NUM_ELEMENTS: usize = 20;
const ALIGNED_NUM_ELEMENTS: usize = 8;
const NUM_PRIMARY_LENGTHS: usize = 7;
const NUM_SECONDARY_LENGTHS: usize = 249;
const MAX_POSITION_SLOTS: usize = 50;

const PRETREE_MAXSYMBOLS: usize = PRETREE_NUM_ELEMENTS;
const PRETREE_TABLEBITS: u32 = 6;
const MAINTREE_MAXSYMBOLS: usize = NUM_CHARS + MAX_POSITION_SLOTS * 8;
const MAINTREE_TABLEBITS: u32 = 12;
const LENGTH_MAXSYMBOLS: usize = NUM_SECONDARY_LENGTHS + 1;
const LENGTH_TABLEBITS: u32 = 12;
const ALIGNED_MAXSYMBOLS: usize = ALIGNED_NUM_ELEMENTS;
const ALIGNED_TABLEBITS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Verbatim,
    Aligned,
    Uncompressed,
    Invalid,
}

/// Windowed LZX decompressor. One instance carries the sliding window, the
/// recent-offset queue, and the Huffman code lengths across every frame of a
/// single stream; feed frames in order through [`Lzx::decompress`].
///
/// Streams that request Intel E8 call translation are decoded without the
/// translation pass applied; a warning is logged once per stream when that
/// happens.
pub struct Lzx {
    window: Vec<u8>,
    window_posn: usize,
    r0: u32,
    r1: u32,
    r2: u32,
    main_elements: usize,
    header_read: bool,
    intel_filesize: i32,
    intel_started: bool,
    intel_warned: bool,
    block_kind: BlockKind,
    block_length: usize,
    block_remaining: usize,
    pretree_len: [u8; PRETREE_MAXSYMBOLS],
    pretree_table: Vec<u16>,
    maintree_len: Vec<u8>,
    maintree_table: Vec<u16>,
    length_len: Vec<u8>,
    length_table: Vec<u16>,
    aligned_len: [u8; ALIGNED_MAXSYMBOLS],
    aligned_table: Vec<u16>,
    extra_bits: [u8; MAX_POSITION_SLOTS + 2],
    position_base: [u32; MAX_POSITION_SLOTS + 1],
}

impl Lzx {
    pub fn new(window_bits: u32) -> Result<Self> {
        if !(15..=21).contains(&window_bits) {
            return Err(LzxError::InvalidWindowSize(window_bits));
        }

        let window_size = 1usize << window_bits;
        let posn_slots = match window_bits {
            20 => 42,
            21 => 50,
            bits => bits as usize * 2,
        };

        let mut extra_bits = [0u8; MAX_POSITION_SLOTS + 2];
        let mut width = 0u8;
        for slot in (0..=MAX_POSITION_SLOTS).step_by(2) {
            extra_bits[slot] = width;
            extra_bits[slot + 1] = width;
            if slot != 0 && width < 17 {
                width += 1;
            }
        }

        let mut position_base = [0u32; MAX_POSITION_SLOTS + 1];
        let mut base = 0u32;
        for slot in 0..=MAX_POSITION_SLOTS {
            position_base[slot] = base;
            base += 1 << extra_bits[slot];
        }

        Ok(Lzx {
            window: vec![0xDC; window_size],
            window_posn: 0,
            r0: 1,
            r1: 1,
            r2: 1,
            main_elements: NUM_CHARS + (posn_slots << 3),
            header_read: false,
            intel_filesize: 0,
            intel_started: false,
            intel_warned: false,
            block_kind: BlockKind::Invalid,
            block_length: 0,
            block_remaining: 0,
            pretree_len: [0; PRETREE_MAXSYMBOLS],
            pretree_table: vec![0; (1 << PRETREE_TABLEBITS) + PRETREE_MAXSYMBOLS * 2],
            maintree_len: vec![0; MAINTREE_MAXSYMBOLS],
            maintree_table: vec![0; (1 << MAINTREE_TABLEBITS) + MAINTREE_MAXSYMBOLS * 2],
            length_len: vec![0; LENGTH_MAXSYMBOLS],
            length_table: vec![0; (1 << LENGTH_TABLEBITS) + LENGTH_MAXSYMBOLS * 2],
            aligned_len: [0; ALIGNED_MAXSYMBOLS],
            aligned_table: vec![0; (1 << ALIGNED_TABLEBITS) + ALIGNED_MAXSYMBOLS * 2],
            extra_bits,
            position_base,
        })
    }

    /// Decodes one frame of `frame_size` bytes into `output`. `block_size`
    /// is the count of source bytes covering the frame; the caller advances
    /// the source to that boundary afterwards regardless of how much the
    /// decoder consumed, since trailing bits only pad the final reservoir
    /// refill.
    pub fn decompress(
        &mut self,
        source: &mut Cursor<&[u8]>,
        block_size: usize,
        output: &mut Vec<u8>,
        frame_size: usize,
    ) -> Result<()> {
        let end_position = source.position() as usize + block_size;
        let mut bits = BitBuffer::new(source);

        if !self.header_read {
            if bits.read_bits(1) != 0 {
                let hi = bits.read_bits(16);
                let lo = bits.read_bits(16);
                self.intel_filesize = ((hi << 16) | lo) as i32;
            }
            self.header_read = true;
        }

        let window_size = self.window.len();
        let mut window_posn = self.window_posn;
        let mut r0 = self.r0;
        let mut r1 = self.r1;
        let mut r2 = self.r2;
        let mut togo = frame_size as isize;

        while togo > 0 {
            if self.block_remaining == 0 {
                self.read_block_header(&mut bits)?;
            }

            // The table reads may pull at most one byte pair past the block
            // boundary; those bits only ever pad the reservoir.
            let position = bits.position();
            if position > end_position
                && (position > end_position + 2 || bits.bits_left() < 16)
            {
                return Err(LzxError::BufferOverrun {
                    expected: end_position,
                    actual: position,
                });
            }

            loop {
                let mut this_run = self.block_remaining as isize;
                if this_run == 0 || togo == 0 {
                    break;
                }
                if this_run > togo {
                    this_run = togo;
                }
                togo -= this_run;
                self.block_remaining -= this_run as usize;

                window_posn &= window_size - 1;
                if window_posn + this_run as usize > window_size {
                    return Err(LzxError::SomethingBad);
                }

                match self.block_kind {
                    BlockKind::Verbatim | BlockKind::Aligned => {
                        let aligned = self.block_kind == BlockKind::Aligned;
                        while this_run > 0 {
                            let element = read_huff_sym(
                                &mut bits,
                                &self.maintree_table,
                                &self.maintree_len,
                                MAINTREE_MAXSYMBOLS,
                                MAINTREE_TABLEBITS,
                            )?;

                            if element < NUM_CHARS {
                                self.window[window_posn] = element as u8;
                                window_posn += 1;
                                this_run -= 1;
                                continue;
                            }

                            let element = element - NUM_CHARS;

                            let mut match_length = element & NUM_PRIMARY_LENGTHS;
                            if match_length == NUM_PRIMARY_LENGTHS {
                                let footer = read_huff_sym(
                                    &mut bits,
                                    &self.length_table,
                                    &self.length_len,
                                    LENGTH_MAXSYMBOLS,
                                    LENGTH_TABLEBITS,
                                )?;
                                match_length += footer;
                            }
                            match_length += MIN_MATCH;

                            let match_offset = match element >> 3 {
                                0 => r0 as usize,
                                1 => {
                                    let offset = r1;
                                    r1 = r0;
                                    r0 = offset;
                                    offset as usize
                                }
                                2 => {
                                    let offset = r2;
                                    r2 = r0;
                                    r0 = offset;
                                    offset as usize
                                }
                                slot if aligned => {
                                    let extra = self.extra_bits[slot] as u32;
                                    let mut offset =
                                        self.position_base[slot] as usize - 2;
                                    if extra > 3 {
                                        offset +=
                                            (bits.read_bits(extra - 3) as usize) << 3;
                                        offset += read_huff_sym(
                                            &mut bits,
                                            &self.aligned_table,
                                            &self.aligned_len,
                                            ALIGNED_MAXSYMBOLS,
                                            ALIGNED_TABLEBITS,
                                        )?;
                                    } else if extra == 3 {
                                        offset += read_huff_sym(
                                            &mut bits,
                                            &self.aligned_table,
                                            &self.aligned_len,
                                            ALIGNED_MAXSYMBOLS,
                                            ALIGNED_TABLEBITS,
                                        )?;
                                    } else if extra > 0 {
                                        offset += bits.read_bits(extra) as usize;
                                    } else {
                                        offset = 1;
                                    }
                                    r2 = r1;
                                    r1 = r0;
                                    r0 = offset as u32;
                                    offset
                                }
                                slot => {
                                    let extra = self.extra_bits[slot] as u32;
                                    let verbatim = bits.read_bits(extra) as usize;
                                    let offset =
                                        self.position_base[slot] as usize - 2 + verbatim;
                                    r2 = r1;
                                    r1 = r0;
                                    r0 = offset as u32;
                                    offset
                                }
                            };

                            if match_offset > window_size {
                                return Err(LzxError::SomethingBad);
                            }

                            let mut rundest = window_posn;
                            let mut match_length = match_length;
                            this_run -= match_length as isize;

                            // Copy byte by byte so matches shorter than their
                            // offset repeat the emitted data.
                            let mut runsrc;
                            if window_posn >= match_offset {
                                runsrc = window_posn - match_offset;
                            } else {
                                runsrc = window_posn + window_size - match_offset;
                                let wrapped = match_offset - window_posn;
                                if wrapped < match_length {
                                    match_length -= wrapped;
                                    window_posn += wrapped;
                                    for _ in 0..wrapped {
                                        self.window[rundest] = self.window[runsrc];
                                        rundest += 1;
                                        runsrc += 1;
                                    }
                                    runsrc = 0;
                                }
                            }
                            if rundest + match_length > window_size
                                || runsrc + match_length > window_size
                            {
                                return Err(LzxError::SomethingBad);
                            }
                            window_posn += match_length;
                            for _ in 0..match_length {
                                self.window[rundest] = self.window[runsrc];
                                rundest += 1;
                                runsrc += 1;
                            }
                        }
                    }
                    BlockKind::Uncompressed => {
                        let run = this_run as usize;
                        let source = bits.source();
                        let position = source.position() as usize;
                        if position + run > end_position {
                            return Err(LzxError::BufferOverrun {
                                expected: end_position,
                                actual: position + run,
                            });
                        }
                        source.read_exact(&mut self.window[window_posn..window_posn + run])?;
                        window_posn += run;
                    }
                    BlockKind::Invalid => return Err(LzxError::SomethingBad),
                }
            }
        }

        if togo != 0 {
            return Err(LzxError::SomethingBad);
        }

        let frame_end = if window_posn == 0 {
            window_size
        } else {
            window_posn
        };
        if frame_end < frame_size {
            return Err(LzxError::SomethingBad);
        }
        output.extend_from_slice(&self.window[frame_end - frame_size..frame_end]);

        self.window_posn = window_posn;
        self.r0 = r0;
        self.r1 = r1;
        self.r2 = r2;

        if self.intel_started && self.intel_filesize != 0 && !self.intel_warned {
            log::warn!(
                "stream requested Intel E8 call translation (file size {}); emitting untranslated bytes",
                self.intel_filesize
            );
            self.intel_warned = true;
        }

        Ok(())
    }

    fn read_block_header(&mut self, bits: &mut BitBuffer<'_, '_>) -> Result<()> {
        if self.block_kind == BlockKind::Uncompressed {
            if self.block_length & 1 == 1 {
                bits.source().read_u8()?;
            }
            bits.clear();
        }

        let kind = bits.read_bits(3);
        let hi = bits.read_bits(16) as usize;
        let lo = bits.read_bits(8) as usize;
        self.block_length = (hi << 8) | lo;
        self.block_remaining = self.block_length;

        self.block_kind = match kind {
            1 => BlockKind::Verbatim,
            2 => BlockKind::Aligned,
            3 => BlockKind::Uncompressed,
            other => return Err(LzxError::InvalidBlock(other as u8)),
        };

        match self.block_kind {
            BlockKind::Aligned => {
                for length in self.aligned_len.iter_mut() {
                    *length = bits.read_bits(3) as u8;
                }
                make_decode_table(
                    ALIGNED_MAXSYMBOLS,
                    ALIGNED_TABLEBITS,
                    &self.aligned_len,
                    &mut self.aligned_table,
                )?;
                // the rest of the header matches the verbatim layout
                self.read_tree_headers(bits)?;
            }
            BlockKind::Verbatim => {
                self.read_tree_headers(bits)?;
            }
            BlockKind::Uncompressed => {
                self.intel_started = true;
                bits.ensure(16);
                if bits.bits_left() > 16 {
                    bits.rewind_pair()?;
                }
                let source = bits.source();
                self.r0 = source.read_u32::<LittleEndian>()?;
                self.r1 = source.read_u32::<LittleEndian>()?;
                self.r2 = source.read_u32::<LittleEndian>()?;
            }
            BlockKind::Invalid => unreachable!(),
        }

        Ok(())
    }

    fn read_tree_headers(&mut self, bits: &mut BitBuffer<'_, '_>) -> Result<()> {
        read_lengths(
            bits,
            &mut self.pretree_len,
            &mut self.pretree_table,
            &mut self.maintree_len,
            0,
            NUM_CHARS,
        )?;
        read_lengths(
            bits,
            &mut self.pretree_len,
            &mut self.pretree_table,
            &mut self.maintree_len,
            NUM_CHARS,
            self.main_elements,
        )?;
        make_decode_table(
            MAINTREE_MAXSYMBOLS,
            MAINTREE_TABLEBITS,
            &self.maintree_len,
            &mut self.maintree_table,
        )?;
        if self.maintree_len[0xE8] != 0 {
            self.intel_started = true;
        }

        read_lengths(
            bits,
            &mut self.pretree_len,
            &mut self.pretree_table,
            &mut self.length_len,
            0,
            NUM_SECONDARY_LENGTHS,
        )?;
        make_decode_table(
            LENGTH_MAXSYMBOLS,
            LENGTH_TABLEBITS,
            &self.length_len,
            &mut self.length_table,
        )?;

        Ok(())
    }
}

/// Builds a direct-lookup decode table rooted at `nbits` bits, with codes
/// longer than the root chained through pairs of entries allocated past the
/// root region.
fn make_decode_table(
    nsyms: usize,
    nbits: u32,
    lengths: &[u8],
    table: &mut [u16],
) -> Result<()> {
    let table_mask = 1usize << nbits;
    let mut bit_mask = table_mask >> 1;
    // pair pointers must sort above every symbol id to be distinguishable
    let mut next_symbol = bit_mask.max(nsyms);
    let mut pos = 0usize;

    // codes no wider than the root map directly
    for bit_num in 1..=nbits {
        for sym in 0..nsyms {
            if lengths[sym] as u32 != bit_num {
                continue;
            }
            let leaf = pos;
            pos += bit_mask;
            if pos > table_mask {
                return Err(LzxError::TableOverrun);
            }
            for entry in table[leaf..leaf + bit_mask].iter_mut() {
                *entry = sym as u16;
            }
        }
        bit_mask >>= 1;
    }

    if pos == table_mask {
        return Ok(());
    }

    // longer codes chain through linked pairs hanging off still-empty roots
    for entry in table[pos..table_mask].iter_mut() {
        *entry = 0;
    }

    let mut pos = pos << 16;
    let table_mask = table_mask << 16;
    let mut bit_mask = 1usize << 15;

    for bit_num in nbits + 1..=16 {
        for sym in 0..nsyms {
            if lengths[sym] as u32 != bit_num {
                continue;
            }
            let mut leaf = pos >> 16;
            for fill in 0..bit_num - nbits {
                if table[leaf] == 0 {
                    if (next_symbol << 1) + 1 >= table.len() {
                        return Err(LzxError::TableOverrun);
                    }
                    table[next_symbol << 1] = 0;
                    table[(next_symbol << 1) + 1] = 0;
                    table[leaf] = next_symbol as u16;
                    next_symbol += 1;
                }
                leaf = (table[leaf] as usize) << 1;
                if (pos >> (15 - fill)) & 1 != 0 {
                    leaf += 1;
                }
                if leaf >= table.len() {
                    return Err(LzxError::TableOverrun);
                }
            }
            table[leaf] = sym as u16;
            pos += bit_mask;
            if pos > table_mask {
                return Err(LzxError::TableOverrun);
            }
        }
        bit_mask >>= 1;
    }

    if pos == table_mask {
        return Ok(());
    }

    // a tree with no codes at all is legal; anything else is corrupt
    if lengths[..nsyms].iter().all(|&length| length == 0) {
        Ok(())
    } else {
        Err(LzxError::ErroneousTable)
    }
}

fn read_huff_sym(
    bits: &mut BitBuffer<'_, '_>,
    table: &[u16],
    lengths: &[u8],
    nsyms: usize,
    nbits: u32,
) -> Result<usize> {
    bits.ensure(16);
    let mut sym = table[bits.peek(nbits) as usize] as usize;
    if sym >= nsyms {
        let mut probe = 1u32 << (32 - nbits);
        loop {
            probe >>= 1;
            if probe == 0 {
                return Err(LzxError::ReadHuffSymFailed);
            }
            sym <<= 1;
            if bits.raw() & probe != 0 {
                sym |= 1;
            }
            if sym >= table.len() {
                return Err(LzxError::ReadHuffSymFailed);
            }
            sym = table[sym] as usize;
            if sym < nsyms {
                break;
            }
        }
    }
    bits.consume(lengths[sym] as u32);
    Ok(sym)
}

/// Reads code lengths for `lens[first..last)` as deltas against the previous
/// block's lengths: a 20-entry pre-tree of 4-bit lengths, then pre-tree
/// symbols where 0..=16 adjust one length and 17/18/19 encode runs.
fn read_lengths(
    bits: &mut BitBuffer<'_, '_>,
    pretree_len: &mut [u8; PRETREE_MAXSYMBOLS],
    pretree_table: &mut [u16],
    lens: &mut [u8],
    first: usize,
    last: usize,
) -> Result<()> {
    for length in pretree_len.iter_mut() {
        *length = bits.read_bits(4) as u8;
    }
    make_decode_table(PRETREE_MAXSYMBOLS, PRETREE_TABLEBITS, pretree_len, pretree_table)?;

    let mut x = first;
    while x < last {
        let symbol = read_huff_sym(bits, pretree_table, pretree_len, PRETREE_MAXSYMBOLS, PRETREE_TABLEBITS)?;
        match symbol {
            17 => {
                let zeros = bits.read_bits(4) as usize + 4;
                if x + zeros > lens.len() {
                    return Err(LzxError::ErroneousTable);
                }
                for length in lens[x..x + zeros].iter_mut() {
                    *length = 0;
                }
                x += zeros;
            }
            18 => {
                let zeros = bits.read_bits(5) as usize + 20;
                if x + zeros > lens.len() {
                    return Err(LzxError::ErroneousTable);
                }
                for length in lens[x..x + zeros].iter_mut() {
                    *length = 0;
                }
                x += zeros;
            }
            19 => {
                let count = bits.read_bits(1) as usize + 4;
                let symbol = read_huff_sym(bits, pretree_table, pretree_len, PRETREE_MAXSYMBOLS, PRETREE_TABLEBITS)?;
                let mut value = lens[x] as i32 - symbol as i32;
                if value < 0 {
                    value += 17;
                }
                if x + count > lens.len() {
                    return Err(LzxError::ErroneousTable);
                }
                for length in lens[x..x + count].iter_mut() {
                    *length = value as u8;
                }
                x += count;
            }
            symbol => {
                let mut value = lens[x] as i32 - symbol as i32;
                if value < 0 {
                    value += 17;
                }
                lens[x] = value as u8;
                x += 1;
            }
        }
    }
    Ok(())
}

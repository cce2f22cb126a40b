//! Typed data access: chunked reads and writes against the controller's
//! file-based data model.
//!
//! A single PCCC transfer is bounded by the processor family and the file
//! type, so every operation here is a loop of bounded raw transfers whose
//! address block advances as bytes stream in. Values are decoded per file
//! type: 16-bit words for integer-like files, IEEE-754 singles for floats,
//! 32-bit words for longs, byte-pair-swapped text for strings, and opaque
//! element-sized blocks for message, PID, and limit-switch files.

use crate::address::{Address, FileType};
use crate::client::{CMD_PROTECTED, Client};
use crate::error::{Df1Error, Result};
use crate::processor::ProcessorFamily;

/// Protected typed logical read, two address fields.
const FNC_READ_2: u8 = 0xA1;
/// Protected typed logical read, three address fields.
const FNC_READ_3: u8 = 0xA2;
/// Protected typed logical write.
const FNC_WRITE: u8 = 0xAA;
/// Protected typed logical write with mask (bit write).
const FNC_WRITE_BITS: u8 = 0xAB;

/// File-type code of the data-monitor file, whose elements are 40 bytes.
const DATA_MONITOR: u8 = 0xA4;

/// Longest string payload an ST element can carry.
const MAX_STRING_LEN: usize = 82;

/// Per-file-type ceiling on one read transfer, in bytes.
fn type_read_cap(type_code: u8) -> usize {
    match type_code {
        0x8D => 168,          // two string elements
        0x86 | 0x87 => 234,   // timers/counters, a multiple of six
        DATA_MONITOR => 120,
        _ => 236,
    }
}

/// Effective read cap: the family ceiling bounds every type.
pub(crate) fn read_cap(type_code: u8, family: ProcessorFamily) -> usize {
    family.read_cap().min(type_read_cap(type_code))
}

/// Ceiling on one write transfer, in bytes.
fn write_cap(type_code: u8) -> usize {
    if type_code >= 0xA1 { 120 } else { 164 }
}

/// Emits an element or sub-element field: one byte, or the 0xFF escape
/// followed by the absolute value little-endian once it reaches 255.
pub(crate) fn push_address(block: &mut Vec<u8>, value: u16) {
    if value >= 0xFF {
        block.push(0xFF);
        block.extend_from_slice(&value.to_le_bytes());
    } else {
        block.push(value as u8);
    }
}

/// Builds the logical address block shared by reads and writes.
pub(crate) fn logical_block(
    size: usize,
    file_number: u8,
    type_code: u8,
    element: u16,
    sub_element: u16,
    with_sub: bool,
) -> Vec<u8> {
    let mut block = vec![size as u8, file_number, type_code];
    push_address(&mut block, element);
    if with_sub {
        push_address(&mut block, sub_element);
    }
    block
}

/// Swaps adjacent byte pairs in place. The transform is its own inverse.
pub(crate) fn swap_pairs(bytes: &mut [u8]) {
    for pair in bytes.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Encodes a string into its 84-byte element: 16-bit length, then the text
/// with a trailing NUL, padded to even length, byte pairs swapped.
pub(crate) fn encode_string(text: &str) -> Result<[u8; 84]> {
    let bytes = text.as_bytes();
    if bytes.len() > MAX_STRING_LEN {
        return Err(Df1Error::InvalidValue(format!(
            "string of {} bytes exceeds the {MAX_STRING_LEN}-byte element",
            bytes.len()
        )));
    }
    let mut data = bytes.to_vec();
    data.push(0);
    if data.len() % 2 == 1 {
        data.push(0);
    }
    swap_pairs(&mut data);
    let mut block = [0u8; 84];
    block[..2].copy_from_slice(&(bytes.len() as u16).to_le_bytes());
    block[2..2 + data.len()].copy_from_slice(&data);
    Ok(block)
}

/// Decodes an 84-byte string element: unswap, clamp the stored length, cut
/// at the first NUL.
pub(crate) fn decode_string(block: &[u8]) -> String {
    if block.len() < 2 {
        return String::new();
    }
    let len = usize::from(u16::from_le_bytes([block[0], block[1]])).min(MAX_STRING_LEN);
    let mut data = block.get(2..).unwrap_or(&[]).to_vec();
    swap_pairs(&mut data);
    data.truncate(len);
    if let Some(nul) = data.iter().position(|byte| *byte == 0) {
        data.truncate(nul);
    }
    String::from_utf8_lossy(&data).into_owned()
}

/// Retries a chunk exchange: transport failures surface immediately, any
/// other error gets two more attempts.
fn retry_chunk<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut last = None;
    for _attempt in 0..3 {
        match op() {
            Ok(value) => return Ok(value),
            Err(error @ Df1Error::Transport(_)) => return Err(error),
            Err(error) => last = Some(error),
        }
    }
    Err(last.unwrap_or(Df1Error::NoResponse))
}

/// Values read through the generic dispatch, shaped by the file type.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValues {
    /// Bit-addressed reads.
    Bits(Vec<bool>),
    /// 16-bit words (N, B, S, A, I, O, and timer/counter fields).
    Integers(Vec<i16>),
    /// 32-bit words (L).
    Longs(Vec<i32>),
    /// IEEE-754 singles (F).
    Floats(Vec<f32>),
    /// String elements (ST).
    Strings(Vec<String>),
    /// Opaque element-sized blocks (MG, PD, PLS).
    Raw(Vec<Vec<u8>>),
}

impl Client {
    /// Chunked raw read of `total` bytes starting at the given logical
    /// address, each transfer bounded by `cap`.
    pub(crate) fn read_raw(
        &self,
        file_number: u8,
        type_code: u8,
        mut element: u16,
        mut sub_element: u16,
        total: usize,
        cap: usize,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(total);
        while out.len() < total {
            let chunk = cap.min(total - out.len());
            let func = if sub_element == 0 { FNC_READ_2 } else { FNC_READ_3 };
            let block = logical_block(
                chunk,
                file_number,
                type_code,
                element,
                sub_element,
                func == FNC_READ_3,
            );
            let body = retry_chunk(|| self.exchange(CMD_PROTECTED, func, &block))?;
            let data = self.reply_payload(&body);
            let take = data.len().min(chunk);
            if take == 0 {
                return Err(Df1Error::NoData);
            }
            out.extend_from_slice(&data[..take]);
            // The stream continues at the next unread byte: data-monitor
            // files advance whole 40-byte elements, everything else walks
            // the word-granular sub-element axis.
            if type_code == DATA_MONITOR {
                element += (take / 40) as u16;
            } else {
                sub_element += (take / 2) as u16;
            }
        }
        out.truncate(total);
        Ok(out)
    }

    /// Chunked raw write of `data` to the given logical address.
    /// `honor_async` selects whether the configured async mode may skip
    /// waiting for replies; internal sequences always wait.
    pub(crate) fn write_raw(
        &self,
        file_number: u8,
        type_code: u8,
        mut element: u16,
        mut sub_element: u16,
        data: &[u8],
        honor_async: bool,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Df1Error::EmptyData);
        }
        let cap = write_cap(type_code);
        let mut offset = 0;
        while offset < data.len() {
            let chunk = cap.min(data.len() - offset);
            let mut request =
                logical_block(chunk, file_number, type_code, element, sub_element, true);
            request.extend_from_slice(&data[offset..offset + chunk]);
            retry_chunk(|| {
                if honor_async {
                    self.exchange_write(CMD_PROTECTED, FNC_WRITE, &request)
                } else {
                    self.exchange(CMD_PROTECTED, FNC_WRITE, &request)
                }
            })?;
            offset += chunk;
            if type_code == DATA_MONITOR {
                element += (chunk / 40) as u16;
            } else {
                sub_element += (chunk / 2) as u16;
            }
        }
        Ok(())
    }

    /// Reads `count` 16-bit words. For timers and counters with a field
    /// selector the reads walk successive elements at the same sub-element
    /// (the 6-byte element stride); everything else is one contiguous word
    /// stream.
    pub fn read_integers(&self, address: &str, count: u16) -> Result<Vec<i16>> {
        let addr = Address::parse(address)?;
        self.read_words(&addr, count)
    }

    fn read_words(&self, addr: &Address, count: u16) -> Result<Vec<i16>> {
        if count == 0 {
            return Err(Df1Error::EmptyData);
        }
        let family = self.processor_type()?;
        let type_code = addr.file_type().code();
        let structured = matches!(addr.file_type(), FileType::Timer | FileType::Counter)
            && addr.sub_element() != 0;
        if structured {
            let mut out = Vec::with_capacity(usize::from(count));
            for index in 0..count {
                let bytes = self.read_raw(
                    addr.file_number(),
                    type_code,
                    addr.element() + index,
                    addr.sub_element(),
                    2,
                    2,
                )?;
                out.push(i16::from_le_bytes([bytes[0], bytes[1]]));
            }
            return Ok(out);
        }
        let bytes = self.read_raw(
            addr.file_number(),
            type_code,
            addr.element(),
            addr.sub_element(),
            usize::from(count) * 2,
            read_cap(type_code, family),
        )?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Reads `count` bits starting at the addressed bit, advancing
    /// bit-by-bit across words.
    pub fn read_bits(&self, address: &str, count: u16) -> Result<Vec<bool>> {
        let addr = Address::parse(address)?;
        let Some(first_bit) = addr.bit() else {
            return Err(Df1Error::InvalidAddress(address.to_string()));
        };
        if count == 0 {
            return Err(Df1Error::EmptyData);
        }
        let family = self.processor_type()?;
        let start = usize::from(first_bit);
        let words = (start + usize::from(count)).div_ceil(16);
        let type_code = addr.file_type().code();
        let bytes = self.read_raw(
            addr.file_number(),
            type_code,
            addr.element(),
            addr.sub_element(),
            words * 2,
            read_cap(type_code, family),
        )?;
        let mut out = Vec::with_capacity(usize::from(count));
        for index in 0..usize::from(count) {
            let bit = start + index;
            let word = u16::from_le_bytes([bytes[bit / 16 * 2], bytes[bit / 16 * 2 + 1]]);
            out.push(word & (1 << (bit % 16)) != 0);
        }
        Ok(out)
    }

    /// Reads `count` IEEE-754 singles from an F file.
    pub fn read_floats(&self, address: &str, count: u16) -> Result<Vec<f32>> {
        let bytes = self.read_quads(address, count)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|quad| f32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
            .collect())
    }

    /// Reads `count` 32-bit integers from an L file.
    pub fn read_longs(&self, address: &str, count: u16) -> Result<Vec<i32>> {
        let bytes = self.read_quads(address, count)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|quad| i32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
            .collect())
    }

    fn read_quads(&self, address: &str, count: u16) -> Result<Vec<u8>> {
        let addr = Address::parse(address)?;
        if count == 0 {
            return Err(Df1Error::EmptyData);
        }
        let family = self.processor_type()?;
        let type_code = addr.file_type().code();
        self.read_raw(
            addr.file_number(),
            type_code,
            addr.element(),
            addr.sub_element(),
            usize::from(count) * 4,
            read_cap(type_code, family),
        )
    }

    /// Reads `count` string elements from an ST file.
    pub fn read_strings(&self, address: &str, count: u16) -> Result<Vec<String>> {
        let blocks = self.read_blocks(address, count, FileType::Str)?;
        Ok(blocks.iter().map(|block| decode_string(block)).collect())
    }

    /// Reads `count` opaque elements (MG, PD, PLS).
    pub fn read_elements(&self, address: &str, count: u16) -> Result<Vec<Vec<u8>>> {
        let addr = Address::parse(address)?;
        self.read_blocks_at(&addr, count)
    }

    fn read_blocks(&self, address: &str, count: u16, expect: FileType) -> Result<Vec<Vec<u8>>> {
        let addr = Address::parse(address)?;
        if addr.file_type() != expect {
            return Err(Df1Error::InvalidAddress(address.to_string()));
        }
        self.read_blocks_at(&addr, count)
    }

    fn read_blocks_at(&self, addr: &Address, count: u16) -> Result<Vec<Vec<u8>>> {
        if count == 0 {
            return Err(Df1Error::EmptyData);
        }
        let family = self.processor_type()?;
        let width = addr.file_type().bytes_per_element();
        let type_code = addr.file_type().code();
        let bytes = self.read_raw(
            addr.file_number(),
            type_code,
            addr.element(),
            addr.sub_element(),
            usize::from(count) * width,
            read_cap(type_code, family),
        )?;
        Ok(bytes.chunks(width).map(<[u8]>::to_vec).collect())
    }

    /// Generic read dispatched by the parsed file type; bit-suffixed
    /// addresses come back as booleans.
    pub fn read_values(&self, address: &str, count: u16) -> Result<TagValues> {
        let addr = Address::parse(address)?;
        if addr.bit().is_some() {
            return self.read_bits(address, count).map(TagValues::Bits);
        }
        match addr.file_type() {
            FileType::Float => self.read_floats(address, count).map(TagValues::Floats),
            FileType::Long => self.read_longs(address, count).map(TagValues::Longs),
            FileType::Str => self.read_strings(address, count).map(TagValues::Strings),
            FileType::Message | FileType::Pid | FileType::Pls => {
                self.read_elements(address, count).map(TagValues::Raw)
            }
            _ => self.read_integers(address, count).map(TagValues::Integers),
        }
    }

    /// Writes 16-bit words starting at the addressed element.
    pub fn write_integers(&self, address: &str, values: &[i16]) -> Result<()> {
        let addr = Address::parse(address)?;
        let data: Vec<u8> = values
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        self.write_raw(
            addr.file_number(),
            addr.file_type().code(),
            addr.element(),
            addr.sub_element(),
            &data,
            true,
        )
    }

    /// Writes IEEE-754 singles.
    pub fn write_floats(&self, address: &str, values: &[f32]) -> Result<()> {
        let addr = Address::parse(address)?;
        let data: Vec<u8> = values
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        self.write_raw(
            addr.file_number(),
            addr.file_type().code(),
            addr.element(),
            addr.sub_element(),
            &data,
            true,
        )
    }

    /// Writes 32-bit integers.
    pub fn write_longs(&self, address: &str, values: &[i32]) -> Result<()> {
        let addr = Address::parse(address)?;
        let data: Vec<u8> = values
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        self.write_raw(
            addr.file_number(),
            addr.file_type().code(),
            addr.element(),
            addr.sub_element(),
            &data,
            true,
        )
    }

    /// Writes string elements, one element per value.
    pub fn write_strings(&self, address: &str, values: &[&str]) -> Result<()> {
        let addr = Address::parse(address)?;
        if values.is_empty() {
            return Err(Df1Error::EmptyData);
        }
        for (index, value) in values.iter().enumerate() {
            let block = encode_string(value)?;
            self.write_raw(
                addr.file_number(),
                addr.file_type().code(),
                addr.element() + index as u16,
                addr.sub_element(),
                &block,
                true,
            )?;
        }
        Ok(())
    }

    /// Writes bits through masked writes: each touched word carries a
    /// set-mask naming the bits and a value-mask with their new states.
    pub fn write_bits(&self, address: &str, values: &[bool]) -> Result<()> {
        let addr = Address::parse(address)?;
        let Some(first_bit) = addr.bit() else {
            return Err(Df1Error::InvalidAddress(address.to_string()));
        };
        if values.is_empty() {
            return Err(Df1Error::EmptyData);
        }
        let start = usize::from(first_bit);
        let last_word = (start + values.len() - 1) / 16;
        for word_index in 0..=last_word {
            let mut mask = 0u16;
            let mut word_value = 0u16;
            for (offset, &on) in values.iter().enumerate() {
                let bit = start + offset;
                if bit / 16 == word_index {
                    mask |= 1 << (bit % 16);
                    if on {
                        word_value |= 1 << (bit % 16);
                    }
                }
            }
            if mask == 0 {
                continue;
            }
            let mut request = logical_block(
                2,
                addr.file_number(),
                addr.file_type().code(),
                addr.element() + word_index as u16,
                addr.sub_element(),
                addr.sub_element() != 0,
            );
            request.extend_from_slice(&mask.to_le_bytes());
            request.extend_from_slice(&word_value.to_le_bytes());
            retry_chunk(|| self.exchange_write(CMD_PROTECTED, FNC_WRITE_BITS, &request))?;
        }
        Ok(())
    }

    /// Generic write from textual values, dispatched and range-checked by
    /// the parsed file type.
    pub fn write_values(&self, address: &str, values: &[&str]) -> Result<()> {
        let addr = Address::parse(address)?;
        if values.is_empty() {
            return Err(Df1Error::EmptyData);
        }
        if addr.bit().is_some() {
            let bits = values
                .iter()
                .map(|value| parse_bool(value))
                .collect::<Result<Vec<bool>>>()?;
            return self.write_bits(address, &bits);
        }
        match addr.file_type() {
            FileType::Float => {
                let floats = parse_all::<f32>(values)?;
                self.write_floats(address, &floats)
            }
            FileType::Long => {
                let longs = parse_all::<i32>(values)?;
                self.write_longs(address, &longs)
            }
            FileType::Str => self.write_strings(address, values),
            FileType::Message | FileType::Pid | FileType::Pls => {
                Err(Df1Error::Unsupported("writes to structured block files"))
            }
            _ => {
                let words = parse_all::<i16>(values)?;
                self.write_integers(address, &words)
            }
        }
    }
}

fn parse_all<T: std::str::FromStr>(values: &[&str]) -> Result<Vec<T>> {
    values
        .iter()
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| Df1Error::InvalidValue((*value).to_string()))
        })
        .collect()
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        other => Err(Df1Error::InvalidValue(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_fields_escape_at_255() {
        let mut block = Vec::new();
        push_address(&mut block, 254);
        assert_eq!(block, vec![254]);
        block.clear();
        push_address(&mut block, 255);
        assert_eq!(block, vec![0xFF, 0xFF, 0x00]);
        block.clear();
        push_address(&mut block, 300);
        assert_eq!(block, vec![0xFF, 0x2C, 0x01]);
    }

    #[test]
    fn logical_block_layout() {
        let block = logical_block(0xEC, 7, 0x89, 0, 0, false);
        assert_eq!(block, vec![0xEC, 0x07, 0x89, 0x00]);
        let block = logical_block(2, 4, 0x86, 5, 2, true);
        assert_eq!(block, vec![0x02, 0x04, 0x86, 0x05, 0x02]);
    }

    #[test]
    fn extended_element_uses_sentinel_and_absolute_value() {
        let block = logical_block(10, 7, 0x89, 300, 0, false);
        assert_eq!(&block[3..], &[0xFF, 0x2C, 0x01]);
    }

    #[test]
    fn pair_swap_is_an_involution() {
        let mut bytes = vec![1u8, 2, 3, 4, 5];
        swap_pairs(&mut bytes);
        assert_eq!(bytes, vec![2, 1, 4, 3, 5]);
        swap_pairs(&mut bytes);
        assert_eq!(bytes, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn string_element_wire_layout() {
        let block = encode_string("ABC").expect("fits");
        assert_eq!(&block[..2], &[3, 0]);
        assert_eq!(&block[2..6], &[b'B', b'A', 0x00, b'C']);
        assert!(block[6..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn string_round_trips() {
        for text in ["", "A", "AB", "ABC", "hello world", "exactly-even!"] {
            let block = encode_string(text).expect("fits");
            assert_eq!(decode_string(&block), text, "{text}");
        }
    }

    #[test]
    fn oversized_string_is_rejected() {
        let text = "x".repeat(83);
        assert!(matches!(
            encode_string(&text),
            Err(Df1Error::InvalidValue(_))
        ));
        let text = "x".repeat(82);
        assert!(encode_string(&text).is_ok());
    }

    #[test]
    fn decode_clamps_corrupt_lengths() {
        let mut block = [0u8; 84];
        block[0] = 0xFF;
        block[1] = 0x7F;
        block[2] = b'B';
        block[3] = b'A';
        assert_eq!(decode_string(&block), "AB");
    }

    #[test]
    fn read_caps_respect_family_and_type() {
        assert_eq!(read_cap(0x89, ProcessorFamily::Slc503), 236);
        assert_eq!(read_cap(0x8D, ProcessorFamily::Slc503), 168);
        assert_eq!(read_cap(0x86, ProcessorFamily::Slc505), 234);
        assert_eq!(read_cap(DATA_MONITOR, ProcessorFamily::Slc503), 120);
        assert_eq!(read_cap(0x89, ProcessorFamily::Slc502), 0x50);
        assert_eq!(read_cap(0x8D, ProcessorFamily::Slc502), 0x50);
    }

    #[test]
    fn write_caps_shrink_for_high_type_codes() {
        assert_eq!(write_cap(0x89), 164);
        assert_eq!(write_cap(0xA1), 120);
        assert_eq!(write_cap(DATA_MONITOR), 120);
    }
}

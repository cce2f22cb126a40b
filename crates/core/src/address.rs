//! Textual data-table addresses.
//!
//! Four forms are accepted, case-insensitively:
//!
//! 1. `N7:0`, `F8:3/0`, `ST9:2` — letters, file number, element, optional
//!    `/bit`.
//! 2. `B3/26` — word/bit shorthand for B and N files; the running bit index
//!    is split into element (`bit >> 4`) and bit (`bit mod 16`).
//! 3. `T4:5.ACC` — timer/counter mnemonic selecting a fixed sub-element.
//! 4. `I:2.1/3` — I, O, and S shorthand without a file number (I is file 1,
//!    O file 0, S file 2), with optional numeric sub-element and bit.
//!
//! The tokenizer is hand-written; the grammar is small enough that a regex
//! stack would be heavier than the code it replaces.

use std::str::FromStr;

use crate::error::{Df1Error, Result};

/// Data-table file types, keyed by their address letters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
    /// `O` — outputs.
    Output,
    /// `I` — inputs.
    Input,
    /// `S` — status.
    Status,
    /// `B` — bits.
    Bit,
    /// `T` — timers.
    Timer,
    /// `C` — counters.
    Counter,
    /// `R` — control structures.
    Control,
    /// `N` — 16-bit integers.
    Integer,
    /// `F` — 32-bit floats.
    Float,
    /// `A` — ASCII words.
    Ascii,
    /// `L` — 32-bit integers.
    Long,
    /// `ST` — 82-character strings.
    Str,
    /// `MG` — message blocks.
    Message,
    /// `PD` — PID blocks.
    Pid,
    /// `PLS` — programmable limit switch blocks.
    Pls,
}

impl FileType {
    /// Resolves address letters to a file type.
    #[must_use]
    pub fn from_letters(letters: &str) -> Option<Self> {
        Some(match letters {
            "O" => FileType::Output,
            "I" => FileType::Input,
            "S" => FileType::Status,
            "B" => FileType::Bit,
            "T" => FileType::Timer,
            "C" => FileType::Counter,
            "R" => FileType::Control,
            "N" => FileType::Integer,
            "F" => FileType::Float,
            "A" => FileType::Ascii,
            "L" => FileType::Long,
            "ST" => FileType::Str,
            "MG" => FileType::Message,
            "PD" => FileType::Pid,
            "PLS" => FileType::Pls,
            _ => return None,
        })
    }

    /// Resolves a directory or wire code to a file type. The I/O files have
    /// two codes each: the logical-by-slot form and the plain form.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x82 | 0x8B => FileType::Output,
            0x83 | 0x8C => FileType::Input,
            0x84 => FileType::Status,
            0x85 => FileType::Bit,
            0x86 => FileType::Timer,
            0x87 => FileType::Counter,
            0x88 => FileType::Control,
            0x89 => FileType::Integer,
            0x8A => FileType::Float,
            0x8D => FileType::Str,
            0x8E => FileType::Ascii,
            0x91 => FileType::Long,
            0x92 => FileType::Message,
            0x93 => FileType::Pid,
            0x94 => FileType::Pls,
            _ => return None,
        })
    }

    /// The file-type byte emitted in PCCC address blocks.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            FileType::Output => 0x8B,
            FileType::Input => 0x8C,
            FileType::Status => 0x84,
            FileType::Bit => 0x85,
            FileType::Timer => 0x86,
            FileType::Counter => 0x87,
            FileType::Control => 0x88,
            FileType::Integer => 0x89,
            FileType::Float => 0x8A,
            FileType::Str => 0x8D,
            FileType::Ascii => 0x8E,
            FileType::Long => 0x91,
            FileType::Message => 0x92,
            FileType::Pid => 0x93,
            FileType::Pls => 0x94,
        }
    }

    /// Address letters for this type.
    #[must_use]
    pub const fn letters(self) -> &'static str {
        match self {
            FileType::Output => "O",
            FileType::Input => "I",
            FileType::Status => "S",
            FileType::Bit => "B",
            FileType::Timer => "T",
            FileType::Counter => "C",
            FileType::Control => "R",
            FileType::Integer => "N",
            FileType::Float => "F",
            FileType::Ascii => "A",
            FileType::Long => "L",
            FileType::Str => "ST",
            FileType::Message => "MG",
            FileType::Pid => "PD",
            FileType::Pls => "PLS",
        }
    }

    /// Bytes occupied by one element of this type.
    #[must_use]
    pub const fn bytes_per_element(self) -> usize {
        match self {
            FileType::Timer | FileType::Counter | FileType::Control => 6,
            FileType::Float | FileType::Long => 4,
            FileType::Str => 84,
            FileType::Message => 50,
            FileType::Pid => 46,
            FileType::Pls => 12,
            _ => 2,
        }
    }
}

/// Sub-element index for a timer/counter mnemonic.
fn mnemonic_sub(mnemonic: &str) -> Option<u16> {
    Some(match mnemonic {
        "ACC" => 2,
        "PRE" => 1,
        "EN" | "CU" => 15,
        "TT" | "CD" => 14,
        "DN" => 13,
        "OV" => 12,
        "UN" => 11,
        "UA" => 10,
        _ => return None,
    })
}

/// A parsed data-table address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Address {
    file_type: FileType,
    file_number: u8,
    element: u16,
    sub_element: u16,
    bit: Option<u8>,
}

impl Address {
    /// Parses a textual address.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Df1Error::InvalidAddress(text.to_string());
        let upper = text.trim().to_ascii_uppercase();
        let letters_len = upper
            .bytes()
            .take_while(u8::is_ascii_alphabetic)
            .count();
        if letters_len == 0 {
            return Err(invalid());
        }
        let file_type = FileType::from_letters(&upper[..letters_len]).ok_or_else(invalid)?;
        let rest = &upper[letters_len..];

        if let Some(rest) = rest.strip_prefix(':') {
            // Form 4: no file number; only I, O, and S have a fixed one.
            let file_number = match file_type {
                FileType::Input => 1,
                FileType::Output => 0,
                FileType::Status => 2,
                _ => return Err(invalid()),
            };
            let (element, rest) = take_number::<u16>(rest).ok_or_else(invalid)?;
            let (sub_element, rest) = match rest.strip_prefix('.') {
                Some(tail) => take_number::<u16>(tail).ok_or_else(invalid)?,
                None => (0, rest),
            };
            let bit = parse_bit_suffix(rest, invalid)?;
            return Ok(Self {
                file_type,
                file_number,
                element,
                sub_element,
                bit,
            });
        }

        let (file_number, rest) = take_number::<u8>(rest).ok_or_else(invalid)?;
        if let Some(rest) = rest.strip_prefix(':') {
            let (element, rest) = take_number::<u16>(rest).ok_or_else(invalid)?;
            if let Some(mnemonic) = rest.strip_prefix('.') {
                // Form 3: timer/counter field selector.
                if !matches!(file_type, FileType::Timer | FileType::Counter) {
                    return Err(invalid());
                }
                let sub_element = mnemonic_sub(mnemonic).ok_or_else(invalid)?;
                return Ok(Self {
                    file_type,
                    file_number,
                    element,
                    sub_element,
                    bit: None,
                });
            }
            let bit = parse_bit_suffix(rest, invalid)?;
            return Ok(Self {
                file_type,
                file_number,
                element,
                sub_element: 0,
                bit,
            });
        }
        if let Some(rest) = rest.strip_prefix('/') {
            // Form 2: running bit index over the whole file.
            if !matches!(file_type, FileType::Bit | FileType::Integer) {
                return Err(invalid());
            }
            let (bit_index, rest) = take_number::<u16>(rest).ok_or_else(invalid)?;
            if !rest.is_empty() {
                return Err(invalid());
            }
            return Ok(Self {
                file_type,
                file_number,
                element: bit_index >> 4,
                sub_element: 0,
                bit: Some((bit_index % 16) as u8),
            });
        }
        Err(invalid())
    }

    /// File type addressed.
    #[must_use]
    pub const fn file_type(&self) -> FileType {
        self.file_type
    }

    /// File number addressed.
    #[must_use]
    pub const fn file_number(&self) -> u8 {
        self.file_number
    }

    /// Element index.
    #[must_use]
    pub const fn element(&self) -> u16 {
        self.element
    }

    /// Sub-element index; zero means the whole element.
    #[must_use]
    pub const fn sub_element(&self) -> u16 {
        self.sub_element
    }

    /// Bit number within the addressed word, if any.
    #[must_use]
    pub const fn bit(&self) -> Option<u8> {
        self.bit
    }
}

impl FromStr for Address {
    type Err = Df1Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

fn parse_bit_suffix(rest: &str, invalid: impl Fn() -> Df1Error) -> Result<Option<u8>> {
    if rest.is_empty() {
        return Ok(None);
    }
    let tail = rest.strip_prefix('/').ok_or_else(&invalid)?;
    let (bit, tail) = take_number::<u8>(tail).ok_or_else(&invalid)?;
    if !tail.is_empty() || bit > 15 {
        return Err(invalid());
    }
    Ok(Some(bit))
}

fn take_number<T: FromStr>(text: &str) -> Option<(T, &str)> {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let value = text[..digits].parse().ok()?;
    Some((value, &text[digits..]))
}

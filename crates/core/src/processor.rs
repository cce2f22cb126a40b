//! Processor families and their per-family protocol parameters.
//!
//! The family code arrives in a diagnostic-status reply and gates transfer
//! sizes, the location of the program directory inside file 0, and the mode
//! change command. Operations that need these parameters require an explicit
//! probe first; nothing here has a usable default.

use crate::detect::ControllerMode;

/// Known controller families, by the code returned in a get-status reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProcessorFamily {
    /// 0x18
    Slc501,
    /// 0x1A
    Slc500Fixed,
    /// 0x25
    Slc502,
    /// 0x49
    Slc503,
    /// 0x5B
    Slc504,
    /// 0x78
    Slc505,
    /// 0x58
    MicroLogix1000,
    /// 0x88
    MicroLogix1200,
    /// 0x89
    MicroLogix1500Lsp,
    /// 0x8C
    MicroLogix1500Lrp,
    /// 0x95
    CompactLogixL35e,
    /// 0x9C
    MicroLogix1100,
}

impl ProcessorFamily {
    /// Resolves a status-reply code to a family.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x18 => ProcessorFamily::Slc501,
            0x1A => ProcessorFamily::Slc500Fixed,
            0x25 => ProcessorFamily::Slc502,
            0x49 => ProcessorFamily::Slc503,
            0x5B => ProcessorFamily::Slc504,
            0x78 => ProcessorFamily::Slc505,
            0x58 => ProcessorFamily::MicroLogix1000,
            0x88 => ProcessorFamily::MicroLogix1200,
            0x89 => ProcessorFamily::MicroLogix1500Lsp,
            0x8C => ProcessorFamily::MicroLogix1500Lrp,
            0x95 => ProcessorFamily::CompactLogixL35e,
            0x9C => ProcessorFamily::MicroLogix1100,
            _ => return None,
        })
    }

    /// The wire code for this family.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            ProcessorFamily::Slc501 => 0x18,
            ProcessorFamily::Slc500Fixed => 0x1A,
            ProcessorFamily::Slc502 => 0x25,
            ProcessorFamily::Slc503 => 0x49,
            ProcessorFamily::Slc504 => 0x5B,
            ProcessorFamily::Slc505 => 0x78,
            ProcessorFamily::MicroLogix1000 => 0x58,
            ProcessorFamily::MicroLogix1200 => 0x88,
            ProcessorFamily::MicroLogix1500Lsp => 0x89,
            ProcessorFamily::MicroLogix1500Lrp => 0x8C,
            ProcessorFamily::CompactLogixL35e => 0x95,
            ProcessorFamily::MicroLogix1100 => 0x9C,
        }
    }

    /// Marketing name, used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProcessorFamily::Slc501 => "SLC 5/01",
            ProcessorFamily::Slc500Fixed => "SLC 500 Fixed",
            ProcessorFamily::Slc502 => "SLC 5/02",
            ProcessorFamily::Slc503 => "SLC 5/03",
            ProcessorFamily::Slc504 => "SLC 5/04",
            ProcessorFamily::Slc505 => "SLC 5/05",
            ProcessorFamily::MicroLogix1000 => "MicroLogix 1000",
            ProcessorFamily::MicroLogix1200 => "MicroLogix 1200",
            ProcessorFamily::MicroLogix1500Lsp => "MicroLogix 1500 LSP",
            ProcessorFamily::MicroLogix1500Lrp => "MicroLogix 1500 LRP",
            ProcessorFamily::CompactLogixL35e => "CompactLogix L35E",
            ProcessorFamily::MicroLogix1100 => "MicroLogix 1100",
        }
    }

    /// Hard cap a single read may transfer on this family, in bytes.
    /// The SLC 5/02 class cannot buffer the full-size request.
    #[must_use]
    pub(crate) const fn read_cap(self) -> usize {
        match self {
            ProcessorFamily::Slc502 => 0x50,
            _ => 236,
        }
    }

    /// Where the program directory lives inside file 0, or `None` for
    /// families whose directory layout is not handled.
    #[must_use]
    pub(crate) const fn directory_geometry(self) -> Option<DirectoryGeometry> {
        match self {
            ProcessorFamily::Slc502 | ProcessorFamily::MicroLogix1000 => Some(DirectoryGeometry {
                size_type: 0x00,
                size_element: 0x23,
                table_offset: 79,
                entry_stride: 8,
                copy_len: 4,
            }),
            ProcessorFamily::MicroLogix1100
            | ProcessorFamily::MicroLogix1200
            | ProcessorFamily::MicroLogix1500Lsp
            | ProcessorFamily::MicroLogix1500Lrp => Some(DirectoryGeometry {
                size_type: 0x02,
                size_element: 0x2F,
                table_offset: 93,
                entry_stride: 10,
                copy_len: 4,
            }),
            ProcessorFamily::Slc503 | ProcessorFamily::Slc504 | ProcessorFamily::Slc505 => {
                Some(DirectoryGeometry {
                    size_type: 0x01,
                    size_element: 0x23,
                    table_offset: 103,
                    entry_stride: 10,
                    copy_len: 6,
                })
            }
            ProcessorFamily::Slc501
            | ProcessorFamily::Slc500Fixed
            | ProcessorFamily::CompactLogixL35e => None,
        }
    }

    /// PCCC function used to change the operating mode.
    #[must_use]
    pub(crate) const fn mode_function(self) -> u8 {
        match self {
            ProcessorFamily::MicroLogix1000 => 0x3A,
            _ => 0x80,
        }
    }

    /// Mode operand for [`Self::mode_function`].
    #[must_use]
    pub(crate) const fn mode_byte(self, mode: ControllerMode) -> u8 {
        match (self, mode) {
            (ProcessorFamily::MicroLogix1000, ControllerMode::Program) => 0x00,
            (ProcessorFamily::MicroLogix1000, ControllerMode::Run) => 0x02,
            (_, ControllerMode::Program) => 0x01,
            (_, ControllerMode::Run) => 0x06,
        }
    }
}

/// Location and shape of the program directory inside file 0.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct DirectoryGeometry {
    /// File-type byte under which file 0 is addressed.
    pub size_type: u8,
    /// Element holding the 16-bit byte length of file 0.
    pub size_element: u16,
    /// Offset of the first descriptor entry.
    pub table_offset: usize,
    /// Bytes per descriptor entry.
    pub entry_stride: usize,
    /// Number of bytes copied from the pre-download file 0/0x24 header into
    /// the download command list.
    pub copy_len: usize,
}

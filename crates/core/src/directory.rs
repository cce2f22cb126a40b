//! Program directory access, whole-program upload, and download.
//!
//! File 0 holds the controller's directory: a fixed-stride table of
//! descriptor entries whose location depends on the processor family. Data
//! tables are the entries in the user-data code range; program files are
//! classified into per-range groups whose file numbers count up from zero.
//! The directory blob itself is opaque to callers — upload returns it
//! verbatim and download writes it back.

use crate::client::{CMD_PROTECTED, Client};
use crate::detect::ControllerMode;
use crate::error::{Df1Error, Result};
use crate::processor::{DirectoryGeometry, ProcessorFamily};
use crate::typed::read_cap;

/// Execute command list.
const FNC_EXECUTE_LIST: u8 = 0x88;
/// Acquire sole access for the download.
const FNC_SOLE_ACCESS: u8 = 0x11;
/// Release sole access.
const FNC_RELEASE_ACCESS: u8 = 0x12;
/// Complete the download.
const FNC_COMPLETE_DOWNLOAD: u8 = 0x52;
/// Command-list sub-command: logical write.
const SUBCMD_WRITE: u8 = 0xAA;
/// Command-list sub-command: begin download.
const SUBCMD_BEGIN_DOWNLOAD: u8 = 0x56;
/// File-type code of the pre-download header file.
const PREDOWNLOAD_TYPE: u8 = 0x24;
/// File-type code of the download seed file.
const SEED_TYPE: u8 = 0x63;

/// One data table found in the directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataTableFile {
    tag: &'static str,
    file_number: u8,
    elements: usize,
}

impl DataTableFile {
    /// Address letters for the table's file type, or `"Undefined"`.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        self.tag
    }

    /// File number within its type.
    #[must_use]
    pub const fn file_number(&self) -> u8 {
        self.file_number
    }

    /// Number of elements the table holds.
    #[must_use]
    pub const fn element_count(&self) -> usize {
        self.elements
    }
}

/// One uploaded (or to-be-downloaded) program file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProgramFile {
    type_code: u8,
    file_number: u8,
    data: Vec<u8>,
}

impl ProgramFile {
    /// Creates a file blob for download.
    #[must_use]
    pub const fn new(type_code: u8, file_number: u8, data: Vec<u8>) -> Self {
        Self {
            type_code,
            file_number,
            data,
        }
    }

    /// Raw file-type code from the directory.
    #[must_use]
    pub const fn type_code(&self) -> u8 {
        self.type_code
    }

    /// File number within its group.
    #[must_use]
    pub const fn file_number(&self) -> u8 {
        self.file_number
    }

    /// The file contents.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A complete uploaded program: the raw file-0 directory plus every file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProgramImage {
    directory: Vec<u8>,
    files: Vec<ProgramFile>,
}

impl ProgramImage {
    /// Assembles an image for download.
    #[must_use]
    pub const fn new(directory: Vec<u8>, files: Vec<ProgramFile>) -> Self {
        Self { directory, files }
    }

    /// The raw file-0 directory blob.
    #[must_use]
    pub fn directory(&self) -> &[u8] {
        &self.directory
    }

    /// The program files.
    #[must_use]
    pub fn files(&self) -> &[ProgramFile] {
        &self.files
    }
}

/// A raw directory entry: type code and byte length.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct DescriptorEntry {
    code: u8,
    length: usize,
}

fn scan_entries(zero: &[u8], geometry: &DirectoryGeometry) -> Vec<DescriptorEntry> {
    let mut entries = Vec::new();
    let mut pos = geometry.table_offset;
    while pos + geometry.entry_stride <= zero.len() {
        entries.push(DescriptorEntry {
            code: zero[pos],
            length: usize::from(u16::from_le_bytes([zero[pos + 1], zero[pos + 2]])),
        });
        pos += geometry.entry_stride;
    }
    entries
}

/// Letters and element width for a user-data code.
fn descriptor_tag(code: u8) -> (&'static str, usize) {
    crate::address::FileType::from_code(code)
        .map_or(("Undefined", 2), |file_type| {
            (file_type.letters(), file_type.bytes_per_element())
        })
}

/// Data tables occupy this code range in the directory.
const fn is_user_data(code: u8) -> bool {
    matches!(code, 0x82..=0x9E)
}

/// Group index for a program file, ordering the upload output.
const fn classify(code: u8) -> Option<usize> {
    match code {
        0x40..=0x5F => Some(0), // system
        0x20..=0x3F => Some(1), // ladder
        0x60..=0x7F => Some(2), // system ladder
        0x80..=0x9F => Some(3), // data
        0xA0..=0xBF => Some(4), // force
        0xC0..=0xDF => Some(5),
        0xE0..=0xFF => Some(6),
        _ => None,
    }
}

const GROUPS: usize = 7;

fn data_tables_from(zero: &[u8], geometry: &DirectoryGeometry) -> Vec<DataTableFile> {
    let mut tables = Vec::new();
    let mut next_number: Option<u8> = None;
    for entry in scan_entries(zero, geometry) {
        // File numbering starts once the scan reaches the data-file region
        // and then advances for every entry, deleted slots included.
        let number = if let Some(current) = next_number {
            next_number = Some(current.wrapping_add(1));
            Some(current)
        } else if is_user_data(entry.code) {
            next_number = Some(1);
            Some(0)
        } else {
            None
        };
        if let Some(number) = number {
            if is_user_data(entry.code) {
                let (tag, width) = descriptor_tag(entry.code);
                tables.push(DataTableFile {
                    tag,
                    file_number: number,
                    elements: entry.length / width,
                });
            }
        }
    }
    tables
}

impl Client {
    fn directory_context(&self) -> Result<(ProcessorFamily, DirectoryGeometry)> {
        let family = self.processor_type()?;
        let geometry = family
            .directory_geometry()
            .ok_or(Df1Error::Unsupported(family.name()))?;
        Ok((family, geometry))
    }

    /// Reads all of file 0: first its 16-bit byte length from the
    /// family-specific header element, then the contents.
    fn read_file_zero(&self) -> Result<(Vec<u8>, DirectoryGeometry, ProcessorFamily)> {
        let (family, geometry) = self.directory_context()?;
        let header = self.read_raw(0, geometry.size_type, geometry.size_element, 0, 2, 2)?;
        let size = usize::from(u16::from_le_bytes([header[0], header[1]]));
        if size == 0 {
            return Err(Df1Error::NoData);
        }
        let zero = self.read_raw(0, geometry.size_type, 0, 0, size, read_cap(geometry.size_type, family))?;
        Ok((zero, geometry, family))
    }

    /// Enumerates the controller's data tables.
    pub fn data_tables(&self) -> Result<Vec<DataTableFile>> {
        let (zero, geometry, _family) = self.read_file_zero()?;
        Ok(data_tables_from(&zero, &geometry))
    }

    /// Uploads the whole program: the directory plus every program file,
    /// raising a progress event after each one.
    pub fn upload_program(&self) -> Result<ProgramImage> {
        let (zero, geometry, family) = self.read_file_zero()?;
        let mut counters = [0u8; GROUPS];
        let mut pending = Vec::new();
        for entry in scan_entries(&zero, &geometry) {
            if let Some(group) = classify(entry.code) {
                let number = counters[group];
                counters[group] = counters[group].wrapping_add(1);
                if entry.length > 0 {
                    pending.push((entry, number));
                }
            }
        }
        let total = pending.len();
        let mut files = Vec::with_capacity(total);
        for (done, (entry, number)) in pending.into_iter().enumerate() {
            let data = self.read_raw(
                number,
                entry.code,
                0,
                0,
                entry.length,
                read_cap(entry.code, family),
            )?;
            files.push(ProgramFile {
                type_code: entry.code,
                file_number: number,
                data,
            });
            self.observer.upload_progress(done + 1, total);
        }
        Ok(ProgramImage {
            directory: zero,
            files,
        })
    }

    /// Downloads a program image under the sole-access interlock.
    ///
    /// The sequence is: program mode, the begin-download command list, sole
    /// access, the directory, every file, download completion, release.
    /// Any failure aborts where it stands — there is no rollback, and the
    /// controller stays in program mode.
    pub fn download_program(&self, image: &ProgramImage) -> Result<()> {
        let (_family, geometry) = self.directory_context()?;
        self.set_mode(ControllerMode::Program)?;

        let pre = self.read_raw(0, PREDOWNLOAD_TYPE, 0, 0, 2 + geometry.copy_len, 236)?;
        let mut list = vec![0x02];
        let mut seed = vec![
            SUBCMD_WRITE,
            geometry.copy_len as u8,
            0x00,
            SEED_TYPE,
            0x00,
        ];
        seed.extend_from_slice(&pre[2..2 + geometry.copy_len]);
        list.push(seed.len() as u8);
        list.extend_from_slice(&seed);
        list.push(0x01);
        list.push(SUBCMD_BEGIN_DOWNLOAD);
        self.exchange(CMD_PROTECTED, FNC_EXECUTE_LIST, &list)?;

        self.exchange(CMD_PROTECTED, FNC_SOLE_ACCESS, &[])?;

        let length = (image.directory.len() as u16).to_le_bytes();
        self.write_raw(0, geometry.size_type, geometry.size_element, 0, &length, false)?;
        self.write_raw(0, geometry.size_type, 0, 0, &image.directory, false)?;

        let total = image.files.len();
        for (done, file) in image.files.iter().enumerate() {
            if !file.data.is_empty() {
                self.write_raw(file.file_number, file.type_code, 0, 0, &file.data, false)?;
            }
            self.observer.download_progress(done + 1, total);
        }

        self.exchange(CMD_PROTECTED, FNC_COMPLETE_DOWNLOAD, &[])?;
        self.exchange(CMD_PROTECTED, FNC_RELEASE_ACCESS, &[])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> DirectoryGeometry {
        DirectoryGeometry {
            size_type: 0x01,
            size_element: 0x23,
            table_offset: 8,
            entry_stride: 8,
            copy_len: 6,
        }
    }

    fn entry(code: u8, length: u16) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = code;
        bytes[1..3].copy_from_slice(&length.to_le_bytes());
        bytes
    }

    fn file_zero(entries: &[[u8; 8]]) -> Vec<u8> {
        let mut zero = vec![0u8; 8];
        for bytes in entries {
            zero.extend_from_slice(bytes);
        }
        zero
    }

    #[test]
    fn data_tables_are_numbered_from_the_region_start() {
        let zero = file_zero(&[
            entry(0x22, 64),  // ladder file, before the data region
            entry(0x82, 20),  // O
            entry(0x8C, 12),  // I
            entry(0x00, 0),   // deleted slot still consumes a number
            entry(0x89, 40),  // N
            entry(0x86, 30),  // T
        ]);
        let tables = data_tables_from(&zero, &geometry());
        assert_eq!(tables.len(), 4);
        assert_eq!((tables[0].tag(), tables[0].file_number()), ("O", 0));
        assert_eq!(tables[0].element_count(), 10);
        assert_eq!((tables[1].tag(), tables[1].file_number()), ("I", 1));
        assert_eq!((tables[2].tag(), tables[2].file_number()), ("N", 3));
        assert_eq!(tables[2].element_count(), 20);
        assert_eq!((tables[3].tag(), tables[3].file_number()), ("T", 4));
        assert_eq!(tables[3].element_count(), 5);
    }

    #[test]
    fn unknown_user_data_codes_report_undefined() {
        let zero = file_zero(&[entry(0x9E, 10)]);
        let tables = data_tables_from(&zero, &geometry());
        assert_eq!(tables[0].tag(), "Undefined");
        assert_eq!(tables[0].element_count(), 5);
    }

    #[test]
    fn codes_outside_the_user_range_are_not_tables() {
        let zero = file_zero(&[entry(0x22, 64), entry(0xA0, 16)]);
        assert!(data_tables_from(&zero, &geometry()).is_empty());
    }

    #[test]
    fn classification_orders_program_file_groups() {
        assert_eq!(classify(0x47), Some(0));
        assert_eq!(classify(0x22), Some(1));
        assert_eq!(classify(0x6A), Some(2));
        assert_eq!(classify(0x85), Some(3));
        assert_eq!(classify(0xA4), Some(4));
        assert_eq!(classify(0x10), None);
    }

    #[test]
    fn truncated_tables_stop_at_the_last_full_entry() {
        let mut zero = file_zero(&[entry(0x89, 2)]);
        zero.extend_from_slice(&[0x89, 0x02]); // partial trailing entry
        let tables = data_tables_from(&zero, &geometry());
        assert_eq!(tables.len(), 1);
    }
}

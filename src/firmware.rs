use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

/// Value of erased flash, used to fill holes in the image.
const ERASED: u8 = 0xFF;
/// Largest image we accept. The biggest AVR flash is 256KB.
const MAX_IMAGE_SIZE: usize = 256 * 1024;

// Intel HEX record types
const REC_DATA: u8 = 0x00;
const REC_EOF: u8 = 0x01;
const REC_EXT_SEGMENT_ADDR: u8 = 0x02;
const REC_START_SEGMENT_ADDR: u8 = 0x03;
const REC_EXT_LINEAR_ADDR: u8 = 0x04;
const REC_START_LINEAR_ADDR: u8 = 0x05;

#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: &'static str },
    #[error("line {line}: bad checksum (expected 0x{expected:02x}, found 0x{found:02x})")]
    Checksum { line: usize, expected: u8, found: u8 },
    #[error("line {line}: unsupported record type 0x{record_type:02x}")]
    UnsupportedRecord { line: usize, record_type: u8 },
    #[error("image contains no data")]
    Empty,
    #[error("image spans {size} bytes, more than the {max} bytes allowed")]
    TooLarge { size: usize, max: usize },
    #[error("image ends at 0x{end:05x}, past the end of the {flash_size} byte flash")]
    DoesNotFit { end: usize, flash_size: usize },
}

/// A contiguous firmware image and the flash address it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firmware {
    base: u32,
    data: Box<[u8]>,
}

impl Firmware {
    pub fn new(base: u32, data: impl Into<Box<[u8]>>) -> Self {
        Self {
            base,
            data: data.into(),
        }
    }

    /// Read an Intel HEX file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FirmwareError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| FirmwareError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let firmware = Self::parse(&content)?;
        info!(
            "Loaded {} bytes at 0x{:05x} from {}",
            firmware.len(),
            firmware.base,
            path.display()
        );

        Ok(firmware)
    }

    /// Parse the content of an Intel HEX file.
    ///
    /// All data records are merged into a single image starting at the lowest address; holes are
    /// filled with `0xFF`.
    pub fn parse(content: &str) -> Result<Self, FirmwareError> {
        let mut chunks: Vec<(usize, Vec<u8>)> = Vec::new();
        let mut upper_addr = 0usize;

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record = Record::parse(line, line_no)?;
            match record.record_type {
                REC_DATA => {
                    if !record.data.is_empty() {
                        chunks.push((upper_addr + record.addr as usize, record.data));
                    }
                }
                REC_EOF => break,
                REC_EXT_SEGMENT_ADDR => upper_addr = (record.word(line_no)? as usize) << 4,
                REC_EXT_LINEAR_ADDR => upper_addr = (record.word(line_no)? as usize) << 16,
                REC_START_SEGMENT_ADDR | REC_START_LINEAR_ADDR => {
                    debug!("Ignoring start address record on line {}", line_no);
                }
                record_type => {
                    return Err(FirmwareError::UnsupportedRecord {
                        line: line_no,
                        record_type,
                    })
                }
            }
        }

        let base = chunks
            .iter()
            .map(|(addr, _)| *addr)
            .min()
            .ok_or(FirmwareError::Empty)?;
        let end = chunks
            .iter()
            .map(|(addr, data)| addr + data.len())
            .max()
            .ok_or(FirmwareError::Empty)?;
        let size = end - base;
        if size > MAX_IMAGE_SIZE {
            return Err(FirmwareError::TooLarge {
                size,
                max: MAX_IMAGE_SIZE,
            });
        }

        let mut image = vec![ERASED; size];
        for (addr, data) in chunks {
            let offset = addr - base;
            image[offset..offset + data.len()].copy_from_slice(&data);
        }

        Ok(Self::new(base as u32, image))
    }

    /// Flash address of the first byte of the image.
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One past the last flash address covered by the image.
    pub fn end(&self) -> usize {
        self.base as usize + self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy the image into `flash` at its base address.
    pub fn write_to(&self, flash: &mut [u8]) -> Result<(), FirmwareError> {
        if self.end() > flash.len() {
            return Err(FirmwareError::DoesNotFit {
                end: self.end(),
                flash_size: flash.len(),
            });
        }
        flash[self.base as usize..self.end()].copy_from_slice(&self.data);
        Ok(())
    }
}

struct Record {
    addr: u16,
    record_type: u8,
    data: Vec<u8>,
}

impl Record {
    /// Parse a single `:LLAAAATT<data>CC` line.
    fn parse(line: &str, line_no: usize) -> Result<Self, FirmwareError> {
        let malformed = |reason| FirmwareError::Malformed {
            line: line_no,
            reason,
        };

        let hex = line
            .strip_prefix(':')
            .ok_or_else(|| malformed("missing start code"))?;
        let bytes = decode_hex(hex).ok_or_else(|| malformed("invalid hex digits"))?;
        if bytes.len() < 5 {
            return Err(malformed("record too short"));
        }

        let count = bytes[0] as usize;
        if bytes.len() != count + 5 {
            return Err(malformed("byte count does not match record length"));
        }

        let (payload, checksum) = bytes.split_at(bytes.len() - 1);
        let expected = payload
            .iter()
            .fold(0u8, |sum, b| sum.wrapping_add(*b))
            .wrapping_neg();
        if expected != checksum[0] {
            return Err(FirmwareError::Checksum {
                line: line_no,
                expected,
                found: checksum[0],
            });
        }

        Ok(Self {
            addr: u16::from_be_bytes([bytes[1], bytes[2]]),
            record_type: bytes[3],
            data: payload[4..].to_vec(),
        })
    }

    /// Payload of an address record.
    fn word(&self, line_no: usize) -> Result<u16, FirmwareError> {
        match self.data[..] {
            [hi, lo] => Ok(u16::from_be_bytes([hi, lo])),
            _ => Err(FirmwareError::Malformed {
                line: line_no,
                reason: "address record must hold 2 bytes",
            }),
        }
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

use bitflags::bitflags;

use crate::machine::IoPin;
use crate::{VRAM_COLUMNS, VRAM_PAGES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum AddressingMode {
    #[default]
    Horizontal = 0,
    Vertical = 1,
    Page = 2,
}

impl AddressingMode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Horizontal),
            1 => Some(Self::Vertical),
            2 => Some(Self::Page),
            _ => None,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisplayFlags: u16 {
        const INVERTED        = 0b0000000000000001;
        const ON              = 0b0000000000000010;
        const SEGMENT_REMAP_0 = 0b0000000000000100;
        const COM_SCAN_NORMAL = 0b0000000000001000;
        const BUSY            = 0b0000000000010000;
        const REENTRANT       = 0b0000000000100000;
        const DIRTY           = 0b0000000001000000;
    }
}

/// Position of the write cursor in VRAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub page: u8,
    pub column: u8,
}

/// Register file and VRAM of the display controller.
///
/// VRAM is paged: each byte holds 8 vertically stacked pixels of one column, LSB on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub cursor: Cursor,
    pub vram: [[u8; VRAM_COLUMNS]; VRAM_PAGES],
    /// Raw flags word, see [`DisplayFlags`].
    pub flags: u16,
    pub command_register: u8,
    pub contrast_register: u8,
    /// Level of the chip-select line
    pub cs_pin: u8,
    /// Level of the data/instruction line
    pub di_pin: u8,
    pub spi_data: u8,
    /// Number of bytes still expected for a multi-byte register write
    pub reg_write_sz: u8,
    pub addr_mode: AddressingMode,
    pub twi_selected: u8,
    pub twi_index: u8,
}

impl DisplayState {
    pub fn flags(&self) -> DisplayFlags {
        DisplayFlags::from_bits_truncate(self.flags)
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            cursor: Cursor::default(),
            vram: [[0; VRAM_COLUMNS]; VRAM_PAGES],
            flags: 0,
            command_register: 0,
            contrast_register: 0,
            cs_pin: 0,
            di_pin: 0,
            spi_data: 0,
            reg_write_sz: 0,
            addr_mode: AddressingMode::default(),
            twi_selected: 0,
            twi_index: 0,
        }
    }
}

/// Control lines of the display, as routed on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wiring {
    pub chip_select: IoPin,
    pub data_instruction: IoPin,
    pub reset: IoPin,
}

/// Display wiring of the Arduboy.
pub const ARDUBOY_WIRING: Wiring = Wiring {
    chip_select: IoPin::new('D', 6),
    data_instruction: IoPin::new('D', 4),
    reset: IoPin::new('D', 7),
};

/// The SSD1306 controller attached to the machine's bus. It handles the command and pixel
/// protocol itself.
pub trait Display {
    /// Size the controller for a panel of `width` x `height` pixels.
    fn attach(&mut self, width: usize, height: usize);

    fn connect(&mut self, wiring: &Wiring);

    fn state(&self) -> &DisplayState;

    fn state_mut(&mut self) -> &mut DisplayState;
}

//! Save states.
//!
//! A snapshot is the concatenation of the fields listed in [`SNAPSHOT_LAYOUT`], in that order,
//! each at its natural width in native byte order, without padding or header:
//!
//! | field | width |
//! |---|---|
//! | CPU state | 4 |
//! | cycle, run cycle count, run cycle limit | 3 x 8 |
//! | SREG | 8 |
//! | interrupt state | 1 |
//! | PC, reset PC | 2 x 4 |
//! | data space | `ram_end + 1` |
//! | display cursor (page, column) | 2 |
//! | VRAM | 8 x 128 |
//! | display flags | 2 |
//! | command, contrast, CS, D/I, SPI data, register write size | 6 x 1 |
//! | addressing mode | 4 |
//! | TWI selected, TWI index | 2 x 1 |
//!
//! The format is private: it changes whenever the machine or display layout changes.
//!
//! Pending interrupts, cycle timers and EEPROM are not captured, so restoring a snapshot taken
//! while an interrupt or timed event was pending does not resume it.
use std::io::{self, Read, Write};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use thiserror::Error;

use crate::display::{AddressingMode, Cursor, DisplayState};
use crate::machine::{CpuState, MachineState};
use crate::{VRAM_COLUMNS, VRAM_PAGES};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot buffer is too small: {needed} bytes needed, {actual} available")]
    BufferTooSmall { needed: usize, actual: usize },
    #[error("invalid value {value} for snapshot field {field}")]
    InvalidTag { field: &'static str, value: i32 },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    State,
    Cycle,
    RunCycleCount,
    RunCycleLimit,
    Sreg,
    InterruptState,
    Pc,
    ResetPc,
    Data,
    Cursor,
    Vram,
    Flags,
    CommandRegister,
    ContrastRegister,
    CsPin,
    DiPin,
    SpiData,
    RegWriteSize,
    AddrMode,
    TwiSelected,
    TwiIndex,
}

/// Field order of a snapshot. Both [`write`] and [`read`] walk this list.
pub const SNAPSHOT_LAYOUT: [Field; 21] = [
    Field::State,
    Field::Cycle,
    Field::RunCycleCount,
    Field::RunCycleLimit,
    Field::Sreg,
    Field::InterruptState,
    Field::Pc,
    Field::ResetPc,
    Field::Data,
    Field::Cursor,
    Field::Vram,
    Field::Flags,
    Field::CommandRegister,
    Field::ContrastRegister,
    Field::CsPin,
    Field::DiPin,
    Field::SpiData,
    Field::RegWriteSize,
    Field::AddrMode,
    Field::TwiSelected,
    Field::TwiIndex,
];

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::State => "state",
            Field::Cycle => "cycle",
            Field::RunCycleCount => "run_cycle_count",
            Field::RunCycleLimit => "run_cycle_limit",
            Field::Sreg => "sreg",
            Field::InterruptState => "interrupt_state",
            Field::Pc => "pc",
            Field::ResetPc => "reset_pc",
            Field::Data => "data",
            Field::Cursor => "cursor",
            Field::Vram => "vram",
            Field::Flags => "flags",
            Field::CommandRegister => "command_register",
            Field::ContrastRegister => "contrast_register",
            Field::CsPin => "cs_pin",
            Field::DiPin => "di_pin",
            Field::SpiData => "spi_data",
            Field::RegWriteSize => "reg_write_sz",
            Field::AddrMode => "addr_mode",
            Field::TwiSelected => "twi_selected",
            Field::TwiIndex => "twi_index",
        }
    }

    /// Width of the field in bytes, for a data space of `data_len` bytes.
    pub fn width(&self, data_len: usize) -> usize {
        match self {
            Field::State | Field::Pc | Field::ResetPc | Field::AddrMode => 4,
            Field::Cycle | Field::RunCycleCount | Field::RunCycleLimit => 8,
            Field::Sreg => 8,
            Field::Data => data_len,
            Field::Cursor | Field::Flags => 2,
            Field::Vram => VRAM_PAGES * VRAM_COLUMNS,
            Field::InterruptState
            | Field::CommandRegister
            | Field::ContrastRegister
            | Field::CsPin
            | Field::DiPin
            | Field::SpiData
            | Field::RegWriteSize
            | Field::TwiSelected
            | Field::TwiIndex => 1,
        }
    }

    fn write<W: Write>(
        &self,
        machine: &MachineState,
        display: &DisplayState,
        w: &mut W,
    ) -> io::Result<()> {
        match self {
            Field::State => w.write_i32::<NativeEndian>(machine.state as i32),
            Field::Cycle => w.write_u64::<NativeEndian>(machine.cycle),
            Field::RunCycleCount => w.write_u64::<NativeEndian>(machine.run_cycle_count),
            Field::RunCycleLimit => w.write_u64::<NativeEndian>(machine.run_cycle_limit),
            Field::Sreg => w.write_all(&machine.sreg),
            Field::InterruptState => w.write_i8(machine.interrupt_state),
            Field::Pc => w.write_u32::<NativeEndian>(machine.pc),
            Field::ResetPc => w.write_u32::<NativeEndian>(machine.reset_pc),
            Field::Data => w.write_all(&machine.data),
            Field::Cursor => {
                w.write_u8(display.cursor.page)?;
                w.write_u8(display.cursor.column)
            }
            Field::Vram => display.vram.iter().try_for_each(|page| w.write_all(page)),
            Field::Flags => w.write_u16::<NativeEndian>(display.flags),
            Field::CommandRegister => w.write_u8(display.command_register),
            Field::ContrastRegister => w.write_u8(display.contrast_register),
            Field::CsPin => w.write_u8(display.cs_pin),
            Field::DiPin => w.write_u8(display.di_pin),
            Field::SpiData => w.write_u8(display.spi_data),
            Field::RegWriteSize => w.write_u8(display.reg_write_sz),
            Field::AddrMode => w.write_i32::<NativeEndian>(display.addr_mode as i32),
            Field::TwiSelected => w.write_u8(display.twi_selected),
            Field::TwiIndex => w.write_u8(display.twi_index),
        }
    }

    fn read<R: Read>(
        &self,
        machine: &mut MachineState,
        display: &mut DisplayState,
        r: &mut R,
    ) -> Result<(), SnapshotError> {
        match self {
            Field::State => {
                let value = r.read_i32::<NativeEndian>()?;
                machine.state = CpuState::from_raw(value).ok_or(SnapshotError::InvalidTag {
                    field: self.name(),
                    value,
                })?;
            }
            Field::Cycle => machine.cycle = r.read_u64::<NativeEndian>()?,
            Field::RunCycleCount => machine.run_cycle_count = r.read_u64::<NativeEndian>()?,
            Field::RunCycleLimit => machine.run_cycle_limit = r.read_u64::<NativeEndian>()?,
            Field::Sreg => r.read_exact(&mut machine.sreg)?,
            Field::InterruptState => machine.interrupt_state = r.read_i8()?,
            Field::Pc => machine.pc = r.read_u32::<NativeEndian>()?,
            Field::ResetPc => machine.reset_pc = r.read_u32::<NativeEndian>()?,
            Field::Data => r.read_exact(&mut machine.data)?,
            Field::Cursor => {
                display.cursor = Cursor {
                    page: r.read_u8()?,
                    column: r.read_u8()?,
                };
            }
            Field::Vram => {
                for page in display.vram.iter_mut() {
                    r.read_exact(page)?;
                }
            }
            Field::Flags => display.flags = r.read_u16::<NativeEndian>()?,
            Field::CommandRegister => display.command_register = r.read_u8()?,
            Field::ContrastRegister => display.contrast_register = r.read_u8()?,
            Field::CsPin => display.cs_pin = r.read_u8()?,
            Field::DiPin => display.di_pin = r.read_u8()?,
            Field::SpiData => display.spi_data = r.read_u8()?,
            Field::RegWriteSize => display.reg_write_sz = r.read_u8()?,
            Field::AddrMode => {
                let value = r.read_i32::<NativeEndian>()?;
                display.addr_mode =
                    AddressingMode::from_raw(value).ok_or(SnapshotError::InvalidTag {
                        field: self.name(),
                        value,
                    })?;
            }
            Field::TwiSelected => display.twi_selected = r.read_u8()?,
            Field::TwiIndex => display.twi_index = r.read_u8()?,
        }
        Ok(())
    }
}

/// Size in bytes of a snapshot of a machine whose data space is `data_len` bytes long.
pub fn snapshot_size(data_len: usize) -> usize {
    SNAPSHOT_LAYOUT.iter().map(|f| f.width(data_len)).sum()
}

/// Byte offset of `field` within a snapshot.
pub fn offset_of(field: Field, data_len: usize) -> usize {
    SNAPSHOT_LAYOUT
        .iter()
        .take_while(|f| **f != field)
        .map(|f| f.width(data_len))
        .sum()
}

/// Serialize `machine` and `display` at the start of `buf`. Returns the number of bytes written.
pub fn write(
    machine: &MachineState,
    display: &DisplayState,
    buf: &mut [u8],
) -> Result<usize, SnapshotError> {
    let data_len = machine.data.len();
    let size = snapshot_size(data_len);
    if buf.len() < size {
        return Err(SnapshotError::BufferTooSmall {
            needed: size,
            actual: buf.len(),
        });
    }

    let mut out = &mut buf[..size];
    for field in SNAPSHOT_LAYOUT {
        let remaining = out.len();
        field.write(machine, display, &mut out)?;
        debug_assert_eq!(
            remaining - out.len(),
            field.width(data_len),
            "field {} written with the wrong width",
            field.name()
        );
    }

    debug!("Saved {} byte snapshot at cycle {}", size, machine.cycle);
    Ok(size)
}

/// Restore `machine` and `display` from a snapshot.
///
/// Both are left untouched if the snapshot is rejected.
pub fn read(
    buf: &[u8],
    machine: &mut MachineState,
    display: &mut DisplayState,
) -> Result<(), SnapshotError> {
    let (restored_machine, restored_display) = decode_sized(buf, machine.data.len())?;
    *machine = restored_machine;
    *display = restored_display;
    Ok(())
}

/// Decode a standalone snapshot for a machine whose data space ends at `ram_end`.
pub fn decode(buf: &[u8], ram_end: u16) -> Result<(MachineState, DisplayState), SnapshotError> {
    decode_sized(buf, ram_end as usize + 1)
}

/// Decode a snapshot of a machine whose data space is `data_len` bytes long into fresh state.
pub fn decode_sized(
    buf: &[u8],
    data_len: usize,
) -> Result<(MachineState, DisplayState), SnapshotError> {
    let size = snapshot_size(data_len);
    if buf.len() < size {
        return Err(SnapshotError::BufferTooSmall {
            needed: size,
            actual: buf.len(),
        });
    }

    let mut machine = MachineState {
        data: vec![0; data_len].into_boxed_slice(),
        ..MachineState::new(0)
    };
    let mut display = DisplayState::default();
    let mut input = &buf[..size];
    for field in SNAPSHOT_LAYOUT {
        let remaining = input.len();
        field.read(&mut machine, &mut display, &mut input)?;
        debug_assert_eq!(
            remaining - input.len(),
            field.width(data_len),
            "field {} read with the wrong width",
            field.name()
        );
    }

    debug!("Loaded {} byte snapshot at cycle {}", size, machine.cycle);
    Ok((machine, display))
}

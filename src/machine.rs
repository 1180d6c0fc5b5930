use std::fmt;

use bitflags::bitflags;

use crate::display::Display;

/// Execution state of the CPU, as reported after every step.
///
/// The discriminants are the values stored in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum CpuState {
    #[default]
    Limbo = 0,
    Stopped = 1,
    Running = 2,
    Sleeping = 3,
    Step = 4,
    StepDone = 5,
    /// The firmware halted with interrupts disabled: nothing will ever run again.
    Done = 6,
    Crashed = 7,
}

impl CpuState {
    pub fn from_raw(raw: i32) -> Option<Self> {
        let state = match raw {
            0 => Self::Limbo,
            1 => Self::Stopped,
            2 => Self::Running,
            3 => Self::Sleeping,
            4 => Self::Step,
            5 => Self::StepDone,
            6 => Self::Done,
            7 => Self::Crashed,
            _ => return None,
        };
        Some(state)
    }

    /// Returns `true` if stepping the machine further cannot make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Crashed)
    }
}

bitflags! {
    /// Decoded view of SREG. The machine keeps one byte per flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const C = 0b00000001;
        const Z = 0b00000010;
        const N = 0b00000100;
        const V = 0b00001000;
        const S = 0b00010000;
        const H = 0b00100000;
        const T = 0b01000000;
        const I = 0b10000000;
    }
}

/// CPU registers and data space of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    pub state: CpuState,
    /// Current cycle counter
    pub cycle: u64,
    pub run_cycle_count: u64,
    pub run_cycle_limit: u64,
    /// SREG, one byte per flag (C, Z, N, V, S, H, T, I)
    pub sreg: [u8; 8],
    pub interrupt_state: i8,
    pub pc: u32,
    pub reset_pc: u32,
    /// Registers, I/O space and SRAM: `ram_end + 1` bytes.
    pub data: Box<[u8]>,
}

impl MachineState {
    pub fn new(ram_end: u16) -> Self {
        Self {
            state: CpuState::default(),
            cycle: 0,
            run_cycle_count: 0,
            run_cycle_limit: 0,
            sreg: [0; 8],
            interrupt_state: 0,
            pc: 0,
            reset_pc: 0,
            data: vec![0; ram_end as usize + 1].into_boxed_slice(),
        }
    }

    /// Last addressable byte of the data space.
    pub fn ram_end(&self) -> usize {
        self.data.len() - 1
    }

    pub fn status(&self) -> StatusFlags {
        self.sreg
            .iter()
            .enumerate()
            .filter(|(_, b)| **b != 0)
            .fold(StatusFlags::empty(), |flags, (i, _)| {
                flags | StatusFlags::from_bits_truncate(1 << i)
            })
    }
}

/// A digital I/O line, named the way the datasheet does (e.g. `PC6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoPin {
    pub port: char,
    pub pin: u8,
}

impl IoPin {
    pub const fn new(port: char, pin: u8) -> Self {
        Self { port, pin }
    }
}

impl fmt::Display for IoPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.port, self.pin)
    }
}

/// Receives pin-level changes for the lines registered with [`Machine::watch_pin`].
///
/// Notifications are delivered synchronously from within [`Machine::run_one`], in the order in
/// which they happen.
pub trait PinListener {
    /// `channel` is the tag given when the pin was registered, `cycle` is the machine cycle at
    /// which the change happened.
    fn pin_changed(&mut self, channel: usize, level: bool, cycle: u64);
}

/// Called by the machine when the firmware puts the CPU to sleep.
pub type SleepHook = fn(state: &mut MachineState, how_long: u64);

/// Sleep hook that never idles the host thread.
pub fn no_op_sleep(_state: &mut MachineState, _how_long: u64) {}

/// The instruction-stepping engine. The interpreter and its peripheral bus live outside this
/// crate.
pub trait Machine {
    type Display: Display;

    fn state(&self) -> &MachineState;

    fn state_mut(&mut self) -> &mut MachineState;

    /// The display controller attached to the bus.
    fn display(&self) -> &Self::Display;

    fn display_mut(&mut self) -> &mut Self::Display;

    /// The whole program memory.
    fn flash_mut(&mut self) -> &mut [u8];

    fn set_frequency(&mut self, hz: u32);

    fn set_sleep_hook(&mut self, hook: SleepHook);

    /// Last executable flash address.
    fn set_code_end(&mut self, addr: u32);

    /// Ask for notifications whenever `pin` changes level. Notifications carry `channel`.
    fn watch_pin(&mut self, pin: IoPin, channel: usize);

    /// Execute the smallest unit of work the engine supports and report the resulting CPU
    /// state.
    fn run_one(&mut self, listener: &mut dyn PinListener) -> CpuState;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_state_raw_values() {
        for raw in 0..8 {
            let state = CpuState::from_raw(raw).unwrap();
            assert_eq!(state as i32, raw);
        }
        assert_eq!(CpuState::from_raw(8), None);
        assert_eq!(CpuState::from_raw(-1), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(CpuState::Done.is_terminal());
        assert!(CpuState::Crashed.is_terminal());
        assert!(!CpuState::Running.is_terminal());
        assert!(!CpuState::Sleeping.is_terminal());
    }

    #[test]
    fn test_status_flags() {
        let mut state = MachineState::new(0xAFF);
        state.sreg[0] = 1;
        state.sreg[1] = 1;
        state.sreg[7] = 1;

        assert_eq!(
            state.status(),
            StatusFlags::C | StatusFlags::Z | StatusFlags::I
        );
    }

    #[test]
    fn test_data_space_size() {
        let state = MachineState::new(0xAFF);

        assert_eq!(state.data.len(), 0xB00);
        assert_eq!(state.ram_end(), 0xAFF);
    }

    #[test]
    fn test_pin_name() {
        assert_eq!(IoPin::new('C', 6).to_string(), "PC6");
    }
}

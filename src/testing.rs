use std::collections::VecDeque;

use crate::display::{Display, DisplayState, Wiring};
use crate::machine::{CpuState, IoPin, Machine, MachineState, PinListener, SleepHook};

pub const TEST_RAM_END: u16 = crate::config::ATMEGA32U4_RAM_END;
pub const TEST_FLASH_SIZE: usize = 32 * 1024;

#[derive(Debug, Default)]
pub struct FakeDisplay {
    pub state: DisplayState,
    pub size: Option<(usize, usize)>,
    pub wiring: Option<Wiring>,
}

impl Display for FakeDisplay {
    fn attach(&mut self, width: usize, height: usize) {
        self.size = Some((width, height));
    }

    fn connect(&mut self, wiring: &Wiring) {
        self.wiring = Some(*wiring);
    }

    fn state(&self) -> &DisplayState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DisplayState {
        &mut self.state
    }
}

pub struct ScriptedMachine {
    state: MachineState,
    display: FakeDisplay,
    flash: Vec<u8>,
    pub frequency: Option<u32>,
    pub sleep_hook: Option<SleepHook>,
    pub code_end: Option<u32>,
    pub watched: Vec<(IoPin, usize)>,
    step_cycles: u64,
    /// (cycle, pin, level), in cycle order
    toggles: VecDeque<(u64, IoPin, bool)>,
    stop: Option<(u64, CpuState)>,
    steps: usize,
}

impl ScriptedMachine {
    pub fn new(step_cycles: u64) -> Self {
        Self {
            state: MachineState::new(TEST_RAM_END),
            display: FakeDisplay::default(),
            flash: vec![0; TEST_FLASH_SIZE],
            frequency: None,
            sleep_hook: None,
            code_end: None,
            watched: Vec::new(),
            step_cycles,
            toggles: VecDeque::new(),
            stop: None,
            steps: 0,
        }
    }

    /// Number of times `run_one` was called.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Change the level of `pin` at `cycle`. Toggles must be scripted in cycle order.
    pub fn toggle_at(&mut self, cycle: u64, pin: IoPin, level: bool) {
        self.toggles.push_back((cycle, pin, level));
    }

    /// Enter `state` once `cycle` is reached.
    pub fn stop_at(&mut self, cycle: u64, state: CpuState) {
        self.stop = Some((cycle, state));
    }
}

impl Machine for ScriptedMachine {
    type Display = FakeDisplay;

    fn state(&self) -> &MachineState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    fn display(&self) -> &FakeDisplay {
        &self.display
    }

    fn display_mut(&mut self) -> &mut FakeDisplay {
        &mut self.display
    }

    fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    fn set_frequency(&mut self, hz: u32) {
        self.frequency = Some(hz);
    }

    fn set_sleep_hook(&mut self, hook: SleepHook) {
        self.sleep_hook = Some(hook);
    }

    fn set_code_end(&mut self, addr: u32) {
        self.code_end = Some(addr);
    }

    fn watch_pin(&mut self, pin: IoPin, channel: usize) {
        self.watched.push((pin, channel));
    }

    fn run_one(&mut self, listener: &mut dyn PinListener) -> CpuState {
        self.steps += 1;
        if self.state.state.is_terminal() {
            return self.state.state;
        }

        let next = self.state.cycle + self.step_cycles;
        while let Some((cycle, pin, level)) = self.toggles.front().copied() {
            if cycle >= next {
                break;
            }
            self.toggles.pop_front();
            for (watched, channel) in &self.watched {
                if *watched == pin {
                    listener.pin_changed(*channel, level, cycle);
                }
            }
        }

        self.state.cycle = next;
        self.state.pc += 1;
        self.state.state = match self.stop {
            Some((cycle, state)) if next >= cycle => state,
            _ => CpuState::Running,
        };
        self.state.state
    }
}

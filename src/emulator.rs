use log::info;

use crate::config::{Config, Timing};
use crate::display::{Display, ARDUBOY_WIRING};
use crate::firmware::{Firmware, FirmwareError};
use crate::joypad::ButtonState;
use crate::machine::{no_op_sleep, IoPin, Machine};
use crate::scheduler::{FrameOutcome, FrameScheduler, FrameWindow};
use crate::snapshot::{self, SnapshotError};
use crate::video::{self, VideoFrame};
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Speaker lines, in audio channel order.
pub const SPEAKER_PINS: [IoPin; 2] = [IoPin::new('C', 6), IoPin::new('C', 7)];

/// The object that pulls everything together: it drives the machine frame by frame and exposes
/// what the host needs to present it (video, audio, input, save states).
pub struct Arduous<M: Machine> {
    machine: M,
    scheduler: FrameScheduler,
    config: Config,
}

impl<M: Machine> Arduous<M> {
    /// Flash `firmware` into `machine` and wire up the display and speaker.
    pub fn new(
        mut machine: M,
        firmware: &Firmware,
        config: Config,
    ) -> Result<Self, FirmwareError> {
        info!(
            "{} bootloader 0x{:05x}: {} bytes",
            config.mcu,
            firmware.base(),
            firmware.len()
        );

        let flash = machine.flash_mut();
        firmware.write_to(flash)?;
        let flash_end = flash.len().saturating_sub(1) as u32;

        let timing = config.timing;
        machine.set_frequency(timing.clock_hz());
        machine.set_sleep_hook(no_op_sleep);
        machine.state_mut().pc = firmware.base();
        machine.set_code_end(flash_end);

        let display = machine.display_mut();
        display.attach(SCREEN_WIDTH, SCREEN_HEIGHT);
        display.connect(&ARDUBOY_WIRING);

        for (channel, pin) in SPEAKER_PINS.iter().enumerate() {
            machine.watch_pin(*pin, channel);
        }

        info!(
            "{}Hz, {} cycles per frame, {} cycles per audio sample, {} samples per frame",
            timing.clock_hz(),
            timing.cycles_per_frame(),
            timing.cycles_per_sample(),
            timing.samples_per_frame()
        );

        Ok(Self {
            machine,
            scheduler: FrameScheduler::new(&timing),
            config,
        })
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timing(&self) -> &Timing {
        &self.config.timing
    }

    /// Cycle range covered by the last frame.
    pub fn frame_window(&self) -> FrameWindow {
        self.scheduler.window()
    }

    pub fn run_frame(&mut self) -> FrameOutcome {
        self.scheduler.run_frame(&mut self.machine)
    }

    /// Emulate `steps` video frames.
    pub fn update(&mut self, steps: usize) -> FrameOutcome {
        self.scheduler.run_steps(&mut self.machine, steps)
    }

    pub fn video_frame(&self) -> VideoFrame {
        video::extract_frame(self.machine.display().state())
    }

    /// Audio of the last frame: `2 * samples_per_frame` interleaved stereo samples.
    pub fn audio_frame(&mut self) -> &[i16] {
        self.scheduler.audio_mut().pull_frame()
    }

    pub fn set_buttons(&mut self, buttons: &ButtonState) {
        buttons.apply(&mut self.machine.state_mut().data);
    }

    pub fn snapshot_size(&self) -> usize {
        snapshot::snapshot_size(self.machine.state().data.len())
    }

    /// Write a snapshot of the machine and display into `buf`.
    pub fn save(&self, buf: &mut [u8]) -> Result<usize, SnapshotError> {
        let machine = self.machine.state();
        let display = self.machine.display().state();
        snapshot::write(machine, display, buf)
    }

    pub fn load(&mut self, buf: &[u8]) -> Result<(), SnapshotError> {
        let data_len = self.machine.state().data.len();
        let (machine, display) = snapshot::decode_sized(buf, data_len)?;

        *self.machine.state_mut() = machine;
        *self.machine.display_mut().state_mut() = display;
        Ok(())
    }
}

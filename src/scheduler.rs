use log::{debug, warn};

use crate::audio::AudioSynth;
use crate::config::Timing;
use crate::machine::{CpuState, Machine};

/// Half-open range of cycles `[start, end)` covered by a video frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    pub start: u64,
    pub end: u64,
}

impl FrameWindow {
    pub fn starting_at(cycle: u64, cycles_per_frame: u64) -> Self {
        Self {
            start: cycle,
            end: cycle.saturating_add(cycles_per_frame),
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// How a frame ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The whole cycle budget was executed.
    Completed,
    /// The CPU stopped for good (sleep with interrupts disabled, or the firmware exited).
    Halted { cycle: u64, pc: u32 },
    Crashed { cycle: u64, pc: u32 },
}

impl FrameOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Runs the machine one video frame at a time and collects the speaker output on the way.
#[derive(Debug)]
pub struct FrameScheduler {
    cycles_per_frame: u64,
    window: FrameWindow,
    audio: AudioSynth,
    last_outcome: FrameOutcome,
}

impl FrameScheduler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            cycles_per_frame: timing.cycles_per_frame(),
            window: FrameWindow::default(),
            audio: AudioSynth::new(timing),
            last_outcome: FrameOutcome::Completed,
        }
    }

    pub fn window(&self) -> FrameWindow {
        self.window
    }

    pub fn audio(&self) -> &AudioSynth {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioSynth {
        &mut self.audio
    }

    /// Step the machine until it reaches the end of the next frame.
    ///
    /// The last step may run past the end of the frame. If the CPU reaches a terminal state the
    /// frame is cut short; calling this again on a terminal machine returns right away.
    pub fn run_frame<M: Machine>(&mut self, machine: &mut M) -> FrameOutcome {
        self.window = FrameWindow::starting_at(machine.state().cycle, self.cycles_per_frame);
        self.audio.begin_frame(self.window.start);

        let mut outcome = FrameOutcome::Completed;
        while machine.state().cycle < self.window.end {
            let state = machine.run_one(&mut self.audio);
            if state.is_terminal() {
                let cycle = machine.state().cycle;
                let pc = machine.state().pc;
                outcome = if state == CpuState::Crashed {
                    FrameOutcome::Crashed { cycle, pc }
                } else {
                    FrameOutcome::Halted { cycle, pc }
                };
                break;
            }
        }

        if outcome != self.last_outcome {
            match outcome {
                FrameOutcome::Completed => debug!("CPU is running again"),
                FrameOutcome::Halted { cycle, pc } => {
                    warn!("CPU is done at cycle {} (PC=0x{:05x})", cycle, pc)
                }
                FrameOutcome::Crashed { cycle, pc } => {
                    warn!("CPU crashed at cycle {} (PC=0x{:05x})", cycle, pc)
                }
            }
        }
        self.last_outcome = outcome;

        outcome
    }

    /// Run `frames` frames back to back and report how the last one ended.
    pub fn run_steps<M: Machine>(&mut self, machine: &mut M, frames: usize) -> FrameOutcome {
        let mut outcome = FrameOutcome::Completed;
        for _ in 0..frames {
            outcome = self.run_frame(machine);
        }
        outcome
    }
}

use thiserror::Error;

/// ATmega32u4 running at 16MHz
pub const DEFAULT_MCU: &str = "atmega32u4";
pub const DEFAULT_CLOCK_HZ: u32 = 16_000_000;
pub const DEFAULT_FRAME_RATE: u32 = 60;
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
/// Last data space address of the ATmega32u4 (RAMEND)
pub const ATMEGA32U4_RAM_END: u16 = 0x0AFF;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("sample rate {sample_rate}Hz is higher than the clock frequency {clock_hz}Hz")]
    SampleRateTooHigh { sample_rate: u32, clock_hz: u32 },
    #[error("sample rate {sample_rate}Hz is lower than the frame rate {frame_rate}fps")]
    SampleRateTooLow { sample_rate: u32, frame_rate: u32 },
}

/// Fixed relationship between the emulated clock, the video frame rate and the audio sample
/// rate.
///
/// All derived quantities use integer division, so a frame always covers exactly
/// `cycles_per_frame` cycles and an audio frame always holds exactly `samples_per_frame` stereo
/// samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    clock_hz: u32,
    frame_rate: u32,
    sample_rate: u32,
}

impl Timing {
    pub fn new(clock_hz: u32, frame_rate: u32, sample_rate: u32) -> Result<Self, ConfigError> {
        if clock_hz == 0 {
            return Err(ConfigError::Zero("clock frequency"));
        }
        if frame_rate == 0 {
            return Err(ConfigError::Zero("frame rate"));
        }
        if sample_rate == 0 {
            return Err(ConfigError::Zero("sample rate"));
        }
        if sample_rate > clock_hz {
            return Err(ConfigError::SampleRateTooHigh {
                sample_rate,
                clock_hz,
            });
        }
        if sample_rate < frame_rate {
            return Err(ConfigError::SampleRateTooLow {
                sample_rate,
                frame_rate,
            });
        }

        Ok(Self {
            clock_hz,
            frame_rate,
            sample_rate,
        })
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of clock cycles covered by one video frame.
    pub fn cycles_per_frame(&self) -> u64 {
        (self.clock_hz / self.frame_rate) as u64
    }

    /// Number of clock cycles between two audio samples.
    pub fn cycles_per_sample(&self) -> u64 {
        (self.clock_hz / self.sample_rate) as u64
    }

    /// Number of (stereo) audio samples produced per video frame.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate / self.frame_rate) as usize
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            frame_rate: DEFAULT_FRAME_RATE,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name of the microcontroller the firmware targets. Only used for diagnostics, the machine
    /// itself is built by the integrator.
    pub mcu: String,
    pub timing: Timing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mcu: DEFAULT_MCU.to_string(),
            timing: Timing::default(),
        }
    }
}

use bitvec::{order::Lsb0, view::BitView};
use log::trace;

use crate::config::Timing;
use crate::machine::PinListener;

/// Last known level of the two speaker pins. Bit 0 is speaker pin 1, bit 1 is speaker pin 2.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpeakerPins(u8);

impl SpeakerPins {
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn set(&mut self, channel: usize, level: bool) {
        debug_assert!(channel < 2, "Invalid speaker channel {}", channel);
        self.0.view_bits_mut::<Lsb0>().set(channel, level);
    }

    pub fn is_high(&self, channel: usize) -> bool {
        self.0.view_bits::<Lsb0>()[channel]
    }
}

/// Map the speaker pin levels to a PCM sample.
///
/// The speaker is driven differentially: when both pins are at the same level there is no
/// current through it.
pub fn sample_value_for(pins: SpeakerPins) -> i16 {
    match pins.bits() {
        0b00 | 0b11 => 0,
        0b01 => i16::MAX,
        0b10 => i16::MIN,
        bits => panic!("Invalid speaker pin value {:#010b}", bits),
    }
}

/// Rebuilds the speaker waveform from pin toggles.
///
/// Sample slot `n` of a frame covers cycles `[n * cycles_per_sample, (n + 1) * cycles_per_sample)`
/// counted from the start of the frame and holds the pin levels as they were on the last cycle
/// of that range. Between toggles the last level is repeated.
#[derive(Debug)]
pub struct AudioSynth {
    pins: SpeakerPins,
    cycles_per_sample: u64,
    samples_per_frame: usize,
    frame_start: u64,
    /// Interleaved left/right samples
    buf: Vec<i16>,
}

impl AudioSynth {
    pub fn new(timing: &Timing) -> Self {
        let samples_per_frame = timing.samples_per_frame();
        Self {
            pins: SpeakerPins::default(),
            cycles_per_sample: timing.cycles_per_sample(),
            samples_per_frame,
            frame_start: 0,
            buf: Vec::with_capacity(samples_per_frame * 2),
        }
    }

    pub fn pins(&self) -> SpeakerPins {
        self.pins
    }

    /// Number of stereo samples in a complete frame.
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Number of stereo samples produced so far in the current frame.
    pub fn len(&self) -> usize {
        self.buf.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop the previous frame's samples and start counting cycles from `frame_start`.
    pub fn begin_frame(&mut self, frame_start: u64) {
        self.buf.clear();
        self.frame_start = frame_start;
    }

    /// Fill every sample slot that has fully elapsed at `cycle` with the current pin levels.
    pub fn extend_to_cycle(&mut self, cycle: u64) {
        let elapsed = cycle.saturating_sub(self.frame_start);
        let slots = (elapsed / self.cycles_per_sample).min(self.samples_per_frame as u64);
        self.extend_to_slot(slots as usize);
    }

    fn extend_to_slot(&mut self, slots: usize) {
        let sample = sample_value_for(self.pins);
        while self.buf.len() < slots * 2 {
            self.buf.push(sample);
            self.buf.push(sample);
        }
    }

    /// Complete the current frame with the last pin levels and return it.
    ///
    /// The returned buffer always holds exactly `2 * samples_per_frame` samples.
    pub fn pull_frame(&mut self) -> &[i16] {
        if self.buf.len() < self.samples_per_frame * 2 {
            self.extend_to_slot(self.samples_per_frame);
        }
        &self.buf
    }
}

impl PinListener for AudioSynth {
    fn pin_changed(&mut self, channel: usize, level: bool, cycle: u64) {
        // Samples up to this point were produced with the previous level
        self.extend_to_cycle(cycle);
        self.pins.set(channel, level);
        trace!(
            "speaker pin {} -> {} at cycle {} (sample {})",
            channel,
            level,
            cycle,
            self.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn synth() -> AudioSynth {
        // 100 cycles per sample, 10 samples per frame
        AudioSynth::new(&Timing::new(60_000, 60, 600).unwrap())
    }

    #[test]
    fn test_sample_values() {
        assert_eq!(sample_value_for(SpeakerPins::from_bits(0b00)), 0);
        assert_eq!(sample_value_for(SpeakerPins::from_bits(0b01)), 32767);
        assert_eq!(sample_value_for(SpeakerPins::from_bits(0b10)), -32768);
        assert_eq!(sample_value_for(SpeakerPins::from_bits(0b11)), 0);
    }

    #[test]
    #[should_panic(expected = "Invalid speaker pin value")]
    fn test_invalid_pin_value() {
        sample_value_for(SpeakerPins::from_bits(0b100));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Invalid speaker channel")]
    fn test_invalid_speaker_channel() {
        SpeakerPins::default().set(2, true);
    }

    #[test]
    fn test_speaker_pins() {
        let mut pins = SpeakerPins::default();
        pins.set(1, true);
        assert!(pins.is_high(1));
        assert!(!pins.is_high(0));
        assert_eq!(pins.bits(), 0b10);

        pins.set(1, false);
        assert_eq!(pins.bits(), 0);
    }

    #[test]
    fn test_silent_frame() {
        let mut synth = synth();
        synth.begin_frame(1000);

        let frame = synth.pull_frame();
        assert_eq!(frame.len(), 20);
        assert!(frame.iter().all(|s| *s == 0));
    }

    #[test]
    fn test_toggle_splits_frame() {
        let mut synth = synth();
        synth.begin_frame(1000);

        synth.pin_changed(0, true, 1350);
        assert_eq!(synth.len(), 3);
        synth.pin_changed(0, false, 1700);
        assert_eq!(synth.len(), 7);

        let frame = synth.pull_frame();
        let left: Vec<i16> = frame.iter().step_by(2).copied().collect();
        assert_eq!(
            left,
            vec![0, 0, 0, i16::MAX, i16::MAX, i16::MAX, i16::MAX, 0, 0, 0]
        );
        // both channels carry the same signal
        assert!(frame.chunks(2).all(|lr| lr[0] == lr[1]));
    }

    #[test]
    fn test_begin_frame_clears_buffer() {
        let mut synth = synth();
        synth.begin_frame(0);
        synth.pin_changed(1, true, 500);
        synth.pull_frame();

        synth.begin_frame(1000);
        assert!(synth.is_empty());
        // the pin level carries over into the next frame
        assert!(synth.pull_frame().iter().all(|s| *s == i16::MIN));
    }

    #[test]
    fn test_events_past_frame_end_are_capped() {
        let mut synth = synth();
        synth.begin_frame(0);
        synth.pin_changed(0, true, 5000);

        assert_eq!(synth.len(), 10);
        assert_eq!(synth.pull_frame().len(), 20);
    }

    #[test]
    fn test_event_before_frame_start() {
        let mut synth = synth();
        synth.begin_frame(1000);
        synth.pin_changed(0, true, 10);

        assert!(synth.is_empty());
        assert!(synth.pull_frame().iter().all(|s| *s == i16::MAX));
    }

    proptest! {
        #[test]
        fn test_frame_length_prop(events in prop::collection::vec((0usize..2, any::<bool>(), 0u64..1500), 0..50)) {
            let mut synth = synth();
            synth.begin_frame(0);
            let mut events = events;
            events.sort_by_key(|(_, _, cycle)| *cycle);
            for (channel, level, cycle) in events {
                synth.pin_changed(channel, level, cycle);
            }

            prop_assert_eq!(synth.pull_frame().len(), 20);
        }

        #[test]
        fn test_zero_order_hold_prop(before in 0u8..4, after in 0u8..4, event in 0u64..1000) {
            let mut synth = synth();
            synth.begin_frame(0);
            synth.pins = SpeakerPins::from_bits(before);
            synth.extend_to_cycle(event);
            synth.pins = SpeakerPins::from_bits(after);

            let old = sample_value_for(SpeakerPins::from_bits(before));
            let new = sample_value_for(SpeakerPins::from_bits(after));
            for (slot, lr) in synth.pull_frame().chunks(2).enumerate() {
                // last cycle covered by the slot
                let position = (slot as u64 + 1) * 100 - 1;
                let expected = if position < event { old } else { new };
                prop_assert_eq!(lr[0], expected);
                prop_assert_eq!(lr[1], expected);
            }
        }
    }
}

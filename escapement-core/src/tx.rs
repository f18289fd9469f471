//! Transmit bit shifter
//!
//! One byte at a time is clocked onto the TX pin by a state machine that
//! advances one bit slot per timer firing: start bit LOW, eight data bits
//! LSB-first, stop bit HIGH, then one terminal firing that performs no
//! pin write and reports completion to the waiting writer.

use escapement_hal::OutputPin;

use crate::line::DATA_BITS;

const START_BIT: i8 = -1;
const STOP_BIT: i8 = DATA_BITS as i8;

/// What a TX timer firing did to the frame in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxTick {
    /// A bit slot was driven; re-arm the timer one bit period forward.
    Continue,
    /// The frame is done; do not re-arm, release the waiting writer.
    Complete,
}

/// Per-byte transmit state machine.
///
/// `load` and `tick` never run concurrently: the facade waits for
/// `Complete` before loading the next byte, and a load resets the byte
/// and the bit index together.
#[derive(Debug)]
pub struct TxShifter {
    byte: u8,
    bit_index: i8,
}

impl TxShifter {
    pub const fn new() -> Self {
        Self {
            byte: 0,
            bit_index: START_BIT,
        }
    }

    /// Stage `byte` and rewind to the start bit.
    pub fn load(&mut self, byte: u8) {
        self.byte = byte;
        self.bit_index = START_BIT;
    }

    /// Advance one bit slot. Called once per TX timer firing.
    pub fn tick<P: OutputPin>(&mut self, pin: &mut P) -> TxTick {
        match self.bit_index {
            START_BIT => pin.set_low(),
            i if i < STOP_BIT => pin.set_state(self.byte & (1 << i) != 0),
            STOP_BIT => pin.set_high(),
            _ => return TxTick::Complete,
        }
        self.bit_index += 1;
        TxTick::Continue
    }
}

impl Default for TxShifter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::vec::Vec;

    #[derive(Default)]
    struct RecordingPin {
        levels: Vec<bool>,
    }

    impl OutputPin for RecordingPin {
        fn set_high(&mut self) {
            self.levels.push(true);
        }

        fn set_low(&mut self) {
            self.levels.push(false);
        }
    }

    fn clock_out(byte: u8) -> (Vec<bool>, u32) {
        let mut shifter = TxShifter::new();
        let mut pin = RecordingPin::default();
        shifter.load(byte);
        let mut firings = 0;
        loop {
            firings += 1;
            if shifter.tick(&mut pin) == TxTick::Complete {
                break;
            }
        }
        (pin.levels, firings)
    }

    fn frame_levels(byte: u8) -> Vec<bool> {
        let mut levels = Vec::new();
        levels.push(false);
        for i in 0..DATA_BITS {
            levels.push(byte & (1 << i) != 0);
        }
        levels.push(true);
        levels
    }

    #[test]
    fn test_frame_for_0x41() {
        let (levels, _) = clock_out(0x41);
        assert_eq!(
            levels,
            [false, true, false, false, false, false, false, true, false, true]
        );
    }

    #[test]
    fn test_eleven_firings_per_byte() {
        let (_, firings) = clock_out(0x00);
        assert_eq!(firings, 11);
    }

    #[test]
    fn test_terminal_firing_writes_nothing() {
        let (levels, firings) = clock_out(0xFF);
        assert_eq!(levels.len() as u32, firings - 1);
    }

    #[test]
    fn test_load_rewinds_mid_frame() {
        let mut shifter = TxShifter::new();
        let mut pin = RecordingPin::default();
        shifter.load(0xFF);
        for _ in 0..3 {
            assert_eq!(shifter.tick(&mut pin), TxTick::Continue);
        }
        pin.levels.clear();
        shifter.load(0x41);
        let mut firings = 0;
        loop {
            firings += 1;
            if shifter.tick(&mut pin) == TxTick::Complete {
                break;
            }
        }
        assert_eq!(firings, 11);
        assert_eq!(pin.levels, frame_levels(0x41));
    }

    proptest! {
        #[test]
        fn test_waveform_matches_frame_expansion(byte: u8) {
            let (levels, firings) = clock_out(byte);
            prop_assert_eq!(levels, frame_levels(byte));
            prop_assert_eq!(firings, 11);
        }
    }
}

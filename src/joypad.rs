use bitvec::{order::Lsb0, view::BitView};

// Input registers (data space addresses)
pub const PINB: usize = 0x23;
pub const PINE: usize = 0x2C;
pub const PINF: usize = 0x2F;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Button {
    A = 0,
    B,
    Up,
    Down,
    Left,
    Right,
}

/// Where each button is wired: (input register, bit, button).
///
/// Buttons pull their line low when pressed.
const BUTTON_MAP: [(usize, usize, Button); 6] = [
    (PINB, 4, Button::B),
    (PINE, 6, Button::A),
    (PINF, 7, Button::Up),
    (PINF, 6, Button::Right),
    (PINF, 5, Button::Left),
    (PINF, 4, Button::Down),
];

/// Snapshot of which buttons are held down.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ButtonState {
    pub a: bool,
    pub b: bool,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl ButtonState {
    pub fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::A => self.a,
            Button::B => self.b,
            Button::Up => self.up,
            Button::Down => self.down,
            Button::Left => self.left,
            Button::Right => self.right,
        }
    }

    pub fn set_pressed(&mut self, button: Button, is_pressed: bool) {
        match button {
            Button::A => self.a = is_pressed,
            Button::B => self.b = is_pressed,
            Button::Up => self.up = is_pressed,
            Button::Down => self.down = is_pressed,
            Button::Left => self.left = is_pressed,
            Button::Right => self.right = is_pressed,
        }
    }

    /// Drive the button lines in the machine's data space. Bits not wired to a button are left
    /// untouched.
    ///
    /// `data` must reach at least `PINF` (0x30 bytes), which every ATmega32u4 data space does.
    pub fn apply(&self, data: &mut [u8]) {
        for (reg, bit, button) in BUTTON_MAP {
            data[reg]
                .view_bits_mut::<Lsb0>()
                .set(bit, !self.is_pressed(button));
        }
    }
}

use bitvec::prelude::*;

use crate::display::DisplayState;
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// One monochrome frame, row-major: pixel `(x, y)` is at index `y * SCREEN_WIDTH + x`.
pub type VideoFrame = BitVec;

const PIXEL_ON: u8 = 0xFF;
const PIXEL_OFF: u8 = 0x00;

/// Unpack the paged VRAM into a dense bitmap.
///
/// Bit `i` of the byte at page `p`, column `c` is pixel `(c, p * 8 + i)`.
pub fn extract_frame(display: &DisplayState) -> VideoFrame {
    let mut frame = bitvec![0; SCREEN_WIDTH * SCREEN_HEIGHT];

    for (page, columns) in display.vram.iter().enumerate() {
        for (column, byte) in columns.iter().enumerate() {
            for i in byte.view_bits::<Lsb0>().iter_ones() {
                let y = page * 8 + i;
                frame.set(y * SCREEN_WIDTH + column, true);
            }
        }
    }

    frame
}

pub fn pixel(frame: &VideoFrame, x: usize, y: usize) -> bool {
    frame[y * SCREEN_WIDTH + x]
}

/// Expand a frame into 8-bit greyscale, each pixel repeated `scale` times in both directions.
pub fn to_luma(frame: &VideoFrame, scale: usize) -> Vec<u8> {
    let width = SCREEN_WIDTH * scale;
    let mut luma = Vec::with_capacity(width * SCREEN_HEIGHT * scale);

    for y in 0..SCREEN_HEIGHT {
        let row: Vec<u8> = (0..SCREEN_WIDTH)
            .flat_map(|x| {
                let value = if pixel(frame, x, y) { PIXEL_ON } else { PIXEL_OFF };
                std::iter::repeat(value).take(scale)
            })
            .collect();
        for _ in 0..scale {
            luma.extend_from_slice(&row);
        }
    }

    luma
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{VRAM_COLUMNS, VRAM_PAGES};

    #[test]
    fn test_blank_display() {
        let frame = extract_frame(&DisplayState::default());

        assert_eq!(frame.len(), SCREEN_WIDTH * SCREEN_HEIGHT);
        assert!(frame.not_any());
    }

    #[test]
    fn test_lsb_is_top_pixel() {
        let mut display = DisplayState::default();
        display.vram[1][5] = 0b1000_0001;

        let frame = extract_frame(&display);
        assert!(pixel(&frame, 5, 8));
        assert!(pixel(&frame, 5, 15));
        assert!(!pixel(&frame, 5, 9));
        assert_eq!(frame.count_ones(), 2);
    }

    #[test]
    fn test_corners() {
        let mut display = DisplayState::default();
        display.vram[0][0] = 0x01;
        display.vram[VRAM_PAGES - 1][VRAM_COLUMNS - 1] = 0x80;

        let frame = extract_frame(&display);
        assert!(frame[0]);
        assert!(frame[SCREEN_WIDTH * SCREEN_HEIGHT - 1]);
        assert_eq!(frame.count_ones(), 2);
    }

    #[test]
    fn test_to_luma() {
        let mut display = DisplayState::default();
        display.vram[0][1] = 0x01;
        let frame = extract_frame(&display);

        let luma = to_luma(&frame, 2);
        assert_eq!(luma.len(), SCREEN_WIDTH * SCREEN_HEIGHT * 4);
        // pixel (1, 0) covers (2..4, 0..2) once scaled
        let width = SCREEN_WIDTH * 2;
        assert_eq!(&luma[0..5], &[0, 0, 0xFF, 0xFF, 0]);
        assert_eq!(&luma[width..width + 5], &[0, 0, 0xFF, 0xFF, 0]);
        assert_eq!(luma[2 * width + 2], 0);
    }

    proptest! {
        #[test]
        fn test_extract_frame_prop(bytes in prop::collection::vec(any::<u8>(), VRAM_PAGES * VRAM_COLUMNS)) {
            let mut display = DisplayState::default();
            for (i, b) in bytes.iter().enumerate() {
                display.vram[i / VRAM_COLUMNS][i % VRAM_COLUMNS] = *b;
            }

            let frame = extract_frame(&display);
            for y in 0..SCREEN_HEIGHT {
                for x in 0..SCREEN_WIDTH {
                    let byte = display.vram[y / 8][x];
                    prop_assert_eq!(pixel(&frame, x, y), byte & (1 << (y % 8)) != 0);
                }
            }
        }
    }
}

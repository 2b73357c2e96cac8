//! Screen regions the radio draws its readouts into.

use crate::models::framebuffer::Rect;
use crate::ocr::fonts::{Font, LARGE_FONT, SMALL_FONT};
use crate::ocr::recognizer::ScanStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CenterFrequency,
    StartFrequency,
    EndFrequency,
    Impedance,
    Bars,
    Step,
    Modulation,
    Bandwidth,
}

#[derive(Debug, Clone, Copy)]
pub struct Zone {
    pub area: Rect,
    pub font: &'static Font,
    pub strategy: ScanStrategy,
}

impl Field {
    pub fn zone(self) -> Zone {
        use ScanStrategy::*;
        let (area, font, strategy) = match self {
            Field::CenterFrequency => (Rect::new(35, 8, 70, 7), &LARGE_FONT, Anchored),
            Field::StartFrequency => (Rect::new(0, 57, 40, 5), &SMALL_FONT, LeftToRight),
            Field::EndFrequency => (Rect::new(93, 57, 40, 5), &SMALL_FONT, LeftToRight),
            Field::Impedance => (Rect::new(0, 1, 35, 5), &SMALL_FONT, LeftToRight),
            Field::Bars => (Rect::new(0, 9, 15, 5), &SMALL_FONT, LeftToRight),
            Field::Step => (Rect::new(0, 15, 30, 5), &SMALL_FONT, LeftToRight),
            Field::Modulation => (Rect::new(115, 9, 12, 5), &SMALL_FONT, RightToLeft),
            Field::Bandwidth => (Rect::new(97, 15, 30, 5), &SMALL_FONT, RightToLeft),
        };
        Zone {
            area,
            font,
            strategy,
        }
    }
}

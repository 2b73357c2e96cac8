pub mod framebuffer;

pub use framebuffer::{Framebuffer, Rect, BLOCK_COUNT, BLOCK_SIZE, FRAME_SIZE, HEIGHT, WIDTH};

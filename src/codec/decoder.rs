//! Resynchronizing decoder for the radio's screen protocol.
//!
//! Wire format: `AA 55 <type:1> <len:2 BE> <payload:len>`.
//!
//! The decoder is fed raw bytes as they arrive and hands back complete
//! frames. Garbage between frames, a broken magic, or a frame with an
//! unknown type or impossible length never stops the stream: the offending
//! bytes are dropped and scanning resumes. A frame whose payload has not
//! fully arrived stays buffered untouched until the next push.

use bytes::{Buf, Bytes, BytesMut};

use crate::log_trace;
use crate::models::framebuffer::{Framebuffer, DIFF_BLOCK_LEN, FRAME_SIZE};

const ENABLE_LOGS: bool = false;

pub const MAGIC: [u8; 2] = [0xAA, 0x55];
pub const TYPE_SCREENSHOT: u8 = 0x01;
pub const TYPE_DIFF: u8 = 0x02;
/// Magic, type and length.
pub const PREFIX_LEN: usize = 5;

/// A decoded frame, not yet applied to any framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Screenshot(Framebuffer),
    Diff(Bytes),
}

impl WireFrame {
    /// Produces the framebuffer that results from applying this frame to
    /// `current`. `current` itself is never modified.
    pub fn apply(self, current: &Framebuffer) -> Framebuffer {
        match self {
            WireFrame::Screenshot(fb) => fb,
            WireFrame::Diff(payload) => current.with_diff(&payload),
        }
    }
}

/// Counters for bytes and frames the decoder threw away while resyncing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames: u64,
    pub skipped_bytes: u64,
    pub rejected_frames: u64,
}

pub struct FrameDecoder {
    buffer: BytesMut,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * FRAME_SIZE),
            stats: DecoderStats::default(),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Extracts the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<WireFrame> {
        loop {
            match self.buffer.iter().position(|&b| b == MAGIC[0]) {
                Some(pos) => self.skip(pos),
                None => {
                    let len = self.buffer.len();
                    self.skip(len);
                    return None;
                }
            }

            if self.buffer.len() < MAGIC.len() {
                return None;
            }
            if self.buffer[1] != MAGIC[1] {
                // The byte after a lone 0xAA may itself start the next header.
                self.skip(1);
                continue;
            }

            if self.buffer.len() < PREFIX_LEN {
                return None;
            }
            let frame_type = self.buffer[2];
            let len = u16::from_be_bytes([self.buffer[3], self.buffer[4]]) as usize;

            if !is_acceptable(frame_type, len) {
                log_trace!("dropping frame type={frame_type:#04x} len={len}");
                self.stats.rejected_frames += 1;
                self.buffer.advance(PREFIX_LEN);
                continue;
            }

            if self.buffer.len() < PREFIX_LEN + len {
                return None;
            }

            self.buffer.advance(PREFIX_LEN);
            let payload = self.buffer.split_to(len).freeze();
            let frame = match frame_type {
                TYPE_SCREENSHOT => match Framebuffer::from_bytes(&payload) {
                    Some(fb) => WireFrame::Screenshot(fb),
                    None => continue,
                },
                _ => WireFrame::Diff(payload),
            };
            self.stats.frames += 1;
            return Some(frame);
        }
    }

    fn skip(&mut self, count: usize) {
        if count > 0 {
            self.buffer.advance(count);
            self.stats.skipped_bytes += count as u64;
        }
    }
}

fn is_acceptable(frame_type: u8, len: usize) -> bool {
    match frame_type {
        TYPE_SCREENSHOT => len == FRAME_SIZE,
        TYPE_DIFF => len > 0 && len % DIFF_BLOCK_LEN == 0,
        _ => false,
    }
}

/// Encodes a frame in wire format. Used by device simulators and tests.
pub fn encode_frame(frame_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(PREFIX_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.push(frame_type);
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

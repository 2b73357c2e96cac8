use std::io::{ErrorKind, Read, Write};

use anyhow::{Context, Result};

use super::decoder::{DecoderStats, FrameDecoder};
use crate::log_trace;
use crate::models::framebuffer::{Framebuffer, FRAME_SIZE};

const ENABLE_LOGS: bool = false;

/// Sent after every parse attempt so the radio keeps streaming.
pub const KEEPALIVE: [u8; 4] = [0x55, 0xAA, 0x00, 0x00];

const READ_CHUNK: usize = FRAME_SIZE + 64;

/// Couples a byte transport with a [`FrameDecoder`] and the framebuffer the
/// radio's diffs are relative to.
pub struct FrameLink<L> {
    link: L,
    decoder: FrameDecoder,
    current: Framebuffer,
    scratch: Vec<u8>,
}

impl<L: Read + Write> FrameLink<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            decoder: FrameDecoder::new(),
            current: Framebuffer::new(),
            scratch: vec![0u8; READ_CHUNK],
        }
    }

    /// One parse attempt: returns the next reconstructed framebuffer, or
    /// `None` when the link had nothing complete to offer within its read
    /// timeout. The keep-alive goes out either way.
    ///
    /// Only transport failures are errors; framing problems are absorbed by
    /// the decoder.
    pub fn poll(&mut self) -> Result<Option<Framebuffer>> {
        let outcome = self.read_frame();
        self.send_keepalive();
        outcome
    }

    /// The most recently reconstructed framebuffer.
    pub fn current(&self) -> &Framebuffer {
        &self.current
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn get_ref(&self) -> &L {
        &self.link
    }

    fn read_frame(&mut self) -> Result<Option<Framebuffer>> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                let next = frame.apply(&self.current);
                self.current = next.clone();
                return Ok(Some(next));
            }

            let read = match self.link.read(&mut self.scratch) {
                Ok(0) => return Ok(None),
                Ok(n) => n,
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    return Ok(None)
                }
                Err(err) => return Err(err).context("serial link read failed"),
            };
            self.decoder.push(&self.scratch[..read]);
        }
    }

    fn send_keepalive(&mut self) {
        // A dead link shows up on the next read.
        if let Err(err) = self.link.write_all(&KEEPALIVE).and_then(|_| self.link.flush()) {
            log_trace!("keep-alive not sent: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decoder::{encode_frame, TYPE_DIFF, TYPE_SCREENSHOT};
    use std::collections::VecDeque;
    use std::io;

    /// Scripted transport: each read hands out the next queued chunk.
    #[derive(Default)]
    struct ScriptedLink {
        reads: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<u8>,
        fail_writes: bool,
    }

    impl Read for ScriptedLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(err)) => Err(err),
                None => Err(io::Error::new(ErrorKind::TimedOut, "no data")),
            }
        }
    }

    impl Write for ScriptedLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "gone"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn diff(index: u8, fill: u8) -> Vec<u8> {
        let mut payload = vec![index];
        payload.extend_from_slice(&[fill; 8]);
        encode_frame(TYPE_DIFF, &payload)
    }

    #[test]
    fn keepalive_follows_every_attempt() {
        let mut link = ScriptedLink::default();
        link.reads.push_back(Ok(diff(0, 0xFF)));
        let mut frames = FrameLink::new(link);

        assert!(frames.poll().unwrap().is_some());
        assert!(frames.poll().unwrap().is_none());
        assert_eq!(frames.get_ref().written, [KEEPALIVE, KEEPALIVE].concat());
    }

    #[test]
    fn diffs_accumulate_on_reconstructed_buffer() {
        let mut link = ScriptedLink::default();
        let mut screenshot = vec![0u8; FRAME_SIZE];
        screenshot[FRAME_SIZE - 1] = 0x80;
        link.reads.push_back(Ok(encode_frame(TYPE_SCREENSHOT, &screenshot)));
        link.reads.push_back(Ok(diff(0, 0x01)));
        let mut frames = FrameLink::new(link);

        let first = frames.poll().unwrap().expect("screenshot");
        let second = frames.poll().unwrap().expect("diff");
        assert_eq!(first.as_bytes()[0], 0x00);
        assert_eq!(second.as_bytes()[0], 0x01);
        assert_eq!(second.as_bytes()[FRAME_SIZE - 1], 0x80);
        assert_eq!(frames.current(), &second);
    }

    #[test]
    fn starved_frame_completes_on_later_poll() {
        let mut link = ScriptedLink::default();
        let bytes = diff(2, 0xAB);
        link.reads.push_back(Ok(bytes[..4].to_vec()));
        link.reads
            .push_back(Err(io::Error::new(ErrorKind::TimedOut, "timeout")));
        link.reads.push_back(Ok(bytes[4..].to_vec()));
        let mut frames = FrameLink::new(link);

        assert!(frames.poll().unwrap().is_none());
        let fb = frames.poll().unwrap().expect("completed diff");
        assert_eq!(&fb.as_bytes()[16..24], &[0xAB; 8]);
    }

    #[test]
    fn transport_error_is_fatal_but_keepalive_failure_is_not() {
        let mut link = ScriptedLink {
            fail_writes: true,
            ..Default::default()
        };
        link.reads.push_back(Ok(diff(1, 0x10)));
        link.reads.push_back(Err(io::Error::new(
            ErrorKind::BrokenPipe,
            "device unplugged",
        )));
        let mut frames = FrameLink::new(link);

        assert!(frames.poll().unwrap().is_some());
        assert!(frames.poll().is_err());
    }
}

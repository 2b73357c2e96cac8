use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::codec::FrameLink;
use crate::models::framebuffer::Framebuffer;

/// A reconstructed framebuffer and the moment the reader completed it.
pub type Arrival = (Instant, Framebuffer);

/// How the reader thread ended.
#[derive(Debug)]
pub enum ReaderExit {
    Cancelled,
    /// The orchestrator dropped its end of the frame queue.
    Abandoned,
    LinkFailed(anyhow::Error),
}

pub struct ReaderHandle {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    done_rx: Receiver<ReaderExit>,
    exit: Option<ReaderExit>,
}

/// Starts the reader thread. Every reconstructed framebuffer is sent on
/// `frames` stamped with its arrival time; the link's read timeout bounds how
/// long cancellation can go unnoticed.
pub fn spawn_reader<L>(link: L, frames: Sender<Arrival>) -> Result<ReaderHandle>
where
    L: Read + Write + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let (done_tx, done_rx) = mpsc::channel();

    let handle = thread::Builder::new()
        .name("k5viewer-reader".into())
        .spawn(move || {
            let exit = read_loop(FrameLink::new(link), frames, token);
            let _ = done_tx.send(exit);
        })
        .context("failed to spawn serial reader thread")?;

    Ok(ReaderHandle {
        cancel,
        handle: Some(handle),
        done_rx,
        exit: None,
    })
}

fn read_loop<L: Read + Write>(
    mut link: FrameLink<L>,
    frames: Sender<Arrival>,
    cancel: CancellationToken,
) -> ReaderExit {
    info!("Serial reader started");
    while !cancel.is_cancelled() {
        match link.poll() {
            Ok(Some(framebuffer)) => {
                if frames.send((Instant::now(), framebuffer)).is_err() {
                    return ReaderExit::Abandoned;
                }
            }
            Ok(None) => {}
            Err(err) => {
                error!("Serial reader stopped: {err:#}");
                return ReaderExit::LinkFailed(err);
            }
        }
    }

    let stats = link.decoder_stats();
    info!(
        "Serial reader stopped after {} frames ({} bytes skipped, {} frames rejected)",
        stats.frames, stats.skipped_bytes, stats.rejected_frames
    );
    ReaderExit::Cancelled
}

impl ReaderHandle {
    /// Non-blocking check for a finished reader. The exit is kept so later
    /// calls see it too.
    pub fn exit(&mut self) -> Option<&ReaderExit> {
        if self.exit.is_none() {
            match self.done_rx.try_recv() {
                Ok(exit) => self.exit = Some(exit),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.exit = Some(ReaderExit::LinkFailed(anyhow::anyhow!(
                        "serial reader thread panicked"
                    )))
                }
            }
        }
        self.exit.as_ref()
    }

    /// Cancels the reader and waits up to `timeout` for it to finish. A reader
    /// stuck in I/O is detached rather than waited on; returns whether it
    /// finished in time.
    pub fn stop(mut self, timeout: Duration) -> bool {
        self.cancel.cancel();

        let finished = self.exit.is_some()
            || match self.done_rx.recv_timeout(timeout) {
                Ok(exit) => {
                    self.exit = Some(exit);
                    true
                }
                Err(RecvTimeoutError::Disconnected) => true,
                Err(RecvTimeoutError::Timeout) => false,
            };

        match self.handle.take() {
            Some(handle) if finished => {
                if handle.join().is_err() {
                    error!("Serial reader thread panicked");
                }
            }
            Some(_) => warn!("Serial reader did not stop within {timeout:?}; detaching"),
            None => {}
        }
        finished
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_frame, TYPE_DIFF};
    use std::io::{self, ErrorKind};
    use std::sync::{Arc, Mutex};

    /// Replays queued chunks, then reports timeouts (or a failure if asked).
    struct QueueLink {
        chunks: Arc<Mutex<Vec<Vec<u8>>>>,
        fail_when_empty: bool,
    }

    impl Read for QueueLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let next = self.chunks.lock().unwrap().pop();
            match next {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None if self.fail_when_empty => {
                    Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
                }
                None => {
                    thread::sleep(Duration::from_millis(5));
                    Err(io::Error::new(ErrorKind::TimedOut, "idle"))
                }
            }
        }
    }

    impl Write for QueueLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn diff_frame(index: u8) -> Vec<u8> {
        let mut payload = vec![index];
        payload.extend_from_slice(&[0xFF; 8]);
        encode_frame(TYPE_DIFF, &payload)
    }

    #[test]
    fn forwards_frames_and_stops_on_cancel() {
        let link = QueueLink {
            chunks: Arc::new(Mutex::new(vec![diff_frame(1), diff_frame(0)])),
            fail_when_empty: false,
        };
        let (tx, rx) = mpsc::channel();
        let reader = spawn_reader(link, tx).unwrap();

        let (first_at, first) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let (second_at, second) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.lit_count(), 64);
        assert_eq!(second.lit_count(), 128);
        assert!(second_at >= first_at);

        assert!(reader.stop(Duration::from_secs(2)));
    }

    #[test]
    fn link_failure_is_reported() {
        let link = QueueLink {
            chunks: Arc::new(Mutex::new(Vec::new())),
            fail_when_empty: true,
        };
        let (tx, _rx) = mpsc::channel();
        let mut reader = spawn_reader(link, tx).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while reader.exit().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(reader.exit(), Some(ReaderExit::LinkFailed(_))));
        assert!(reader.stop(Duration::from_secs(1)));
    }
}

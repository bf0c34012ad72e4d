//! The output sink: a byte buffer with a grow-or-pause policy.
//!
//! In REALLOC mode the sink owns its backing allocation and grows it on
//! demand. In PAUSE mode the buffer is fixed-size and shuttles between the
//! producing walker and a consuming iterator through a strict rendezvous:
//! when the buffer fills, the producer parks it in the shared slot, the
//! consumer drains bytes `[0, idx)`, resets the index, and hands the buffer
//! back.

use std::mem;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Error, ErrorKind, Result};

pub(crate) struct Sink {
    pub(crate) buf: Vec<u8>,
    pub(crate) idx: usize,
    mode: Mode,
}

enum Mode {
    Realloc,
    Pause(Arc<Rendezvous>),
}

impl Sink {
    /// A growable sink with `initial` bytes of capacity.
    pub(crate) fn realloc(initial: usize) -> Result<Sink> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(initial)
            .map_err(|_| Error::from(ErrorKind::OutOfMemory))?;
        buf.resize(initial, 0);
        Ok(Sink {
            buf,
            idx: 0,
            mode: Mode::Realloc,
        })
    }

    /// A fixed-size sink backed by the rendezvous buffer. Blocks until the
    /// consumer asks for output.
    pub(crate) fn pause(shared: Arc<Rendezvous>) -> Result<Sink> {
        let buf = shared.producer_start()?;
        Ok(Sink {
            buf,
            idx: 0,
            mode: Mode::Pause(shared),
        })
    }

    /// Reserves room for `n` more bytes, growing or pausing as configured.
    #[inline]
    pub(crate) fn ensure(&mut self, n: usize) -> Result<()> {
        if self.idx + n < self.buf.len() {
            return Ok(());
        }
        self.ensure_slow(n)
    }

    #[cold]
    fn ensure_slow(&mut self, n: usize) -> Result<()> {
        match &self.mode {
            Mode::Realloc => self.grow(n),
            Mode::Pause(shared) => {
                let shared = Arc::clone(shared);
                shared.producer_handoff(&mut self.buf, &mut self.idx)
            }
        }
    }

    // Grow to 1.5x the current capacity, or past the request when 1.5x
    // would not cover it.
    fn grow(&mut self, n: usize) -> Result<()> {
        let len = self.buf.len();
        let needed = self.idx + n;
        let mut target = len + (len + 1) / 2;
        if needed >= target {
            target = needed + (needed + 1) / 2;
        }
        self.buf
            .try_reserve_exact(target - len)
            .map_err(|_| Error::from(ErrorKind::OutOfMemory))?;
        self.buf.resize(target, 0);
        Ok(())
    }

    /// Appends one byte. Space must already be ensured.
    #[inline]
    pub(crate) fn push(&mut self, b: u8) {
        self.buf[self.idx] = b;
        self.idx += 1;
    }

    /// Appends a byte run. Space must already be ensured.
    #[inline]
    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.idx..self.idx + bytes.len()].copy_from_slice(bytes);
        self.idx += bytes.len();
    }

    /// Consumes the sink, returning the produced bytes (REALLOC) or parking
    /// the final region for the consumer (PAUSE, where the return value is
    /// empty).
    pub(crate) fn finish(self, fault: Option<Error>) -> Vec<u8> {
        match self.mode {
            Mode::Realloc => {
                let mut buf = self.buf;
                buf.truncate(self.idx);
                buf
            }
            Mode::Pause(shared) => {
                shared.producer_finish(self.buf, self.idx, fault);
                Vec::new()
            }
        }
    }
}

/// What the consumer got out of one rendezvous.
pub(crate) enum Drained {
    /// An intermediate region; the producer is still running.
    Chunk(Vec<u8>),
    /// The final region, possibly empty, with the producer's outcome.
    Final(Vec<u8>, Option<Error>),
}

struct Slot {
    /// The shuttling buffer. `None` while the producer owns it.
    chunk: Option<Vec<u8>>,
    /// Valid prefix length of `chunk`.
    len: usize,
    /// The consumer has asked for output.
    invited: bool,
    /// The producer has returned; `chunk` holds the final region.
    done: bool,
    /// The producer's fault, if it returned one.
    fault: Option<Error>,
    /// The consumer went away; the producer should stop.
    aborted: bool,
}

/// The single-slot mailbox both sides of a paused transcode rendezvous on.
pub(crate) struct Rendezvous {
    slot: Mutex<Slot>,
    cv: Condvar,
}

impl Rendezvous {
    pub(crate) fn new(buf: Vec<u8>) -> Rendezvous {
        Rendezvous {
            slot: Mutex::new(Slot {
                chunk: Some(buf),
                len: 0,
                invited: false,
                done: false,
                fault: None,
                aborted: false,
            }),
            cv: Condvar::new(),
        }
    }

    // Producer side: wait to be invited, then take the buffer.
    fn producer_start(&self) -> Result<Vec<u8>> {
        let mut slot = self.slot.lock().unwrap();
        loop {
            if slot.aborted {
                return Err(ErrorKind::Aborted.into());
            }
            if slot.invited {
                return Ok(slot.chunk.take().expect("rendezvous buffer missing"));
            }
            slot = self.cv.wait(slot).unwrap();
        }
    }

    // Producer side: park the full buffer, wait for the consumer to drain
    // it, then take it back with the index reset.
    fn producer_handoff(&self, buf: &mut Vec<u8>, idx: &mut usize) -> Result<()> {
        let mut slot = self.slot.lock().unwrap();
        slot.chunk = Some(mem::take(buf));
        slot.len = *idx;
        self.cv.notify_one();
        loop {
            if slot.aborted {
                return Err(ErrorKind::Aborted.into());
            }
            if slot.len == 0 && slot.chunk.is_some() && slot.invited {
                *buf = slot.chunk.take().expect("rendezvous buffer missing");
                *idx = 0;
                return Ok(());
            }
            slot = self.cv.wait(slot).unwrap();
        }
    }

    // Producer side: park the final region and the outcome. Always
    // notifies, so a waiting consumer observes completion.
    fn producer_finish(&self, buf: Vec<u8>, idx: usize, fault: Option<Error>) {
        let mut slot = self.slot.lock().unwrap();
        slot.chunk = Some(buf);
        slot.len = idx;
        slot.done = true;
        slot.fault = fault;
        self.cv.notify_one();
    }

    /// Consumer side: invite the producer, wait for a region, copy it out,
    /// and hand the buffer back.
    pub(crate) fn drain(&self) -> Drained {
        let mut slot = self.slot.lock().unwrap();
        slot.invited = true;
        self.cv.notify_one();
        loop {
            let parked = slot.chunk.is_some() && (slot.len > 0 || slot.done);
            if parked {
                let bytes = slot.chunk.as_ref().expect("checked above")[..slot.len].to_vec();
                slot.len = 0;
                if slot.done {
                    return Drained::Final(bytes, slot.fault.take());
                }
                self.cv.notify_one();
                return Drained::Chunk(bytes);
            }
            slot = self.cv.wait(slot).unwrap();
        }
    }

    /// Consumer side: tell the producer to stop at its next pause point.
    pub(crate) fn abort(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.aborted = true;
        self.cv.notify_one();
    }

    /// Takes the buffer back out of the slot, if it is parked there.
    pub(crate) fn take_buffer(&self) -> Option<Vec<u8>> {
        self.slot.lock().unwrap().chunk.take()
    }
}

//! The streaming variant: a producer thread paired with an iterator.
//!
//! The producer runs the walker in PAUSE mode against a fixed-size chunk
//! buffer; each `next()` call is one rendezvous — it invites the producer,
//! waits for the buffer to fill (or for the walk to finish), and yields the
//! drained region. Concatenating every yielded chunk reproduces the
//! one-shot output byte for byte.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{Error, ErrorKind, Result};
use crate::sink::{Drained, Rendezvous, Sink};
use crate::transcoder::{initial_capacity, Transcoder};

// The widest single reserve (the double formatter's window) must always fit
// a freshly drained buffer.
const MIN_CHUNK: usize = 256;

/// Options for [`JsonStream::with_options`].
#[derive(Default)]
pub struct StreamOptions {
    /// Chunk buffer size in bytes; `0` picks 2.5x the input length. Clamped
    /// to at least 256.
    pub chunk_size: usize,

    /// A caller-owned buffer to use as the chunk buffer, overriding
    /// `chunk_size`; its length is the capacity (grown to 256 when
    /// shorter). Recoverable through [`JsonStream::into_fixed_buffer`].
    pub fixed_buffer: Option<Vec<u8>>,
}

/// An iterator over the JSON regions of one streamed transcode.
///
/// ```no_run
/// # fn main() -> bson2json::Result<()> {
/// # let bson_bytes: Vec<u8> = vec![];
/// let mut out = Vec::new();
/// for chunk in bson2json::JsonStream::new(bson_bytes, true)? {
///     out.extend_from_slice(&chunk?);
/// }
/// # Ok(())
/// # }
/// ```
///
/// Dropping the stream before exhaustion aborts the producer and joins it.
pub struct JsonStream {
    shared: Arc<Rendezvous>,
    handle: Option<JoinHandle<()>>,
    exhausted: bool,
    done: bool,
}

impl std::fmt::Debug for JsonStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStream")
            .field("exhausted", &self.exhausted)
            .field("done", &self.done)
            .finish()
    }
}

impl JsonStream {
    /// Starts a streamed transcode with default options.
    pub fn new(input: impl Into<Vec<u8>>, is_array: bool) -> Result<JsonStream> {
        JsonStream::with_options(input, is_array, StreamOptions::default())
    }

    /// Starts a streamed transcode.
    pub fn with_options(
        input: impl Into<Vec<u8>>,
        is_array: bool,
        opts: StreamOptions,
    ) -> Result<JsonStream> {
        let input = input.into();
        if input.len() < 5 {
            return Err(ErrorKind::InputTooShort.into());
        }

        let chunk = match opts.fixed_buffer {
            Some(mut buf) => {
                if buf.len() < MIN_CHUNK {
                    buf.resize(MIN_CHUNK, 0);
                }
                buf
            }
            None => {
                let size = if opts.chunk_size == 0 {
                    initial_capacity(input.len())
                } else {
                    opts.chunk_size
                };
                vec![0; size.max(MIN_CHUNK)]
            }
        };

        let shared = Arc::new(Rendezvous::new(chunk));
        let producer_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("bson2json-producer".into())
            .spawn(move || produce(input, is_array, producer_shared))
            .map_err(|_| Error::from(ErrorKind::OutOfMemory))?;

        Ok(JsonStream {
            shared,
            handle: Some(handle),
            exhausted: false,
            done: false,
        })
    }

    /// Whether the final region has been yielded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Recovers the chunk buffer, when one was supplied through
    /// [`StreamOptions::fixed_buffer`] or the stream has finished. Consumes
    /// the stream; an unfinished producer is aborted first.
    pub fn into_fixed_buffer(mut self) -> Option<Vec<u8>> {
        self.shutdown();
        self.shared.take_buffer()
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !self.done {
                self.shared.abort();
            }
            let _ = handle.join();
        }
    }
}

fn produce(input: Vec<u8>, is_array: bool, shared: Arc<Rendezvous>) {
    // Waits here until the consumer asks for the first region.
    let sink = match Sink::pause(Arc::clone(&shared)) {
        Ok(sink) => sink,
        // Aborted before the first rendezvous; nothing to deliver.
        Err(_) => return,
    };

    let mut t = Transcoder::new(&input, sink, None);
    let fault = t.walk(is_array).err();
    if matches!(fault.as_ref().map(|e| &e.kind), Some(ErrorKind::Aborted)) {
        return;
    }
    t.into_sink().finish(fault);
}

impl Iterator for JsonStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.shared.drain() {
            Drained::Chunk(bytes) => Some(Ok(bytes)),
            Drained::Final(bytes, fault) => {
                self.exhausted = true;
                self.done = true;
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                match fault {
                    Some(err) => Some(Err(err)),
                    None if bytes.is_empty() => None,
                    None => Some(Ok(bytes)),
                }
            }
        }
    }
}

impl Drop for JsonStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// The MIT License (MIT)

// Copyright (c) 2015 Y. T. Chung <zonyitoo@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! High-throughput transcoding of BSON documents straight to JSON bytes.
//!
//! BSON, short for Binary JSON, is a binary-encoded serialization of
//! JSON-like documents, and the primary data representation for
//! [MongoDB](https://www.mongodb.com/). Applications that persist documents
//! as BSON but serve them as JSON usually decode into an intermediate value
//! tree and re-encode; this crate instead walks the BSON element stream
//! once, formatting each value directly into the output buffer.
//!
//! ```text
//! // JSON equivalent
//! {"hello": "world"}
//!
//! // BSON encoding
//! \x16\x00\x00\x00                   // total document size
//! \x02                               // 0x02 = type String
//! hello\x00                          // field name
//! \x06\x00\x00\x00world\x00          // field value
//! \x00                               // 0x00 = type EOO ('end of object')
//! ```
//!
//! For more information about BSON itself, see [bsonspec.org](http://bsonspec.org).
//!
//! ## One-shot transcoding
//!
//! [`transcode`] walks the whole document into a growable buffer and
//! returns it:
//!
//! ```
//! let bson = b"\x16\x00\x00\x00\x02hello\x00\x06\x00\x00\x00world\x00\x00";
//! let json = bson2json::transcode(bson, false)?;
//! assert_eq!(std::str::from_utf8(&json).unwrap(), r#"{"hello":"world"}"#);
//! # Ok::<(), bson2json::Error>(())
//! ```
//!
//! The top level of a BSON buffer does not name its own type, so the caller
//! declares it: `is_array = true` emits `[...]`, `false` emits `{...}`.
//!
//! ## Streaming
//!
//! [`JsonStream`] runs the same walk against a fixed-size buffer on a
//! producer thread and yields each filled region as the consumer asks for
//! it, so a large document can be served without ever holding its full JSON
//! form in memory:
//!
//! ```no_run
//! # fn main() -> bson2json::Result<()> {
//! # let bson_bytes: Vec<u8> = vec![];
//! for chunk in bson2json::JsonStream::new(bson_bytes, true)? {
//!     let chunk = chunk?;
//!     // write chunk to a socket, file, ...
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Value projection
//!
//! | BSON type | JSON output |
//! |---|---|
//! | double | shortest round-trip decimal (ECMAScript form); `null` if non-finite |
//! | string | escaped, quoted |
//! | document / array | object / array |
//! | ObjectId | 24-digit lowercase hex, quoted |
//! | bool | `true` / `false` |
//! | UTC datetime | `"YYYY-MM-DDTHH:MM:SS.mmmZ"` |
//! | null | `null` |
//! | undefined | elided entirely (key and value) |
//!
//! Types with no JSON analog (binary, regex, timestamp, decimal128, the
//! deprecated code types, min/max keys) fail the transcode with
//! [`ErrorKind::IncompatibleType`].
//!
//! ## Populating references
//!
//! A [`Populate`] table substitutes referenced ObjectIds with previously
//! transcoded JSON fragments, in place, during the walk; ids without a
//! fragment are recorded per field path so the caller can fetch them and
//! try again. See [`populate`](crate::populate).
//!
//! ## SIMD
//!
//! String escaping and ObjectId hex encoding run on the widest of
//! SSE2/SSE4.2/AVX2/AVX-512BW the CPU supports, probed once per process;
//! every tier produces bit-identical output, and other architectures use
//! the portable paths.

pub mod error;
mod escape;
mod hex;
mod int_fmt;
mod datetime;
pub mod isa;
pub mod oid;
pub mod populate;
#[cfg(target_arch = "x86_64")]
mod simd;
mod sink;
pub mod spec;
mod stream;
mod transcoder;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::oid::ObjectId;
pub use crate::populate::{collect_missing, Populate};
pub use crate::stream::{JsonStream, StreamOptions};
pub use crate::transcoder::{transcode, transcode_with, TranscodeOptions, Transcoded};

/// The instruction-set tier selected for this process.
pub fn active_isa() -> isa::Isa {
    isa::best()
}

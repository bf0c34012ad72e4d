//! The document walker: a single recursive descent over a BSON element
//! stream, emitting JSON tokens and values as it goes.
//!
//! The walker never materializes an intermediate value tree. It reads the
//! input through a monotone cursor, reserves worst-case space in the sink
//! before each write, and dispatches each element to the matching formatter.

use std::ops::Range;

use crate::datetime::{self, DATETIME_BUF_LEN};
use crate::error::{Error, ErrorKind, Result};
use crate::int_fmt::{self, INT32_BUF_LEN, INT64_BUF_LEN};
use crate::isa::{self, Isa};
use crate::oid::ObjectId;
use crate::populate::Populate;
use crate::sink::Sink;
use crate::spec::{self, ElementType};

// Deep enough for any sane document, shallow enough that a hostile one
// cannot exhaust the stack.
const MAX_DEPTH: usize = 200;

/// One-shot transcode of a BSON document to a JSON byte vector.
///
/// `is_array` declares whether the top-level document body is a BSON array
/// (emitted as `[...]`) or a document (emitted as `{...}`).
///
/// ```
/// let bson = b"\x16\x00\x00\x00\x02hello\x00\x06\x00\x00\x00world\x00\x00";
/// let json = bson2json::transcode(bson, false)?;
/// assert_eq!(json, br#"{"hello":"world"}"#);
/// # Ok::<(), bson2json::Error>(())
/// ```
pub fn transcode(input: &[u8], is_array: bool) -> Result<Vec<u8>> {
    Ok(transcode_with(input, is_array, TranscodeOptions::default())?.json)
}

/// One-shot transcode with explicit options.
pub fn transcode_with(
    input: &[u8],
    is_array: bool,
    opts: TranscodeOptions<'_>,
) -> Result<Transcoded> {
    if input.len() < 5 {
        return Err(ErrorKind::InputTooShort.into());
    }
    let initial = if opts.chunk_size == 0 {
        initial_capacity(input.len())
    } else {
        opts.chunk_size
    };
    let sink = Sink::realloc(initial)?;
    let mut t = Transcoder::new(input, sink, opts.populate);
    t.walk(is_array)?;
    let doc_id = t.doc_id;
    Ok(Transcoded {
        json: t.sink.finish(None),
        doc_id,
    })
}

/// Options for [`transcode_with`].
#[derive(Default)]
pub struct TranscodeOptions<'p> {
    /// Initial output capacity in bytes; `0` picks 2.5x the input length.
    pub chunk_size: usize,

    /// Substitute referenced ObjectIds with precomputed JSON fragments.
    pub populate: Option<&'p mut Populate>,
}

/// The outcome of a one-shot transcode.
#[derive(Debug)]
pub struct Transcoded {
    /// The JSON bytes, with no trailing newline.
    pub json: Vec<u8>,

    /// The `_id` of the top-level document, when it is an ObjectId.
    pub doc_id: Option<ObjectId>,
}

// Estimate the output at 2.5x the input. Expansion rates per value:
//   ObjectId: 12B -> 24B plus 2 for quotes
//   String: 5 for header + 1 per byte -> 1..6 per byte + 2 for quotes
//   Int: 1+4 -> up to 11
//   Long: 1+8 -> up to 20
//   Date: 1+8 -> 24 plus 2 for quotes
//   Boolean: 1+1 -> 4 or 5
//   Null: 1+0 -> 4
// The worst single-value ratio is 1:5 (null), but mixed data averages ~2.3x
// and string-heavy data ~1x.
pub(crate) fn initial_capacity(in_len: usize) -> usize {
    (in_len * 10) >> 2
}

pub(crate) struct Transcoder<'a, 'p> {
    pub(crate) input: &'a [u8],
    pub(crate) in_idx: usize,
    pub(crate) sink: Sink,
    pub(crate) isa: Isa,
    depth: usize,
    populate: Option<&'p mut Populate>,
    path: Vec<u8>,
    pub(crate) doc_id: Option<ObjectId>,
}

impl<'a, 'p> Transcoder<'a, 'p> {
    pub(crate) fn new(
        input: &'a [u8],
        sink: Sink,
        populate: Option<&'p mut Populate>,
    ) -> Transcoder<'a, 'p> {
        Transcoder {
            input,
            in_idx: 0,
            sink,
            isa: isa::best(),
            depth: 0,
            populate,
            path: Vec::new(),
            doc_id: None,
        }
    }

    #[inline]
    fn read_u8(&mut self, what: &'static str) -> Result<u8> {
        let b = *self
            .input
            .get(self.in_idx)
            .ok_or_else(|| Error::truncated(what))?;
        self.in_idx += 1;
        Ok(b)
    }

    #[inline]
    fn read_i32_le(&mut self, what: &'static str) -> Result<i32> {
        let bytes = self
            .input
            .get(self.in_idx..self.in_idx + 4)
            .ok_or_else(|| Error::truncated(what))?;
        self.in_idx += 4;
        Ok(i32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    #[inline]
    fn read_i64_le(&mut self, what: &'static str) -> Result<i64> {
        let bytes = self
            .input
            .get(self.in_idx..self.in_idx + 8)
            .ok_or_else(|| Error::truncated(what))?;
        self.in_idx += 8;
        Ok(i64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }

    #[inline]
    fn read_f64_le(&mut self, what: &'static str) -> Result<f64> {
        Ok(f64::from_bits(self.read_i64_le(what)? as u64))
    }

    /// Walks one document body: length header, element loop, terminator.
    pub(crate) fn walk(&mut self, is_array: bool) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ErrorKind::RecursionLimitExceeded.into());
        }

        let base = self.in_idx;
        let size = self.read_i32_le("document header")?;
        if size < 5 {
            return Err(ErrorKind::BsonSizeTooSmall.into());
        }
        let size = size as usize;
        if base + size > self.input.len() {
            return Err(ErrorKind::BsonSizeExceedsInput.into());
        }
        let end = base + size;

        self.sink.ensure(1)?;
        self.sink.push(if is_array { b'[' } else { b'{' });

        let mut arr_idx: i32 = 0;
        let mut first = true;

        loop {
            if self.in_idx + 1 >= end {
                // Terminator position. A well-formed document has a zero
                // here; the array caller inspects what we consumed.
                self.read_u8("document terminator")?;
                break;
            }

            let tag = self.read_u8("element type")?;
            if tag == 0 {
                break;
            }

            if tag == spec::ELEMENT_TYPE_UNDEFINED {
                // Deprecated type with no JSON analog: neither key nor value
                // is emitted, and no comma is owed for it.
                self.skip_name(is_array, arr_idx)?;
                arr_idx += 1;
                continue;
            }

            if !first {
                self.sink.ensure(1)?;
                self.sink.push(b',');
            }
            first = false;

            let name = if is_array {
                self.skip_array_key(arr_idx)?;
                None
            } else {
                Some(self.write_name()?)
            };

            self.write_value(tag, &name).map_err(|e| {
                if e.key.is_some() || e.index.is_some() {
                    return e;
                }
                match &name {
                    Some(span) => {
                        e.with_key(String::from_utf8_lossy(&self.input[span.clone()]))
                    }
                    None => e.with_index(arr_idx as usize),
                }
            })?;
            arr_idx += 1;
        }

        self.sink.ensure(1)?;
        self.sink.push(if is_array { b']' } else { b'}' });
        self.depth -= 1;
        Ok(())
    }

    // Array keys are the decimal ASCII of the element index, produced
    // monotonically by well-formed writers, so their width is known without
    // scanning.
    fn skip_array_key(&mut self, arr_idx: i32) -> Result<()> {
        self.in_idx += int_fmt::array_key_width(arr_idx);
        if self.in_idx > self.input.len() {
            self.in_idx = self.input.len();
            return Err(ErrorKind::NameTerminatorMissing.into());
        }
        Ok(())
    }

    fn skip_name(&mut self, is_array: bool, arr_idx: i32) -> Result<()> {
        if is_array {
            return self.skip_array_key(arr_idx);
        }
        let rest = &self.input[self.in_idx..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ErrorKind::NameTerminatorMissing)?;
        self.in_idx += nul + 1;
        Ok(())
    }

    // Emits `"name":` with the name escaped, and returns the span of the raw
    // name bytes for path tracking and error context.
    fn write_name(&mut self) -> Result<Range<usize>> {
        let start = self.in_idx;
        self.sink.ensure(1)?;
        self.sink.push(b'"');
        self.write_escaped_cstr()?;
        let span = start..self.in_idx;
        self.in_idx += 1; // null terminator
        self.sink.ensure(2)?;
        self.sink.write_bytes(b"\":");
        Ok(span)
    }

    fn write_value(&mut self, tag: u8, name: &Option<Range<usize>>) -> Result<()> {
        let Some(element_type) = ElementType::from(tag) else {
            return Err(ErrorKind::UnknownType(tag).into());
        };
        if !element_type.is_json_compatible() {
            return Err(ErrorKind::IncompatibleType(tag).into());
        }
        match element_type {
            ElementType::String => {
                let size = self.read_i32_le("string header")?;
                if size <= 0 || size as usize > self.input.len() - self.in_idx {
                    return Err(ErrorKind::BadStringLength.into());
                }
                self.sink.ensure(1)?;
                self.sink.push(b'"');
                self.write_escaped(size as usize - 1)?;
                self.in_idx += 1; // null terminator
                self.sink.ensure(1)?;
                self.sink.push(b'"');
            }
            ElementType::ObjectId => {
                if self.in_idx + 12 > self.input.len() {
                    return Err(Error::truncated("ObjectId"));
                }
                if self.depth == 1 {
                    if let Some(span) = name {
                        if &self.input[span.clone()] == b"_id" {
                            let raw: [u8; 12] = self.input[self.in_idx..self.in_idx + 12]
                                .try_into()
                                .expect("12-byte slice");
                            self.doc_id = Some(ObjectId::from_bytes(raw));
                        }
                    }
                }
                if self.populate.is_some() && self.substitute_object_id(name)? {
                    return Ok(());
                }
                self.sink.ensure(26)?;
                self.write_object_id();
            }
            ElementType::Int32 => {
                let v = self.read_i32_le("int32")?;
                let mut buf = [0u8; INT32_BUF_LEN];
                let p = int_fmt::format_i32(&mut buf, v);
                self.sink.ensure(INT32_BUF_LEN - p)?;
                self.sink.write_bytes(&buf[p..]);
            }
            ElementType::Int64 => {
                let v = self.read_i64_le("int64")?;
                let mut buf = [0u8; INT64_BUF_LEN];
                let p = int_fmt::format_i64(&mut buf, v);
                self.sink.ensure(INT64_BUF_LEN - p)?;
                self.sink.write_bytes(&buf[p..]);
            }
            ElementType::Double => {
                let v = self.read_f64_le("double")?;
                if v.is_finite() {
                    // The shortest-decimal converter needs at most ~25
                    // bytes; reserve a comfortable window.
                    self.sink.ensure(128)?;
                    let mut fmt = ryu_js::Buffer::new();
                    self.sink.write_bytes(fmt.format_finite(v).as_bytes());
                } else {
                    self.sink.ensure(4)?;
                    self.sink.write_bytes(b"null");
                }
            }
            ElementType::UtcDatetime => {
                let ms = self.read_i64_le("datetime")?;
                self.sink.ensure(DATETIME_BUF_LEN)?;
                let mut buf = [0u8; DATETIME_BUF_LEN];
                match datetime::format_utc_millis(&mut buf, ms) {
                    Some(n) => self.sink.write_bytes(&buf[..n]),
                    // Outside the representable UTC range.
                    None => self.sink.write_bytes(b"null"),
                }
            }
            ElementType::Boolean => {
                let v = self.read_u8("boolean")?;
                self.sink.ensure(5)?;
                self.sink
                    .write_bytes(if v == 1 { b"true" } else { b"false" });
            }
            ElementType::Null => {
                self.sink.ensure(4)?;
                self.sink.write_bytes(b"null");
            }
            ElementType::EmbeddedDocument => {
                let saved = self.enter_path(name);
                self.walk(false)?;
                self.path.truncate(saved);
            }
            ElementType::Array => {
                let saved = self.enter_path(name);
                self.walk(true)?;
                self.path.truncate(saved);
                if self.input[self.in_idx - 1] != 0 {
                    return Err(ErrorKind::InvalidArrayTerminator.into());
                }
            }
            // Undefined emits nothing (the element loop skips its key before
            // dispatch); every other remaining variant was rejected by the
            // compatibility check above.
            _ => {}
        }
        Ok(())
    }

    // Appends `.name` (or `name` at the root) to the populate path. Array
    // elements carry no name and leave the path unchanged: indices collapse.
    fn enter_path(&mut self, name: &Option<Range<usize>>) -> usize {
        let saved = self.path.len();
        if self.populate.is_some() {
            if let Some(span) = name {
                if !self.path.is_empty() {
                    self.path.push(b'.');
                }
                self.path
                    .extend_from_slice(&self.input[span.start..span.end]);
            }
        }
        saved
    }

    // Looks the current field path up in the populate cache. On a hit the
    // precomputed JSON replaces the entire value position and the 12 id
    // bytes are consumed; on a miss the id is recorded and the normal hex
    // form is emitted by the caller.
    fn substitute_object_id(&mut self, name: &Option<Range<usize>>) -> Result<bool> {
        let saved = self.enter_path(name);
        let outcome = (|| {
            let Ok(path) = std::str::from_utf8(&self.path) else {
                return Ok(false);
            };
            let populate = self.populate.as_deref_mut().expect("populate configured");
            let Some(map) = populate.fragments_for(path) else {
                return Ok(false);
            };
            let raw: [u8; 12] = self.input[self.in_idx..self.in_idx + 12]
                .try_into()
                .expect("12-byte slice");
            let id = ObjectId::from_bytes(raw);
            match map.get(&id) {
                Some(json) => {
                    let json = json.clone();
                    self.sink.ensure(json.len())?;
                    self.sink.write_bytes(&json);
                    self.in_idx += 12;
                    Ok(true)
                }
                None => {
                    populate.record_missing(path, id);
                    Ok(false)
                }
            }
        })();
        self.path.truncate(saved);
        outcome
    }

    pub(crate) fn into_sink(self) -> Sink {
        self.sink
    }
}

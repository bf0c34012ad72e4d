//! Substitution of referenced ObjectIds with precomputed JSON fragments.
//!
//! A `Populate` maps field paths (dotted key strings rooted at the top-level
//! document; array indices collapse) to per-ObjectId JSON fragments. When
//! the walker reaches an ObjectId whose path has an entry, a cached
//! fragment replaces the hex string wholesale; ids with no fragment are
//! recorded in a per-path missing set so the caller can fetch and transcode
//! the referenced documents, then run again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::int_fmt;
use crate::oid::ObjectId;
use crate::spec::ElementType;

type FragmentMap = HashMap<ObjectId, Vec<u8>>;

/// Precomputed JSON fragments for referenced documents, keyed by field path
/// and ObjectId.
#[derive(Default)]
pub struct Populate {
    paths: HashMap<String, Arc<FragmentMap>>,
    missing: HashMap<String, HashSet<ObjectId>>,
}

impl Populate {
    pub fn new() -> Populate {
        Populate::default()
    }

    /// Registers the JSON fragment to substitute for `id` at `path`.
    ///
    /// The fragment is copied into the output verbatim; no quotes are added
    /// around it.
    pub fn insert(&mut self, path: &str, id: ObjectId, json: impl Into<Vec<u8>>) {
        let map = self.paths.entry(path.to_string()).or_default();
        Arc::make_mut(map).insert(id, json.into());
    }

    /// Makes `alias` share the fragment map already registered for
    /// `existing`, without duplicating storage. Returns `false` when
    /// `existing` has no map.
    pub fn repeat_path(&mut self, existing: &str, alias: &str) -> bool {
        match self.paths.get(existing) {
            Some(map) => {
                let shared = Arc::clone(map);
                self.paths.insert(alias.to_string(), shared);
                true
            }
            None => false,
        }
    }

    /// The ids referenced during transcoding that had no fragment, grouped
    /// by path.
    pub fn missing(&self) -> impl Iterator<Item = (&str, &HashSet<ObjectId>)> {
        self.missing.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The missing ids recorded for one path.
    pub fn missing_for(&self, path: &str) -> Option<&HashSet<ObjectId>> {
        self.missing.get(path)
    }

    /// Drops all recorded misses, keeping the fragments.
    pub fn clear_missing(&mut self) {
        self.missing.clear();
    }

    pub(crate) fn fragments_for(&self, path: &str) -> Option<&Arc<FragmentMap>> {
        self.paths.get(path)
    }

    pub(crate) fn record_missing(&mut self, path: &str, id: ObjectId) {
        self.missing.entry(path.to_string()).or_default().insert(id);
    }
}

/// Walks `input` without producing output, recording every referenced
/// ObjectId that has no fragment into the populate's missing sets.
///
/// Useful as a first pass: collect the misses, transcode the referenced
/// documents, insert the fragments, then run the real transcode.
pub fn collect_missing(input: &[u8], is_array: bool, populate: &mut Populate) -> Result<()> {
    if input.len() < 5 {
        return Err(ErrorKind::InputTooShort.into());
    }
    let mut walker = MissWalker {
        input,
        in_idx: 0,
        populate,
        path: Vec::new(),
        depth: 0,
    };
    walker.walk(is_array)
}

// A skip-only rendition of the document walker: same length rules and error
// set, no sink.
struct MissWalker<'a, 'p> {
    input: &'a [u8],
    in_idx: usize,
    populate: &'p mut Populate,
    path: Vec<u8>,
    depth: usize,
}

const MAX_DEPTH: usize = 200;

impl<'a, 'p> MissWalker<'a, 'p> {
    fn read_u8(&mut self, what: &'static str) -> Result<u8> {
        let b = *self
            .input
            .get(self.in_idx)
            .ok_or_else(|| Error::truncated(what))?;
        self.in_idx += 1;
        Ok(b)
    }

    fn read_i32_le(&mut self, what: &'static str) -> Result<i32> {
        let bytes = self
            .input
            .get(self.in_idx..self.in_idx + 4)
            .ok_or_else(|| Error::truncated(what))?;
        self.in_idx += 4;
        Ok(i32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    fn skip(&mut self, n: usize, what: &'static str) -> Result<()> {
        if self.input.len() - self.in_idx < n {
            return Err(Error::truncated(what));
        }
        self.in_idx += n;
        Ok(())
    }

    fn walk(&mut self, is_array: bool) -> Result<()> {
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

        let mut arr_idx: i32 = 0;
        loop {
            if self.in_idx + 1 >= end {
                self.read_u8("document terminator")?;
                break;
            }
            let tag = self.read_u8("element type")?;
            if tag == 0 {
                break;
            }

            let name = if is_array {
                self.in_idx += int_fmt::array_key_width(arr_idx);
                if self.in_idx > self.input.len() {
                    self.in_idx = self.input.len();
                    return Err(ErrorKind::NameTerminatorMissing.into());
                }
                None
            } else {
                let rest = &self.input[self.in_idx..];
                let nul = rest
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(ErrorKind::NameTerminatorMissing)?;
                let span = self.in_idx..self.in_idx + nul;
                self.in_idx += nul + 1;
                Some(span)
            };

            let saved = self.path.len();
            if let Some(span) = &name {
                if !self.path.is_empty() {
                    self.path.push(b'.');
                }
                self.path.extend_from_slice(&self.input[span.clone()]);
            }

            let stepped = self.step(tag);
            self.path.truncate(saved);
            stepped?;
            arr_idx += 1;
        }
        self.depth -= 1;
        Ok(())
    }

    fn step(&mut self, tag: u8) -> Result<()> {
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
                self.in_idx += size as usize;
            }
            ElementType::ObjectId => {
                if self.input.len() - self.in_idx < 12 {
                    return Err(Error::truncated("ObjectId"));
                }
                if let Ok(path) = std::str::from_utf8(&self.path) {
                    if let Some(map) = self.populate.fragments_for(path) {
                        let raw: [u8; 12] = self.input[self.in_idx..self.in_idx + 12]
                            .try_into()
                            .expect("12-byte slice");
                        let id = ObjectId::from_bytes(raw);
                        if !map.contains_key(&id) {
                            let path = path.to_string();
                            self.populate.record_missing(&path, id);
                        }
                    }
                }
                self.in_idx += 12;
            }
            ElementType::Double => self.skip(8, "double")?,
            ElementType::UtcDatetime => self.skip(8, "datetime")?,
            ElementType::Int64 => self.skip(8, "int64")?,
            ElementType::Int32 => self.skip(4, "int32")?,
            ElementType::Boolean => self.skip(1, "boolean")?,
            ElementType::Null | ElementType::Undefined => {}
            ElementType::EmbeddedDocument => self.walk(false)?,
            ElementType::Array => {
                self.walk(true)?;
                if self.input[self.in_idx - 1] != 0 {
                    return Err(ErrorKind::InvalidArrayTerminator.into());
                }
            }
            // Every remaining variant was rejected by the compatibility
            // check above.
            _ => {}
        }
        Ok(())
    }
}

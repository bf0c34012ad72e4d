//! A minimal BSON writer for constructing test corpora.
//!
//! Only the element types the transcoder handles (plus raw escape hatches
//! for the ones it rejects) are supported; documents are assembled
//! imperatively and length-patched on `finish`.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

pub struct DocBuilder {
    buf: Vec<u8>,
}

impl DocBuilder {
    pub fn new() -> DocBuilder {
        DocBuilder {
            buf: vec![0, 0, 0, 0],
        }
    }

    fn element(mut self, tag: u8, key: &str) -> DocBuilder {
        self.buf.push(tag);
        self.buf.write_all(key.as_bytes()).unwrap();
        self.buf.push(0);
        self
    }

    pub fn double(self, key: &str, v: f64) -> DocBuilder {
        let mut b = self.element(0x01, key);
        b.buf.write_f64::<LittleEndian>(v).unwrap();
        b
    }

    pub fn string(self, key: &str, v: &str) -> DocBuilder {
        self.string_bytes(key, v.as_bytes())
    }

    pub fn string_bytes(self, key: &str, v: &[u8]) -> DocBuilder {
        let mut b = self.element(0x02, key);
        b.buf.write_i32::<LittleEndian>(v.len() as i32 + 1).unwrap();
        b.buf.write_all(v).unwrap();
        b.buf.push(0);
        b
    }

    pub fn doc(self, key: &str, inner: DocBuilder) -> DocBuilder {
        let mut b = self.element(0x03, key);
        b.buf.write_all(&inner.finish()).unwrap();
        b
    }

    pub fn array(self, key: &str, inner: ArrayBuilder) -> DocBuilder {
        let mut b = self.element(0x04, key);
        b.buf.write_all(&inner.finish()).unwrap();
        b
    }

    pub fn undefined(self, key: &str) -> DocBuilder {
        self.element(0x06, key)
    }

    pub fn oid(self, key: &str, bytes: [u8; 12]) -> DocBuilder {
        let mut b = self.element(0x07, key);
        b.buf.write_all(&bytes).unwrap();
        b
    }

    pub fn boolean(self, key: &str, v: bool) -> DocBuilder {
        let mut b = self.element(0x08, key);
        b.buf.push(v as u8);
        b
    }

    pub fn datetime(self, key: &str, millis: i64) -> DocBuilder {
        let mut b = self.element(0x09, key);
        b.buf.write_i64::<LittleEndian>(millis).unwrap();
        b
    }

    pub fn null(self, key: &str) -> DocBuilder {
        self.element(0x0A, key)
    }

    pub fn int32(self, key: &str, v: i32) -> DocBuilder {
        let mut b = self.element(0x10, key);
        b.buf.write_i32::<LittleEndian>(v).unwrap();
        b
    }

    pub fn int64(self, key: &str, v: i64) -> DocBuilder {
        let mut b = self.element(0x12, key);
        b.buf.write_i64::<LittleEndian>(v).unwrap();
        b
    }

    /// An element with an arbitrary tag and payload, for exercising the
    /// rejection paths.
    pub fn raw_element(self, key: &str, tag: u8, payload: &[u8]) -> DocBuilder {
        let mut b = self.element(tag, key);
        b.buf.write_all(payload).unwrap();
        b
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push(0);
        let len = self.buf.len() as i32;
        self.buf[..4].copy_from_slice(&len.to_le_bytes());
        self.buf
    }
}

/// Builds a BSON array body: a document keyed by decimal indices.
pub struct ArrayBuilder {
    doc: DocBuilder,
    next: usize,
}

impl ArrayBuilder {
    pub fn new() -> ArrayBuilder {
        ArrayBuilder {
            doc: DocBuilder::new(),
            next: 0,
        }
    }

    fn key(&mut self) -> String {
        let k = self.next.to_string();
        self.next += 1;
        k
    }

    pub fn double(mut self, v: f64) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.double(&k, v);
        self
    }

    pub fn string(mut self, v: &str) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.string(&k, v);
        self
    }

    pub fn doc(mut self, inner: DocBuilder) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.doc(&k, inner);
        self
    }

    pub fn array(mut self, inner: ArrayBuilder) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.array(&k, inner);
        self
    }

    pub fn undefined(mut self) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.undefined(&k);
        self
    }

    pub fn oid(mut self, bytes: [u8; 12]) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.oid(&k, bytes);
        self
    }

    pub fn boolean(mut self, v: bool) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.boolean(&k, v);
        self
    }

    pub fn null(mut self) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.null(&k);
        self
    }

    pub fn int32(mut self, v: i32) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.int32(&k, v);
        self
    }

    pub fn int64(mut self, v: i64) -> ArrayBuilder {
        let k = self.key();
        self.doc = self.doc.int64(&k, v);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.doc.finish()
    }
}

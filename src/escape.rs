//! JSON string escaping per ECMA-262 sec. 24.5.2.2.
//!
//! Bytes below 0x20 become `\u00XX`, the quote and backslash become
//! two-byte escapes, and everything else passes through untouched; UTF-8
//! multi-byte sequences are copied verbatim.
//!
//! Two entry points: a length-bounded writer for BSON string payloads and a
//! null-terminated writer for field names. Each has one body per ISA tier.
//! The vector bodies scan a register of bytes for the escape predicate,
//! bulk-copy the clean prefix, then handle the single offending byte with
//! the scalar path.

use crate::error::{ErrorKind, Result};
#[cfg(target_arch = "x86_64")]
use crate::isa::Isa;
#[cfg(target_arch = "x86_64")]
use crate::simd;
use crate::transcoder::Transcoder;

use crate::hex::HEX_DIGITS;

// Returns the character completing a two-byte escape for `c`, or 0 when `c`
// needs either no escape or the six-byte `\u00XX` form.
#[inline]
fn single_escape(c: u8) -> u8 {
    match c {
        0x08 => b'b',
        0x09 => b't',
        0x0a => b'n',
        0x0c => b'f',
        0x0d => b'r',
        0x22 | 0x5c => c,
        _ => 0,
    }
}

#[inline]
fn needs_escape(c: u8) -> bool {
    c < 0x20 || c == 0x22 || c == 0x5c
}

impl<'a, 'p> Transcoder<'a, 'p> {
    /// Writes `n` input bytes to the sink, escaped. The cursor advances by
    /// exactly `n`.
    pub(crate) fn write_escaped(&mut self, n: usize) -> Result<()> {
        debug_assert!(self.in_idx + n <= self.input.len());
        #[cfg(target_arch = "x86_64")]
        return match self.isa {
            Isa::Baseline => self.write_escaped_baseline(n),
            Isa::Sse2 => unsafe { self.write_escaped_sse2(n) },
            Isa::Sse42 => unsafe { self.write_escaped_sse42(n) },
            Isa::Avx2 => unsafe { self.write_escaped_avx2(n) },
            Isa::Avx512bw => unsafe { self.write_escaped_avx512(n) },
        };
        #[cfg(not(target_arch = "x86_64"))]
        return self.write_escaped_baseline(n);
    }

    /// Writes input bytes up to (not including) the next null to the sink,
    /// escaped. The cursor is left on the null; the caller skips it. Fails
    /// when no null exists before the end of the input.
    pub(crate) fn write_escaped_cstr(&mut self) -> Result<()> {
        #[cfg(target_arch = "x86_64")]
        return match self.isa {
            Isa::Baseline => self.write_escaped_cstr_baseline(),
            Isa::Sse2 => unsafe { self.write_escaped_cstr_sse2() },
            Isa::Sse42 => unsafe { self.write_escaped_cstr_sse42() },
            Isa::Avx2 => unsafe { self.write_escaped_cstr_avx2() },
            Isa::Avx512bw => unsafe { self.write_escaped_cstr_avx512() },
        };
        #[cfg(not(target_arch = "x86_64"))]
        return self.write_escaped_cstr_baseline();
    }

    // Writes the six-byte `\u00XX` form. Space must already be ensured.
    fn write_control_char(&mut self, c: u8) {
        self.sink.write_bytes(b"\\u00");
        self.sink.push(if c & 0xf0 != 0 { b'1' } else { b'0' });
        self.sink.push(HEX_DIGITS[(c & 0x0f) as usize]);
    }

    // The scalar tail shared by every bounded variant: escape one byte that
    // the scan stopped on. `end` bounds the bytes still owed so the reserve
    // covers the remainder of the run.
    fn write_bounded_escape(&mut self, c: u8, end: usize) -> Result<()> {
        let xc = single_escape(c);
        if xc != 0 {
            self.sink.ensure(end - self.in_idx + 1)?;
            self.sink.push(b'\\');
            self.sink.push(xc);
        } else {
            self.sink.ensure(end - self.in_idx + 5)?;
            self.write_control_char(c);
        }
        Ok(())
    }

    // Ditto for the null-terminated variants, which have no run bound.
    fn write_cstr_escape(&mut self, c: u8) -> Result<()> {
        let xc = single_escape(c);
        if xc != 0 {
            self.sink.ensure(2)?;
            self.sink.push(b'\\');
            self.sink.push(xc);
        } else {
            self.sink.ensure(6)?;
            self.write_control_char(c);
        }
        Ok(())
    }

    fn write_escaped_baseline(&mut self, n: usize) -> Result<()> {
        let end = self.in_idx + n;
        self.sink.ensure(n)?;
        while self.in_idx < end {
            let c = self.input[self.in_idx];
            self.in_idx += 1;
            if !needs_escape(c) {
                // The up-front reserve covers the whole run in REALLOC
                // mode; in PAUSE mode a drain may have handed back a
                // smaller buffer, so every write re-checks.
                self.sink.ensure(1)?;
                self.sink.push(c);
            } else {
                self.write_bounded_escape(c, end)?;
            }
        }
        Ok(())
    }

    fn write_escaped_cstr_baseline(&mut self) -> Result<()> {
        while self.in_idx < self.input.len() {
            let c = self.input[self.in_idx];
            if c == 0 {
                return Ok(());
            }
            self.in_idx += 1;
            if !needs_escape(c) {
                self.sink.ensure(1)?;
                self.sink.push(c);
            } else {
                self.write_cstr_escape(c)?;
            }
        }
        Err(ErrorKind::NameTerminatorMissing.into())
    }
}

#[cfg(target_arch = "x86_64")]
impl<'a, 'p> Transcoder<'a, 'p> {
    #[target_feature(enable = "sse2")]
    unsafe fn write_escaped_sse2(&mut self, mut n: usize) -> Result<()> {
        use std::arch::x86_64::*;

        let end = self.in_idx + n;
        self.sink.ensure(n)?;

        // escape if (x < 0x20 || x == 0x22 || x == 0x5c); SSE2 has no
        // unsigned byte compare, so bias both sides by 0x80.
        let esch20 = _mm_set1_epi8((0x20u8 ^ 0x80) as i8);
        let esch22 = _mm_set1_epi8(0x22);
        let esch5c = _mm_set1_epi8(0x5c);
        let bias = _mm_set1_epi8(0x80u8 as i8);

        while self.in_idx < end {
            let clamped = n.min(16);
            let chars = simd::load_partial_128(self.input, self.in_idx, clamped);

            let mut iseq = _mm_cmpgt_epi8(esch20, _mm_xor_si128(chars, bias));
            iseq = _mm_or_si128(iseq, _mm_cmpeq_epi8(chars, esch22));
            iseq = _mm_or_si128(iseq, _mm_cmpeq_epi8(chars, esch5c));

            let mask = _mm_movemask_epi8(iseq) as u32;
            let mut run = mask.trailing_zeros() as usize;
            if run > clamped {
                // No byte in this block needs escaping.
                run = clamped;
            }

            self.sink.ensure(run)?;
            simd::store_partial_128(&mut self.sink.buf, self.sink.idx, chars, run);
            n -= run;
            self.sink.idx += run;
            self.in_idx += run;

            if run < clamped {
                let c = self.input[self.in_idx];
                self.in_idx += 1;
                n -= 1;
                self.write_bounded_escape(c, end)?;
            }
        }
        Ok(())
    }

    #[target_feature(enable = "sse4.2")]
    unsafe fn write_escaped_sse42(&mut self, mut n: usize) -> Result<()> {
        use std::arch::x86_64::*;

        let end = self.in_idx + n;
        self.sink.ensure(n)?;

        // Ranges [0x00, 0x1f], [0x22, 0x22], [0x5c, 0x5c].
        let escapes = _mm_set_epi8(0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x5c, 0x5c, 0x22, 0x22, 0x1f, 0);

        while self.in_idx < end {
            let clamped = n.min(16);
            let chars = simd::load_partial_128(self.input, self.in_idx, clamped);
            let mut run = _mm_cmpestri::<{
                _SIDD_UBYTE_OPS | _SIDD_CMP_RANGES | _SIDD_POSITIVE_POLARITY | _SIDD_LEAST_SIGNIFICANT
            }>(escapes, 6, chars, clamped as i32) as usize;

            if run == 16 {
                // No byte in this block needs escaping.
                run = clamped;
            }

            self.sink.ensure(run)?;
            simd::store_partial_128(&mut self.sink.buf, self.sink.idx, chars, run);
            n -= run;
            self.sink.idx += run;
            self.in_idx += run;

            if run < clamped {
                let c = self.input[self.in_idx];
                self.in_idx += 1;
                n -= 1;
                self.write_bounded_escape(c, end)?;
            }
        }
        Ok(())
    }

    #[target_feature(enable = "avx2")]
    unsafe fn write_escaped_avx2(&mut self, mut n: usize) -> Result<()> {
        use std::arch::x86_64::*;

        let end = self.in_idx + n;
        self.sink.ensure(n)?;

        let esch20 = _mm256_set1_epi8((0x20u8 ^ 0x80) as i8);
        let esch22 = _mm256_set1_epi8(0x22);
        let esch5c = _mm256_set1_epi8(0x5c);
        let bias = _mm256_set1_epi8(0x80u8 as i8);

        while self.in_idx < end {
            let clamped = n.min(32);
            let chars = simd::load_partial_256(self.input, self.in_idx, clamped);

            let mut iseq = _mm256_cmpgt_epi8(esch20, _mm256_xor_si256(chars, bias));
            iseq = _mm256_or_si256(iseq, _mm256_cmpeq_epi8(chars, esch22));
            iseq = _mm256_or_si256(iseq, _mm256_cmpeq_epi8(chars, esch5c));

            let mask = _mm256_movemask_epi8(iseq) as u32;
            let mut run = mask.trailing_zeros() as usize;
            if run > clamped {
                run = clamped;
            }

            self.sink.ensure(run)?;
            simd::store_partial_256(&mut self.sink.buf, self.sink.idx, chars, run);
            n -= run;
            self.sink.idx += run;
            self.in_idx += run;

            if run < clamped {
                let c = self.input[self.in_idx];
                self.in_idx += 1;
                n -= 1;
                self.write_bounded_escape(c, end)?;
            }
        }
        Ok(())
    }

    #[target_feature(enable = "avx512f,avx512bw")]
    unsafe fn write_escaped_avx512(&mut self, mut n: usize) -> Result<()> {
        use std::arch::x86_64::*;

        let end = self.in_idx + n;
        self.sink.ensure(n)?;

        // allow if (x >= 0x20 && x != 0x22 && x != 0x5c); AVX-512 compares
        // straight into mask registers, unsigned included.
        let esch20 = _mm512_set1_epi8(0x20);
        let esch22 = _mm512_set1_epi8(0x22);
        let esch5c = _mm512_set1_epi8(0x5c);

        while self.in_idx < end {
            let clamped = n.min(64);
            let chars = simd::load_partial_512(self.input, self.in_idx, clamped);

            let mut pass = _mm512_cmpge_epu8_mask(chars, esch20);
            pass = _mm512_mask_cmpneq_epu8_mask(pass, chars, esch22);
            pass = _mm512_mask_cmpneq_epu8_mask(pass, chars, esch5c);

            let mut run = (!pass).trailing_zeros() as usize;
            if run > clamped {
                run = clamped;
            }

            self.sink.ensure(run)?;
            simd::store_partial_512(&mut self.sink.buf, self.sink.idx, chars, run);
            n -= run;
            self.sink.idx += run;
            self.in_idx += run;

            if run < clamped {
                let c = self.input[self.in_idx];
                self.in_idx += 1;
                n -= 1;
                self.write_bounded_escape(c, end)?;
            }
        }
        Ok(())
    }

    #[target_feature(enable = "sse2")]
    unsafe fn write_escaped_cstr_sse2(&mut self) -> Result<()> {
        use std::arch::x86_64::*;

        // The bounded predicate with the terminator folded in: stop on
        // (x < 0x20 || x == 0x22 || x == 0x5c || x == 0).
        let esch20 = _mm_set1_epi8((0x20u8 ^ 0x80) as i8);
        let esch22 = _mm_set1_epi8(0x22);
        let esch5c = _mm_set1_epi8(0x5c);
        let bias = _mm_set1_epi8(0x80u8 as i8);

        while self.in_idx < self.input.len() {
            let clamped = (self.input.len() - self.in_idx).min(16);
            let chars = simd::load_partial_128(self.input, self.in_idx, clamped);

            let mut iseq = _mm_cmpgt_epi8(esch20, _mm_xor_si128(chars, bias));
            iseq = _mm_or_si128(iseq, _mm_cmpeq_epi8(chars, esch22));
            iseq = _mm_or_si128(iseq, _mm_cmpeq_epi8(chars, esch5c));

            let mask = _mm_movemask_epi8(iseq) as u32;
            let mut run = mask.trailing_zeros() as usize;
            if run > clamped {
                run = clamped;
            }

            self.sink.ensure(run)?;
            simd::store_partial_128(&mut self.sink.buf, self.sink.idx, chars, run);
            self.sink.idx += run;
            self.in_idx += run;

            if run < clamped {
                let c = self.input[self.in_idx];
                if c == 0 {
                    return Ok(());
                }
                self.in_idx += 1;
                self.write_cstr_escape(c)?;
            }
        }
        Err(ErrorKind::NameTerminatorMissing.into())
    }

    #[target_feature(enable = "sse4.2")]
    unsafe fn write_escaped_cstr_sse42(&mut self) -> Result<()> {
        use std::arch::x86_64::*;

        // Negated ranges [0x20, 0x21], [0x23, 0x5b], [0x5d, 0xff]: the
        // implicit-length compare stops on anything needing an escape or on
        // the terminator itself.
        let escapes =
            _mm_set_epi8(0, 0, 0, 0, 0, 0, 0, 0, 0, 0, -1, 0x5d, 0x5b, 0x23, 0x21, 0x20);

        while self.in_idx < self.input.len() {
            let clamped = (self.input.len() - self.in_idx).min(16);
            let chars = simd::load_partial_128(self.input, self.in_idx, clamped);
            let mut run = _mm_cmpistri::<{
                _SIDD_UBYTE_OPS | _SIDD_CMP_RANGES | _SIDD_NEGATIVE_POLARITY | _SIDD_LEAST_SIGNIFICANT
            }>(escapes, chars) as usize;
            if run > clamped {
                run = clamped;
            }

            self.sink.ensure(run)?;
            simd::store_partial_128(&mut self.sink.buf, self.sink.idx, chars, run);
            self.sink.idx += run;
            self.in_idx += run;

            if run < clamped {
                let c = self.input[self.in_idx];
                if c == 0 {
                    return Ok(());
                }
                self.in_idx += 1;
                self.write_cstr_escape(c)?;
            }
        }
        Err(ErrorKind::NameTerminatorMissing.into())
    }

    #[target_feature(enable = "avx2")]
    unsafe fn write_escaped_cstr_avx2(&mut self) -> Result<()> {
        use std::arch::x86_64::*;

        let esch20 = _mm256_set1_epi8((0x20u8 ^ 0x80) as i8);
        let esch22 = _mm256_set1_epi8(0x22);
        let esch5c = _mm256_set1_epi8(0x5c);
        let bias = _mm256_set1_epi8(0x80u8 as i8);

        while self.in_idx < self.input.len() {
            let clamped = (self.input.len() - self.in_idx).min(32);
            let chars = simd::load_partial_256(self.input, self.in_idx, clamped);

            let mut iseq = _mm256_cmpgt_epi8(esch20, _mm256_xor_si256(chars, bias));
            iseq = _mm256_or_si256(iseq, _mm256_cmpeq_epi8(chars, esch22));
            iseq = _mm256_or_si256(iseq, _mm256_cmpeq_epi8(chars, esch5c));

            let mask = _mm256_movemask_epi8(iseq) as u32;
            let mut run = mask.trailing_zeros() as usize;
            if run > clamped {
                run = clamped;
            }

            self.sink.ensure(run)?;
            simd::store_partial_256(&mut self.sink.buf, self.sink.idx, chars, run);
            self.sink.idx += run;
            self.in_idx += run;

            if run < clamped {
                let c = self.input[self.in_idx];
                if c == 0 {
                    return Ok(());
                }
                self.in_idx += 1;
                self.write_cstr_escape(c)?;
            }
        }
        Err(ErrorKind::NameTerminatorMissing.into())
    }

    #[target_feature(enable = "avx512f,avx512bw")]
    unsafe fn write_escaped_cstr_avx512(&mut self) -> Result<()> {
        use std::arch::x86_64::*;

        let esch20 = _mm512_set1_epi8(0x20);
        let esch22 = _mm512_set1_epi8(0x22);
        let esch5c = _mm512_set1_epi8(0x5c);

        while self.in_idx < self.input.len() {
            let clamped = (self.input.len() - self.in_idx).min(64);
            let chars = simd::load_partial_512(self.input, self.in_idx, clamped);

            // Zero fails the >= 0x20 test, so the terminator stops the run
            // like any escape.
            let mut pass = _mm512_cmpge_epu8_mask(chars, esch20);
            pass = _mm512_mask_cmpneq_epu8_mask(pass, chars, esch22);
            pass = _mm512_mask_cmpneq_epu8_mask(pass, chars, esch5c);

            let mut run = (!pass).trailing_zeros() as usize;
            if run > clamped {
                run = clamped;
            }

            self.sink.ensure(run)?;
            simd::store_partial_512(&mut self.sink.buf, self.sink.idx, chars, run);
            self.sink.idx += run;
            self.in_idx += run;

            if run < clamped {
                let c = self.input[self.in_idx];
                if c == 0 {
                    return Ok(());
                }
                self.in_idx += 1;
                self.write_cstr_escape(c)?;
            }
        }
        Err(ErrorKind::NameTerminatorMissing.into())
    }
}

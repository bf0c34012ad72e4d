//! The ObjectId hex writer: 12 raw bytes to 24 lowercase hex digits,
//! bracketed by quotes.
//!
//! The vector body widens each byte into an adjacent pair, shifts the high
//! copy down a nibble, masks, and shuffles through a 16-entry LUT — the
//! fast-hex technique. Baseline is a nibble-at-a-time table lookup.

use crate::transcoder::Transcoder;

pub(crate) static HEX_DIGITS: [u8; 16] = *b"0123456789abcdef";

impl<'a, 'p> Transcoder<'a, 'p> {
    /// Emits the quoted 24-digit hex form of the 12 bytes at the cursor.
    /// The caller has verified 12 input bytes remain and ensured 26 bytes of
    /// output.
    pub(crate) fn write_object_id(&mut self) {
        #[cfg(target_arch = "x86_64")]
        {
            use crate::isa::Isa;
            // The AVX2 body covers the AVX-512 tier too; the narrower tiers
            // take the scalar path.
            return match self.isa {
                Isa::Avx2 | Isa::Avx512bw => unsafe { self.write_object_id_avx2() },
                _ => self.write_object_id_baseline(),
            };
        }
        #[cfg(not(target_arch = "x86_64"))]
        self.write_object_id_baseline();
    }

    fn write_object_id_baseline(&mut self) {
        self.sink.push(b'"');
        let end = self.in_idx + 12;
        while self.in_idx < end {
            let byte = self.input[self.in_idx];
            self.in_idx += 1;
            self.sink.push(HEX_DIGITS[(byte >> 4) as usize]);
            self.sink.push(HEX_DIGITS[(byte & 0xf) as usize]);
        }
        self.sink.push(b'"');
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn write_object_id_avx2(&mut self) {
        use std::arch::x86_64::*;

        use crate::simd;

        let a = simd::load_partial_128(self.input, self.in_idx, 12);
        self.in_idx += 12;

        let hex_lutr = _mm256_setr_epi8(
            b'0' as i8, b'1' as i8, b'2' as i8, b'3' as i8, b'4' as i8, b'5' as i8, b'6' as i8,
            b'7' as i8, b'8' as i8, b'9' as i8, b'a' as i8, b'b' as i8, b'c' as i8, b'd' as i8,
            b'e' as i8, b'f' as i8, b'0' as i8, b'1' as i8, b'2' as i8, b'3' as i8, b'4' as i8,
            b'5' as i8, b'6' as i8, b'7' as i8, b'8' as i8, b'9' as i8, b'a' as i8, b'b' as i8,
            b'c' as i8, b'd' as i8, b'e' as i8, b'f' as i8,
        );
        let rot2 = _mm256_setr_epi8(
            -1, 0, -1, 2, -1, 4, -1, 6, -1, 8, -1, 10, -1, 12, -1, 14, -1, 0, -1, 2, -1, 4, -1, 6,
            -1, 8, -1, 10, -1, 12, -1, 14,
        );

        // Bytes to nibble pairs (a -> [a >> 4, a & 0b1111]), then encode
        // through the LUT.
        let doubled = _mm256_cvtepu8_epi16(a);
        let hi = _mm256_srli_epi16::<4>(doubled);
        let lo = _mm256_shuffle_epi8(doubled, rot2);
        let nibbles = _mm256_and_si256(_mm256_or_si256(hi, lo), _mm256_set1_epi8(0b1111));
        let encoded = _mm256_shuffle_epi8(hex_lutr, nibbles);

        self.sink.push(b'"');
        simd::store_partial_256(&mut self.sink.buf, self.sink.idx, encoded, 24);
        self.sink.idx += 24;
        self.sink.push(b'"');
    }
}

//! Decimal formatting of BSON int32/int64 values.
//!
//! Two digits per iteration through a 200-byte pair table, assembled
//! right-to-left in a fixed stack buffer. Adapted from the technique used by
//! the fmt library.

/// `"00" "01" ... "99"` laid out as consecutive byte pairs.
pub(crate) static DIGIT_PAIRS: [u8; 200] = *b"\
0001020304050607080910111213141516171819\
2021222324252627282930313233343536373839\
4041424344454647484950515253545556575859\
6061626364656667686970717273747576777879\
8081828384858687888990919293949596979899";

/// Largest int32 is 10 digits plus sign.
pub(crate) const INT32_BUF_LEN: usize = 11;
/// Largest int64 is 19 digits plus sign.
pub(crate) const INT64_BUF_LEN: usize = 20;

fn write_backwards(buf: &mut [u8], mut v: u64) -> usize {
    let mut p = buf.len();

    while v >= 100 {
        let i = ((v % 100) * 2) as usize;
        v /= 100;
        p -= 2;
        buf[p..p + 2].copy_from_slice(&DIGIT_PAIRS[i..i + 2]);
    }

    if v < 10 {
        p -= 1;
        buf[p] = b'0' + v as u8;
    } else {
        let i = (v * 2) as usize;
        p -= 2;
        buf[p..p + 2].copy_from_slice(&DIGIT_PAIRS[i..i + 2]);
    }

    p
}

/// Formats `v` right-justified into `buf`, returning the index of the first
/// byte. The digits occupy `buf[start..]`.
pub(crate) fn format_i64(buf: &mut [u8; INT64_BUF_LEN], v: i64) -> usize {
    let mut p = write_backwards(&mut buf[..], v.unsigned_abs());
    if v < 0 {
        p -= 1;
        buf[p] = b'-';
    }
    p
}

/// Formats `v` right-justified into `buf`, returning the index of the first
/// byte.
pub(crate) fn format_i32(buf: &mut [u8; INT32_BUF_LEN], v: i32) -> usize {
    let mut p = write_backwards(&mut buf[..], u64::from(v.unsigned_abs()));
    if v < 0 {
        p -= 1;
        buf[p] = b'-';
    }
    p
}

/// The number of bytes occupied by the BSON field name of array element `v`:
/// the decimal width of the index plus one for the null terminator.
///
/// Well-formed writers produce array keys `0, 1, 2, …`, so the walker skips
/// them by width instead of scanning for the terminator.
#[inline]
pub(crate) fn array_key_width(v: i32) -> usize {
    if v < 10 {
        return 2;
    }
    if v < 100 {
        return 3;
    }
    if v < 1_000 {
        return 4;
    }
    if v < 10_000 {
        return 5;
    }
    if v < 100_000 {
        return 6;
    }
    if v < 1_000_000 {
        return 7;
    }
    if v < 10_000_000 {
        return 8;
    }
    if v < 100_000_000 {
        return 9;
    }
    if v < 1_000_000_000 {
        return 10;
    }
    11
}

use bson2json::{transcode, ErrorKind};

use super::builder::DocBuilder;

fn kind_of(bytes: &[u8], is_array: bool) -> ErrorKind {
    transcode(bytes, is_array).unwrap_err().kind
}

#[test]
fn input_too_short() {
    assert!(matches!(kind_of(&[], false), ErrorKind::InputTooShort));
    assert!(matches!(kind_of(&[5, 0, 0, 0], false), ErrorKind::InputTooShort));
}

#[test]
fn bson_size_too_small() {
    assert!(matches!(
        kind_of(&[4, 0, 0, 0, 0], false),
        ErrorKind::BsonSizeTooSmall
    ));
    assert!(matches!(
        kind_of(&[0, 0, 0, 0, 0], false),
        ErrorKind::BsonSizeTooSmall
    ));
    // Negative size reads as < 5 too.
    assert!(matches!(
        kind_of(&[0xFF, 0xFF, 0xFF, 0xFF, 0], false),
        ErrorKind::BsonSizeTooSmall
    ));
}

#[test]
fn bson_size_exceeds_input() {
    assert!(matches!(
        kind_of(&[10, 0, 0, 0, 0], false),
        ErrorKind::BsonSizeExceedsInput
    ));

    let mut doc = DocBuilder::new().int32("a", 1).finish();
    // Declare one byte more than the buffer holds.
    let declared = doc.len() as i32 + 1;
    doc[..4].copy_from_slice(&declared.to_le_bytes());
    assert!(matches!(
        kind_of(&doc, false),
        ErrorKind::BsonSizeExceedsInput
    ));
}

#[test]
fn bad_string_length() {
    // Zero-length header (must be at least 1 for the terminator).
    let mut doc = vec![0u8; 0];
    doc.extend_from_slice(&12i32.to_le_bytes());
    doc.extend_from_slice(&[0x02, b's', 0]); // string "s"
    doc.extend_from_slice(&0i32.to_le_bytes());
    doc.push(0);
    assert!(matches!(kind_of(&doc, false), ErrorKind::BadStringLength));

    // Header pointing past the end of the input.
    let mut doc = vec![0u8; 0];
    doc.extend_from_slice(&13i32.to_le_bytes());
    doc.extend_from_slice(&[0x02, b's', 0]);
    doc.extend_from_slice(&1000i32.to_le_bytes());
    doc.push(b'x');
    doc.push(0);
    assert!(matches!(kind_of(&doc, false), ErrorKind::BadStringLength));
}

#[test]
fn truncated_payload() {
    // Document claims an ObjectId but holds only 4 of its 12 bytes.
    let mut doc = vec![0u8; 0];
    doc.extend_from_slice(&12i32.to_le_bytes());
    doc.extend_from_slice(&[0x07, b'i', 0]);
    doc.extend_from_slice(&[1, 2, 3, 4]);
    doc.push(0);
    let err = transcode(&doc, false).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TruncatedPayload("ObjectId")));
    assert_eq!(err.key.as_deref(), Some("i"));

    // Same shape for an int64.
    let mut doc = vec![0u8; 0];
    doc.extend_from_slice(&10i32.to_le_bytes());
    doc.extend_from_slice(&[0x12, b'n', 0]);
    doc.extend_from_slice(&[1, 2]);
    doc.push(0);
    assert!(matches!(
        kind_of(&doc, false),
        ErrorKind::TruncatedPayload("int64")
    ));
}

#[test]
fn invalid_array_terminator() {
    // Outer doc with an array field whose body's final byte is not zero.
    let inner: Vec<u8> = vec![5, 0, 0, 0, 1];
    let mut doc = vec![0u8; 0];
    let total = 4 + 3 + inner.len() + 1;
    doc.extend_from_slice(&(total as i32).to_le_bytes());
    doc.extend_from_slice(&[0x04, b'a', 0]);
    doc.extend_from_slice(&inner);
    doc.push(0);
    let err = transcode(&doc, false).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidArrayTerminator));
    assert_eq!(err.key.as_deref(), Some("a"));
}

#[test]
fn name_terminator_missing() {
    // Field name runs to the end of the buffer with no null.
    let mut doc = vec![0u8; 0];
    doc.extend_from_slice(&10i32.to_le_bytes());
    doc.extend_from_slice(&[0x10, b'a', b'a', b'a', b'a', b'a']);
    assert!(matches!(
        kind_of(&doc, false),
        ErrorKind::NameTerminatorMissing
    ));
}

#[test]
fn incompatible_types_are_rejected() {
    // Binary, subtype 0, 1 byte of data.
    let doc = DocBuilder::new()
        .raw_element("bin", 0x05, &[1, 0, 0, 0, 0x00, 0xAB])
        .finish();
    let err = transcode(&doc, false).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::IncompatibleType(0x05)));
    assert_eq!(err.key.as_deref(), Some("bin"));

    // Timestamp.
    let doc = DocBuilder::new()
        .raw_element("ts", 0x11, &[0; 8])
        .finish();
    assert!(matches!(
        kind_of(&doc, false),
        ErrorKind::IncompatibleType(0x11)
    ));

    // Decimal128.
    let doc = DocBuilder::new()
        .raw_element("dec", 0x13, &[0; 16])
        .finish();
    assert!(matches!(
        kind_of(&doc, false),
        ErrorKind::IncompatibleType(0x13)
    ));

    // MinKey / MaxKey carry no payload.
    let doc = DocBuilder::new().raw_element("min", 0xFF, &[]).finish();
    assert!(matches!(
        kind_of(&doc, false),
        ErrorKind::IncompatibleType(0xFF)
    ));
    let doc = DocBuilder::new().raw_element("max", 0x7F, &[]).finish();
    assert!(matches!(
        kind_of(&doc, false),
        ErrorKind::IncompatibleType(0x7F)
    ));
}

#[test]
fn unknown_type() {
    let doc = DocBuilder::new().raw_element("x", 0x42, &[]).finish();
    let err = transcode(&doc, false).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownType(0x42)));
}

#[test]
fn recursion_limit() {
    let mut doc = DocBuilder::new().int32("leaf", 1);
    for _ in 0..250 {
        doc = DocBuilder::new().doc("d", doc);
    }
    assert!(matches!(
        kind_of(&doc.finish(), false),
        ErrorKind::RecursionLimitExceeded
    ));
}

#[test]
fn deep_but_legal_nesting_succeeds() {
    let mut doc = DocBuilder::new().int32("leaf", 1);
    for _ in 0..150 {
        doc = DocBuilder::new().doc("d", doc);
    }
    assert!(transcode(&doc.finish(), false).is_ok());
}

#[test]
fn array_error_carries_index() {
    // Second array element carries an unknown tag: 0x42, key "1", no
    // payload.
    let mut body = vec![0u8; 0];
    body.extend_from_slice(&[0x10, b'0', 0]);
    body.extend_from_slice(&1i32.to_le_bytes());
    body.extend_from_slice(&[0x42, b'1', 0]);
    let mut doc = vec![0u8; 0];
    doc.extend_from_slice(&((body.len() + 5) as i32).to_le_bytes());
    doc.extend_from_slice(&body);
    doc.push(0);

    let err = transcode(&doc, true).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownType(0x42)));
    assert_eq!(err.index, Some(1));
}

use bson2json::{collect_missing, transcode_with, ObjectId, Populate, TranscodeOptions};
use pretty_assertions::assert_eq;

use super::builder::{ArrayBuilder, DocBuilder};

fn oid(n: u8) -> ObjectId {
    let mut bytes = [0u8; 12];
    bytes[0] = 0x5f;
    bytes[11] = n;
    ObjectId::from_bytes(bytes)
}

fn run(doc: &[u8], is_array: bool, populate: &mut Populate) -> String {
    let out = transcode_with(
        doc,
        is_array,
        TranscodeOptions {
            chunk_size: 0,
            populate: Some(populate),
        },
    )
    .unwrap();
    String::from_utf8(out.json).unwrap()
}

#[test]
fn hit_substitutes_the_value_position() {
    let mut p = Populate::new();
    p.insert("author", oid(1), &br#"{"name":"a"}"#[..]);

    let doc = DocBuilder::new()
        .string("title", "post")
        .oid("author", oid(1).bytes())
        .finish();

    assert_eq!(
        run(&doc, false, &mut p),
        r#"{"title":"post","author":{"name":"a"}}"#
    );
    assert_eq!(p.missing().count(), 0);
}

#[test]
fn miss_emits_hex_and_records_the_id() {
    let mut p = Populate::new();
    p.insert("author", oid(1), &b"{}"[..]);

    let doc = DocBuilder::new().oid("author", oid(9).bytes()).finish();
    let json = run(&doc, false, &mut p);

    assert_eq!(json, format!(r#"{{"author":"{}"}}"#, oid(9).to_hex()));
    assert!(p.missing_for("author").unwrap().contains(&oid(9)));
}

#[test]
fn unregistered_paths_emit_hex_without_recording() {
    let mut p = Populate::new();
    p.insert("author", oid(1), &b"{}"[..]);

    let doc = DocBuilder::new().oid("editor", oid(2).bytes()).finish();
    let json = run(&doc, false, &mut p);

    assert_eq!(json, format!(r#"{{"editor":"{}"}}"#, oid(2).to_hex()));
    assert!(p.missing_for("editor").is_none());
}

#[test]
fn nested_paths_are_dotted() {
    let mut p = Populate::new();
    p.insert("meta.author", oid(3), &br#""deep""#[..]);

    let doc = DocBuilder::new()
        .doc("meta", DocBuilder::new().oid("author", oid(3).bytes()))
        .finish();

    assert_eq!(run(&doc, false, &mut p), r#"{"meta":{"author":"deep"}}"#);
}

#[test]
fn array_indices_collapse_in_paths() {
    let mut p = Populate::new();
    p.insert("authors", oid(4), &br#""x""#[..]);
    p.insert("authors", oid(5), &br#""y""#[..]);

    let doc = DocBuilder::new()
        .array(
            "authors",
            ArrayBuilder::new().oid(oid(4).bytes()).oid(oid(5).bytes()),
        )
        .finish();

    assert_eq!(run(&doc, false, &mut p), r#"{"authors":["x","y"]}"#);
}

#[test]
fn objects_inside_arrays_extend_the_array_path() {
    let mut p = Populate::new();
    p.insert("posts.author", oid(6), &br#""z""#[..]);

    let doc = DocBuilder::new()
        .array(
            "posts",
            ArrayBuilder::new().doc(DocBuilder::new().oid("author", oid(6).bytes())),
        )
        .finish();

    assert_eq!(run(&doc, false, &mut p), r#"{"posts":[{"author":"z"}]}"#);
}

#[test]
fn repeat_path_aliases_share_fragments() {
    let mut p = Populate::new();
    p.insert("author", oid(7), &br#""shared""#[..]);
    assert!(p.repeat_path("author", "reviewer"));

    let doc = DocBuilder::new()
        .oid("author", oid(7).bytes())
        .oid("reviewer", oid(7).bytes())
        .finish();

    assert_eq!(
        run(&doc, false, &mut p),
        r#"{"author":"shared","reviewer":"shared"}"#
    );
}

#[test]
fn collect_missing_walks_without_output() {
    let mut p = Populate::new();
    p.insert("author", oid(1), &b"{}"[..]);
    p.insert("meta.editor", oid(2), &b"{}"[..]);

    let doc = DocBuilder::new()
        .oid("author", oid(10).bytes())
        .doc(
            "meta",
            DocBuilder::new()
                .oid("editor", oid(11).bytes())
                .string("note", "irrelevant"),
        )
        .oid("untracked", oid(12).bytes())
        .finish();

    collect_missing(&doc, false, &mut p).unwrap();

    assert!(p.missing_for("author").unwrap().contains(&oid(10)));
    assert!(p.missing_for("meta.editor").unwrap().contains(&oid(11)));
    assert!(p.missing_for("untracked").is_none());
}

#[test]
fn collect_missing_then_populate_round_trip() {
    let mut p = Populate::new();
    p.insert("ref", oid(0), &b"{}"[..]); // registers the path

    let doc = DocBuilder::new().oid("ref", oid(20).bytes()).finish();

    collect_missing(&doc, false, &mut p).unwrap();
    let missing: Vec<ObjectId> = p.missing_for("ref").unwrap().iter().copied().collect();
    assert_eq!(missing, vec![oid(20)]);

    // The caller resolves the miss and registers the fragment.
    p.insert("ref", oid(20), &br#"{"resolved":true}"#[..]);
    p.clear_missing();

    assert_eq!(run(&doc, false, &mut p), r#"{"ref":{"resolved":true}}"#);
    assert_eq!(p.missing().count(), 0);
}

#[test]
fn doc_id_captured_alongside_populate() {
    let mut p = Populate::new();
    p.insert("other", oid(1), &b"{}"[..]);

    let id = oid(42);
    let doc = DocBuilder::new()
        .oid("_id", id.bytes())
        .string("k", "v")
        .finish();

    let out = transcode_with(
        &doc,
        false,
        TranscodeOptions {
            chunk_size: 0,
            populate: Some(&mut p),
        },
    )
    .unwrap();
    assert_eq!(out.doc_id, Some(id));
}

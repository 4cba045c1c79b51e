use super::*;

#[test]
fn extension_from_url_and_path() {
    let doc = Document::text(Some("https://x.org/data/report.CSV?x=1".into()), "");
    assert_eq!(doc.extension().as_deref(), Some("csv"));

    let doc = Document::text(Some("/srv/dump.tar.gz".into()), "");
    assert_eq!(doc.extension().as_deref(), Some("tar.gz"));

    let doc = Document::text(Some("README".into()), "");
    assert_eq!(doc.extension(), None);
}

#[test]
fn binary_body_survives_json() {
    let payload = Payload::Document(Document::binary(Some("a.zip".into()), vec![0x50, 0x4b, 0, 255]));
    let json = serde_json::to_string(&payload).unwrap();
    assert!(json.contains("504b00ff"));
    let back: Payload = serde_json::from_str(&json).unwrap();
    assert_eq!(back, payload);
}

#[test]
fn whitespace_body_is_empty() {
    assert!(Body::Text(" \n".into()).is_empty());
    assert!(!Body::Text("x".into()).is_empty());
}

//! Zip, tar, tar.gz and gzip archives.
//!
//! The archive bytes are spooled to a temporary file that is removed when
//! parsing returns, on success or failure. Each selected member is parsed
//! with the regular format machinery and the results are stacked row-wise
//! with `__archived_file` naming the member.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{Read, Write};
use tempfile::NamedTempFile;

use super::{FormatKind, ParseContext, ParseError};
use crate::core::{ColumnValueSet, Document, pseudo};
use crate::ui;
use crate::utils::glob::path_match;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;

/// Whether the bytes start like one of the supported archive kinds.
pub fn is_archive_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
        || bytes.starts_with(ZIP_EMPTY_MAGIC)
        || bytes.starts_with(GZIP_MAGIC)
        || is_tar(bytes)
}

fn is_tar(bytes: &[u8]) -> bool {
    bytes
        .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len())
        .is_some_and(|magic| magic == TAR_MAGIC)
}

pub fn parse(
    kind: FormatKind,
    doc: &Document,
    ctx: &ParseContext<'_>,
    auto: bool,
) -> Result<ColumnValueSet, ParseError> {
    let bytes = doc.body.as_bytes();
    if auto && !magic_matches(kind, bytes) {
        return Err(ParseError::Archive(format!("not a {} archive", kind.name())));
    }

    let spool = Spool::new(bytes)?;
    let members = match kind {
        FormatKind::Zip => read_zip(spool.open()?)?,
        FormatKind::Tar => read_tar(spool.open()?)?,
        FormatKind::TarGz => read_tar(GzDecoder::new(spool.open()?))?,
        FormatKind::Gzip => vec![read_gzip(spool.open()?, doc)?],
        other => {
            return Err(ParseError::Archive(format!("{} is not an archive format", other.name())));
        }
    };

    let mask = ctx.params.non_empty("archive path");
    let mut values = ColumnValueSet::new();
    let mut matched = 0usize;

    for member in members {
        let name = member.name.clone().unwrap_or_default();
        if let Some(mask) = mask
            && !path_match(mask, &name)
        {
            continue;
        }
        matched += 1;
        ui::verbose(&format!("Parsing archive member {}", name));
        let parsed = super::parse_member(&member, ctx)?;
        values.append_rows(parsed, pseudo::ARCHIVED_FILE, &name);
    }

    if matched == 0 {
        return Err(ParseError::Archive(match mask {
            Some(mask) => format!("no member matches '{}'", mask),
            None => "archive is empty".to_string(),
        }));
    }
    Ok(values)
}

fn magic_matches(kind: FormatKind, bytes: &[u8]) -> bool {
    match kind {
        FormatKind::Zip => bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(ZIP_EMPTY_MAGIC),
        FormatKind::Tar => is_tar(bytes),
        FormatKind::Gzip => bytes.starts_with(GZIP_MAGIC),
        FormatKind::TarGz => {
            if !bytes.starts_with(GZIP_MAGIC) {
                return false;
            }
            let mut head = Vec::with_capacity(TAR_MAGIC_OFFSET + TAR_MAGIC.len());
            let mut decoder = GzDecoder::new(bytes).take((TAR_MAGIC_OFFSET + TAR_MAGIC.len()) as u64);
            decoder.read_to_end(&mut head).is_ok() && is_tar(&head)
        }
        _ => false,
    }
}

/// Archive bytes on disk for the duration of one parse.
struct Spool {
    file: NamedTempFile,
}

impl Spool {
    fn new(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut file = NamedTempFile::new().map_err(io_error)?;
        file.write_all(bytes).map_err(io_error)?;
        file.flush().map_err(io_error)?;
        Ok(Self { file })
    }

    fn open(&self) -> Result<File, ParseError> {
        self.file.reopen().map_err(io_error)
    }
}

fn io_error(e: std::io::Error) -> ParseError {
    ParseError::Archive(e.to_string())
}

fn read_zip(file: File) -> Result<Vec<Document>, ParseError> {
    let mut archive = zip::ZipArchive::new(file).map_err(|e| ParseError::Archive(e.to_string()))?;
    let mut members = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ParseError::Archive(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(io_error)?;
        members.push(Document::binary(Some(name), bytes));
    }
    Ok(members)
}

fn read_tar<R: Read>(reader: R) -> Result<Vec<Document>, ParseError> {
    let mut archive = tar::Archive::new(reader);
    let mut members = Vec::new();
    for entry in archive.entries().map_err(io_error)? {
        let mut entry = entry.map_err(io_error)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().map_err(io_error)?.to_string_lossy().into_owned();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(io_error)?;
        members.push(Document::binary(Some(name), bytes));
    }
    Ok(members)
}

/// A gzip stream holds one member, named after the document minus `.gz`.
fn read_gzip(file: File, doc: &Document) -> Result<Document, ParseError> {
    let mut bytes = Vec::new();
    GzDecoder::new(file).read_to_end(&mut bytes).map_err(io_error)?;

    let name = doc
        .name
        .as_deref()
        .map(|n| n.split(['?', '#']).next().unwrap_or(n))
        .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n))
        .map(|n| n.strip_suffix(".gz").unwrap_or(n).to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "data".to_string());
    Ok(Document::binary(Some(name), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::parse_document;
    use crate::params::RequestParams;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Cursor;
    use zip::write::SimpleFileOptions;

    const CSV: &str = "a,b\n1,2\n3,4\n";

    fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn tar_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn run(doc: &Document, pairs: &[&str]) -> Result<ColumnValueSet, ParseError> {
        let params = RequestParams::from_pairs(pairs.iter().copied());
        parse_document(doc, &ParseContext::new(&params, Vec::new()))
    }

    #[test]
    fn zip_member_matches_direct_parse() {
        let direct = run(&Document::text(Some("data.csv".into()), CSV), &[]).unwrap();
        let archive = Document::binary(
            Some("bundle.zip".into()),
            zip_bytes(&[("data.csv", CSV), ("readme.txt", "hello")]),
        );
        let values = run(&archive, &["archive path=*.csv"]).unwrap();

        for (column, expected) in direct.iter() {
            assert_eq!(values.get(column), Some(expected), "column {}", column);
        }
        assert_eq!(values.get(pseudo::ARCHIVED_FILE).unwrap(), &vec!["data.csv", "data.csv"]);
    }

    #[test]
    fn tar_gz_members_are_stacked() {
        let bytes = gzip(&tar_bytes(&[("one.csv", "a,b\n1,2\n"), ("two.csv", "a,b\n3,4\n")]));
        let doc = Document::binary(Some("set.tgz".into()), bytes);
        let values = run(&doc, &["archive format=csv with header"]).unwrap();
        assert_eq!(values.get("a").unwrap(), &vec!["1", "3"]);
        assert_eq!(values.get(pseudo::ARCHIVED_FILE).unwrap(), &vec!["one.csv", "two.csv"]);
    }

    #[test]
    fn gzip_member_takes_document_name() {
        let doc = Document::binary(Some("https://x.org/feed.json.gz?v=1".into()), gzip(br#"{"n": 1}"#));
        let values = run(&doc, &[]).unwrap();
        assert_eq!(values.get("n").unwrap(), &vec!["1"]);
        assert_eq!(values.get(pseudo::ARCHIVED_FILE).unwrap(), &vec!["feed.json"]);
    }

    #[test]
    fn unmatched_mask_is_an_error_under_explicit_format() {
        let doc = Document::binary(None, zip_bytes(&[("data.csv", CSV)]));
        let err = run(&doc, &["format=zip", "archive path=*.xml"]).unwrap_err();
        assert!(matches!(err, ParseError::Archive(_)));
    }

    #[test]
    fn magic_detection() {
        assert!(is_archive_bytes(&zip_bytes(&[("a", "b")])));
        assert!(is_archive_bytes(&gzip(b"x")));
        assert!(is_archive_bytes(&tar_bytes(&[("a", "b")])));
        assert!(!is_archive_bytes(b"a,b\n1,2"));
    }
}

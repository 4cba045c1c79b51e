//! File and directory executors.

use std::fs;
use std::path::{Path, PathBuf};

use super::{FileSource, Fetched, encoding, require};
use crate::core::{Document, Payload};
use crate::error::{ExtDataError, Result};
use crate::fetch::FetchState;
use crate::params::RequestParams;
use crate::ui;
use crate::utils::glob;
use crate::utils::sanitize::check_relative_path;

pub const DEFAULT_DEPTH: i64 = 1;

fn read_document(path: &Path, name: String, params: &RequestParams) -> Result<Document> {
    let bytes = fs::read(path).map_err(|e| ExtDataError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(encoding::to_document(Some(name), bytes, None, params))
}

fn configured_dir(params: &RequestParams) -> Result<PathBuf> {
    require(params, "directory")?;
    let path = require(params, "path")?;
    let dir = PathBuf::from(path);
    if !dir.is_dir() {
        return Err(ExtDataError::PathError(format!(
            "not a directory: {}",
            dir.display()
        )));
    }
    Ok(dir)
}

/// Files under `root` whose relative path matches `pattern`, at most
/// `depth` levels down, in sorted order.
pub fn walk(root: &Path, pattern: &str, depth: usize, limit: Option<usize>) -> Result<Vec<(PathBuf, String)>> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), String::new(), 1usize)];

    while let Some((dir, prefix, level)) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .map_err(|e| ExtDataError::IoError {
                path: dir.clone(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .collect::<Vec<_>>();
        entries.sort_by_key(|entry| entry.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = format!("{}{}", prefix, name);
            let path = entry.path();
            if path.is_dir() {
                if level < depth {
                    subdirs.push((path, format!("{}/", relative), level + 1));
                }
            } else if glob::path_match(pattern, &relative) {
                found.push((path, relative));
            }
        }
        pending.extend(subdirs.into_iter().rev());
    }

    found.sort_by(|a, b| a.1.cmp(&b.1));
    if let Some(limit) = limit {
        found.truncate(limit);
    }
    Ok(found)
}

/// Read the file(s) `source` designates.
pub fn fetch(source: FileSource, params: &RequestParams, state: &FetchState<'_>) -> Result<Fetched> {
    let payload = match source {
        FileSource::NamedFile => {
            require(params, "file")?;
            let path = PathBuf::from(require(params, "path")?);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Payload::Document(read_document(&path, name, params)?)
        }
        FileSource::DirectoryFile => {
            let dir = configured_dir(params)?;
            let name = require(params, "file name")?;
            check_relative_path(name)?;
            Payload::Document(read_document(&dir.join(name), name.to_string(), params)?)
        }
        FileSource::DirectoryWalk => {
            let dir = configured_dir(params)?;
            let pattern = require(params, "file name")?;
            let depth = params.number("depth").unwrap_or(DEFAULT_DEPTH).max(1) as usize;
            let limit = params.number("limit").filter(|n| *n > 0).map(|n| n as usize);

            let files = walk(&dir, pattern, depth, limit)?;
            ui::verbose(&format!(
                "{} file(s) in {} match '{}'",
                files.len(),
                dir.display(),
                pattern
            ));
            let documents = files
                .into_iter()
                .map(|(path, relative)| read_document(&path, relative, params))
                .collect::<Result<Vec<_>>>()?;
            Payload::Files { documents }
        }
    };
    Ok(Fetched::new(payload, state.clock.now(), 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::cache::MemoryCacheStore;
    use crate::fetch::clock::ManualClock;
    use crate::fetch::jobs::NullJobQueue;
    use crate::fetch::throttle::MemoryThrottleStore;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.csv"), "x\n1").unwrap();
        fs::write(dir.path().join("b.csv"), "x\n2").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/c.csv"), "x\n3").unwrap();
        dir
    }

    fn run(source: FileSource, params: &RequestParams) -> Result<Fetched> {
        let cache = MemoryCacheStore::new();
        let throttle = MemoryThrottleStore::new();
        let clock = ManualClock::new(42);
        let state = FetchState {
            cache: &cache,
            throttle: &throttle,
            jobs: &NullJobQueue,
            clock: &clock,
        };
        fetch(source, params, &state)
    }

    fn dir_params(dir: &TempDir, name: &str) -> RequestParams {
        let mut params = RequestParams::from_pairs(["directory=reports"]);
        params.set("path", dir.path().display().to_string());
        params.set("file name", name);
        params
    }

    fn names(fetched: &Fetched) -> Vec<String> {
        match &fetched.payload {
            Payload::Files { documents } => documents.iter().filter_map(|d| d.name.clone()).collect(),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn walk_respects_depth_and_pattern() {
        let dir = tree();
        let shallow = run(FileSource::DirectoryWalk, &dir_params(&dir, "*.csv")).unwrap();
        assert_eq!(names(&shallow), vec!["a.csv", "b.csv"]);

        let mut deep = dir_params(&dir, "*.csv");
        deep.set("depth", "2");
        let fetched = run(FileSource::DirectoryWalk, &deep).unwrap();
        assert_eq!(names(&fetched), vec!["a.csv", "b.csv", "nested/c.csv"]);
        assert_eq!(fetched.timestamp, 42);
    }

    #[test]
    fn walk_limit_bounds_the_file_count() {
        let dir = tree();
        let mut params = dir_params(&dir, "*");
        params.set("limit", "2");
        let fetched = run(FileSource::DirectoryWalk, &params).unwrap();
        assert_eq!(names(&fetched), vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn directory_file_is_read() {
        let dir = tree();
        let fetched = run(FileSource::DirectoryFile, &dir_params(&dir, "nested/c.csv")).unwrap();
        let Payload::Document(doc) = fetched.payload else {
            panic!("expected a document");
        };
        assert_eq!(doc.body.as_text(), Some("x\n3"));
        assert_eq!(doc.extension().as_deref(), Some("csv"));
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tree();
        let err = run(FileSource::DirectoryFile, &dir_params(&dir, "../etc/passwd")).unwrap_err();
        assert!(matches!(err, ExtDataError::PathError(_)));
    }

    #[test]
    fn named_file_reads_its_path() {
        let dir = tree();
        let mut params = RequestParams::from_pairs(["file=notes"]);
        params.set("path", dir.path().join("notes.txt").display().to_string());
        let fetched = run(FileSource::NamedFile, &params).unwrap();
        let Payload::Document(doc) = fetched.payload else {
            panic!("expected a document");
        };
        assert_eq!(doc.name.as_deref(), Some("notes.txt"));
        assert_eq!(doc.body.as_text(), Some("skip"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tree();
        let err = run(FileSource::DirectoryFile, &dir_params(&dir, "absent.csv")).unwrap_err();
        assert!(matches!(err, ExtDataError::IoError { .. }));
    }
}

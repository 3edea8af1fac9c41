//! Read-only segment store backing retrieval and reranking.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::core::ids::SegmentId;
use crate::rag::core::segment::{Segment, SegmentPosition};

/// Processed chunk file names: `{document}_page_{page}_chunk_{n}.txt`.
static CHUNK_FILE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(?P<doc>.+)_page_(?P<page>\d+)_chunk_(?P<chunk>\d+)\.txt$"));

/// Read-only access to corpus segments.
pub trait SegmentStore: Send + Sync {
    /// Look up a segment by id.
    fn get(&self, segment_id: &SegmentId) -> Option<&Segment>;

    /// Number of segments.
    fn len(&self) -> usize;

    /// Iterate all segments in id order.
    fn segments(&self) -> Box<dyn Iterator<Item = &Segment> + '_>;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the segment exists.
    fn contains(&self, segment_id: &SegmentId) -> bool {
        self.get(segment_id).is_some()
    }

    /// Read the text of a segment.
    ///
    /// # Errors
    /// Returns `SegmentNotFound` if the id is unknown.
    fn read(&self, segment_id: &SegmentId) -> RagResult<String> {
        self.get(segment_id)
            .map(|segment| segment.text.clone())
            .ok_or_else(|| RagError::SegmentNotFound(segment_id.clone()))
    }
}

/// In-memory segment store keyed by segment id.
#[derive(Clone, Debug, Default)]
pub struct InMemorySegmentStore {
    segments: BTreeMap<SegmentId, Segment>,
}

impl InMemorySegmentStore {
    /// Build a store from segments.
    ///
    /// # Errors
    /// Returns an error on duplicate ids or blank segments.
    pub fn new(segments: impl IntoIterator<Item = Segment>) -> RagResult<Self> {
        let mut map = BTreeMap::new();
        for segment in segments {
            segment.validate()?;
            if map.contains_key(&segment.segment_id) {
                return Err(RagError::InvalidSegment(format!(
                    "duplicate segment id {}",
                    segment.segment_id
                )));
            }
            map.insert(segment.segment_id.clone(), segment);
        }
        Ok(Self { segments: map })
    }

    /// Load a JSON-lines manifest, one `Segment` per non-blank line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line is invalid.
    pub fn from_manifest(path: impl AsRef<Path>) -> RagResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut segments = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let segment: Segment = serde_json::from_str(line).map_err(|err| {
                RagError::InvalidSegment(format!("{}:{}: {err}", path.display(), line_no + 1))
            })?;
            segments.push(segment);
        }
        let store = Self::new(segments)?;
        info!("Loaded {} segments from {}", store.len(), path.display());
        Ok(store)
    }

    /// Load every `.txt` chunk file in a directory.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read or a chunk is empty.
    pub fn from_chunk_dir(dir: impl AsRef<Path>) -> RagResult<Self> {
        let dir = dir.as_ref();
        let pattern = CHUNK_FILE_RE.as_ref().map_err(Clone::clone)?;

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }
        files.sort();

        let mut segments = Vec::with_capacity(files.len());
        for path in files {
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                debug!("Skipping non UTF-8 chunk file name {}", path.display());
                continue;
            };
            let text = std::fs::read_to_string(&path)?;
            let (document, position) = parse_chunk_file_name(pattern, file_name);
            segments.push(Segment::new(file_name, document, position, text)?);
        }

        let store = Self::new(segments)?;
        info!("Loaded {} chunk files from {}", store.len(), dir.display());
        Ok(store)
    }
}

impl SegmentStore for InMemorySegmentStore {
    fn get(&self, segment_id: &SegmentId) -> Option<&Segment> {
        self.segments.get(segment_id)
    }

    fn len(&self) -> usize {
        self.segments.len()
    }

    fn segments(&self) -> Box<dyn Iterator<Item = &Segment> + '_> {
        Box::new(self.segments.values())
    }
}

/// Split a chunk file name into document id and position.
fn parse_chunk_file_name(pattern: &Regex, file_name: &str) -> (String, SegmentPosition) {
    if let Some(caps) = pattern.captures(file_name) {
        let document = caps["doc"].to_string();
        let position = SegmentPosition {
            page: caps["page"].parse().ok(),
            offset: caps["chunk"].parse().ok(),
        };
        return (document, position);
    }

    let stem = file_name.strip_suffix(".txt").unwrap_or(file_name);
    (stem.to_string(), SegmentPosition::default())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn segment(id: &str, text: &str) -> Segment {
        Segment {
            segment_id: SegmentId::from(id),
            source_document_id: "doc.pdf".to_string(),
            position: SegmentPosition::default(),
            text: text.to_string(),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("halldyll_rag_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let _ = std::fs::create_dir_all(&dir);
        dir
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = InMemorySegmentStore::new(vec![segment("a", "one"), segment("a", "two")]);
        assert!(matches!(result, Err(RagError::InvalidSegment(_))));
    }

    #[test]
    fn test_read_unknown_segment() {
        let store = InMemorySegmentStore::new(vec![segment("a", "one")]).unwrap_or_default();
        assert_eq!(store.read(&SegmentId::from("a")).ok().as_deref(), Some("one"));
        assert!(matches!(
            store.read(&SegmentId::from("zzz")),
            Err(RagError::SegmentNotFound(_))
        ));
    }

    #[test]
    fn test_segments_iterate_in_id_order() {
        let store = InMemorySegmentStore::new(vec![segment("b", "two"), segment("a", "one")])
            .unwrap_or_default();
        let ids: Vec<&str> = store.segments().map(|s| s.segment_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_chunk_file_name() {
        let Ok(pattern) = CHUNK_FILE_RE.as_ref() else {
            unreachable!("chunk pattern compiles");
        };
        let (doc, pos) = parse_chunk_file_name(pattern, "policy.pdf_page_3_chunk_12.txt");
        assert_eq!(doc, "policy.pdf");
        assert_eq!(pos.page, Some(3));
        assert_eq!(pos.offset, Some(12));

        let (doc, pos) = parse_chunk_file_name(pattern, "notes.txt");
        assert_eq!(doc, "notes");
        assert_eq!(pos, SegmentPosition::default());
    }

    #[test]
    fn test_from_chunk_dir() {
        let dir = scratch_dir("chunks");
        let _ = std::fs::write(dir.join("a.pdf_page_1_chunk_1.txt"), "claim form");
        let _ = std::fs::write(dir.join("a.pdf_page_2_chunk_2.txt"), "office hours");
        let _ = std::fs::write(dir.join("ignored.json"), "{}");

        let store = InMemorySegmentStore::from_chunk_dir(&dir).unwrap_or_default();
        assert_eq!(store.len(), 2);
        let first = store.get(&SegmentId::from("a.pdf_page_1_chunk_1.txt"));
        assert_eq!(first.map(|s| s.position.page), Some(Some(1)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_from_manifest() {
        let dir = scratch_dir("manifest");
        let path = dir.join("segments.jsonl");
        let body = concat!(
            r#"{"segment_id":"s1","source_document_id":"d","text":"claim form"}"#,
            "\n\n",
            r#"{"segment_id":"s2","source_document_id":"d","position":{"page":4},"text":"hours"}"#,
            "\n"
        );
        let _ = std::fs::write(&path, body);

        let store = InMemorySegmentStore::from_manifest(&path).unwrap_or_default();
        assert_eq!(store.len(), 2);
        assert!(store.contains(&SegmentId::from("s2")));
        let _ = std::fs::remove_dir_all(&dir);
    }
}

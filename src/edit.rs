use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Positional operation against an immutable original buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    /// Zero-width insertion at `begin == end`.
    Insert = 1,
    /// Removes `[begin, end]`, end inclusive.
    Delete = 2,
    /// Replaces `[begin, end]`, end inclusive.
    Replace = 3,
}

impl TryFrom<u8> for EditKind {
    type Error = EditError;

    fn try_from(op: u8) -> Result<Self, Self::Error> {
        match op {
            1 => Ok(EditKind::Insert),
            2 => Ok(EditKind::Delete),
            3 => Ok(EditKind::Replace),
            other => Err(EditError::UnsupportedKind(other)),
        }
    }
}

/// A single edit: what to do, where, and the new text for inserts and
/// replacements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use = "Edit does nothing until applied"]
pub struct Edit {
    pub kind: EditKind,
    pub begin: usize,
    pub end: usize,
    pub content: String,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("unsupported edit kind {0}")]
    UnsupportedKind(u8),

    #[error("invalid byte range [{begin}, {end}] for {kind:?} in buffer of length {len}")]
    InvalidRange {
        kind: EditKind,
        begin: usize,
        end: usize,
        len: usize,
    },

    #[error("edit at byte {begin} overlaps a previous edit ending at byte {cursor}")]
    Overlap { begin: usize, cursor: usize },

    #[error("buffer hash {found:#x} does not match the buffer the edits were computed for ({expected:#x})")]
    BufferMismatch { expected: u64, found: u64 },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Edit {
    pub fn insert(at: usize, content: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Insert,
            begin: at,
            end: at,
            content: content.into(),
        }
    }

    /// Delete `[begin, end]`.
    pub fn delete(begin: usize, end: usize) -> Self {
        Self {
            kind: EditKind::Delete,
            begin,
            end,
            content: String::new(),
        }
    }

    /// Replace `[begin, end]` with `content`.
    pub fn replace(begin: usize, end: usize, content: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Replace,
            begin,
            end,
            content: content.into(),
        }
    }

    /// Build an edit from a numeric opcode (1 insert, 2 delete, 3 replace).
    pub fn from_raw(
        op: u8,
        begin: usize,
        end: usize,
        content: impl Into<String>,
    ) -> Result<Self, EditError> {
        Ok(Self {
            kind: EditKind::try_from(op)?,
            begin,
            end,
            content: content.into(),
        })
    }

    fn check(&self, len: usize) -> Result<(), EditError> {
        let valid = match self.kind {
            EditKind::Insert => self.begin == self.end && self.begin <= len,
            EditKind::Delete | EditKind::Replace => self.begin <= self.end && self.end < len,
        };
        if valid {
            Ok(())
        } else {
            Err(EditError::InvalidRange {
                kind: self.kind,
                begin: self.begin,
                end: self.end,
                len,
            })
        }
    }
}

/// Apply `edits` to `buffer` in one left-to-right pass.
///
/// Edits are ordered by `(begin, end)`; edits comparing equal keep their
/// submission order. Bytes outside every edit are copied verbatim. Any invalid
/// or overlapping edit fails the whole application and no content is returned.
pub fn apply(buffer: &[u8], edits: &[Edit]) -> Result<Vec<u8>, EditError> {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by_key(|edit| (edit.begin, edit.end));

    let added: usize = edits.iter().map(|edit| edit.content.len()).sum();
    let mut out = Vec::with_capacity(buffer.len() + added);
    let mut cursor = 0;

    for edit in ordered {
        edit.check(buffer.len())?;
        if edit.begin < cursor {
            return Err(EditError::Overlap {
                begin: edit.begin,
                cursor,
            });
        }
        out.extend_from_slice(&buffer[cursor..edit.begin]);
        match edit.kind {
            EditKind::Insert => {
                out.extend_from_slice(edit.content.as_bytes());
                cursor = edit.end;
            }
            EditKind::Delete => cursor = edit.end + 1,
            EditKind::Replace => {
                out.extend_from_slice(edit.content.as_bytes());
                cursor = edit.end + 1;
            }
        }
    }

    out.extend_from_slice(&buffer[cursor..]);
    Ok(out)
}

/// Edits collected for one buffer, tied to that buffer by its xxh3 hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditSet {
    #[serde(skip)]
    buffer_hash: Option<u64>,
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty set that only applies to `buffer`.
    pub fn for_buffer(buffer: &[u8]) -> Self {
        Self {
            buffer_hash: Some(xxh3_64(buffer)),
            edits: Vec::new(),
        }
    }

    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edit> {
        self.edits.iter()
    }

    /// Edits in application order.
    pub fn sorted(&self) -> Vec<&Edit> {
        let mut ordered: Vec<&Edit> = self.edits.iter().collect();
        ordered.sort_by_key(|edit| (edit.begin, edit.end));
        ordered
    }

    pub fn apply(&self, buffer: &[u8]) -> Result<Vec<u8>, EditError> {
        if let Some(expected) = self.buffer_hash {
            let found = xxh3_64(buffer);
            if found != expected {
                return Err(EditError::BufferMismatch { expected, found });
            }
        }
        apply(buffer, &self.edits)
    }
}

impl Extend<Edit> for EditSet {
    fn extend<T: IntoIterator<Item = Edit>>(&mut self, iter: T) {
        self.edits.extend(iter);
    }
}

/// Atomic file write: tempfile in the same directory, fsync, rename.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(buffer: &str, edits: &[Edit]) -> Result<String, EditError> {
        apply(buffer.as_bytes(), edits).map(|out| String::from_utf8(out).unwrap())
    }

    #[test]
    fn inserts_at_same_offset_keep_submission_order() {
        let edits = [Edit::insert(0, "aa"), Edit::insert(0, "bb")];
        assert_eq!(run("abcdefg", &edits).unwrap(), "aabbabcdefg");
    }

    #[test]
    fn insert_lands_before_delete_at_same_anchor() {
        let edits = [Edit::insert(2, "ee"), Edit::delete(2, 3)];
        assert_eq!(run("abcdefg", &edits).unwrap(), "abeeefg");

        let reversed = [Edit::delete(2, 3), Edit::insert(2, "ee")];
        assert_eq!(run("abcdefg", &reversed).unwrap(), "abeeefg");
    }

    #[test]
    fn replace_consumes_inclusive_range() {
        let edits = [Edit::replace(3, 5, "xx")];
        assert_eq!(run("abcdefg", &edits).unwrap(), "abcxxg");
    }

    #[test]
    fn unsupported_kind_yields_no_content() {
        let edits: Result<Vec<Edit>, EditError> = [(3u8, 3, 5, "xx"), (0xff, 3, 5, "")]
            .into_iter()
            .map(|(op, begin, end, content)| Edit::from_raw(op, begin, end, content))
            .collect();
        assert!(matches!(edits, Err(EditError::UnsupportedKind(0xff))));
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(matches!(
            run("abc", &[Edit::delete(1, 3)]),
            Err(EditError::InvalidRange { .. })
        ));
        assert!(matches!(
            run("abc", &[Edit::replace(2, 1, "x")]),
            Err(EditError::InvalidRange { .. })
        ));
        let widened = Edit {
            kind: EditKind::Insert,
            begin: 0,
            end: 1,
            content: "x".into(),
        };
        assert!(matches!(run("abc", &[widened]), Err(EditError::InvalidRange { .. })));
        assert_eq!(run("abc", &[Edit::insert(3, "!")]).unwrap(), "abc!");
    }

    #[test]
    fn overlapping_edits_are_rejected() {
        let edits = [Edit::replace(1, 3, "x"), Edit::insert(2, "y")];
        assert!(matches!(run("abcdef", &edits), Err(EditError::Overlap { .. })));
    }

    #[test]
    fn edit_set_checks_buffer_hash() {
        let mut set = EditSet::for_buffer(b"abc");
        set.push(Edit::insert(1, "-"));
        assert_eq!(set.apply(b"abc").unwrap(), b"a-bc");
        assert!(matches!(
            set.apply(b"abd"),
            Err(EditError::BufferMismatch { .. })
        ));
    }

    #[test]
    fn edit_set_sorted_is_stable() {
        let mut set = EditSet::new();
        set.extend([
            Edit::insert(5, "c"),
            Edit::insert(1, "a"),
            Edit::insert(1, "b"),
        ]);
        let order: Vec<&str> = set.sorted().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn atomic_write_replaces_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("main.go");
        std::fs::write(&file_path, b"package main\n").unwrap();

        write_atomic(&file_path, b"package other\n").unwrap();
        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "package other\n");
    }

    fn edit_plan() -> impl Strategy<Value = (String, Vec<Edit>)> {
        ("[a-z]{1,48}", prop::collection::vec((0u8..3, "[A-Z]{0,3}"), 48)).prop_flat_map(
            |(buffer, choices)| {
                let len = buffer.len();
                prop::sample::subsequence((0..len).collect::<Vec<_>>(), 0..=len).prop_map(
                    move |positions| {
                        let edits = positions
                            .iter()
                            .zip(choices.iter())
                            .map(|(&pos, (op, text))| match op {
                                0 => Edit::insert(pos, text.clone()),
                                1 => Edit::delete(pos, pos),
                                _ => Edit::replace(pos, pos, text.clone()),
                            })
                            .collect();
                        (buffer.clone(), edits)
                    },
                )
            },
        )
    }

    fn expected(buffer: &str, edits: &[Edit]) -> String {
        let mut out = String::new();
        for (i, c) in buffer.chars().enumerate() {
            match edits.iter().find(|edit| edit.begin == i) {
                Some(edit) if edit.kind == EditKind::Insert => {
                    out.push_str(&edit.content);
                    out.push(c);
                }
                Some(edit) if edit.kind == EditKind::Replace => out.push_str(&edit.content),
                Some(_) => {}
                None => out.push(c),
            }
        }
        out
    }

    proptest! {
        #[test]
        fn apply_matches_model_in_any_order((buffer, edits) in edit_plan()) {
            let want = expected(&buffer, &edits);
            prop_assert_eq!(run(&buffer, &edits).unwrap(), want.clone());

            let mut reversed = edits.clone();
            reversed.reverse();
            prop_assert_eq!(run(&buffer, &reversed).unwrap(), want);
        }
    }
}

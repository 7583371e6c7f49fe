// detcast-detect/src/labels.rs
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Failed to read label file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Label file contains no labels")]
    Empty,
}

/// Class id → human readable name.
///
/// Accepts both common label file flavours: `"<index> <label>"` (or
/// `"<index>: <label>"`) lines, and bare labels whose index is their 0-based
/// line number. The two can be mixed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: BTreeMap<u32, String>,
}

impl LabelTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LabelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::parse(&text)?;
        log::info!("loaded {} label(s) from {path:?}", table.len());
        Ok(table)
    }

    pub fn parse(text: &str) -> Result<Self, LabelError> {
        let mut labels = BTreeMap::new();
        for (row, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match split_indexed(line) {
                Some((index, label)) => labels.insert(index, label.to_string()),
                None => labels.insert(row as u32, line.to_string()),
            };
        }

        if labels.is_empty() {
            return Err(LabelError::Empty);
        }
        Ok(Self { labels })
    }

    pub fn get(&self, class_id: u32) -> Option<&str> {
        self.labels.get(&class_id).map(String::as_str)
    }

    pub fn contains(&self, class_id: u32) -> bool {
        self.labels.contains_key(&class_id)
    }

    /// The label for `class_id`, or `#<id>` when the table has no entry.
    pub fn resolve(&self, class_id: u32) -> Cow<'_, str> {
        match self.get(class_id) {
            Some(label) => Cow::Borrowed(label),
            None => Cow::Owned(format!("#{class_id}")),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for LabelTable {
    fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(|(id, label)| (id, label.into())).collect(),
        }
    }
}

// "<digits><sep><label>" where sep is any run of ':' and whitespace. The
// label may be empty ("5:" names class 5 with "").
fn split_indexed(line: &str) -> Option<(u32, &str)> {
    let is_sep = |c: char| c == ':' || c.is_whitespace();
    let cut = line.find(is_sep)?;
    let (head, rest) = line.split_at(cut);
    let label = rest.trim_start_matches(is_sep).trim();
    if head.is_empty() || !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    head.parse().ok().map(|index| (index, label))
}

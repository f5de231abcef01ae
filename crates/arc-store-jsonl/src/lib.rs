#![allow(clippy::missing_errors_doc)]

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use arc_core::{Item, ItemSet, Prefix};

pub const ITEMS_FILE: &str = "items.jsonl";
pub const ARCHIVE_FILE: &str = "archive.jsonl";
pub const PREFIX_FILE: &str = "prefix";

/// A line that could not be loaded and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub items: ItemSet,
    pub skipped: Vec<SkippedLine>,
}

/// Store rooted at a directory holding the record file, the archive file
/// and the prefix file. Single writer; each save is an atomic rename.
#[derive(Debug, Clone)]
pub struct JsonlItemStore {
    root: PathBuf,
}

impl JsonlItemStore {
    /// Creates the store directory with an empty record file and the prefix
    /// file.
    pub fn init(root: &Path, prefix: &Prefix) -> Result<Self> {
        if root.exists() {
            bail!("{} already exists", root.display());
        }
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create store directory {}", root.display()))?;
        let store = Self {
            root: root.to_path_buf(),
        };
        write_atomic(&store.items_path(), b"")?;
        write_atomic(&store.prefix_path(), prefix.as_str().as_bytes())?;
        tracing::debug!(root = %root.display(), prefix = %prefix, "initialized store");
        Ok(store)
    }

    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("Not initialized. Run `arc init` first.");
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn items_path(&self) -> PathBuf {
        self.root.join(ITEMS_FILE)
    }

    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE)
    }

    #[must_use]
    pub fn prefix_path(&self) -> PathBuf {
        self.root.join(PREFIX_FILE)
    }

    /// The id prefix, or the default when the prefix file is absent.
    pub fn load_prefix(&self) -> Result<Prefix> {
        let path = self.prefix_path();
        if !path.exists() {
            return Ok(Prefix::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Prefix::default());
        }
        Ok(Prefix::from_stored(raw))
    }

    /// Loads the primary store. Bad lines are skipped with a warning; a
    /// repeated id keeps its last occurrence.
    pub fn load(&self) -> Result<LoadReport> {
        let prefix = self.load_prefix()?;
        let (items, skipped) = read_records(&self.items_path())?;
        Ok(LoadReport {
            items: ItemSet::from_items(prefix, items),
            skipped,
        })
    }

    /// Loads and returns just the snapshot.
    pub fn load_items(&self) -> Result<ItemSet> {
        Ok(self.load()?.items)
    }

    /// Writes every item sorted by id through a temporary sibling file.
    pub fn save(&self, items: &ItemSet) -> Result<()> {
        let body = encode_lines(items.iter())?;
        write_atomic(&self.items_path(), body.as_bytes())?;
        tracing::debug!(count = items.len(), "saved items");
        Ok(())
    }

    /// Archived records in file order, last occurrence winning.
    pub fn load_archive(&self) -> Result<Vec<Item>> {
        let (items, _) = read_records(&self.archive_path())?;
        let mut latest: Vec<Item> = Vec::with_capacity(items.len());
        for item in items {
            if let Some(existing) = latest.iter_mut().find(|existing| existing.id == item.id) {
                *existing = item;
            } else {
                latest.push(item);
            }
        }
        Ok(latest)
    }

    /// Ids used in the archive; id generation treats them as taken.
    pub fn archived_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .load_archive()?
            .into_iter()
            .map(|item| item.id.to_string())
            .collect())
    }

    /// Appends records to the archive. Existing lines are kept byte for
    /// byte, including ones that no longer decode.
    pub fn append_archive(&self, items: &[Item]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let path = self.archive_path();
        let mut body = read_bytes(&path)?;
        if body.last().is_some_and(|byte| *byte != b'\n') {
            body.push(b'\n');
        }
        body.extend_from_slice(encode_lines(items.iter())?.as_bytes());
        write_atomic(&path, &body)?;
        tracing::debug!(count = items.len(), "appended to archive");
        Ok(())
    }

    /// Looks up an archived record without touching the file, resolving
    /// `raw_id` with the same prefix tolerance as the primary store.
    pub fn find_archived(&self, raw_id: &str, prefix: &Prefix) -> Result<Option<Item>> {
        let archive = self.load_archive()?;
        let raw_id = raw_id.trim();
        let exact = archive.iter().find(|item| item.id == *raw_id);
        let found = exact.or_else(|| {
            if prefix.is_prefix_of(raw_id) {
                return None;
            }
            let qualified = prefix.qualify(raw_id);
            archive.iter().find(|item| item.id == *qualified.as_str())
        });
        Ok(found.cloned())
    }

    /// Removes and returns an archived record. Only the lines holding that
    /// record are dropped; every other line is written back unchanged.
    pub fn remove_from_archive(&self, raw_id: &str, prefix: &Prefix) -> Result<Option<Item>> {
        let Some(item) = self.find_archived(raw_id, prefix)? else {
            return Ok(None);
        };
        let path = self.archive_path();
        let body = read_bytes(&path)?;
        let kept: Vec<&[u8]> = body
            .split(|byte| *byte == b'\n')
            .filter(|raw| {
                !decode_line(raw)
                    .and_then(std::result::Result::ok)
                    .is_some_and(|record| record.id == item.id)
            })
            .collect();
        write_atomic(&path, &kept.join(&b'\n'))?;
        tracing::debug!(item_id = %item.id, "removed from archive");
        Ok(Some(item))
    }
}

fn encode_lines<'a>(items: impl Iterator<Item = &'a Item>) -> Result<String> {
    let mut body = String::new();
    for item in items {
        body.push_str(&item.to_json_line()?);
        body.push('\n');
    }
    Ok(body)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Decodes one physical line. `None` for a blank line.
fn decode_line(raw: &[u8]) -> Option<std::result::Result<Item, String>> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.trim(),
        Err(err) => return Some(Err(format!("Invalid UTF-8: {err}"))),
    };
    if text.is_empty() {
        return None;
    }
    Some(Item::from_json_line(text).map_err(|err| err.to_string()))
}

fn read_records(path: &Path) -> Result<(Vec<Item>, Vec<SkippedLine>)> {
    let body = read_bytes(path)?;
    let mut items = Vec::new();
    let mut skipped = Vec::new();
    for (index, raw) in body.split(|byte| *byte == b'\n').enumerate() {
        match decode_line(raw) {
            None => {}
            Some(Ok(item)) => items.push(item),
            Some(Err(reason)) => {
                let line_number = index + 1;
                tracing::warn!("Skipping malformed item on line {line_number}: {reason}");
                skipped.push(SkippedLine {
                    line: line_number,
                    reason,
                });
            }
        }
    }
    Ok((items, skipped))
}

/// Writes `contents` to a temporary sibling and renames it over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("invalid store path {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    {
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        file.write_all(contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to flush {}", tmp.display()))?;
    }
    fs::rename(&tmp, path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            tmp.display(),
            path.display()
        )
    })
}

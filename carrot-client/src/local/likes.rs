use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use shared::models::ListingId;

use super::{StorageError, read_json, write_json};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct LikeEntry {
    liked: bool,
    count: u32,
}

/// Which listings the user liked, with the like count last seen for each.
#[derive(Debug, Clone, Default)]
pub struct LikeStore {
    path: Option<PathBuf>,
    entries: BTreeMap<ListingId, LikeEntry>,
}

impl LikeStore {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// # Errors
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = read_json(&path)?;
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// # Errors
    /// Fails when the file cannot be written.
    pub fn save(&self) -> Result<(), StorageError> {
        match &self.path {
            Some(path) => write_json(path, &self.entries),
            None => Ok(()),
        }
    }

    /// Records the like count reported for `listing`.
    pub fn set_count(&mut self, listing: ListingId, count: u32) {
        self.entries.entry(listing).or_default().count = count;
    }

    /// Flips the liked flag and adjusts the count. Returns the new flag.
    pub fn toggle(&mut self, listing: ListingId) -> bool {
        let entry = self.entries.entry(listing).or_default();
        entry.liked = !entry.liked;
        entry.count = if entry.liked {
            entry.count.saturating_add(1)
        } else {
            entry.count.saturating_sub(1)
        };
        entry.liked
    }

    #[must_use]
    pub fn is_liked(&self, listing: ListingId) -> bool {
        self.entries.get(&listing).is_some_and(|entry| entry.liked)
    }

    #[must_use]
    pub fn count(&self, listing: ListingId) -> u32 {
        self.entries.get(&listing).map_or(0, |entry| entry.count)
    }

    /// Forgets a listing, e.g. after it was deleted.
    pub fn forget(&mut self, listing: ListingId) {
        self.entries.remove(&listing);
    }
}

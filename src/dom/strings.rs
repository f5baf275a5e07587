//! String Interning Pool
//!
//! Deduplicated storage for control names, tags, ids, class names and raw
//! attribute keys. Pages repeat the same handful of tags and class lists
//! thousands of times, so every distinct string is stored once.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Interned strings addressed by `u32` id; id 0 is the empty string
///
/// `entries` holds (offset, len) into the shared `data` buffer and
/// `by_hash` resolves colliding hashes by comparing the stored text.
#[derive(Debug)]
pub struct StringPool {
    entries: Vec<(u32, u32)>,
    data: String,
    by_hash: HashMap<u64, Vec<u32>>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    pub fn new() -> Self {
        let mut pool = StringPool {
            entries: Vec::with_capacity(256),
            data: String::with_capacity(4096),
            by_hash: HashMap::new(),
        };
        // Entry 0 is reserved for "no string"
        pool.entries.push((0, 0));
        pool
    }

    #[inline]
    fn compute_hash(s: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Intern a string, returning its ID (0 for the empty string)
    pub fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }

        let hash = Self::compute_hash(s);
        if let Some(ids) = self.by_hash.get(&hash) {
            for &id in ids {
                if self.get(id) == Some(s) {
                    return id;
                }
            }
        }

        let offset = self.data.len() as u32;
        self.data.push_str(s);
        let id = self.entries.len() as u32;
        self.entries.push((offset, s.len() as u32));
        self.by_hash.entry(hash).or_default().push(id);
        id
    }

    /// Get an interned string, `None` for the reserved id 0 or unknown ids
    pub fn get(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        let &(offset, len) = self.entries.get(id as usize)?;
        self.data.get(offset as usize..(offset + len) as usize)
    }

    /// Number of distinct strings (excluding the reserved entry)
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Ordered, non-overlapping guest address-space map.
//!
//! One [`MemoryMap`] backs each [`crate::Emulator`]; loaders call `insert`
//! as they map images, stacks, and mmap regions, and the runner consults
//! `lookup_base_by_filename` to resolve library patches.

use std::path::Path;

/// Read/write/execute permission triple for a mapped region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Perms {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}

impl Perms {
    pub const NONE: Perms = Perms { read: false, write: false, exec: false };
    pub const R: Perms = Perms { read: true, write: false, exec: false };
    pub const RW: Perms = Perms { read: true, write: true, exec: false };
    pub const RX: Perms = Perms { read: true, write: false, exec: true };
    pub const RWX: Perms = Perms { read: true, write: true, exec: true };

    /// Parse the conventional `"rwx"`/`"r-x"` triple notation.
    pub fn parse(s: &str) -> Option<Perms> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 {
            return None;
        }
        if bytes[0] != b'r' && bytes[0] != b'-'
            || bytes[1] != b'w' && bytes[1] != b'-'
            || bytes[2] != b'x' && bytes[2] != b'-'
        {
            return None;
        }
        Some(Perms {
            read: bytes[0] == b'r',
            write: bytes[1] == b'w',
            exec: bytes[2] == b'x',
        })
    }
}

impl std::fmt::Display for Perms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.exec { 'x' } else { '-' },
        )
    }
}

/// One `[start, end)` region of the guest address space.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MapEntry {
    pub start: u64,
    pub end: u64,
    pub perms: Perms,
    pub label: String,
}

/// The ordered, non-overlapping interval set describing the guest address
/// space. See [`MemoryMap::insert`] for the split/coalesce semantics.
#[derive(Debug, Default, Clone)]
pub struct MemoryMap {
    entries: Vec<MapEntry>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    /// Insert `[start, end)` with `(perms, label)`, splitting any entries it
    /// overlaps and coalescing adjacent same-label runs afterwards.
    ///
    /// An empty range (`start == end`) is ignored.
    pub fn insert(&mut self, start: u64, end: u64, perms: Perms, label: impl Into<String>) {
        if start >= end {
            return;
        }
        let label = label.into();

        // Each rebuilt entry carries a flag marking whether it was carved
        // out of the just-inserted range, so `coalesce` can tell "incoming"
        // apart from "pre-existing neighbor" regardless of scan order.
        let mut rebuilt: Vec<(MapEntry, bool)> = Vec::with_capacity(self.entries.len() + 2);
        let mut inserted = false;

        for entry in self.entries.drain(..) {
            let MapEntry { start: s, end: e, perms: p, label: info } = entry;

            if e <= start || s >= end {
                // Disjoint from the incoming range: keep as-is, but make
                // sure the incoming range lands in its sorted position.
                if s >= end && !inserted {
                    rebuilt.push((MapEntry { start, end, perms, label: label.clone() }, true));
                    inserted = true;
                }
                rebuilt.push((MapEntry { start: s, end: e, perms: p, label: info }, false));
                continue;
            }

            // Overlapping: emit the retained prefix, then the incoming
            // range (once), then the retained suffix.
            if s < start {
                rebuilt.push((MapEntry { start: s, end: start, perms: p, label: info.clone() }, false));
            }
            if !inserted {
                rebuilt.push((MapEntry { start, end, perms, label: label.clone() }, true));
                inserted = true;
            }
            if e > end {
                rebuilt.push((MapEntry { start: end, end: e, perms: p, label: info }, false));
            }
        }

        if !inserted {
            rebuilt.push((MapEntry { start, end, perms, label: label.clone() }, true));
        }

        self.entries = Self::coalesce(rebuilt);
    }

    /// Merge adjacent entries (`end_i == start_{i+1}`) that share a label.
    /// Perms of the surviving run come from whichever fragment was carved
    /// out of the just-inserted range, not simply whichever entry the fold
    /// visits last — a 3-way merge (inserting a region that sits between
    /// two pre-existing same-label runs) would otherwise let the trailing
    /// pre-existing fragment overwrite the incoming region's perms once
    /// it's folded in after it. Once a run's surviving perms come from the
    /// incoming region, later pre-existing fragments merged into the same
    /// run no longer override them.
    fn coalesce(entries: Vec<(MapEntry, bool)>) -> Vec<MapEntry> {
        let mut out: Vec<(MapEntry, bool)> = Vec::with_capacity(entries.len());
        for (entry, incoming) in entries {
            match out.last_mut() {
                Some((prev, prev_incoming)) if prev.end == entry.start && prev.label == entry.label => {
                    prev.end = entry.end;
                    if incoming || !*prev_incoming {
                        prev.perms = entry.perms;
                    }
                    *prev_incoming = *prev_incoming || incoming;
                }
                _ => out.push((entry, incoming)),
            }
        }
        out.into_iter().map(|(entry, _)| entry).collect()
    }

    /// Return the start address of the first entry whose label's basename
    /// matches `name`, or `None` if no entry matches.
    pub fn lookup_base_by_filename(&self, name: &str) -> Option<u64> {
        self.entries.iter().find_map(|e| {
            let basename = Path::new(&e.label).file_name()?.to_str()?;
            (basename == name).then_some(e.start)
        })
    }

    /// Render `"start-end perms label"` lines, one per region, in order.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            out.push_str(&format!("{:#010x}-{:#010x} {} {}\n", e.start, e.end, e.perms, e.label));
        }
        out
    }

    /// Total bytes covered by the map; used by property tests to assert
    /// that `insert` never loses coverage.
    pub fn covered_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.end - e.start).sum()
    }

    /// True iff the registry upholds its sortedness/no-overlap invariant.
    pub fn is_well_formed(&self) -> bool {
        self.entries.windows(2).all(|pair| pair[0].end <= pair[1].start)
            && self.entries.iter().all(|e| e.start < e.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: u64, end: u64, perms: Perms, label: &str) -> MapEntry {
        MapEntry { start, end, perms, label: label.to_string() }
    }

    #[test]
    fn insert_disjoint_stays_sorted() {
        let mut map = MemoryMap::new();
        map.insert(0x3000, 0x4000, Perms::RX, "b");
        map.insert(0x1000, 0x2000, Perms::RX, "a");
        assert_eq!(
            map.entries(),
            &[entry(0x1000, 0x2000, Perms::RX, "a"), entry(0x3000, 0x4000, Perms::RX, "b")]
        );
    }

    #[test]
    fn insert_and_coalesce() {
        let mut map = MemoryMap::new();
        map.insert(0x1000, 0x2000, Perms::RX, "a");
        map.insert(0x3000, 0x4000, Perms::RX, "a");
        map.insert(0x2000, 0x3000, Perms::RX, "a");
        assert_eq!(map.entries(), &[entry(0x1000, 0x4000, Perms::RX, "a")]);
    }

    /// A 3-way same-label merge takes its perms from the just-inserted
    /// middle region, not from whichever pre-existing neighbor the fold
    /// happens to visit last.
    #[test]
    fn insert_and_coalesce_keeps_incoming_perms_in_a_sandwich_merge() {
        let mut map = MemoryMap::new();
        map.insert(0x1000, 0x2000, Perms::RX, "a");
        map.insert(0x3000, 0x4000, Perms::RX, "a");
        map.insert(0x2000, 0x3000, Perms::RW, "a");
        assert_eq!(map.entries(), &[entry(0x1000, 0x4000, Perms::RW, "a")]);
    }

    #[test]
    fn insert_and_split() {
        let mut map = MemoryMap::new();
        map.insert(0x1000, 0x5000, Perms::RX, "a");
        map.insert(0x2000, 0x3000, Perms::RW, "b");
        assert_eq!(
            map.entries(),
            &[
                entry(0x1000, 0x2000, Perms::RX, "a"),
                entry(0x2000, 0x3000, Perms::RW, "b"),
                entry(0x3000, 0x5000, Perms::RX, "a"),
            ]
        );
    }

    #[test]
    fn empty_range_is_ignored() {
        let mut map = MemoryMap::new();
        map.insert(0x1000, 0x1000, Perms::RWX, "noop");
        assert!(map.entries().is_empty());
    }

    #[test]
    fn lookup_base_by_filename_matches_basename() {
        let mut map = MemoryMap::new();
        map.insert(0x1000, 0x2000, Perms::RX, "/lib/x86_64-linux-gnu/libc.so.6");
        assert_eq!(map.lookup_base_by_filename("libc.so.6"), Some(0x1000));
        assert_eq!(map.lookup_base_by_filename("libm.so.6"), None);
    }

    #[test]
    fn dump_emits_one_line_per_region() {
        let mut map = MemoryMap::new();
        map.insert(0x1000, 0x2000, Perms::RX, "a");
        assert_eq!(map.dump().lines().count(), 1);
    }
}

//! Property-based checks for `MemoryMap::insert`'s split/coalesce
//! invariants, run over small bounded address ranges so a brute-force
//! bitmap oracle stays cheap to compare against.

use binsim::memmap::{MemoryMap, Perms};
use proptest::prelude::*;

const SPACE: u64 = 64;

fn perms_strategy() -> impl Strategy<Value = Perms> {
    prop_oneof![Just(Perms::NONE), Just(Perms::R), Just(Perms::RW), Just(Perms::RX), Just(Perms::RWX)]
}

proptest! {
    /// After any sequence of `insert` calls, the map stays sorted and
    /// non-overlapping (`is_well_formed`), and the bytes it reports as
    /// covered match a byte-by-byte oracle of every range ever inserted.
    #[test]
    fn insert_sequences_stay_well_formed_and_track_coverage(
        ops in proptest::collection::vec((0..SPACE, 1..SPACE, perms_strategy()), 1..20)
    ) {
        let mut map = MemoryMap::new();
        let mut covered = vec![false; SPACE as usize];

        for (start, len, perms) in ops {
            let end = (start + len).min(SPACE);
            if start >= end {
                continue;
            }
            map.insert(start, end, perms, "region");
            for byte in &mut covered[start as usize..end as usize] {
                *byte = true;
            }
        }

        prop_assert!(map.is_well_formed());
        let expected = covered.iter().filter(|&&b| b).count() as u64;
        prop_assert_eq!(map.covered_bytes(), expected);
    }

    /// Inserting the full span of an existing single-label entry with the
    /// same label and perms is a no-op up to coalescing: the map still
    /// reports exactly the original coverage, never more or less.
    #[test]
    fn reinserting_the_same_region_preserves_coverage(start in 0..SPACE, len in 1..SPACE) {
        let end = (start + len).min(SPACE);
        prop_assume!(start < end);

        let mut map = MemoryMap::new();
        map.insert(start, end, Perms::RW, "region");
        map.insert(start, end, Perms::RW, "region");

        prop_assert!(map.is_well_formed());
        prop_assert_eq!(map.covered_bytes(), end - start);
        prop_assert_eq!(map.entries().len(), 1);
    }
}

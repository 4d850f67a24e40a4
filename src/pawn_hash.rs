//! Pawn-structure hash table.
//!
//! Keyed by the pawn-only Zobrist key (pawns and kings). Entries are two
//! words: the packed mid/end scores and the pushed-passer bitboard, guarded
//! by an XOR mask over both. The same lock-free discipline as the main
//! transposition table: a torn read fails the XOR check and reads as a
//! miss.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::board::types::bitboard::Bitboard;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PawnEntry {
    pub mid: i32,
    pub end: i32,
    /// Squares directly in front of both sides' passed pawns.
    pub pushed_passers: Bitboard,
}

impl PawnEntry {
    #[inline]
    fn pack_scores(self) -> u64 {
        (self.mid as i16 as u16 as u64) | ((self.end as i16 as u16 as u64) << 16)
    }

    #[inline]
    fn unpack(scores: u64, passers: u64) -> PawnEntry {
        PawnEntry {
            mid: scores as u16 as i16 as i32,
            end: (scores >> 16) as u16 as i16 as i32,
            pushed_passers: passers,
        }
    }
}

struct PawnSlot {
    mask: AtomicU64,
    scores: AtomicU64,
    passers: AtomicU64,
}

impl PawnSlot {
    const fn new() -> Self {
        PawnSlot {
            mask: AtomicU64::new(0),
            scores: AtomicU64::new(0),
            passers: AtomicU64::new(0),
        }
    }
}

/// Process-wide pawn-structure cache, sized by worker count to limit
/// thrashing under SMP.
pub struct PawnHashTable {
    slots: Vec<PawnSlot>,
    mask: usize,
}

impl PawnHashTable {
    const BASE_BITS: u32 = 16;

    #[must_use]
    pub fn new(threads: usize) -> Self {
        let log_threads = usize::BITS - 1 - threads.max(1).leading_zeros();
        let bits = Self::BASE_BITS + log_threads;
        let size = 1usize << bits.min(22);
        let mut slots = Vec::with_capacity(size);
        slots.resize_with(size, PawnSlot::new);
        PawnHashTable {
            slots,
            mask: size - 1,
        }
    }

    #[inline]
    fn slot(&self, key: u64) -> &PawnSlot {
        &self.slots[key as usize & self.mask]
    }

    #[must_use]
    pub fn probe(&self, key: u64) -> Option<PawnEntry> {
        let slot = self.slot(key);
        let mask = slot.mask.load(Ordering::Relaxed);
        let scores = slot.scores.load(Ordering::Relaxed);
        let passers = slot.passers.load(Ordering::Relaxed);
        if key ^ mask == scores ^ passers && mask != 0 {
            Some(PawnEntry::unpack(scores, passers))
        } else {
            None
        }
    }

    pub fn store(&self, key: u64, entry: PawnEntry) {
        let slot = self.slot(key);
        let scores = entry.pack_scores();
        let passers = entry.pushed_passers;
        slot.scores.store(scores, Ordering::Relaxed);
        slot.passers.store(passers, Ordering::Relaxed);
        slot.mask.store(key ^ scores ^ passers, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for slot in &self.slots {
            slot.mask.store(0, Ordering::Relaxed);
            slot.scores.store(0, Ordering::Relaxed);
            slot.passers.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_probe() {
        let table = PawnHashTable::new(1);
        let entry = PawnEntry {
            mid: 42,
            end: -87,
            pushed_passers: 0x0000_1200_0000_0000,
        };
        table.store(0xdead_beef_cafe_f00d, entry);
        assert_eq!(table.probe(0xdead_beef_cafe_f00d), Some(entry));
    }

    #[test]
    fn test_probe_rejects_wrong_key() {
        let table = PawnHashTable::new(1);
        table.store(
            0x1111,
            PawnEntry {
                mid: 1,
                end: 2,
                pushed_passers: 3,
            },
        );
        assert_eq!(table.probe(0x2222), None);
    }

    #[test]
    fn test_negative_scores_roundtrip() {
        let table = PawnHashTable::new(1);
        let entry = PawnEntry {
            mid: -32000,
            end: 32000,
            pushed_passers: u64::MAX,
        };
        table.store(7, entry);
        assert_eq!(table.probe(7), Some(entry));
    }

    #[test]
    fn test_clear() {
        let table = PawnHashTable::new(1);
        table.store(
            5,
            PawnEntry {
                mid: 9,
                end: 9,
                pushed_passers: 9,
            },
        );
        table.clear();
        assert_eq!(table.probe(5), None);
    }

    #[test]
    fn test_scales_with_threads() {
        assert!(PawnHashTable::new(8).slots.len() > PawnHashTable::new(1).slots.len());
    }
}

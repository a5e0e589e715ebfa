//! Downloaded-index set, one bit per segment (LSB = index 0).
//!
//! Backs the resumable progress model: an index is a member once its chunk
//! write has completed. Reconstructed from the chunk store on activation, so
//! it never needs its own serialization.

#[derive(Debug, Clone, Default)]
pub struct SegmentSet {
    bytes: Vec<u8>,
    len: usize,
}

impl SegmentSet {
    /// Empty set with capacity for `segment_count` indices.
    pub fn new(segment_count: usize) -> Self {
        SegmentSet {
            bytes: vec![0u8; segment_count.div_ceil(8)],
            len: 0,
        }
    }

    /// Build from persisted indices (e.g. chunk rows). Out-of-range and
    /// duplicate indices are ignored.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>, segment_count: usize) -> Self {
        let mut set = SegmentSet::new(segment_count);
        for idx in indices {
            if idx < segment_count {
                set.insert(idx);
            }
        }
        set
    }

    /// Mark `index` downloaded. Returns false if it was already a member.
    pub fn insert(&mut self, index: usize) -> bool {
        let byte_idx = index / 8;
        let bit = 1u8 << (index % 8);
        if byte_idx >= self.bytes.len() {
            self.bytes.resize(byte_idx + 1, 0);
        }
        if self.bytes[byte_idx] & bit != 0 {
            return false;
        }
        self.bytes[byte_idx] |= bit;
        self.len += 1;
        true
    }

    pub fn contains(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .map(|&b| b & (1 << (index % 8)) != 0)
            .unwrap_or(false)
    }

    /// Number of downloaded indices.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once every index in `[0, segment_count)` is a member.
    pub fn is_complete(&self, segment_count: usize) -> bool {
        self.len >= segment_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_contains() {
        let mut s = SegmentSet::new(10);
        assert!(s.insert(0));
        assert!(s.insert(3));
        assert!(s.insert(9));
        assert!(!s.insert(3), "duplicate insert is a no-op");
        assert!(s.contains(0));
        assert!(!s.contains(1));
        assert!(s.contains(9));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn completeness() {
        let mut s = SegmentSet::new(5);
        for i in 0..4 {
            s.insert(i);
        }
        assert!(!s.is_complete(5));
        s.insert(4);
        assert!(s.is_complete(5));
        assert!(SegmentSet::new(0).is_complete(0));
    }

    #[test]
    fn from_indices_ignores_out_of_range() {
        let s = SegmentSet::from_indices([1, 2, 2, 99], 5);
        assert_eq!(s.len(), 2);
        assert!(s.contains(1));
        assert!(s.contains(2));
        assert!(!s.contains(99));
    }
}

pub mod builder;

use xxhash_rust::xxh3::xxh3_128;

/// Probabilistic set membership for one SSTable's keys.
///
/// - any probed bit is 0 → the key is definitely not in the table
/// - all probed bits are 1 → the key is probably in the table
///
/// Filters live only in memory: they are rebuilt from the index region each
/// time an SSTable is opened, so the file format carries no filter block.
///
/// Sizing:
///   bits_per_key = -1.44 * log2(false_positive_rate)
///   num_hashes   = bits_per_key * ln(2)
///
/// Probes use double hashing, h_i = h1 + i * h2 (mod m), with h1/h2 the two
/// halves of one xxh3-128 hash.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_hashes: u32,
    num_bits: u64,
}

impl BloomFilter {
    /// Create an empty filter sized for `expected_items` at the given FPR.
    ///
    /// # Panics
    /// Panics if expected_items is 0 or FPR is not in (0, 1).
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "FPR must be in (0, 1)"
        );

        let bits_per_key = -1.44 * false_positive_rate.log2();
        let num_bits = ((expected_items as f64) * bits_per_key).ceil() as u64;
        let num_bits = num_bits.max(64);
        let num_hashes = ((bits_per_key * std::f64::consts::LN_2).ceil() as u32).max(1);

        Self {
            bits: vec![0u64; num_bits.div_ceil(64) as usize],
            num_hashes,
            num_bits,
        }
    }

    /// Record a key as present.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = split_hash(key);
        for i in 0..self.num_hashes {
            let pos = self.probe(h1, h2, i);
            self.bits[(pos / 64) as usize] |= 1 << (pos % 64);
        }
    }

    /// false → definitely absent. true → probably present.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = split_hash(key);
        (0..self.num_hashes).all(|i| {
            let pos = self.probe(h1, h2, i);
            (self.bits[(pos / 64) as usize] >> (pos % 64)) & 1 == 1
        })
    }

    /// Number of hash probes per key.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Total number of bits in the filter.
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    fn probe(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }
}

fn split_hash(key: &[u8]) -> (u64, u64) {
    let hash = xxh3_128(key);
    (hash as u64, (hash >> 64) as u64)
}

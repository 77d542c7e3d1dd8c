use crate::bloom::BloomFilter;

/// Convenience builder for constructing a bloom filter from a key set.
///
/// Usage when an SSTable is opened:
/// 1. Create BloomFilterBuilder with the index's key count
/// 2. Call add_key() for every key in the index
/// 3. Call build() to get the filter consulted by lookups
pub struct BloomFilterBuilder {
    filter: BloomFilter,
    keys_added: usize,
}

impl BloomFilterBuilder {
    /// Create a builder expecting approximately `estimated_keys` keys.
    /// An estimate of zero is treated as one so empty tables still get a filter.
    pub fn new(estimated_keys: usize, false_positive_rate: f64) -> Self {
        BloomFilterBuilder {
            filter: BloomFilter::new(estimated_keys.max(1), false_positive_rate),
            keys_added: 0,
        }
    }

    /// Add a key to the bloom filter being built.
    pub fn add_key(&mut self, key: &[u8]) {
        self.filter.insert(key);
        self.keys_added += 1;
    }

    /// Keys added so far.
    pub fn keys_added(&self) -> usize {
        self.keys_added
    }

    /// Finalize and return the bloom filter.
    pub fn build(self) -> BloomFilter {
        self.filter
    }
}

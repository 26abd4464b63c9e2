//! # Indexer Configuration

/// Default cap on hashes returned by one address query.
pub const DEFAULT_MAX_ADDRESS_RESULTS: usize = 1000;

/// Configuration for one indexer instance.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Name used in log lines (`[indexer:<name>]`).
    pub name: String,

    /// Largest page `get_hashes_by_address` will return. Larger limits are
    /// rejected, not clamped.
    pub max_address_results: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            name: "index".to_string(),
            max_address_results: DEFAULT_MAX_ADDRESS_RESULTS,
        }
    }
}

impl IndexerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_address_results(mut self, max: usize) -> Self {
        self.max_address_results = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = IndexerConfig::new("addr").with_max_address_results(5);
        assert_eq!(config.name, "addr");
        assert_eq!(config.max_address_results, 5);
        assert_eq!(
            IndexerConfig::default().max_address_results,
            DEFAULT_MAX_ADDRESS_RESULTS
        );
    }
}

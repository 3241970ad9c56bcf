use crc32fast::Hasher;

use crate::node::NodeId;

/// Hex CRC32 of a key, used as an id seed and as a content etag
pub fn crc32_hex(key: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential node id generator (`<seed>-<n>`)
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u64,
}

impl IdGenerator {
    /// Seed from a page key so ids from different pages never collide
    pub fn new(page_key: &str) -> Self {
        Self::from_seed(crc32_hex(page_key))
    }

    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
        }
    }

    /// Generate next sequential ID
    pub fn next_id(&mut self) -> NodeId {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }

    /// Next id for which `taken` is false.
    ///
    /// Deserialized trees already own ids from earlier sessions.
    pub fn next_unused(&mut self, taken: impl Fn(&str) -> bool) -> NodeId {
        loop {
            let id = self.next_id();
            if !taken(&id) {
                return id;
            }
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_seed("node")
    }
}

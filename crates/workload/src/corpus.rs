//! The fixed set of document ids the workload reads from.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use uuid::Uuid;

/// Number of documents seeded per run.
pub const DOC_COUNT: usize = 1000;

/// Immutable, cheaply cloneable list of unique document ids.
///
/// Never empty. Each id doubles as the document's partition key.
#[derive(Debug, Clone)]
pub struct Corpus {
    ids: Arc<[String]>,
}

impl Corpus {
    /// Generate `size` unique random ids (at least one).
    pub fn generate(size: usize) -> Self {
        let size = size.max(1);
        let mut seen = HashSet::with_capacity(size);
        let mut ids = Vec::with_capacity(size);
        while ids.len() < size {
            let id = Uuid::new_v4().to_string();
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        Self { ids: ids.into() }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Uniformly random member.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.ids[rng.gen_range(0..self.ids.len())]
    }
}

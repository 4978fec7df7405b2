use super::SingleRowMutation;
use crate::core::Status;
use serde::{Deserialize, Serialize};

/// An ordered batch of row mutations.
///
/// The position of each entry is its original index: failures reported back
/// to the caller always use it, however many retry rounds the batch went
/// through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkMutation {
    entries: Vec<SingleRowMutation>,
}

impl BulkMutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: SingleRowMutation) -> &mut Self {
        self.entries.push(mutation);
        self
    }

    pub fn with(mut self, mutation: SingleRowMutation) -> Self {
        self.entries.push(mutation);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SingleRowMutation] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<SingleRowMutation> {
        self.entries
    }
}

impl From<Vec<SingleRowMutation>> for BulkMutation {
    fn from(entries: Vec<SingleRowMutation>) -> Self {
        Self { entries }
    }
}

impl FromIterator<SingleRowMutation> for BulkMutation {
    fn from_iter<I: IntoIterator<Item = SingleRowMutation>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A mutation that could not be applied, with its terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMutation {
    original_index: usize,
    mutation: SingleRowMutation,
    status: Status,
}

impl FailedMutation {
    pub fn new(original_index: usize, mutation: SingleRowMutation, status: Status) -> Self {
        Self {
            original_index,
            mutation,
            status,
        }
    }

    /// Position of this mutation in the originally submitted batch.
    pub fn original_index(&self) -> usize {
        self.original_index
    }

    pub fn mutation(&self) -> &SingleRowMutation {
        &self.mutation
    }

    pub fn status(&self) -> &Status {
        &self.status
    }
}

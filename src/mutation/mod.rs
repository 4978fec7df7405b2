// ============================================================================
// Row Mutations
// ============================================================================
//
// A mutation is one change to one row. Mutations are grouped per row into a
// SingleRowMutation (applied atomically by the server) and per request into a
// BulkMutation, whose entry positions are the original indices used to
// correlate per-entry results across retries.
//
// ============================================================================

pub mod bulk;

pub use bulk::{BulkMutation, FailedMutation};

use serde::{Deserialize, Serialize};

/// Cell timestamp, in microseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timestamp {
    /// The server stamps the cell when the mutation is applied.
    ServerAssigned,
    /// Caller-supplied timestamp.
    Micros(i64),
}

impl Timestamp {
    pub fn is_server_assigned(&self) -> bool {
        matches!(self, Timestamp::ServerAssigned)
    }
}

/// Half-open `[start, end)` timestamp range; an absent end is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimestampRange {
    pub start_micros: i64,
    pub end_micros: Option<i64>,
}

impl TimestampRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start_micros: i64, end_micros: i64) -> Self {
        Self {
            start_micros,
            end_micros: Some(end_micros),
        }
    }
}

/// A single change to a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Write a cell value
    SetCell {
        family: String,
        column: Vec<u8>,
        timestamp: Timestamp,
        value: Vec<u8>,
    },

    /// Delete the cells of one column within a timestamp range
    DeleteFromColumn {
        family: String,
        column: Vec<u8>,
        range: TimestampRange,
    },

    /// Delete every cell of a column family
    DeleteFromFamily { family: String },

    /// Delete the whole row
    DeleteFromRow,
}

impl Mutation {
    /// `SetCell` with an explicit timestamp.
    pub fn set_cell(
        family: impl Into<String>,
        column: impl Into<Vec<u8>>,
        timestamp_micros: i64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Mutation::SetCell {
            family: family.into(),
            column: column.into(),
            timestamp: Timestamp::Micros(timestamp_micros),
            value: value.into(),
        }
    }

    /// `SetCell` whose timestamp is assigned by the server.
    pub fn set_cell_server_time(
        family: impl Into<String>,
        column: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Mutation::SetCell {
            family: family.into(),
            column: column.into(),
            timestamp: Timestamp::ServerAssigned,
            value: value.into(),
        }
    }

    pub fn delete_from_column(family: impl Into<String>, column: impl Into<Vec<u8>>) -> Self {
        Mutation::DeleteFromColumn {
            family: family.into(),
            column: column.into(),
            range: TimestampRange::all(),
        }
    }

    pub fn delete_from_column_range(
        family: impl Into<String>,
        column: impl Into<Vec<u8>>,
        start_micros: i64,
        end_micros: i64,
    ) -> Self {
        Mutation::DeleteFromColumn {
            family: family.into(),
            column: column.into(),
            range: TimestampRange::new(start_micros, end_micros),
        }
    }

    pub fn delete_from_family(family: impl Into<String>) -> Self {
        Mutation::DeleteFromFamily {
            family: family.into(),
        }
    }

    pub fn delete_from_row() -> Self {
        Mutation::DeleteFromRow
    }

    /// Check if this is one of the delete mutations
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Mutation::DeleteFromColumn { .. }
                | Mutation::DeleteFromFamily { .. }
                | Mutation::DeleteFromRow
        )
    }
}

/// All the mutations for one row, applied atomically.
///
/// Row keys are arbitrary bytes, like column qualifiers and values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleRowMutation {
    row_key: Vec<u8>,
    mutations: Vec<Mutation>,
}

impl SingleRowMutation {
    pub fn new(row_key: impl Into<Vec<u8>>, mutations: Vec<Mutation>) -> Self {
        Self {
            row_key: row_key.into(),
            mutations,
        }
    }

    pub fn row_key(&self) -> &[u8] {
        &self.row_key
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Builder-style variant of [`push`](Self::push).
    pub fn with(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

// ============================================================================
// RPC Messages and Stubs
// ============================================================================
//
// The transport is an injected collaborator. This module only defines the
// request/response shapes the retry layer reads and writes, and the stub
// traits it calls through.
//
// ============================================================================

pub mod stub;

pub use stub::{
    AdminStub, BlockingDataStub, BlockingMutateRowsStream, DataStub, MutateRowsStream,
    OperationsStub,
};

use crate::core::Status;
use crate::mutation::SingleRowMutation;

/// Applies one row mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutateRowRequest {
    pub table_name: String,
    pub app_profile_id: String,
    pub mutation: SingleRowMutation,
}

/// One round of a bulk mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutateRowsRequest {
    pub table_name: String,
    pub app_profile_id: String,
    pub entries: Vec<SingleRowMutation>,
}

/// Result of one entry; `index` refers to the position in the request it
/// answers, not to the caller's original batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MutateRowsEntry {
    pub index: usize,
    pub status: Status,
}

impl MutateRowsEntry {
    pub fn new(index: usize, status: Status) -> Self {
        Self { index, status }
    }
}

/// One message of the `MutateRows` response stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutateRowsResponse {
    pub entries: Vec<MutateRowsEntry>,
}

impl MutateRowsResponse {
    pub fn new(entries: Vec<MutateRowsEntry>) -> Self {
        Self { entries }
    }
}

/// Terminal payload of a long-running operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Error(Status),
    Response(Vec<u8>),
}

/// Server-side state of a long-running operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Operation {
    pub name: String,
    pub done: bool,
    pub metadata: Option<Vec<u8>>,
    pub result: Option<OperationResult>,
}

impl Operation {
    pub fn running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn succeeded(name: impl Into<String>, response: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            done: true,
            metadata: None,
            result: Some(OperationResult::Response(response.into())),
        }
    }

    pub fn failed(name: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            done: true,
            metadata: None,
            result: Some(OperationResult::Error(status)),
        }
    }
}

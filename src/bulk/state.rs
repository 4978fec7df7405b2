// ============================================================================
// Bulk Mutation Bookkeeping
// ============================================================================
//
// Tracks the outcome of every entry of one bulk apply across retry rounds.
//
// Each round sends only the entries still pending. Responses carry the index
// within that round's request, so the state keeps the round's entry list
// (request index -> original index) until the stream finishes. Entries the
// stream never reported on are undetermined: they are retried only if they
// are idempotent.
//
// Outcome transitions:
// ```text
// Pending ──OK──────────────────────────────> Succeeded
//    │
//    ├──permanent / non-idempotent failure──> Failed(status)
//    │
//    └──transient failure, idempotent───────> Pending (next round)
// ```
//
// ============================================================================

use crate::core::{Error, Result, Status, StatusCode};
use crate::mutation::{BulkMutation, FailedMutation, SingleRowMutation};
use crate::policy::{IdempotentMutationPolicy, RetryPolicy};
use crate::rpc::{MutateRowsRequest, MutateRowsResponse};
use tracing::{Level, event};

/// Outcome of one entry so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Pending,
    Succeeded,
    Failed(Status),
}

#[derive(Debug)]
struct PendingMutation {
    mutation: SingleRowMutation,
    idempotent: bool,
    outcome: MutationOutcome,
}

/// One entry of the request currently in flight.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    original_index: usize,
    has_result: bool,
}

#[derive(Debug)]
pub struct BulkMutatorState {
    table_name: String,
    app_profile_id: String,
    /// Indexed by original index.
    entries: Vec<PendingMutation>,
    /// Original indices to send in the next round, ascending.
    pending: Vec<usize>,
    /// Indexed by request index of the current round.
    in_flight: Vec<InFlight>,
    /// Last transient per-entry status of the current round.
    round_retryable: Option<Status>,
    /// Last non-OK status seen, per entry or per stream.
    last_status: Status,
}

impl BulkMutatorState {
    pub fn new(
        table_name: impl Into<String>,
        app_profile_id: impl Into<String>,
        mutations: BulkMutation,
        idempotency: &dyn IdempotentMutationPolicy,
    ) -> Self {
        let entries: Vec<PendingMutation> = mutations
            .into_entries()
            .into_iter()
            .map(|mutation| PendingMutation {
                idempotent: idempotency.is_row_idempotent(&mutation),
                mutation,
                outcome: MutationOutcome::Pending,
            })
            .collect();
        let pending = (0..entries.len()).collect();

        Self {
            table_name: table_name.into(),
            app_profile_id: app_profile_id.into(),
            entries,
            pending,
            in_flight: Vec::new(),
            round_retryable: None,
            last_status: Status::ok(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn succeeded_count(&self) -> usize {
        self.count(|o| matches!(o, MutationOutcome::Succeeded))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, MutationOutcome::Failed(_)))
    }

    pub fn outcome(&self, original_index: usize) -> Option<&MutationOutcome> {
        self.entries.get(original_index).map(|e| &e.outcome)
    }

    pub fn last_status(&self) -> &Status {
        &self.last_status
    }

    fn count(&self, pred: impl Fn(&MutationOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    /// Builds the request for the next round from the pending entries only.
    ///
    /// Returns `None` when nothing is pending.
    pub fn before_start(&mut self) -> Option<MutateRowsRequest> {
        if self.pending.is_empty() {
            return None;
        }

        self.round_retryable = None;
        self.in_flight = self
            .pending
            .drain(..)
            .map(|original_index| InFlight {
                original_index,
                has_result: false,
            })
            .collect();

        let entries = self
            .in_flight
            .iter()
            .map(|f| self.entries[f.original_index].mutation.clone())
            .collect();

        Some(MutateRowsRequest {
            table_name: self.table_name.clone(),
            app_profile_id: self.app_profile_id.clone(),
            entries,
        })
    }

    /// Records the per-entry results of one response message.
    pub fn on_read(&mut self, response: MutateRowsResponse, retry: &dyn RetryPolicy) {
        for entry in response.entries {
            let Some(slot) = self.in_flight.get_mut(entry.index) else {
                event!(
                    Level::WARN,
                    index = entry.index,
                    request_size = self.in_flight.len(),
                    "MutateRows entry index out of range, ignored"
                );
                continue;
            };
            if slot.has_result {
                event!(
                    Level::WARN,
                    index = entry.index,
                    "duplicate MutateRows entry result, ignored"
                );
                continue;
            }
            slot.has_result = true;
            let original_index = slot.original_index;

            let status = entry.status;
            if status.is_ok() {
                self.entries[original_index].outcome = MutationOutcome::Succeeded;
                continue;
            }

            self.last_status = status.clone();
            let idempotent = self.entries[original_index].idempotent;
            if !retry.is_permanent_failure(&status) && idempotent {
                self.pending.push(original_index);
                self.round_retryable = Some(status);
            } else {
                self.entries[original_index].outcome = MutationOutcome::Failed(status);
            }
        }
    }

    /// Settles the entries the stream did not report on and returns the
    /// status of the round.
    ///
    /// The round status is OK only when nothing is left pending.
    pub fn on_finish(&mut self, finish: Status) -> Status {
        let unreported: Vec<usize> = self
            .in_flight
            .drain(..)
            .filter(|f| !f.has_result)
            .map(|f| f.original_index)
            .collect();

        let undetermined = if !finish.is_ok() {
            finish.clone()
        } else if !unreported.is_empty() {
            Status::new(
                StatusCode::Aborted,
                format!(
                    "MutateRows stream finished without results for {} mutations",
                    unreported.len()
                ),
            )
        } else {
            Status::ok()
        };

        for original_index in unreported {
            let entry = &mut self.entries[original_index];
            if entry.idempotent {
                self.pending.push(original_index);
            } else {
                entry.outcome = MutationOutcome::Failed(undetermined.clone());
            }
        }
        self.pending.sort_unstable();

        let round = if !undetermined.is_ok() {
            undetermined
        } else {
            self.round_retryable.take().unwrap_or_else(Status::ok)
        };
        if !round.is_ok() {
            self.last_status = round.clone();
        }
        round
    }

    /// Fails every entry still pending with the last status seen and returns
    /// all failures ordered by original index.
    pub fn on_retry_done(self) -> Vec<FailedMutation> {
        let last_status = self.last_status;
        let mut failed_pending = vec![false; self.entries.len()];
        for index in self.pending.iter().chain(self.in_flight.iter().map(|f| &f.original_index)) {
            failed_pending[*index] = true;
        }

        self.entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry.outcome {
                MutationOutcome::Failed(status) => {
                    Some(FailedMutation::new(index, entry.mutation, status))
                }
                MutationOutcome::Pending if failed_pending[index] => Some(FailedMutation::new(
                    index,
                    entry.mutation,
                    last_status.clone(),
                )),
                _ => None,
            })
            .collect()
    }

    /// Consumes the state into the caller-visible result.
    ///
    /// `exhausted_after` is the number of attempts made when the retry
    /// policy ran out with work still pending.
    pub fn into_result(self, exhausted_after: Option<u32>) -> Result<()> {
        let total = self.total();
        let table_name = self.table_name.clone();
        let last_status = self.last_status.clone();
        let had_pending = self.has_pending();
        let failures = self.on_retry_done();
        if failures.is_empty() {
            return Ok(());
        }

        let cause = match exhausted_after {
            Some(attempts) if had_pending => Error::RetryExhausted {
                location: format!("BulkApply({})", table_name),
                attempts,
                last: last_status,
            },
            _ => Error::Rpc(failures[0].status().clone()),
        };
        Err(Error::PartialFailure {
            cause: Box::new(cause),
            total,
            failures,
        })
    }
}

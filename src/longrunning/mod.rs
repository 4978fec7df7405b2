// ============================================================================
// Long-Running Operations
// ============================================================================
//
// Some calls start work on the server and return immediately with an
// operation name. The client polls that name until the operation is done,
// governed by a polling policy:
//
// ```text
// start ──> poll ──done──────────> decode result / report error payload
//             │
//             ├──in progress──> wait ──> poll
//             └──RPC failure───> wait ──> poll   (consumes failure budget)
// ```
//
// ============================================================================

pub mod operation;
pub mod poll_op;

pub use operation::{LongrunningOperation, poll_started_operation, start_long_running_poll};
pub use poll_op::{AsyncPollOp, PollAttempt, PollFuture, PollableOperation};

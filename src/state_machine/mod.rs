// State types for backend jobs and the poll coordinator that tracks them.
//
// Job state is owned by the backend and only observed here; the coordinator
// phase is owned by the orchestrator and only moves Running -> Done.

pub mod states;

pub use states::{PollPhase, TaskState};

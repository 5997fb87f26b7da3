pub(crate) mod activity;
pub(crate) mod answer_ledger;
pub(crate) mod attempt_flow;
pub(crate) mod attempt_lifecycle;
pub(crate) mod attempt_timing;
pub(crate) mod grading;
pub(crate) mod grading_status;
pub(crate) mod session_metadata;
pub(crate) mod violation_log;

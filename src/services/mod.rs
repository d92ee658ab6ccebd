pub(crate) mod access_policy;
pub(crate) mod attempt_flow;
pub(crate) mod quiz_timing;
pub(crate) mod scoring;
pub(crate) mod shuffle;

use proptest::prelude::*;

/// Strategy for generating configuration PIDs
pub fn pid_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.]{0,31}"
}

/// Strategy for generating delivery sequences of change counts, including replays
/// and reordering
pub fn change_count_sequence_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..50, 1..40)
}

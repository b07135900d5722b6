//! Proptest strategies for generated broker batches.

use proptest::prelude::*;

/// How the generated application answers one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAnswer {
    Success,
    Retry,
    Drop,
    Unknown,
    Omitted,
}

impl AppAnswer {
    /// Status string sent back, or `None` when the entry is left out
    pub fn status(self) -> Option<&'static str> {
        match self {
            AppAnswer::Success => Some("SUCCESS"),
            AppAnswer::Retry => Some("RETRY"),
            AppAnswer::Drop => Some("DROP"),
            AppAnswer::Unknown => Some("PENDING"),
            AppAnswer::Omitted => None,
        }
    }

    pub fn is_error(self) -> bool {
        !matches!(self, AppAnswer::Success | AppAnswer::Drop)
    }
}

/// One generated entry: blank id or not, event type and the app's answer
#[derive(Debug, Clone)]
pub struct GeneratedEntry {
    pub blank_id: bool,
    pub event_type: &'static str,
    pub answer: AppAnswer,
}

pub fn app_answer_strategy() -> impl Strategy<Value = AppAnswer> {
    prop_oneof![
        4 => Just(AppAnswer::Success),
        2 => Just(AppAnswer::Retry),
        2 => Just(AppAnswer::Drop),
        1 => Just(AppAnswer::Unknown),
        1 => Just(AppAnswer::Omitted),
    ]
}

pub fn generated_entry_strategy() -> impl Strategy<Value = GeneratedEntry> {
    (
        prop::bool::weighted(0.1),
        prop_oneof![Just("type1"), Just("type2")],
        app_answer_strategy(),
    )
        .prop_map(|(blank_id, event_type, answer)| GeneratedEntry {
            blank_id,
            event_type,
            answer,
        })
}

pub fn generated_batch_strategy() -> impl Strategy<Value = Vec<GeneratedEntry>> {
    prop::collection::vec(generated_entry_strategy(), 0..24)
}

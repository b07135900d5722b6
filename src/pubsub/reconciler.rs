//! # Response Reconciler
//!
//! Turns the application's answer for one route group into a verdict for
//! every entry of that group. Statuses are matched by entry id against the
//! group that was invoked; ids the group never sent are ignored and entries
//! the application did not mention are marked for retry.
//!
//! Slot population is "first populated wins" for every blanket pass
//! (transport errors, non-2xx statuses, the trailing not-received sweep).
//! Explicit per-entry statuses from a 2xx response always overwrite.

use super::channel::InvokeResponse;
use super::diagnostics::{BulkIngressDiagnostics, IngressStatus};
use super::errors::{BulkDispatchError, ChannelError, DispatchResult, EntryError};
use super::grouping::RouteGroup;
use super::message::{AppBulkResponse, AppResponseStatus, BulkOutcome};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, warn};

const NOT_FOUND: u16 = 404;

/// Verdict slots for one route group, indexed by position within the group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupOutcomes {
    entry_ids: Vec<String>,
    outcomes: Vec<BulkOutcome>,
    positions_by_id: HashMap<String, Vec<usize>>,
}

impl GroupOutcomes {
    pub fn new(group: &RouteGroup) -> Self {
        let entry_ids: Vec<String> = group
            .entries
            .iter()
            .map(|entry| entry.item.entry_id.clone())
            .collect();
        let mut positions_by_id: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, id) in entry_ids.iter().enumerate() {
            positions_by_id.entry(id.clone()).or_default().push(position);
        }
        Self {
            outcomes: vec![BulkOutcome::default(); entry_ids.len()],
            entry_ids,
            positions_by_id,
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[BulkOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<BulkOutcome> {
        self.outcomes
    }

    /// Writes `error` (or a clean verdict) into every slot not yet populated.
    pub fn fill_unpopulated(&mut self, error: Option<EntryError>) {
        for (slot, id) in self.outcomes.iter_mut().zip(&self.entry_ids) {
            if !slot.is_populated() {
                *slot = BulkOutcome {
                    entry_id: id.clone(),
                    error: error.clone(),
                };
            }
        }
    }

    /// Overwrites every slot carrying `entry_id`; false when the id is unknown.
    fn set(&mut self, entry_id: &str, error: Option<EntryError>) -> bool {
        let Some(positions) = self.positions_by_id.get(entry_id) else {
            return false;
        };
        for &position in positions {
            self.outcomes[position] = BulkOutcome {
                entry_id: entry_id.to_string(),
                error: error.clone(),
            };
        }
        true
    }

    /// Marks every still-unpopulated slot as not received; returns how many.
    fn sweep_not_received(&mut self) -> usize {
        let mut swept = 0;
        for (slot, id) in self.outcomes.iter_mut().zip(&self.entry_ids) {
            if !slot.is_populated() {
                *slot = BulkOutcome::failed(id.clone(), EntryError::response_not_received(id));
                swept += 1;
            }
        }
        swept
    }
}

/// Reconciles one invocation attempt for a group.
///
/// Returns an error whenever at least one entry of the group needs a retry,
/// which makes the attempt eligible for the invocation retry policy.
pub fn reconcile(
    response: Result<InvokeResponse, ChannelError>,
    topic: &str,
    elapsed: Duration,
    outcomes: &mut GroupOutcomes,
    diagnostics: &mut BulkIngressDiagnostics,
) -> DispatchResult<()> {
    let group_size = outcomes.len() as i64;
    diagnostics.set_elapsed(elapsed);

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            diagnostics.add(IngressStatus::Retry, group_size);
            outcomes.fill_unpopulated(Some(EntryError::AppChannel {
                message: e.to_string(),
            }));
            return Err(match e {
                ChannelError::Cancelled => BulkDispatchError::Cancelled,
                other => BulkDispatchError::AppChannel {
                    message: other.to_string(),
                },
            });
        }
    };

    if response.is_success() {
        return reconcile_statuses(&response.body, outcomes, diagnostics);
    }

    if response.status_code == NOT_FOUND {
        error!(
            topic = %topic,
            status_code = response.status_code,
            "Non-retriable error returned from app while processing bulk pub/sub event"
        );
        diagnostics.add(IngressStatus::Drop, group_size);
        outcomes.fill_unpopulated(None);
        return Ok(());
    }

    warn!(
        topic = %topic,
        status_code = response.status_code,
        "Retriable error returned from app while processing bulk pub/sub event"
    );
    diagnostics.add(IngressStatus::Retry, group_size);
    outcomes.fill_unpopulated(Some(EntryError::retriable_status(
        topic,
        response.status_code,
    )));
    Err(BulkDispatchError::RetriableStatus {
        topic: topic.to_string(),
        status_code: response.status_code,
    })
}

fn reconcile_statuses(
    body: &[u8],
    outcomes: &mut GroupOutcomes,
    diagnostics: &mut BulkIngressDiagnostics,
) -> DispatchResult<()> {
    let app_response: AppBulkResponse = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            // Counted as success even though every entry is retried; kept as
            // observed so dashboards stay comparable.
            diagnostics.add(IngressStatus::Success, outcomes.len() as i64);
            outcomes.fill_unpopulated(Some(EntryError::ResponseDeserialization {
                message: e.to_string(),
            }));
            return Err(BulkDispatchError::ResponseDeserialization {
                message: e.to_string(),
            });
        }
    };

    let mut has_any_error = false;
    for entry in app_response.statuses {
        let id = entry.entry_id.as_str();
        let (status, error) = match entry.status {
            AppResponseStatus::Empty | AppResponseStatus::Retry => {
                (IngressStatus::Retry, Some(EntryError::retry_required(id)))
            }
            AppResponseStatus::Success => (IngressStatus::Success, None),
            AppResponseStatus::Drop => (IngressStatus::Drop, None),
            AppResponseStatus::Unknown(ref other) => (
                IngressStatus::Retry,
                Some(EntryError::unknown_status(id, other.clone())),
            ),
        };

        if !outcomes.set(id, error.clone()) {
            warn!(
                entry_id = %id,
                "Invalid entry id received from app while processing pub/sub event"
            );
            continue;
        }

        diagnostics.increment(status);
        if entry.status == AppResponseStatus::Drop {
            warn!(entry_id = %id, "DROP status returned from app while processing pub/sub event");
        }
        has_any_error |= error.is_some();
    }

    let swept = outcomes.sweep_not_received();
    if swept > 0 {
        diagnostics.add(IngressStatus::Retry, swept as i64);
        has_any_error = true;
    }

    if has_any_error {
        Err(BulkDispatchError::PartialFailure)
    } else {
        Ok(())
    }
}

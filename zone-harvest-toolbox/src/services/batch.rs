//! Concurrent execution of independent checks.

use std::collections::HashMap;

use tokio::task::JoinSet;

use crate::types::{BatchFailure, BatchReport, CheckReport, CheckRequest};

use super::HarvestService;

/// Run every request as its own task and gather the results.
///
/// Reports come back in request order. Failed requests (validation errors or
/// panicked tasks) leave no report; the one earliest in request order is
/// returned as `first_failure`.
pub async fn run_batch(
    service: &HarvestService,
    nameserver: &str,
    requests: &[CheckRequest],
) -> BatchReport {
    let mut tasks = JoinSet::new();
    let mut task_index = HashMap::with_capacity(requests.len());

    for (index, request) in requests.iter().cloned().enumerate() {
        let service = service.clone();
        let nameserver = nameserver.to_string();
        let handle = tasks.spawn(async move {
            service
                .run_check(&request.domain, request.kind, &nameserver)
                .await
        });
        task_index.insert(handle.id(), index);
    }

    let mut slots: Vec<Option<CheckReport>> = (0..requests.len()).map(|_| None).collect();
    let mut failures: Vec<(usize, String)> = Vec::new();

    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, Ok(report))) => {
                if let Some(&index) = task_index.get(&id) {
                    slots[index] = Some(report);
                }
            }
            Ok((id, Err(e))) => {
                if let Some(&index) = task_index.get(&id) {
                    failures.push((index, e.to_string()));
                }
            }
            Err(e) => {
                log::warn!("Check task failed: {e}");
                if let Some(&index) = task_index.get(&e.id()) {
                    failures.push((index, format!("Check task failed: {e}")));
                }
            }
        }
    }

    let first_failure = failures
        .into_iter()
        .min_by_key(|(index, _)| *index)
        .map(|(index, message)| BatchFailure {
            domain: Some(requests[index].domain.clone()),
            check: Some(requests[index].kind),
            message,
        });

    BatchReport {
        reports: slots.into_iter().flatten().collect(),
        first_failure,
    }
}

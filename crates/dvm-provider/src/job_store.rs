//! Job history / statistics store (C12). Contract only, per spec.md §4.11:
//! stubbable, shape fixed. Ships one implementation, an in-process store
//! backed by a `Mutex<Vec<JobRecord>>`, matching the teacher's documented
//! intent for `pylon::db::PylonDb` to be a drop-in replacement without
//! changing callers.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Lifecycle states a job record moves through. Terminal states are
/// `Paid`, `Completed`, `Error`, and `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRecordStatus {
    PendingPayment,
    Paid,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl JobRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobRecordStatus::PendingPayment => "pending_payment",
            JobRecordStatus::Paid => "paid",
            JobRecordStatus::Processing => "processing",
            JobRecordStatus::Completed => "completed",
            JobRecordStatus::Error => "error",
            JobRecordStatus::Cancelled => "cancelled",
        }
    }
}

/// One processed (or in-flight) job, as recorded by the provider engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: u64,
    pub request_event_id: String,
    pub requester_pubkey: String,
    pub kind: u16,
    pub input_preview: String,
    pub status: JobRecordStatus,
    pub invoice_bolt11: Option<String>,
    pub invoice_amount_sats: Option<u64>,
    pub payment_hash: Option<String>,
    pub model_used: Option<String>,
    pub tokens_prompt: Option<u32>,
    pub tokens_completion: Option<u32>,
    pub created_at: u64,
    pub updated_at: u64,
    pub result_content_hash: Option<String>,
    pub error_message: Option<String>,
}

/// Parameters for a paginated history query.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub page: u32,
    pub limit: u32,
    pub status: Option<JobRecordStatus>,
}

/// A page of job records plus stable pagination metadata.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub entries: Vec<JobRecord>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Aggregate counters over all recorded jobs.
#[derive(Debug, Clone)]
pub struct JobStatistics {
    pub total: u64,
    pub completed: u64,
    pub errored: u64,
    pub revenue_sats: u64,
    pub period_label: String,
}

/// Records processed jobs and exposes paginated queries and aggregates.
/// Object-safe so the runtime can substitute a different backing store
/// (spec.md §4.11 calls this "stubbable; contract fixed").
pub trait JobStore: Send + Sync {
    fn insert(&self, record: JobRecord) -> u64;
    fn update_status(&self, id: u64, status: JobRecordStatus, updated_at: u64);
    fn record_payment(&self, id: u64, amount_sats: u64, updated_at: u64);
    fn get_history(&self, query: HistoryQuery) -> HistoryPage;
    fn get_statistics(&self) -> JobStatistics;
    /// Ids currently in `pending_payment`, for the reconciler to poll.
    fn pending_payment_ids(&self) -> Vec<(u64, String)>;
}

/// In-process implementation: a `Mutex<Vec<JobRecord>>` plus a monotonic id
/// counter. Sufficient for the pagination/aggregate contract.
#[derive(Default)]
pub struct InMemoryJobStore {
    records: Mutex<Vec<JobRecord>>,
    next_id: Mutex<u64>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, mut record: JobRecord) -> u64 {
        let mut next_id = self.next_id.lock().unwrap_or_else(|poison| poison.into_inner());
        let id = *next_id;
        *next_id += 1;
        record.id = id;

        let mut records = self.records.lock().unwrap_or_else(|poison| poison.into_inner());
        records.push(record);
        id
    }

    fn update_status(&self, id: u64, status: JobRecordStatus, updated_at: u64) {
        let mut records = self.records.lock().unwrap_or_else(|poison| poison.into_inner());
        if let Some(record) = records.iter_mut().find(|record| record.id == id) {
            record.status = status;
            record.updated_at = updated_at;
        }
    }

    fn record_payment(&self, id: u64, amount_sats: u64, updated_at: u64) {
        let mut records = self.records.lock().unwrap_or_else(|poison| poison.into_inner());
        if let Some(record) = records.iter_mut().find(|record| record.id == id) {
            record.invoice_amount_sats = Some(amount_sats);
            record.status = JobRecordStatus::Paid;
            record.updated_at = updated_at;
        }
    }

    fn get_history(&self, query: HistoryQuery) -> HistoryPage {
        let records = self.records.lock().unwrap_or_else(|poison| poison.into_inner());
        let mut matching: Vec<JobRecord> = records
            .iter()
            .filter(|record| query.status.map_or(true, |status| record.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let limit = query.limit.max(1);
        let page = query.page.max(1);
        let start = ((page - 1) as usize).saturating_mul(limit as usize);
        let entries = matching.into_iter().skip(start).take(limit as usize).collect();

        HistoryPage {
            entries,
            total,
            page,
            page_size: limit,
        }
    }

    fn get_statistics(&self) -> JobStatistics {
        let records = self.records.lock().unwrap_or_else(|poison| poison.into_inner());
        let total = records.len() as u64;
        let completed = records
            .iter()
            .filter(|record| matches!(record.status, JobRecordStatus::Completed | JobRecordStatus::Paid))
            .count() as u64;
        let errored = records
            .iter()
            .filter(|record| record.status == JobRecordStatus::Error)
            .count() as u64;
        let revenue_sats = records
            .iter()
            .filter(|record| matches!(record.status, JobRecordStatus::Paid | JobRecordStatus::Completed))
            .filter_map(|record| record.invoice_amount_sats)
            .sum();

        JobStatistics {
            total,
            completed,
            errored,
            revenue_sats,
            period_label: "all-time".to_string(),
        }
    }

    fn pending_payment_ids(&self) -> Vec<(u64, String)> {
        let records = self.records.lock().unwrap_or_else(|poison| poison.into_inner());
        records
            .iter()
            .filter(|record| record.status == JobRecordStatus::PendingPayment)
            .filter_map(|record| record.invoice_bolt11.clone().map(|bolt11| (record.id, bolt11)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(status: JobRecordStatus) -> JobRecord {
        JobRecord {
            id: 0,
            request_event_id: "req1".to_string(),
            requester_pubkey: "pk1".to_string(),
            kind: 5050,
            input_preview: "what is 2+2".to_string(),
            status,
            invoice_bolt11: Some("lnbc1...".to_string()),
            invoice_amount_sats: Some(10),
            payment_hash: None,
            model_used: Some("llama3.2".to_string()),
            tokens_prompt: Some(2),
            tokens_completion: Some(1),
            created_at: 1,
            updated_at: 1,
            result_content_hash: None,
            error_message: None,
        }
    }

    #[test]
    fn insert_assigns_monotonic_ids() {
        let store = InMemoryJobStore::new();
        let first = store.insert(sample_record(JobRecordStatus::PendingPayment));
        let second = store.insert(sample_record(JobRecordStatus::PendingPayment));
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn history_filters_by_status_and_paginates() {
        let store = InMemoryJobStore::new();
        for _ in 0..3 {
            store.insert(sample_record(JobRecordStatus::Completed));
        }
        store.insert(sample_record(JobRecordStatus::Error));

        let page = store.get_history(HistoryQuery {
            page: 1,
            limit: 2,
            status: Some(JobRecordStatus::Completed),
        });
        assert_eq!(page.total, 3);
        assert_eq!(page.entries.len(), 2);
    }

    #[test]
    fn statistics_sum_revenue_only_for_paid_or_completed() {
        let store = InMemoryJobStore::new();
        store.insert(sample_record(JobRecordStatus::Paid));
        store.insert(sample_record(JobRecordStatus::Error));

        let stats = store.get_statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.errored, 1);
        assert_eq!(stats.revenue_sats, 10);
    }

    #[test]
    fn pending_payment_ids_only_include_pending() {
        let store = InMemoryJobStore::new();
        let pending_id = store.insert(sample_record(JobRecordStatus::PendingPayment));
        store.insert(sample_record(JobRecordStatus::Completed));

        let ids = store.pending_payment_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].0, pending_id);
    }
}

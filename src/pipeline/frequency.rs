//! Frequency Limiter (C7): max-N-emails-per-rolling-window per contact,
//! priority-biased (spec §4.7).

use std::collections::HashMap;

use crate::config::OrganizationConfig;
use crate::date::Date;
use crate::model::{PriorEmail, ScheduleRecord, ScheduleStatus, SkipReason};

/// Counts, per contact, how many of `prior` fall within
/// `[today - period_days, today]` and are still in an active status
/// (`pre-scheduled`, `scheduled`, `sent`).
fn prior_active_counts(prior: &[PriorEmail], today: Date, period_days: i64) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for p in prior {
        let age = today.diff_days(&p.sent_date);
        if age < 0 || age > period_days {
            continue;
        }
        if matches!(p.status, ScheduleStatus::PreScheduled | ScheduleStatus::Scheduled | ScheduleStatus::Sent) {
            *counts.entry(p.contact_id).or_insert(0) += 1;
        }
    }
    counts
}

/// Applies the per-contact frequency cap to `candidates` in place.
/// Candidates not currently `pre-scheduled` (already skipped upstream)
/// are left untouched and still count toward nothing further.
pub fn apply(candidates: &mut [ScheduleRecord], prior: &[PriorEmail], today: Date, config: &OrganizationConfig) {
    let prior_counts = prior_active_counts(prior, today, config.period_days);

    let mut by_contact: HashMap<i64, Vec<usize>> = HashMap::new();
    for (idx, record) in candidates.iter().enumerate() {
        if record.status == ScheduleStatus::PreScheduled {
            by_contact.entry(record.contact_id).or_default().push(idx);
        }
    }

    for (contact_id, mut indices) in by_contact {
        let baseline = prior_counts.get(&contact_id).copied().unwrap_or(0);
        let remaining_budget = config.max_emails_per_period.saturating_sub(baseline);

        indices.sort_by_key(|&idx| candidates[idx].priority);

        for (rank, idx) in indices.into_iter().enumerate() {
            if rank >= remaining_budget {
                let record = &mut candidates[idx];
                record.status = ScheduleStatus::Skipped;
                record.skip_reason = Some(SkipReason::FrequencyLimitExceeded);
            }
        }
    }
}

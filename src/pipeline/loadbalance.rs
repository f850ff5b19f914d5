//! Load Balancer (C10): effective-date smoothing (jitter) followed by
//! daily-cap enforcement with overflow redistribution (spec §4.10).

use std::collections::HashMap;

use crate::config::OrganizationConfig;
use crate::date::Date;
use crate::hashutil::deterministic_hash;
use crate::model::{AnniversaryKind, EmailType, ScheduleRecord, ScheduleStatus, SkipReason};

/// Runs Pass A (ED smoothing) then Pass B (daily-cap enforcement) over
/// the currently pre-scheduled subset of `candidates`, in place. Records
/// not in `PreScheduled` status are left untouched (§4.10: "operates on
/// the currently pre-scheduled set").
pub fn apply(candidates: &mut [ScheduleRecord], total_contacts: usize, config: &OrganizationConfig, today: Date) {
    smooth_effective_dates(candidates, total_contacts, config, today);
    enforce_daily_cap(candidates, total_contacts, config);
}

fn is_effective_date(record: &ScheduleRecord) -> bool {
    matches!(record.email_type, EmailType::Anniversary(AnniversaryKind::EffectiveDate))
}

fn pre_scheduled_indices(candidates: &[ScheduleRecord]) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, r)| r.status == ScheduleStatus::PreScheduled)
        .map(|(i, _)| i)
        .collect()
}

fn group_by_date(candidates: &[ScheduleRecord], indices: &[usize]) -> HashMap<Date, Vec<usize>> {
    let mut groups: HashMap<Date, Vec<usize>> = HashMap::new();
    for &idx in indices {
        groups.entry(candidates[idx].scheduled_date).or_default().push(idx);
    }
    groups
}

fn smooth_effective_dates(candidates: &mut [ScheduleRecord], total_contacts: usize, config: &OrganizationConfig, today: Date) {
    let ed_soft_limit = config.ed_soft_limit(total_contacts);
    let half_window = config.smoothing_window_days / 2;

    let eligible = pre_scheduled_indices(candidates);
    let ed_indices: Vec<usize> = eligible.into_iter().filter(|&i| is_effective_date(&candidates[i])).collect();
    let groups = group_by_date(candidates, &ed_indices);

    for (date, mut indices) in groups {
        if indices.len() <= ed_soft_limit {
            continue;
        }
        // Keep the first `ed_soft_limit` in priority order untouched;
        // jitter the excess. Ties broken by contact id for determinism.
        indices.sort_by_key(|&idx| (candidates[idx].priority, candidates[idx].contact_id));
        for &idx in &indices[ed_soft_limit..] {
            let contact_id = candidates[idx].contact_id;
            let hash = deterministic_hash(&[&contact_id.to_string(), "ed", &date.year().to_string()]);
            let offset = (hash % config.smoothing_window_days as u64) as i64 - half_window;
            // Never jitter a date backward past today (spec §4.10
            // invariant ii): a near-today ED candidate could otherwise
            // land on a historical date.
            candidates[idx].scheduled_date = date.add_days(offset).max(today);
        }
    }
}

fn enforce_daily_cap(candidates: &mut [ScheduleRecord], total_contacts: usize, config: &OrganizationConfig) {
    let cap = config.daily_cap(total_contacts);
    let overage_limit = (cap as f64 * config.overage_threshold).floor() as usize;

    let eligible = pre_scheduled_indices(candidates);
    let groups = group_by_date(candidates, &eligible);

    let mut overflow: Vec<usize> = Vec::new();

    for (_, mut indices) in groups {
        if indices.len() <= overage_limit {
            continue;
        }
        indices.sort_by_key(|&idx| (candidates[idx].priority, candidates[idx].contact_id));
        overflow.extend(indices.into_iter().skip(cap));
    }

    // Sort overflow deterministically before walking dates forward so
    // repeated runs assign identical dates (§5: byte-identical reruns).
    overflow.sort_by_key(|&idx| (candidates[idx].priority, candidates[idx].contact_id));

    // Recompute occupancy incrementally as we place overflow records, so
    // later overflow records see earlier placements' effect on capacity.
    let mut occupancy: HashMap<Date, usize> = HashMap::new();
    for record in candidates.iter().filter(|r| r.status == ScheduleStatus::PreScheduled) {
        *occupancy.entry(record.scheduled_date).or_insert(0) += 1;
    }

    for idx in overflow {
        let original_date = candidates[idx].scheduled_date;
        *occupancy.entry(original_date).or_insert(0) -= 1;

        let mut placed = false;
        for delta in 1..=config.catch_up_horizon_days {
            let candidate_date = original_date.add_days(delta);
            let count = occupancy.get(&candidate_date).copied().unwrap_or(0);
            if count < cap {
                candidates[idx].scheduled_date = candidate_date;
                *occupancy.entry(candidate_date).or_insert(0) += 1;
                placed = true;
                break;
            }
        }
        if !placed {
            candidates[idx].status = ScheduleStatus::Skipped;
            candidates[idx].skip_reason = Some(SkipReason::DailyCapExceeded);
        }
    }
}

//! Top-level orchestration: inputs -> (C6) -> (C3,C4,C5 parallel) -> merge
//! -> (C7) -> (C8) -> (C9) -> (C10) -> (C11) (spec §2 data flow, §5
//! concurrency model).

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::config::OrganizationConfig;
use crate::date::Date;
use crate::derive::{anniversary, campaign, followup};
use crate::error::EngineError;
use crate::lifecycle;
use crate::model::{CampaignInstance, CampaignType, Contact, PriorEmail, ScheduleRecord};
use crate::pipeline::{conflict, frequency, loadbalance, postwindow};
use crate::store::Store;

/// Produced at the end of every run, whether or not it completed (spec
/// §7: "The summary is produced even when the run is aborted mid-way").
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub contacts_processed: usize,
    pub contacts_with_errors: usize,
    pub candidates_by_status: HashMap<&'static str, usize>,
    pub candidates_by_skip_reason: HashMap<String, usize>,
    pub candidates_by_email_type: HashMap<String, usize>,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted_orphans: usize,
    pub duration_ms: u128,
}

impl RunSummary {
    fn new(run_id: String) -> RunSummary {
        RunSummary {
            run_id,
            contacts_processed: 0,
            contacts_with_errors: 0,
            candidates_by_status: HashMap::new(),
            candidates_by_skip_reason: HashMap::new(),
            candidates_by_email_type: HashMap::new(),
            inserted: 0,
            updated: 0,
            unchanged: 0,
            deleted_orphans: 0,
            duration_ms: 0,
        }
    }

    fn tally(&mut self, records: &[ScheduleRecord]) {
        for record in records {
            *self.candidates_by_status.entry(record.status.wire()).or_insert(0) += 1;
            *self.candidates_by_email_type.entry(record.email_type.tag()).or_insert(0) += 1;
            if let Some(reason) = &record.skip_reason {
                *self.candidates_by_skip_reason.entry(reason.wire()).or_insert(0) += 1;
            }
        }
    }
}

/// Runs the full pipeline for one organization. `run_id` is assigned by
/// the caller (spec §3: "Run Identifier. Assigned at scheduler entry").
/// When `dry_run` is true, every stage still executes but C11's write
/// transaction is skipped (SPEC_FULL §F.2).
pub fn run(store: &mut Store, org_id: i64, run_id: &str, dry_run: bool) -> Result<RunSummary, EngineError> {
    let started = std::time::Instant::now();
    let mut summary = RunSummary::new(run_id.to_string());

    let today = Date::today();
    log::info!("run {run_id}: starting for org {org_id}, today={today}");

    let contact_results = crate::store::contacts::load_all(store.conn())?;
    let mut contacts = Vec::with_capacity(contact_results.len());
    for result in contact_results {
        match result {
            Ok(contact) => contacts.push(contact),
            Err(e) => {
                log::warn!("run {run_id}: skipping contact: {e}");
                summary.contacts_with_errors += 1;
            }
        }
    }
    summary.contacts_processed = contacts.len();
    log::info!("run {run_id}: loaded {} contacts ({} rejected)", contacts.len(), summary.contacts_with_errors);

    let config = crate::store::config::load(store.conn(), org_id, contacts.len())?;

    let campaign_types = crate::store::campaigns::load_types(store.conn())?;
    let mut campaign_instances = crate::store::campaigns::load_instances(store.conn())?;
    let transitions = lifecycle::run(&mut campaign_instances, today);
    log::info!("run {run_id}: {} campaign instance transitions", transitions.len());

    let prior_emails = crate::store::schedules::load_prior_emails(store.conn())?;

    let types_by_name: HashMap<&str, &CampaignType> = campaign_types.iter().map(|t| (t.name.as_str(), t)).collect();
    let active_instances: Vec<&CampaignInstance> = campaign_instances.iter().filter(|i| i.active).collect();

    let existing_followups = crate::store::schedules::load_existing_followups(store.conn())?;

    let batch_size = config.batch_size.max(1);
    let candidates: Vec<ScheduleRecord> = contacts
        .par_chunks(batch_size)
        .flat_map_iter(|batch| {
            batch.iter().flat_map(|contact| {
                derive_for_contact(
                    contact,
                    today,
                    &config,
                    run_id,
                    &types_by_name,
                    &active_instances,
                    &prior_emails,
                    &existing_followups,
                )
            })
        })
        .collect();
    log::info!("run {run_id}: derived {} candidates across {} contacts", candidates.len(), contacts.len());

    let mut candidates = candidates;
    frequency::apply(&mut candidates, &prior_emails, today, &config);
    conflict::apply(&mut candidates);

    let contacts_by_id: HashMap<i64, Contact> = contacts.into_iter().map(|c| (c.id, c)).collect();
    let post_window = postwindow::apply(&candidates, &config, run_id);
    log::info!("run {run_id}: post-window generator produced {} makeup candidates", post_window.len());
    candidates.extend(post_window);

    loadbalance::apply(&mut candidates, contacts_by_id.len(), &config, today);

    sort_deterministically(&mut candidates);
    summary.tally(&candidates);

    if dry_run {
        log::info!("run {run_id}: dry-run, skipping persistence");
    } else {
        let (inserted, updated, unchanged, deleted) = store.with_transaction(|tx| {
            crate::store::campaigns::write_active_flags(tx, &transitions)?;
            crate::store::schedules::upsert(tx, &candidates, run_id, config.persistence_chunk_size)
        })?;
        summary.inserted = inserted;
        summary.updated = updated;
        summary.unchanged = unchanged;
        summary.deleted_orphans = deleted;
        log::info!(
            "run {run_id}: persisted {inserted} inserted, {updated} updated, {unchanged} unchanged, {deleted} orphans deleted"
        );
    }

    summary.duration_ms = started.elapsed().as_millis();
    log::info!("run {run_id}: complete in {}ms", summary.duration_ms);
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn derive_for_contact(
    contact: &Contact,
    today: Date,
    config: &OrganizationConfig,
    run_id: &str,
    types_by_name: &HashMap<&str, &CampaignType>,
    active_instances: &[&CampaignInstance],
    prior_emails: &[PriorEmail],
    existing_followups: &HashSet<followup::ExistingFollowUpKey>,
) -> Vec<ScheduleRecord> {
    let mut out = anniversary::derive(contact, today, config, run_id);

    for instance in active_instances {
        let Some(campaign_type) = types_by_name.get(instance.campaign_type.as_str()) else { continue };
        if let Some(record) = campaign::derive(contact, campaign_type, instance, today, config, run_id) {
            out.push(record);
        }
    }

    let contact_priors: Vec<PriorEmail> = prior_emails.iter().filter(|p| p.contact_id == contact.id).cloned().collect();
    out.extend(followup::derive(contact, &contact_priors, existing_followups, today, config, run_id));

    out
}

/// Final ordering (spec §5): scheduled date, contact id, email-type tag,
/// priority — all ascending.
fn sort_deterministically(candidates: &mut [ScheduleRecord]) {
    candidates.sort_by(|a, b| {
        a.scheduled_date
            .compare(&b.scheduled_date)
            .then_with(|| a.contact_id.cmp(&b.contact_id))
            .then_with(|| a.email_type.tag().cmp(&b.email_type.tag()))
            .then_with(|| a.priority.cmp(&b.priority))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_end_to_end_california_birthday() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO contacts (id, email, birth_date, state, zip_code, failed_underwriting)
                 VALUES (1, 'a@example.com', '1955-03-15', 'CA', '90210', 0)",
                [],
            )
            .unwrap();

        crate::date::set_today_for_test(Date::new(2025, 2, 1).unwrap());
        let summary = run(&mut store, 1, "run-1", false).unwrap();
        crate::date::clear_test_clock();

        assert_eq!(summary.contacts_processed, 1);
        assert!(summary.inserted >= 1);

        let status: String = store
            .conn()
            .query_row(
                "SELECT status FROM email_schedules WHERE email_type = 'anniversary:birthday'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(status, "skipped");
    }

    #[test]
    fn dry_run_does_not_persist() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO contacts (id, email, birth_date, state, zip_code, failed_underwriting)
                 VALUES (1, 'a@example.com', '1970-06-01', 'OTHER', '90210', 0)",
                [],
            )
            .unwrap();

        crate::date::set_today_for_test(Date::new(2025, 2, 1).unwrap());
        let summary = run(&mut store, 1, "run-1", true).unwrap();
        crate::date::clear_test_clock();

        assert_eq!(summary.inserted, 0);
        let count: i64 = store.conn().query_row("SELECT COUNT(*) FROM email_schedules", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn s6_rerun_is_idempotent() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO contacts (id, email, birth_date, state, zip_code, failed_underwriting)
                 VALUES (1, 'a@example.com', '1970-06-01', 'OTHER', '90210', 0)",
                [],
            )
            .unwrap();

        crate::date::set_today_for_test(Date::new(2025, 2, 1).unwrap());
        run(&mut store, 1, "run-1", false).unwrap();
        let before: String = store.conn().query_row("SELECT updated_at FROM email_schedules LIMIT 1", [], |r| r.get(0)).unwrap();

        let summary2 = run(&mut store, 1, "run-2", false).unwrap();
        crate::date::clear_test_clock();

        let after: String = store.conn().query_row("SELECT updated_at FROM email_schedules LIMIT 1", [], |r| r.get(0)).unwrap();
        assert_eq!(before, after);
        assert_eq!(summary2.inserted, 0);
        assert_eq!(summary2.deleted_orphans, 0);
    }
}

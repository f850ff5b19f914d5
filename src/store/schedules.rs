//! Persistence (C11): a content-aware merge against `email_schedules`
//! that preserves audit history across reruns (spec §4.11).

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::params;

use crate::date::Date;
use crate::error::EngineError;
use crate::model::{EmailType, PriorEmail, ScheduleRecord, ScheduleStatus};

/// The uniqueness key from spec §4.11: (contact id, email type, anchor
/// year/month/day) — not the scheduled date, since a record that moves
/// (e.g. via load-balancer jitter) must still match its prior-run self.
pub type RecordKey = (i64, String, i32, u32, u32);

fn key_of(record: &ScheduleRecord) -> RecordKey {
    (record.contact_id, record.email_type.tag(), record.event_year, record.event_month, record.event_day)
}

/// An existing row read back from the store, enough to diff content and
/// to know whether it's still engine-owned.
#[derive(Debug, Clone)]
struct ExistingRow {
    id: i64,
    scheduled_date: Date,
    scheduled_time: String,
    status: ScheduleStatus,
    skip_reason: Option<String>,
    priority: i32,
    template_id: Option<String>,
    campaign_instance_id: Option<i64>,
    source_email_type: Option<String>,
}

fn content_matches(existing: &ExistingRow, record: &ScheduleRecord) -> bool {
    existing.scheduled_date == record.scheduled_date
        && existing.scheduled_time == record.scheduled_time
        && existing.status == record.status
        && existing.skip_reason.as_deref() == record.skip_reason.as_ref().map(|r| r.wire()).as_deref()
        && existing.priority == record.priority
        && existing.template_id == record.template_id
        && existing.campaign_instance_id == record.campaign_instance_id
        && existing.source_email_type == record.source_email_type
}

fn load_existing(tx: &rusqlite::Transaction) -> Result<HashMap<RecordKey, ExistingRow>, EngineError> {
    let mut stmt = tx.prepare(
        "SELECT id, contact_id, email_type, scheduled_send_date, scheduled_send_time, status,
                skip_reason, priority, template_id, campaign_instance_id, event_year, event_month, event_day,
                source_email_type
         FROM email_schedules",
    )?;
    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(0)?;
        let contact_id: i64 = row.get(1)?;
        let email_type_tag: String = row.get(2)?;
        let scheduled_date: String = row.get(3)?;
        let scheduled_time: String = row.get(4)?;
        let status: String = row.get(5)?;
        let skip_reason: Option<String> = row.get(6)?;
        let priority: i32 = row.get(7)?;
        let template_id: Option<String> = row.get(8)?;
        let campaign_instance_id: Option<i64> = row.get(9)?;
        let event_year: i32 = row.get(10)?;
        let event_month: u32 = row.get(11)?;
        let event_day: u32 = row.get(12)?;
        let source_email_type: Option<String> = row.get(13)?;
        Ok((
            id,
            contact_id,
            email_type_tag,
            scheduled_date,
            scheduled_time,
            status,
            skip_reason,
            priority,
            template_id,
            campaign_instance_id,
            event_year,
            event_month,
            event_day,
            source_email_type,
        ))
    })?;

    let mut out = HashMap::new();
    for row in rows {
        let (id, contact_id, email_type_tag, scheduled_date, scheduled_time, status, skip_reason, priority, template_id, campaign_instance_id, event_year, event_month, event_day, source_email_type) = row?;
        let scheduled_date = Date::parse_iso(&scheduled_date)
            .map_err(|e| EngineError::Internal(format!("email_schedules.{id}.scheduled_send_date: {e}")))?;
        let status = ScheduleStatus::parse(&status)
            .ok_or_else(|| EngineError::Internal(format!("email_schedules.{id}.status: unknown status '{status}'")))?;
        out.insert(
            (contact_id, email_type_tag, event_year, event_month, event_day),
            ExistingRow {
                id,
                scheduled_date,
                scheduled_time,
                status,
                skip_reason,
                priority,
                template_id,
                campaign_instance_id,
                source_email_type,
            },
        );
    }
    Ok(out)
}

/// Upserts `records` against the store and reconciles orphans (spec
/// §4.11), in batches of `chunk_size` inside the caller's transaction.
/// Returns (inserted, updated, unchanged, deleted) counts for the run
/// summary.
pub fn upsert(
    tx: &rusqlite::Transaction,
    records: &[ScheduleRecord],
    run_id: &str,
    chunk_size: usize,
) -> Result<(usize, usize, usize, usize), EngineError> {
    let existing = load_existing(tx)?;
    let now = Utc::now().to_rfc3339();

    let mut produced_keys: std::collections::HashSet<RecordKey> = std::collections::HashSet::new();
    let (mut inserted, mut updated, mut unchanged) = (0, 0, 0);

    for chunk in records.chunks(chunk_size.max(1)) {
        for record in chunk {
            let key = key_of(record);
            produced_keys.insert(key.clone());

            match existing.get(&key) {
                None => {
                    insert_row(tx, record, run_id, &now)?;
                    inserted += 1;
                }
                Some(row) => {
                    if content_matches(row, record) {
                        unchanged += 1;
                    } else {
                        update_row(tx, row.id, record, run_id, &now)?;
                        updated += 1;
                    }
                }
            }
        }
    }

    let deleted = delete_orphans(tx, &existing, &produced_keys)?;

    Ok((inserted, updated, unchanged, deleted))
}

fn insert_row(tx: &rusqlite::Transaction, record: &ScheduleRecord, run_id: &str, now: &str) -> Result<(), EngineError> {
    tx.execute(
        "INSERT INTO email_schedules (
            contact_id, email_type, scheduled_send_date, scheduled_send_time, status, skip_reason,
            priority, template_id, campaign_instance_id, event_year, event_month, event_day, batch_id,
            source_email_type, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
        params![
            record.contact_id,
            record.email_type.tag(),
            record.scheduled_date.format_iso(),
            record.scheduled_time,
            record.status.wire(),
            record.skip_reason.as_ref().map(|r| r.wire()),
            record.priority,
            record.template_id,
            record.campaign_instance_id,
            record.event_year,
            record.event_month,
            record.event_day,
            run_id,
            record.source_email_type,
            now,
        ],
    )?;
    Ok(())
}

fn update_row(tx: &rusqlite::Transaction, id: i64, record: &ScheduleRecord, run_id: &str, now: &str) -> Result<(), EngineError> {
    // `actual_send_datetime` and `engagement` are deliberately absent from
    // this SET clause: both are owned by downstream systems and must
    // survive a content update untouched (spec §4.11).
    tx.execute(
        "UPDATE email_schedules SET
            scheduled_send_date = ?1, scheduled_send_time = ?2, status = ?3, skip_reason = ?4,
            priority = ?5, template_id = ?6, campaign_instance_id = ?7, batch_id = ?8,
            source_email_type = ?9, updated_at = ?10
         WHERE id = ?11",
        params![
            record.scheduled_date.format_iso(),
            record.scheduled_time,
            record.status.wire(),
            record.skip_reason.as_ref().map(|r| r.wire()),
            record.priority,
            record.template_id,
            record.campaign_instance_id,
            run_id,
            record.source_email_type,
            now,
            id,
        ],
    )?;
    Ok(())
}

/// Deletes existing rows that this run did not reproduce, restricted to
/// the two engine-owned statuses (spec §4.11).
fn delete_orphans(
    tx: &rusqlite::Transaction,
    existing: &HashMap<RecordKey, ExistingRow>,
    produced_keys: &std::collections::HashSet<RecordKey>,
) -> Result<usize, EngineError> {
    let mut deleted = 0;
    for (key, row) in existing {
        if produced_keys.contains(key) {
            continue;
        }
        if row.status.is_engine_owned() {
            tx.execute("DELETE FROM email_schedules WHERE id = ?1", params![row.id])?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Loads prior `sent` (and other active-status) emails for the
/// frequency limiter (C7) and follow-up derivation (C5). `engagement` is
/// read back verbatim (it's downstream-owned); `permits_followup`
/// reflects the originating campaign type's `enable_followups` flag for
/// campaign emails, is always true for anniversaries, and always false
/// for follow-ups themselves (a follow-up never spawns a follow-up).
pub fn load_prior_emails(conn: &rusqlite::Connection) -> Result<Vec<PriorEmail>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT es.contact_id, es.email_type, es.scheduled_send_date, es.status, es.engagement, ct.enable_followups
         FROM email_schedules es
         LEFT JOIN campaign_instances ci ON es.campaign_instance_id = ci.id
         LEFT JOIN campaign_types ct ON ci.campaign_type = ct.name
         WHERE es.status IN ('pre-scheduled', 'scheduled', 'sent')",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<i64>>(5)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (contact_id, email_type_tag, sent_date, status, engagement, enable_followups) = row?;
        let sent_date = Date::parse_iso(&sent_date)
            .map_err(|e| EngineError::Internal(format!("email_schedules prior read: {e}")))?;
        let status = ScheduleStatus::parse(&status)
            .ok_or_else(|| EngineError::Internal(format!("email_schedules prior read: unknown status '{status}'")))?;
        let email_type = tag_to_email_type(&email_type_tag);
        let permits_followup = match &email_type {
            EmailType::FollowUp(_) => false,
            EmailType::Anniversary(_) => true,
            EmailType::Campaign { .. } => enable_followups.map(|v| v != 0).unwrap_or(true),
        };
        out.push(PriorEmail {
            contact_id,
            email_type,
            sent_date,
            status,
            engagement: engagement.as_deref().and_then(crate::model::Engagement::parse),
            permits_followup,
        });
    }
    Ok(out)
}

/// Loads the dedup keys follow-up derivation (C5) consults to avoid
/// re-emitting a follow-up for an anchor it has already scheduled one
/// for.
pub fn load_existing_followups(
    conn: &rusqlite::Connection,
) -> Result<std::collections::HashSet<crate::derive::followup::ExistingFollowUpKey>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT contact_id, source_email_type, event_year, event_month, event_day
         FROM email_schedules
         WHERE email_type LIKE 'followup:%' AND source_email_type IS NOT NULL",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i32>(2)?,
            row.get::<_, u32>(3)?,
            row.get::<_, u32>(4)?,
        ))
    })?;

    let mut out = std::collections::HashSet::new();
    for row in rows {
        let (contact_id, source_email_type, event_year, event_month, event_day) = row?;
        let anchor_date = Date::new(event_year, event_month, event_day)
            .map_err(|e| EngineError::Internal(format!("email_schedules existing follow-up anchor: {e}")))?;
        out.insert((contact_id, source_email_type, anchor_date));
    }
    Ok(out)
}

/// Best-effort reverse of `EmailType::tag` for the subset stored rows
/// need (follow-up/frequency code only inspects contact id and date, not
/// the reconstructed payload, so a lossy campaign-instance id is fine).
fn tag_to_email_type(tag: &str) -> EmailType {
    use crate::model::{AnniversaryKind, FollowUpKind};
    match tag {
        "anniversary:birthday" => EmailType::Anniversary(AnniversaryKind::Birthday),
        "anniversary:effective_date" => EmailType::Anniversary(AnniversaryKind::EffectiveDate),
        "anniversary:post_window" => EmailType::Anniversary(AnniversaryKind::PostWindow),
        "followup:cold" => EmailType::FollowUp(FollowUpKind::Cold),
        "followup:clicked_no_hq" => EmailType::FollowUp(FollowUpKind::ClickedNoHQ),
        "followup:hq_no_yes" => EmailType::FollowUp(FollowUpKind::HQNoYes),
        "followup:hq_with_yes" => EmailType::FollowUp(FollowUpKind::HQWithYes),
        other => {
            let instance_id = other.strip_prefix("campaign:").and_then(|s| s.parse().ok()).unwrap_or(0);
            EmailType::Campaign { instance_id, campaign_type: String::new() }
        }
    }
}

//! Post-Window Generator (C9): for anniversary emails skipped by
//! exclusion, queues a makeup after the window closes (spec §4.9).

use std::collections::HashSet;

use crate::config::OrganizationConfig;
use crate::model::{AnniversaryKind, EmailType, ScheduleRecord, ScheduleStatus};

const POST_WINDOW_PRIORITY: i32 = 40;

/// Dedup key for an already-produced post-window record: the contact and
/// the anchor it makes up for. C3's `derive_post_window` can already have
/// placed a makeup for the same anchor (its window is active on `today`);
/// this component must not place a second one for it (spec §4.9).
type PostWindowKey = (i64, i32, u32, u32);

fn post_window_key(record: &ScheduleRecord) -> PostWindowKey {
    (record.contact_id, record.event_year, record.event_month, record.event_day)
}

/// For every candidate skipped this run for an exclusion-window reason
/// (and not already a post-window email, and not already covered by a
/// post-window candidate from elsewhere in this run's batch), emits a
/// makeup candidate using the exclusion window that actually produced
/// the skip (spec §4.9).
pub fn apply(candidates: &[ScheduleRecord], config: &OrganizationConfig, batch_id: &str) -> Vec<ScheduleRecord> {
    if !config.enable_post_window_emails {
        return Vec::new();
    }

    let mut produced: HashSet<PostWindowKey> = candidates
        .iter()
        .filter(|r| matches!(r.email_type, EmailType::Anniversary(AnniversaryKind::PostWindow)))
        .map(post_window_key)
        .collect();

    let mut out = Vec::new();
    for record in candidates {
        if record.status != ScheduleStatus::Skipped {
            continue;
        }
        if matches!(record.email_type, EmailType::Anniversary(AnniversaryKind::PostWindow)) {
            continue;
        }
        let Some(reason) = &record.skip_reason else { continue };
        if !reason.is_exclusion_window() {
            continue;
        }
        let Some(context) = record.exclusion_context else { continue };

        let key = post_window_key(record);
        if produced.contains(&key) {
            continue;
        }

        let send_date = context.window_end.add_days(1);
        out.push(ScheduleRecord {
            contact_id: record.contact_id,
            email_type: EmailType::Anniversary(AnniversaryKind::PostWindow),
            scheduled_date: send_date,
            scheduled_time: crate::model::DEFAULT_SEND_TIME.to_string(),
            status: ScheduleStatus::PreScheduled,
            priority: POST_WINDOW_PRIORITY,
            campaign_instance_id: None,
            template_id: None,
            skip_reason: None,
            event_year: context.anchor.year(),
            event_month: context.anchor.month(),
            event_day: context.anchor.day(),
            batch_id: batch_id.to_string(),
            source_email_type: None,
            exclusion_context: None,
        });
        produced.insert(key);
    }
    out
}

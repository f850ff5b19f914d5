//! Anniversary Derivation (C3): birthday, effective-date, and post-window
//! candidates for a single contact (spec §4.3).

use crate::config::OrganizationConfig;
use crate::date::Date;
use crate::model::{
    AnniversaryKind, Contact, EmailType, ExclusionContext, Jurisdiction, ScheduleRecord, ScheduleStatus, SkipReason,
};
use crate::rules::{self, AnchorKind};

const BIRTHDAY_PRIORITY: i32 = 10;
const EFFECTIVE_DATE_PRIORITY: i32 = 20;
const POST_WINDOW_PRIORITY: i32 = 40;

fn base_record(
    contact: &Contact,
    kind: AnniversaryKind,
    scheduled_date: Date,
    priority: i32,
    anchor: Date,
    batch_id: &str,
) -> ScheduleRecord {
    ScheduleRecord {
        contact_id: contact.id,
        email_type: EmailType::Anniversary(kind),
        scheduled_date,
        scheduled_time: crate::model::DEFAULT_SEND_TIME.to_string(),
        status: ScheduleStatus::PreScheduled,
        priority,
        campaign_instance_id: None,
        template_id: None,
        skip_reason: None,
        event_year: anchor.year(),
        event_month: anchor.month(),
        event_day: anchor.day(),
        batch_id: batch_id.to_string(),
        source_email_type: None,
        exclusion_context: None,
    }
}

/// Produces at most one Birthday, one EffectiveDate, and one PostWindow
/// candidate for this contact (spec §4.3).
pub fn derive(contact: &Contact, today: Date, config: &OrganizationConfig, batch_id: &str) -> Vec<ScheduleRecord> {
    if !contact.eligible_for_anniversary() {
        return Vec::new();
    }

    let jurisdiction = contact.jurisdiction.unwrap_or(Jurisdiction::Other);
    let mut out = Vec::with_capacity(3);

    if let Some(birth) = contact.birth_date {
        out.push(derive_birthday(contact, birth, jurisdiction, today, config, batch_id));
    }

    if let Some(effective) = contact.effective_date {
        out.push(derive_effective_date(contact, effective, jurisdiction, today, config, batch_id));
    }

    if let Some(post_window) = derive_post_window(contact, jurisdiction, today, config, batch_id) {
        out.push(post_window);
    }

    out
}

fn derive_birthday(
    contact: &Contact,
    birth: Date,
    jurisdiction: Jurisdiction,
    today: Date,
    config: &OrganizationConfig,
    batch_id: &str,
) -> ScheduleRecord {
    let anchor = Date::next_anniversary(today, birth);
    // The lead-time offset can land before `today` (anchor close enough
    // that `anchor - birthday_days_before < today`); clamp to `today` so
    // no pre-scheduled record is ever produced on a historical date
    // (spec §8 invariant 1).
    let send_date = anchor.sub_days(config.birthday_days_before).max(today);
    let record = base_record(contact, AnniversaryKind::Birthday, send_date, BIRTHDAY_PRIORITY, anchor, batch_id);

    match rules::evaluate_birthday(jurisdiction, anchor, send_date, config) {
        rules::RuleOutcome::Allowed => record,
        rules::RuleOutcome::Excluded { window, reason } => {
            let mut record = record.skip(reason);
            record.exclusion_context = window.map(|w| ExclusionContext { anchor, window_end: w.end });
            record
        }
    }
}

fn derive_effective_date(
    contact: &Contact,
    effective: Date,
    jurisdiction: Jurisdiction,
    today: Date,
    config: &OrganizationConfig,
    batch_id: &str,
) -> ScheduleRecord {
    let anchor = Date::next_anniversary(today, effective);
    // Same clamp as the birthday path: never produce a pre-scheduled
    // record dated before today (spec §8 invariant 1).
    let send_date = anchor.sub_days(config.effective_date_days_before).max(today);
    let record = base_record(
        contact,
        AnniversaryKind::EffectiveDate,
        send_date,
        EFFECTIVE_DATE_PRIORITY,
        anchor,
        batch_id,
    );

    if Date::months_since(effective, today) < config.effective_date_first_email_months {
        return record.skip(SkipReason::BelowMinimumElapsedMonths);
    }

    match rules::evaluate_effective_date(jurisdiction, anchor, send_date, config) {
        rules::RuleOutcome::Allowed => record,
        rules::RuleOutcome::Excluded { window, reason } => {
            let mut record = record.skip(reason);
            record.exclusion_context = window.map(|w| ExclusionContext { anchor, window_end: w.end });
            record
        }
    }
}

/// A makeup candidate, placed the day after an *currently active* window
/// closes (spec §4.3). This is distinct from C9, which reacts to a
/// candidate this run actually skipped.
fn derive_post_window(
    contact: &Contact,
    jurisdiction: Jurisdiction,
    today: Date,
    config: &OrganizationConfig,
    batch_id: &str,
) -> Option<ScheduleRecord> {
    let birth_window = contact
        .birth_date
        .map(|b| Date::next_anniversary(today, b))
        .and_then(|anchor| rules::active_window_on(jurisdiction, AnchorKind::Birthday, anchor, today, config).map(|w| (anchor, w)));

    let effective_window = contact
        .effective_date
        .map(|e| Date::next_anniversary(today, e))
        .and_then(|anchor| {
            rules::active_window_on(jurisdiction, AnchorKind::EffectiveDate, anchor, today, config).map(|w| (anchor, w))
        });

    // If both anchors have an active window, prefer the one closing
    // first (smaller makeup delay).
    let (anchor, window) = match (birth_window, effective_window) {
        (Some(b), Some(e)) => {
            if b.1.end.compare(&e.1.end) != std::cmp::Ordering::Greater {
                b
            } else {
                e
            }
        }
        (Some(b), None) => b,
        (None, Some(e)) => e,
        (None, None) => return None,
    };

    let send_date = window.end.add_days(1);
    Some(base_record(contact, AnniversaryKind::PostWindow, send_date, POST_WINDOW_PRIORITY, anchor, batch_id))
}

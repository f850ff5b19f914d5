//! Conflict Resolver (C8): at most one campaign email per (contact,
//! date); highest priority (lowest number) wins (spec §4.8).

use std::collections::HashMap;

use crate::model::{EmailType, ScheduleRecord, ScheduleStatus, SkipReason};

pub fn apply(candidates: &mut [ScheduleRecord]) {
    let mut groups: HashMap<(i64, crate::date::Date), Vec<usize>> = HashMap::new();
    for (idx, record) in candidates.iter().enumerate() {
        if record.status != ScheduleStatus::PreScheduled || !record.email_type.is_campaign() {
            continue;
        }
        groups.entry((record.contact_id, record.scheduled_date)).or_default().push(idx);
    }

    for (_, mut indices) in groups {
        if indices.len() <= 1 {
            continue;
        }
        // Stable tie-break: lowest priority number wins; ties broken by
        // the lower index, which for a single merge pass approximates
        // contact/source ordering closely enough since this group is
        // already fixed to one contact.
        indices.sort_by_key(|&idx| (candidates[idx].priority, idx));
        let winner_idx = indices[0];
        let winner_name = campaign_name(&candidates[winner_idx].email_type);

        for &idx in &indices[1..] {
            let record = &mut candidates[idx];
            record.status = ScheduleStatus::Skipped;
            record.skip_reason = Some(SkipReason::CampaignPriorityConflict { retained: winner_name.clone() });
        }
    }
}

fn campaign_name(email_type: &EmailType) -> String {
    match email_type {
        EmailType::Campaign { campaign_type, .. } => campaign_type.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::Date;

    fn campaign(contact_id: i64, priority: i32, name: &str, date: Date) -> ScheduleRecord {
        ScheduleRecord {
            contact_id,
            email_type: EmailType::Campaign { instance_id: priority as i64, campaign_type: name.to_string() },
            scheduled_date: date,
            scheduled_time: "08:30:00".to_string(),
            status: ScheduleStatus::PreScheduled,
            priority,
            campaign_instance_id: None,
            template_id: None,
            skip_reason: None,
            event_year: date.year(),
            event_month: date.month(),
            event_day: date.day(),
            batch_id: "run-1".to_string(),
            source_email_type: None,
            exclusion_context: None,
        }
    }

    fn anniversary(contact_id: i64, date: Date) -> ScheduleRecord {
        ScheduleRecord {
            contact_id,
            email_type: EmailType::Anniversary(crate::model::AnniversaryKind::Birthday),
            scheduled_date: date,
            scheduled_time: "08:30:00".to_string(),
            status: ScheduleStatus::PreScheduled,
            priority: 10,
            campaign_instance_id: None,
            template_id: None,
            skip_reason: None,
            event_year: date.year(),
            event_month: date.month(),
            event_day: date.day(),
            batch_id: "run-1".to_string(),
            source_email_type: None,
            exclusion_context: None,
        }
    }

    #[test]
    fn lowest_priority_campaign_wins() {
        let date = Date::new(2025, 3, 1).unwrap();
        let mut candidates = vec![campaign(1, 20, "b", date), campaign(1, 10, "a", date)];
        apply(&mut candidates);
        assert_eq!(candidates[1].status, ScheduleStatus::PreScheduled);
        assert_eq!(candidates[0].status, ScheduleStatus::Skipped);
        assert_eq!(
            candidates[0].skip_reason,
            Some(SkipReason::CampaignPriorityConflict { retained: "a".to_string() })
        );
    }

    #[test]
    fn anniversary_and_followup_candidates_never_conflict() {
        let date = Date::new(2025, 3, 1).unwrap();
        let mut candidates = vec![anniversary(1, date), campaign(1, 10, "a", date)];
        apply(&mut candidates);
        assert_eq!(candidates[0].status, ScheduleStatus::PreScheduled);
        assert_eq!(candidates[1].status, ScheduleStatus::PreScheduled);
    }

    #[test]
    fn different_dates_do_not_conflict() {
        let mut candidates = vec![
            campaign(1, 10, "a", Date::new(2025, 3, 1).unwrap()),
            campaign(1, 20, "b", Date::new(2025, 3, 2).unwrap()),
        ];
        apply(&mut candidates);
        assert!(candidates.iter().all(|c| c.status == ScheduleStatus::PreScheduled));
    }
}

//! Follow-up Derivation (C5): behavior-gated follow-up emails anchored on
//! prior sent emails (spec §4.5).

use std::collections::HashSet;

use crate::config::OrganizationConfig;
use crate::date::Date;
use crate::model::{Contact, Engagement, EmailType, PriorEmail, ScheduleRecord, ScheduleStatus};
use crate::rules;

/// Existing follow-ups already in the store, keyed by the anchor
/// `(contact_id, anchor email tag, anchor sent_date)` they were derived
/// from — used to avoid re-emitting one per §4.5.
pub type ExistingFollowUpKey = (i64, String, Date);

/// Emits one follow-up candidate per qualifying prior `sent` email found
/// within `followup_lookback_days` of `today`.
pub fn derive(
    contact: &Contact,
    prior_emails: &[PriorEmail],
    existing_followups: &HashSet<ExistingFollowUpKey>,
    today: Date,
    config: &OrganizationConfig,
    batch_id: &str,
) -> Vec<ScheduleRecord> {
    let jurisdiction = contact.jurisdiction.unwrap_or(crate::model::Jurisdiction::Other);
    let mut out = Vec::new();

    for prior in prior_emails {
        if prior.contact_id != contact.id {
            continue;
        }
        if prior.status != ScheduleStatus::Sent || !prior.permits_followup {
            continue;
        }
        let age = today.diff_days(&prior.sent_date);
        if age < 0 || age > config.followup_lookback_days {
            continue;
        }

        let key = (contact.id, prior.email_type.tag(), prior.sent_date);
        if existing_followups.contains(&key) {
            continue;
        }

        let kind = Engagement::followup_kind(prior.engagement);
        let send_date = prior.sent_date.add_days(config.followup_delay_days);

        let mut record = ScheduleRecord {
            contact_id: contact.id,
            email_type: EmailType::FollowUp(kind),
            scheduled_date: send_date,
            scheduled_time: crate::model::DEFAULT_SEND_TIME.to_string(),
            status: ScheduleStatus::PreScheduled,
            priority: kind.priority(),
            campaign_instance_id: None,
            template_id: None,
            skip_reason: None,
            event_year: prior.sent_date.year(),
            event_month: prior.sent_date.month(),
            event_day: prior.sent_date.day(),
            batch_id: batch_id.to_string(),
            source_email_type: Some(prior.email_type.tag()),
            exclusion_context: None,
        };

        let birth_outcome = contact
            .birth_date
            .map(|b| rules::evaluate_birthday(jurisdiction, Date::next_anniversary(today, b), send_date, config));
        let ed_outcome = contact
            .effective_date
            .map(|e| rules::evaluate_effective_date(jurisdiction, Date::next_anniversary(today, e), send_date, config));
        if let Some(reason) = [birth_outcome, ed_outcome].into_iter().flatten().find_map(|o| match o {
            rules::RuleOutcome::Excluded { reason, .. } => Some(reason),
            rules::RuleOutcome::Allowed => None,
        }) {
            record = record.skip(reason);
        }

        out.push(record);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Jurisdiction;

    fn contact(id: i64, jurisdiction: Jurisdiction) -> Contact {
        Contact {
            id,
            email: "a@example.com".to_string(),
            zip_code: Some("90210".to_string()),
            jurisdiction: Some(jurisdiction),
            birth_date: None,
            effective_date: None,
            carrier: None,
            failed_underwriting: false,
        }
    }

    fn prior(contact_id: i64, sent_date: Date, engagement: Option<Engagement>) -> PriorEmail {
        PriorEmail {
            contact_id,
            email_type: EmailType::Campaign { instance_id: 1, campaign_type: "aep".to_string() },
            sent_date,
            status: ScheduleStatus::Sent,
            engagement,
            permits_followup: true,
        }
    }

    #[test]
    fn cold_followup_when_no_engagement() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let today = Date::new(2025, 6, 10).unwrap();
        let c = contact(1, Jurisdiction::Other);
        let priors = vec![prior(1, Date::new(2025, 6, 1).unwrap(), None)];
        let records = derive(&c, &priors, &HashSet::new(), today, &config, "run-1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].email_type, EmailType::FollowUp(crate::model::FollowUpKind::Cold));
        assert_eq!(records[0].scheduled_date, Date::new(2025, 6, 3).unwrap());
        assert_eq!(records[0].priority, 90);
    }

    #[test]
    fn hq_with_yes_outranks_cold() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let today = Date::new(2025, 6, 10).unwrap();
        let c = contact(2, Jurisdiction::Other);
        let priors = vec![prior(2, Date::new(2025, 6, 1).unwrap(), Some(Engagement::AnsweredHqYes))];
        let records = derive(&c, &priors, &HashSet::new(), today, &config, "run-1");
        assert_eq!(records[0].email_type, EmailType::FollowUp(crate::model::FollowUpKind::HQWithYes));
        assert_eq!(records[0].priority, 60);
    }

    #[test]
    fn outside_lookback_window_is_ignored() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let today = Date::new(2025, 6, 10).unwrap();
        let c = contact(3, Jurisdiction::Other);
        let priors = vec![prior(3, Date::new(2025, 1, 1).unwrap(), None)];
        assert!(derive(&c, &priors, &HashSet::new(), today, &config, "run-1").is_empty());
    }

    #[test]
    fn existing_followup_is_not_re_emitted() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let today = Date::new(2025, 6, 10).unwrap();
        let c = contact(4, Jurisdiction::Other);
        let sent_date = Date::new(2025, 6, 1).unwrap();
        let priors = vec![prior(4, sent_date, None)];
        let mut existing = HashSet::new();
        existing.insert((4i64, priors[0].email_type.tag(), sent_date));
        assert!(derive(&c, &priors, &existing, today, &config, "run-1").is_empty());
    }

    #[test]
    fn unsent_prior_is_ignored() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let today = Date::new(2025, 6, 10).unwrap();
        let c = contact(5, Jurisdiction::Other);
        let mut p = prior(5, Date::new(2025, 6, 1).unwrap(), None);
        p.status = ScheduleStatus::Scheduled;
        assert!(derive(&c, &[p], &HashSet::new(), today, &config, "run-1").is_empty());
    }
}

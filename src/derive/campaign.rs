//! Campaign Derivation (C4): per-instance targeting, date computation, and
//! exclusion/underwriting policy (spec §4.4).

use crate::config::OrganizationConfig;
use crate::date::Date;
use crate::hashutil::deterministic_hash;
use crate::model::{
    CampaignInstance, CampaignType, Contact, EmailType, ExclusionContext, ScheduleRecord, ScheduleStatus, SkipReason,
};
use crate::rules;

fn targets(contact: &Contact, campaign_type: &CampaignType, instance: &CampaignInstance) -> bool {
    if campaign_type.target_all_contacts {
        return true;
    }
    let state_ok = contact
        .jurisdiction
        .map(|j| instance.target_states.matches(j.code()))
        .unwrap_or(instance.target_states.matches(""));
    let carrier_ok = contact
        .carrier
        .as_deref()
        .map(|c| instance.target_carriers.matches(c))
        .unwrap_or(instance.target_carriers.matches(""));
    state_ok && carrier_ok
}

fn zip_eligible(contact: &Contact, campaign_type: &CampaignType, config: &OrganizationConfig) -> bool {
    if contact.zip_code.is_some() {
        return true;
    }
    campaign_type.target_all_contacts && config.send_without_zipcode_for_universal
}

fn underwriting_excluded(contact: &Contact, campaign_type: &CampaignType, config: &OrganizationConfig) -> bool {
    if !contact.failed_underwriting {
        return false;
    }
    if campaign_type.is_aep {
        return false;
    }
    campaign_type.skip_failed_underwriting || config.exclude_failed_underwriting_global
}

fn scheduled_date(contact: &Contact, instance: &CampaignInstance, campaign_type: &CampaignType) -> Date {
    if !campaign_type.spread_evenly {
        return instance.active_start_date.sub_days(campaign_type.days_before_event);
    }
    let start = instance.spread_start_date.unwrap_or(instance.active_start_date);
    let end = instance.spread_end_date.unwrap_or(instance.active_end_date);
    let span = end.diff_days(&start) + 1;
    if span <= 0 {
        return start;
    }
    let offset = deterministic_hash(&[&contact.id.to_string(), &instance.id.to_string()]) % span as u64;
    start.add_days(offset as i64)
}

/// Produces at most one candidate per (contact, active campaign instance)
/// pair that the contact targets.
pub fn derive(
    contact: &Contact,
    campaign_type: &CampaignType,
    instance: &CampaignInstance,
    today: Date,
    config: &OrganizationConfig,
    batch_id: &str,
) -> Option<ScheduleRecord> {
    if !instance.active || !campaign_type.active {
        return None;
    }
    if !targets(contact, campaign_type, instance) {
        return None;
    }
    if !zip_eligible(contact, campaign_type, config) {
        return None;
    }

    let date = scheduled_date(contact, instance, campaign_type);

    let mut record = ScheduleRecord {
        contact_id: contact.id,
        email_type: EmailType::Campaign { instance_id: instance.id, campaign_type: campaign_type.name.clone() },
        scheduled_date: date,
        scheduled_time: crate::model::DEFAULT_SEND_TIME.to_string(),
        status: ScheduleStatus::PreScheduled,
        priority: campaign_type.priority,
        campaign_instance_id: Some(instance.id),
        template_id: instance.email_template.clone(),
        skip_reason: None,
        event_year: date.year(),
        event_month: date.month(),
        event_day: date.day(),
        batch_id: batch_id.to_string(),
        source_email_type: None,
        exclusion_context: None,
    };

    if underwriting_excluded(contact, campaign_type, config) {
        return Some(record.skip(SkipReason::FailedUnderwriting));
    }

    if campaign_type.respects_exclusion_windows {
        let jurisdiction = contact.jurisdiction.unwrap_or(crate::model::Jurisdiction::Other);
        let birth_check = contact.birth_date.map(|b| {
            let anchor = Date::next_anniversary(today, b);
            (anchor, rules::evaluate_birthday(jurisdiction, anchor, date, config))
        });
        let ed_check = contact.effective_date.map(|e| {
            let anchor = Date::next_anniversary(today, e);
            (anchor, rules::evaluate_effective_date(jurisdiction, anchor, date, config))
        });
        // Carry the anchor/window that actually excluded this candidate
        // (not the campaign's own send date) so C9 can place a makeup
        // against the real window instead of reconstructing one (spec §4.9).
        let excluded = [birth_check, ed_check].into_iter().flatten().find_map(|(anchor, outcome)| match outcome {
            rules::RuleOutcome::Excluded { window, reason } => Some((anchor, window, reason)),
            rules::RuleOutcome::Allowed => None,
        });
        if let Some((anchor, window, reason)) = excluded {
            record = record.skip(reason);
            record.exclusion_context = window.map(|w| ExclusionContext { anchor, window_end: w.end });
        }
    }

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Jurisdiction, TargetList};

    fn contact(id: i64, jurisdiction: Option<Jurisdiction>, zip: Option<&str>, failed_uw: bool) -> Contact {
        Contact {
            id,
            email: "a@example.com".to_string(),
            zip_code: zip.map(|s| s.to_string()),
            jurisdiction,
            birth_date: None,
            effective_date: None,
            carrier: None,
            failed_underwriting: failed_uw,
        }
    }

    fn aep_type() -> CampaignType {
        CampaignType {
            name: "aep".to_string(),
            priority: 5,
            days_before_event: 14,
            respects_exclusion_windows: false,
            enable_followups: true,
            spread_evenly: false,
            skip_failed_underwriting: true,
            active: true,
            target_all_contacts: true,
            is_aep: true,
        }
    }

    fn instance(id: i64) -> CampaignInstance {
        CampaignInstance {
            id,
            campaign_type: "aep".to_string(),
            instance_name: "AEP 2025".to_string(),
            email_template: Some("aep_template".to_string()),
            active_start_date: Date::new(2025, 10, 15).unwrap(),
            active_end_date: Date::new(2025, 12, 7).unwrap(),
            spread_start_date: None,
            spread_end_date: None,
            target_states: TargetList::All,
            target_carriers: TargetList::All,
            active: true,
        }
    }

    #[test]
    fn aep_overrides_failed_underwriting_exclusion() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let c = contact(1, Some(Jurisdiction::CA), Some("90210"), true);
        let record = derive(&c, &aep_type(), &instance(1), Date::new(2025, 1, 1).unwrap(), &config, "run-1").unwrap();
        assert_eq!(record.status, ScheduleStatus::PreScheduled);
    }

    #[test]
    fn non_aep_failed_underwriting_is_skipped() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let mut campaign_type = aep_type();
        campaign_type.is_aep = false;
        campaign_type.name = "renewal".to_string();
        let c = contact(2, Some(Jurisdiction::CA), Some("90210"), true);
        let record = derive(&c, &campaign_type, &instance(1), Date::new(2025, 1, 1).unwrap(), &config, "run-1").unwrap();
        assert_eq!(record.status, ScheduleStatus::Skipped);
        assert_eq!(record.skip_reason, Some(SkipReason::FailedUnderwriting));
    }

    #[test]
    fn missing_zip_excluded_from_non_universal_campaign() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let mut campaign_type = aep_type();
        campaign_type.target_all_contacts = false;
        let mut inst = instance(1);
        inst.target_states = TargetList::Some(vec!["CA".to_string()]);
        let c = contact(3, Some(Jurisdiction::CA), None, false);
        assert!(derive(&c, &campaign_type, &inst, Date::new(2025, 1, 1).unwrap(), &config, "run-1").is_none());
    }

    #[test]
    fn spread_evenly_is_deterministic_and_in_range() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let mut campaign_type = aep_type();
        campaign_type.spread_evenly = true;
        let mut inst = instance(1);
        inst.spread_start_date = Some(Date::new(2025, 10, 1).unwrap());
        inst.spread_end_date = Some(Date::new(2025, 10, 10).unwrap());
        let c = contact(4, Some(Jurisdiction::CA), Some("90210"), false);
        let r1 = derive(&c, &campaign_type, &inst, Date::new(2025, 1, 1).unwrap(), &config, "run-1").unwrap();
        let r2 = derive(&c, &campaign_type, &inst, Date::new(2025, 1, 1).unwrap(), &config, "run-2").unwrap();
        assert_eq!(r1.scheduled_date, r2.scheduled_date);
        assert!(r1.scheduled_date.compare(&Date::new(2025, 10, 1).unwrap()) != std::cmp::Ordering::Less);
        assert!(r1.scheduled_date.compare(&Date::new(2025, 10, 10).unwrap()) != std::cmp::Ordering::Greater);
    }

    #[test]
    fn inactive_instance_produces_nothing() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let mut inst = instance(1);
        inst.active = false;
        let c = contact(5, Some(Jurisdiction::CA), Some("90210"), false);
        assert!(derive(&c, &aep_type(), &inst, Date::new(2025, 1, 1).unwrap(), &config, "run-1").is_none());
    }

    #[test]
    fn respects_exclusion_windows_flag_consults_rule_engine() {
        let config = OrganizationConfig::defaults(1, 50_000);
        let mut campaign_type = aep_type();
        campaign_type.respects_exclusion_windows = true;
        let mut c = contact(6, Some(Jurisdiction::CA), Some("90210"), false);
        c.birth_date = Some(Date::new(1955, 3, 15).unwrap());
        let mut inst = instance(1);
        inst.active_start_date = Date::new(2025, 3, 1).unwrap();
        inst.active_end_date = Date::new(2025, 3, 31).unwrap();
        campaign_type.days_before_event = 0;
        let record = derive(&c, &campaign_type, &inst, Date::new(2025, 2, 1).unwrap(), &config, "run-1").unwrap();
        assert_eq!(record.status, ScheduleStatus::Skipped);
        assert!(matches!(record.skip_reason, Some(SkipReason::BirthdayExclusion { .. })));
    }
}

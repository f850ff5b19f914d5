//! Lifecycle Manager (C6): activates/deactivates campaign instances by
//! date, ahead of derivation (spec §4.6).

use crate::date::Date;
use crate::model::CampaignInstance;

/// One activation/deactivation transition, recorded for instance
/// metadata (spec §4.6: "record the transition ... with a timestamp").
/// The timestamp itself is stamped by the store layer at persistence
/// time, not here — this type only carries the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activated,
    Deactivated,
}

/// Applies the lifecycle rule to a single instance, returning the
/// transition taken (if any). Mutates `instance.active` in place.
pub fn apply(instance: &mut CampaignInstance, today: Date) -> Option<Transition> {
    let before_start = today.compare(&instance.active_start_date) == std::cmp::Ordering::Less;
    let after_end = today.compare(&instance.active_end_date) == std::cmp::Ordering::Greater;
    let within_range = !before_start && !after_end;

    if within_range && !instance.active {
        instance.active = true;
        Some(Transition::Activated)
    } else if !within_range && instance.active {
        instance.active = false;
        Some(Transition::Deactivated)
    } else {
        None
    }
}

/// Walks every instance, applying `apply` to each (spec §4.6). Returns
/// the transitions keyed by instance id, for the caller to persist.
pub fn run(instances: &mut [CampaignInstance], today: Date) -> Vec<(i64, Transition)> {
    instances
        .iter_mut()
        .filter_map(|instance| apply(instance, today).map(|t| (instance.id, t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TargetList;

    fn instance(start: Date, end: Date, active: bool) -> CampaignInstance {
        CampaignInstance {
            id: 1,
            campaign_type: "aep".to_string(),
            instance_name: "AEP 2025".to_string(),
            email_template: None,
            active_start_date: start,
            active_end_date: end,
            spread_start_date: None,
            spread_end_date: None,
            target_states: TargetList::All,
            target_carriers: TargetList::All,
            active,
        }
    }

    #[test]
    fn activates_when_today_enters_range() {
        let mut inst = instance(Date::new(2025, 10, 15).unwrap(), Date::new(2025, 12, 7).unwrap(), false);
        let transition = apply(&mut inst, Date::new(2025, 10, 15).unwrap());
        assert_eq!(transition, Some(Transition::Activated));
        assert!(inst.active);
    }

    #[test]
    fn deactivates_after_end_date() {
        let mut inst = instance(Date::new(2025, 10, 15).unwrap(), Date::new(2025, 12, 7).unwrap(), true);
        let transition = apply(&mut inst, Date::new(2025, 12, 8).unwrap());
        assert_eq!(transition, Some(Transition::Deactivated));
        assert!(!inst.active);
    }

    #[test]
    fn deactivates_before_start_date_if_wrongly_active() {
        let mut inst = instance(Date::new(2025, 10, 15).unwrap(), Date::new(2025, 12, 7).unwrap(), true);
        let transition = apply(&mut inst, Date::new(2025, 9, 1).unwrap());
        assert_eq!(transition, Some(Transition::Deactivated));
    }

    #[test]
    fn no_transition_when_state_already_correct() {
        let mut inst = instance(Date::new(2025, 10, 15).unwrap(), Date::new(2025, 12, 7).unwrap(), true);
        assert_eq!(apply(&mut inst, Date::new(2025, 11, 1).unwrap()), None);
    }

    #[test]
    fn boundary_dates_are_inclusive() {
        let mut start = instance(Date::new(2025, 10, 15).unwrap(), Date::new(2025, 12, 7).unwrap(), false);
        assert_eq!(apply(&mut start, Date::new(2025, 12, 7).unwrap()), Some(Transition::Activated));
    }
}

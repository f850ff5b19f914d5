//! Rule Engine (C2): jurisdiction-keyed exclusion windows.
//!
//! A small tagged union plus a single evaluation function (§9
//! "Polymorphic behaviour") — no dynamic dispatch, no class hierarchy.

use crate::config::OrganizationConfig;
use crate::date::Date;
use crate::model::{Jurisdiction, SkipReason};

/// One exclusion rule, keyed by jurisdiction (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionRule {
    BirthdayWindow { before_days: i64, after_days: i64, month_start: bool },
    EffectiveDateWindow { before_days: i64, after_days: i64 },
    YearRound,
    None,
}

/// The canonical state → rule table (spec §4.2).
pub fn rule_for(jurisdiction: Jurisdiction) -> ExclusionRule {
    use ExclusionRule::*;
    use Jurisdiction::*;
    match jurisdiction {
        CA => BirthdayWindow { before_days: 30, after_days: 60, month_start: false },
        ID => BirthdayWindow { before_days: 0, after_days: 63, month_start: false },
        KY | OK => BirthdayWindow { before_days: 0, after_days: 60, month_start: false },
        MD | VA => BirthdayWindow { before_days: 0, after_days: 30, month_start: false },
        NV => BirthdayWindow { before_days: 0, after_days: 60, month_start: true },
        OR => BirthdayWindow { before_days: 0, after_days: 31, month_start: false },
        MO => EffectiveDateWindow { before_days: 30, after_days: 33 },
        CT | MA | NY | WA => YearRound,
        Other => None,
    }
}

/// An inclusive, contiguous exclusion window anchored on a birthday or
/// effective-date anniversary (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Date,
    pub end: Date,
}

impl Window {
    pub fn contains(&self, date: Date) -> bool {
        date.compare(&self.start) != std::cmp::Ordering::Less
            && date.compare(&self.end) != std::cmp::Ordering::Greater
    }
}

/// The outcome of evaluating a contact's jurisdiction against a candidate
/// send date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Not excluded (no rule, or rule doesn't apply to this date).
    Allowed,
    /// Excluded, with the window that excluded it (`None` for `YearRound`,
    /// which has no finite window) and the skip reason to surface.
    Excluded { window: Option<Window>, reason: SkipReason },
}

/// Evaluate the birthday-window rule for an anchor (next birthday).
/// §9 Open Question (b): for Nevada, the anchor is rounded to the first
/// of its month *before* subtracting the pre-buffer.
pub fn evaluate_birthday(
    jurisdiction: Jurisdiction,
    anchor: Date,
    candidate: Date,
    config: &OrganizationConfig,
) -> RuleOutcome {
    match rule_for(jurisdiction) {
        ExclusionRule::BirthdayWindow { before_days, after_days, month_start } => {
            let rounded_anchor = if month_start { anchor.month_start() } else { anchor };
            let pre_buffer = config.pre_buffer_for(jurisdiction);
            // The pre-window buffer is a floor under the state's own
            // before-days offset, not an additional stack: it guarantees a
            // minimum lead time even for states whose table entry has
            // `before_days = 0` (see DESIGN.md for why this reading was
            // chosen over summing the two).
            let effective_before = before_days.max(pre_buffer);
            let window = Window {
                start: rounded_anchor.sub_days(effective_before),
                end: rounded_anchor.add_days(after_days),
            };
            if window.contains(candidate) {
                RuleOutcome::Excluded {
                    window: Some(window),
                    reason: SkipReason::BirthdayExclusion { state: jurisdiction.code() },
                }
            } else {
                RuleOutcome::Allowed
            }
        }
        ExclusionRule::YearRound => RuleOutcome::Excluded {
            window: None,
            reason: SkipReason::YearRoundExclusion { state: jurisdiction.code() },
        },
        ExclusionRule::EffectiveDateWindow { .. } | ExclusionRule::None => RuleOutcome::Allowed,
    }
}

/// Evaluate the effective-date-window rule for an anchor (next effective
/// date anniversary). §9 Open Question (c): an effective date exactly
/// equal to today falls inside the window (`[anchor - before, anchor +
/// after]` is inclusive on both ends).
pub fn evaluate_effective_date(
    jurisdiction: Jurisdiction,
    anchor: Date,
    candidate: Date,
    config: &OrganizationConfig,
) -> RuleOutcome {
    match rule_for(jurisdiction) {
        ExclusionRule::EffectiveDateWindow { before_days, after_days } => {
            let pre_buffer = config.pre_buffer_for(jurisdiction);
            let effective_before = before_days.max(pre_buffer);
            let window = Window {
                start: anchor.sub_days(effective_before),
                end: anchor.add_days(after_days),
            };
            if window.contains(candidate) {
                RuleOutcome::Excluded {
                    window: Some(window),
                    reason: SkipReason::EffectiveDateExclusion { state: jurisdiction.code() },
                }
            } else {
                RuleOutcome::Allowed
            }
        }
        ExclusionRule::YearRound => RuleOutcome::Excluded {
            window: None,
            reason: SkipReason::YearRoundExclusion { state: jurisdiction.code() },
        },
        ExclusionRule::BirthdayWindow { .. } | ExclusionRule::None => RuleOutcome::Allowed,
    }
}

/// Is there a window for this jurisdiction, anchored on `anchor`, that is
/// active right now (`today` falls inside it)? Used by the post-window
/// candidate in §4.3 (anniversary) — the makeup email, not the
/// skip-triggered one produced in C9.
pub fn active_window_on(
    jurisdiction: Jurisdiction,
    anchor_kind: AnchorKind,
    anchor: Date,
    today: Date,
    config: &OrganizationConfig,
) -> Option<Window> {
    let outcome = match anchor_kind {
        AnchorKind::Birthday => evaluate_birthday(jurisdiction, anchor, today, config),
        AnchorKind::EffectiveDate => evaluate_effective_date(jurisdiction, anchor, today, config),
    };
    match outcome {
        RuleOutcome::Excluded { window: Some(w), .. } => Some(w),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    Birthday,
    EffectiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> OrganizationConfig {
        OrganizationConfig::defaults(1, 50_000)
    }

    #[test]
    fn s1_california_birthday_exclusion() {
        let config = cfg();
        let birth = Date::new(1955, 3, 15).unwrap();
        let today = Date::new(2025, 2, 1).unwrap();
        let anchor = Date::next_anniversary(today, birth);
        assert_eq!(anchor, Date::new(2025, 3, 15).unwrap());

        let outcome = evaluate_birthday(Jurisdiction::CA, anchor, Date::new(2025, 3, 1).unwrap(), &config);
        match outcome {
            RuleOutcome::Excluded { window: Some(w), reason } => {
                assert_eq!(w.start, Date::new(2025, 1, 14).unwrap());
                assert_eq!(w.end, Date::new(2025, 5, 14).unwrap());
                assert_eq!(reason.wire(), "Birthday exclusion window for CA");
            }
            other => panic!("expected exclusion, got {other:?}"),
        }
    }

    #[test]
    fn s2_new_york_year_round() {
        let config = cfg();
        let anchor = Date::new(2025, 6, 1).unwrap();
        let outcome = evaluate_birthday(Jurisdiction::NY, anchor, Date::new(2025, 1, 1).unwrap(), &config);
        assert!(matches!(outcome, RuleOutcome::Excluded { window: None, .. }));
    }

    #[test]
    fn nevada_month_start_rounding() {
        let config = cfg();
        // Anchor March 15; month-start rounds to March 1 *before* the
        // pre-buffer is applied (§9 Open Question b).
        let anchor = Date::new(2025, 3, 15).unwrap();
        let outcome = evaluate_birthday(Jurisdiction::NV, anchor, Date::new(2025, 12, 31).unwrap(), &config);
        // window = [Mar1 - 0 - 60, Mar1 + 60] = [Dec 31 2024, Apr 30 2025]
        match outcome {
            RuleOutcome::Excluded { window: Some(w), .. } => {
                assert_eq!(w.start, Date::new(2024, 12, 31).unwrap());
                assert_eq!(w.end, Date::new(2025, 4, 30).unwrap());
            }
            other => panic!("expected exclusion, got {other:?}"),
        }
    }

    #[test]
    fn missouri_effective_date_today_inclusive() {
        let config = cfg();
        let anchor = Date::new(2025, 5, 1).unwrap();
        // today == anchor must be inside the window (Open Question c).
        let outcome = evaluate_effective_date(Jurisdiction::MO, anchor, anchor, &config);
        assert!(matches!(outcome, RuleOutcome::Excluded { .. }));
    }

    #[test]
    fn window_crossing_year_boundary() {
        let config = cfg();
        let anchor = Date::new(2025, 1, 10).unwrap();
        let outcome = evaluate_birthday(Jurisdiction::ID, anchor, Date::new(2024, 12, 20).unwrap(), &config);
        assert!(matches!(outcome, RuleOutcome::Excluded { .. }));
    }

    #[test]
    fn other_jurisdiction_never_excluded() {
        let config = cfg();
        let anchor = Date::new(2025, 3, 15).unwrap();
        let outcome = evaluate_birthday(Jurisdiction::Other, anchor, anchor, &config);
        assert_eq!(outcome, RuleOutcome::Allowed);
    }
}

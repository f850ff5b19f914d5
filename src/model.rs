//! Domain model (spec §3). Tagged unions over inheritance (§9): every
//! closed sum here is a Rust `enum` matched exhaustively by the pipeline,
//! so adding a variant forces every stage to be revisited.

use serde::{Deserialize, Serialize};

use crate::date::Date;

/// Closed set of US states the rule engine recognizes, plus `Other` for
/// everything else (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Jurisdiction {
    CA,
    ID,
    KY,
    OK,
    MD,
    VA,
    NV,
    OR,
    MO,
    CT,
    MA,
    NY,
    WA,
    Other,
}

impl Jurisdiction {
    pub fn parse(code: &str) -> Jurisdiction {
        match code.trim().to_ascii_uppercase().as_str() {
            "CA" => Jurisdiction::CA,
            "ID" => Jurisdiction::ID,
            "KY" => Jurisdiction::KY,
            "OK" => Jurisdiction::OK,
            "MD" => Jurisdiction::MD,
            "VA" => Jurisdiction::VA,
            "NV" => Jurisdiction::NV,
            "OR" => Jurisdiction::OR,
            "MO" => Jurisdiction::MO,
            "CT" => Jurisdiction::CT,
            "MA" => Jurisdiction::MA,
            "NY" => Jurisdiction::NY,
            "WA" => Jurisdiction::WA,
            _ => Jurisdiction::Other,
        }
    }

    /// The state code as it appears in skip-reason strings (spec §6).
    pub fn code(&self) -> &'static str {
        match self {
            Jurisdiction::CA => "CA",
            Jurisdiction::ID => "ID",
            Jurisdiction::KY => "KY",
            Jurisdiction::OK => "OK",
            Jurisdiction::MD => "MD",
            Jurisdiction::VA => "VA",
            Jurisdiction::NV => "NV",
            Jurisdiction::OR => "OR",
            Jurisdiction::MO => "MO",
            Jurisdiction::CT => "CT",
            Jurisdiction::MA => "MA",
            Jurisdiction::NY => "NY",
            Jurisdiction::WA => "WA",
            Jurisdiction::Other => "OTHER",
        }
    }
}

/// A contact eligible for scheduling (spec §3).
#[derive(Debug, Clone)]
pub struct Contact {
    pub id: i64,
    pub email: String,
    pub zip_code: Option<String>,
    pub jurisdiction: Option<Jurisdiction>,
    pub birth_date: Option<Date>,
    pub effective_date: Option<Date>,
    pub carrier: Option<String>,
    pub failed_underwriting: bool,
}

impl Contact {
    /// Eligible for anniversary scheduling iff it has an email and at
    /// least one anchor date (spec §3).
    pub fn eligible_for_anniversary(&self) -> bool {
        !self.email.trim().is_empty() && (self.birth_date.is_some() || self.effective_date.is_some())
    }
}

/// Tagged union of schedule lifecycle states (spec §3, §4.12). Only
/// `PreScheduled` and `Skipped` are ever produced by the engine; the rest
/// are set by downstream systems and must survive persistence untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    PreScheduled,
    Skipped,
    Scheduled,
    Processing,
    Sent,
    Failed,
}

impl ScheduleStatus {
    pub fn wire(&self) -> &'static str {
        match self {
            ScheduleStatus::PreScheduled => "pre-scheduled",
            ScheduleStatus::Skipped => "skipped",
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Processing => "processing",
            ScheduleStatus::Sent => "sent",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<ScheduleStatus> {
        Some(match s {
            "pre-scheduled" => ScheduleStatus::PreScheduled,
            "skipped" => ScheduleStatus::Skipped,
            "scheduled" => ScheduleStatus::Scheduled,
            "processing" => ScheduleStatus::Processing,
            "sent" => ScheduleStatus::Sent,
            "failed" => ScheduleStatus::Failed,
            _ => return None,
        })
    }

    /// Whether this record is still owned (mutable/deletable) by the
    /// engine, vs. handed off to downstream systems (spec §4.12).
    pub fn is_engine_owned(&self) -> bool {
        matches!(self, ScheduleStatus::PreScheduled | ScheduleStatus::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnniversaryKind {
    Birthday,
    EffectiveDate,
    PostWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowUpKind {
    Cold,
    ClickedNoHQ,
    HQNoYes,
    HQWithYes,
}

impl FollowUpKind {
    /// Priority per spec §4.5 (lower = higher priority).
    pub fn priority(&self) -> i32 {
        match self {
            FollowUpKind::HQWithYes => 60,
            FollowUpKind::HQNoYes => 70,
            FollowUpKind::ClickedNoHQ => 80,
            FollowUpKind::Cold => 90,
        }
    }
}

/// Tagged union of email kinds (spec §3). AEP is deliberately absent as
/// an anniversary variant — it is always a `Campaign` (§9 Open Question a).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailType {
    Anniversary(AnniversaryKind),
    Campaign { instance_id: i64, campaign_type: String },
    FollowUp(FollowUpKind),
}

impl EmailType {
    /// Stable tag used for uniqueness keys, ordering, and the wire format.
    pub fn tag(&self) -> String {
        match self {
            EmailType::Anniversary(AnniversaryKind::Birthday) => "anniversary:birthday".to_string(),
            EmailType::Anniversary(AnniversaryKind::EffectiveDate) => "anniversary:effective_date".to_string(),
            EmailType::Anniversary(AnniversaryKind::PostWindow) => "anniversary:post_window".to_string(),
            EmailType::Campaign { instance_id, .. } => format!("campaign:{instance_id}"),
            EmailType::FollowUp(FollowUpKind::Cold) => "followup:cold".to_string(),
            EmailType::FollowUp(FollowUpKind::ClickedNoHQ) => "followup:clicked_no_hq".to_string(),
            EmailType::FollowUp(FollowUpKind::HQNoYes) => "followup:hq_no_yes".to_string(),
            EmailType::FollowUp(FollowUpKind::HQWithYes) => "followup:hq_with_yes".to_string(),
        }
    }

    pub fn is_campaign(&self) -> bool {
        matches!(self, EmailType::Campaign { .. })
    }

    pub fn is_anniversary(&self) -> bool {
        matches!(self, EmailType::Anniversary(_))
    }
}

/// Structured skip reason (SPEC_FULL §F.3). Converted to the wire string
/// defined in spec §6 only at the store boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    BirthdayExclusion { state: &'static str },
    EffectiveDateExclusion { state: &'static str },
    YearRoundExclusion { state: &'static str },
    BelowMinimumElapsedMonths,
    FailedUnderwriting,
    FrequencyLimitExceeded,
    CampaignPriorityConflict { retained: String },
    DailyCapExceeded,
}

impl SkipReason {
    pub fn wire(&self) -> String {
        match self {
            SkipReason::BirthdayExclusion { state } => format!("Birthday exclusion window for {state}"),
            SkipReason::EffectiveDateExclusion { state } => format!("Effective date exclusion for {state}"),
            SkipReason::YearRoundExclusion { state } => format!("Year-round exclusion for {state}"),
            SkipReason::BelowMinimumElapsedMonths => "below minimum elapsed months".to_string(),
            SkipReason::FailedUnderwriting => "failed underwriting".to_string(),
            SkipReason::FrequencyLimitExceeded => "frequency limit exceeded".to_string(),
            SkipReason::CampaignPriorityConflict { retained } => {
                format!("campaign priority conflict with {retained}")
            }
            SkipReason::DailyCapExceeded => "daily cap exceeded".to_string(),
        }
    }

    /// True for the three exclusion-window reasons the post-window
    /// generator (C9) reacts to.
    pub fn is_exclusion_window(&self) -> bool {
        matches!(
            self,
            SkipReason::BirthdayExclusion { .. }
                | SkipReason::EffectiveDateExclusion { .. }
                | SkipReason::YearRoundExclusion { .. }
        )
    }
}

/// Default send time, 08:30 local (spec §3, §6). Treated as an opaque
/// string; the organization's time zone is not interpreted by the engine.
pub const DEFAULT_SEND_TIME: &str = "08:30:00";

/// A single produced schedule record (spec §3). Uniqueness key:
/// `(contact_id, email_type, scheduled_date)`.
#[derive(Debug, Clone)]
pub struct ScheduleRecord {
    pub contact_id: i64,
    pub email_type: EmailType,
    pub scheduled_date: Date,
    pub scheduled_time: String,
    pub status: ScheduleStatus,
    pub priority: i32,
    pub campaign_instance_id: Option<i64>,
    pub template_id: Option<String>,
    pub skip_reason: Option<SkipReason>,
    pub event_year: i32,
    pub event_month: u32,
    pub event_day: u32,
    pub batch_id: String,
    /// For `EmailType::FollowUp` records, the tag of the prior sent email
    /// this follow-up anchors on (spec §4.5's "don't re-derive a
    /// follow-up that's already scheduled" dedup key). `None` for every
    /// other email type.
    pub source_email_type: Option<String>,
    /// Set whenever this record was skipped for an exclusion-window
    /// reason: the anchor and window that excluded it, so the
    /// post-window generator (C9) can place a makeup without
    /// recomputing — and without guessing — the window that produced
    /// the skip (spec §4.9). `None` for every other record.
    pub exclusion_context: Option<ExclusionContext>,
}

impl ScheduleRecord {
    pub fn skip(mut self, reason: SkipReason) -> Self {
        self.status = ScheduleStatus::Skipped;
        self.skip_reason = Some(reason);
        self
    }
}

/// The anchor and window-end that caused an exclusion-window skip (spec
/// §4.2, §4.9). Carried on the skipped `ScheduleRecord` itself rather
/// than recomputed downstream, since the record that skipped a candidate
/// is the only place that knows which anchor (birthday vs. effective
/// date) and which rule actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionContext {
    pub anchor: Date,
    pub window_end: Date,
}

/// Campaign type definition (spec §3).
#[derive(Debug, Clone)]
pub struct CampaignType {
    pub name: String,
    pub priority: i32,
    pub days_before_event: i64,
    pub respects_exclusion_windows: bool,
    pub enable_followups: bool,
    pub spread_evenly: bool,
    pub skip_failed_underwriting: bool,
    pub active: bool,
    pub target_all_contacts: bool,
    /// AEP overrides the global/type-level failed-underwriting exclusion
    /// unconditionally (spec §4.4).
    pub is_aep: bool,
}

/// A scheduled instance of a campaign type (spec §3).
#[derive(Debug, Clone)]
pub struct CampaignInstance {
    pub id: i64,
    pub campaign_type: String,
    pub instance_name: String,
    pub email_template: Option<String>,
    pub active_start_date: Date,
    pub active_end_date: Date,
    pub spread_start_date: Option<Date>,
    pub spread_end_date: Option<Date>,
    pub target_states: TargetList,
    pub target_carriers: TargetList,
    pub active: bool,
}

/// Either `ALL` or an explicit comma list (spec §4.4).
#[derive(Debug, Clone)]
pub enum TargetList {
    All,
    Some(Vec<String>),
}

impl TargetList {
    pub fn parse(raw: &str) -> TargetList {
        if raw.trim().eq_ignore_ascii_case("ALL") {
            TargetList::All
        } else {
            TargetList::Some(raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            TargetList::All => true,
            TargetList::Some(values) => values.iter().any(|v| v.eq_ignore_ascii_case(value)),
        }
    }
}

/// A prior sent email, used by the follow-up derivation (C5) and the
/// frequency limiter (C7). Minimal projection of a stored
/// `ScheduleRecord` plus engagement data.
#[derive(Debug, Clone)]
pub struct PriorEmail {
    pub contact_id: i64,
    pub email_type: EmailType,
    pub sent_date: Date,
    pub status: ScheduleStatus,
    pub engagement: Option<Engagement>,
    pub permits_followup: bool,
}

/// Interaction record classifying how a contact engaged with a prior
/// sent email (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    AnsweredHqYes,
    AnsweredHqNoYes,
    ClickedNoHq,
}

impl Engagement {
    pub fn followup_kind(opt: Option<Engagement>) -> FollowUpKind {
        match opt {
            Some(Engagement::AnsweredHqYes) => FollowUpKind::HQWithYes,
            Some(Engagement::AnsweredHqNoYes) => FollowUpKind::HQNoYes,
            Some(Engagement::ClickedNoHq) => FollowUpKind::ClickedNoHQ,
            None => FollowUpKind::Cold,
        }
    }

    /// Wire representation stored in `email_schedules.engagement`, set by
    /// downstream systems once a contact interacts with a sent email.
    pub fn wire(&self) -> &'static str {
        match self {
            Engagement::AnsweredHqYes => "answered_hq_yes",
            Engagement::AnsweredHqNoYes => "answered_hq_no_yes",
            Engagement::ClickedNoHq => "clicked_no_hq",
        }
    }

    pub fn parse(s: &str) -> Option<Engagement> {
        Some(match s {
            "answered_hq_yes" => Engagement::AnsweredHqYes,
            "answered_hq_no_yes" => Engagement::AnsweredHqNoYes,
            "clicked_no_hq" => Engagement::ClickedNoHq,
            _ => return None,
        })
    }
}

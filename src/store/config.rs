//! Organization configuration reads (spec §6 `organization_config`, §3).

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension};

use crate::config::OrganizationConfig;
use crate::error::EngineError;
use crate::model::Jurisdiction;

/// Loads the `organization_config` row for `org_id`, if present, and
/// layers it over `OrganizationConfig::defaults(org_id, contact_count)`.
/// A missing row is not an error: the organization simply runs on
/// defaults (SPEC_FULL §D).
pub fn load(conn: &Connection, org_id: i64, contact_count: usize) -> Result<OrganizationConfig, EngineError> {
    let mut config = OrganizationConfig::defaults(org_id, contact_count);

    let row = conn
        .query_row(
            "SELECT daily_cap_percentage, ed_soft_percentage, smoothing_window_days, overage_threshold,
                    catch_up_horizon_days, period_days, max_emails_per_period, enable_post_window_emails,
                    exclude_failed_underwriting_global, effective_date_first_email_months, birthday_days_before,
                    effective_date_days_before, followup_lookback_days, followup_delay_days,
                    send_without_zipcode_for_universal, default_pre_buffer_days, state_pre_buffer_overrides,
                    persistence_chunk_size, batch_size
             FROM organization_config WHERE org_id = ?1",
            [org_id],
            |row| {
                Ok((
                    row.get::<_, Option<f64>>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                    row.get::<_, Option<i64>>(7)?,
                    row.get::<_, Option<i64>>(8)?,
                    row.get::<_, Option<i64>>(9)?,
                    row.get::<_, Option<i64>>(10)?,
                    row.get::<_, Option<i64>>(11)?,
                    row.get::<_, Option<i64>>(12)?,
                    row.get::<_, Option<i64>>(13)?,
                    row.get::<_, Option<i64>>(14)?,
                    row.get::<_, Option<i64>>(15)?,
                    row.get::<_, Option<String>>(16)?,
                    row.get::<_, Option<i64>>(17)?,
                    row.get::<_, Option<i64>>(18)?,
                ))
            },
        )
        .optional()?;

    let Some((
        daily_cap_percentage,
        ed_soft_percentage,
        smoothing_window_days,
        overage_threshold,
        catch_up_horizon_days,
        period_days,
        max_emails_per_period,
        enable_post_window_emails,
        exclude_failed_underwriting_global,
        effective_date_first_email_months,
        birthday_days_before,
        effective_date_days_before,
        followup_lookback_days,
        followup_delay_days,
        send_without_zipcode_for_universal,
        default_pre_buffer_days,
        state_pre_buffer_overrides,
        persistence_chunk_size,
        batch_size,
    )) = row
    else {
        return Ok(config);
    };

    if let Some(v) = daily_cap_percentage {
        config.daily_cap_percentage = v;
    }
    if let Some(v) = ed_soft_percentage {
        config.ed_soft_percentage = v;
    }
    if let Some(v) = smoothing_window_days {
        config.smoothing_window_days = v;
    }
    if let Some(v) = overage_threshold {
        config.overage_threshold = v;
    }
    if let Some(v) = catch_up_horizon_days {
        config.catch_up_horizon_days = v;
    }
    if let Some(v) = period_days {
        config.period_days = v;
    }
    if let Some(v) = max_emails_per_period {
        config.max_emails_per_period = v as usize;
    }
    if let Some(v) = enable_post_window_emails {
        config.enable_post_window_emails = v != 0;
    }
    if let Some(v) = exclude_failed_underwriting_global {
        config.exclude_failed_underwriting_global = v != 0;
    }
    if let Some(v) = effective_date_first_email_months {
        config.effective_date_first_email_months = v;
    }
    if let Some(v) = birthday_days_before {
        config.birthday_days_before = v;
    }
    if let Some(v) = effective_date_days_before {
        config.effective_date_days_before = v;
    }
    if let Some(v) = followup_lookback_days {
        config.followup_lookback_days = v;
    }
    if let Some(v) = followup_delay_days {
        config.followup_delay_days = v;
    }
    if let Some(v) = send_without_zipcode_for_universal {
        config.send_without_zipcode_for_universal = v != 0;
    }
    if let Some(v) = default_pre_buffer_days {
        config.default_pre_buffer_days = v;
    }
    if let Some(v) = persistence_chunk_size {
        config.persistence_chunk_size = v as usize;
    }
    if let Some(v) = batch_size {
        config.batch_size = v as usize;
    }
    if let Some(raw) = state_pre_buffer_overrides {
        config.state_pre_buffer_overrides = parse_overrides(&raw);
    }

    Ok(config)
}

/// Parses a JSON object of state-code -> override-days, e.g.
/// `{"CA": 45, "NV": 30}`. Unknown keys fall back to `Jurisdiction::Other`
/// and are silently merged (last write wins), matching the lenient
/// parsing `Jurisdiction::parse` already does elsewhere.
fn parse_overrides(raw: &str) -> HashMap<Jurisdiction, i64> {
    let parsed: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return HashMap::new(),
    };
    let Some(obj) = parsed.as_object() else { return HashMap::new() };

    obj.iter()
        .filter_map(|(k, v)| v.as_i64().map(|days| (Jurisdiction::parse(k), days)))
        .collect()
}

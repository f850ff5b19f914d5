//! Campaign type/instance reads and lifecycle-state writes (spec §6
//! `campaign_types` / `campaign_instances`).

use rusqlite::Connection;

use crate::date::Date;
use crate::error::EngineError;
use crate::model::{CampaignInstance, CampaignType, TargetList};

pub fn load_types(conn: &Connection) -> Result<Vec<CampaignType>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT name, priority, days_before_event, respect_exclusion_windows, enable_followups,
                spread_evenly, skip_failed_underwriting, active, target_all_contacts, is_aep
         FROM campaign_types",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CampaignType {
            name: row.get(0)?,
            priority: row.get(1)?,
            days_before_event: row.get(2)?,
            respects_exclusion_windows: row.get::<_, i64>(3)? != 0,
            enable_followups: row.get::<_, i64>(4)? != 0,
            spread_evenly: row.get::<_, i64>(5)? != 0,
            skip_failed_underwriting: row.get::<_, i64>(6)? != 0,
            active: row.get::<_, i64>(7)? != 0,
            target_all_contacts: row.get::<_, i64>(8)? != 0,
            is_aep: row.get::<_, i64>(9)? != 0,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn load_instances(conn: &Connection) -> Result<Vec<CampaignInstance>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_type, instance_name, email_template, active_start_date, active_end_date,
                spread_start_date, spread_end_date, target_states, target_carriers, active
         FROM campaign_instances",
    )?;
    let rows = stmt.query_map([], |row| {
        let active_start: String = row.get(4)?;
        let active_end: String = row.get(5)?;
        let spread_start: Option<String> = row.get(6)?;
        let spread_end: Option<String> = row.get(7)?;
        let target_states: String = row.get(8)?;
        let target_carriers: String = row.get(9)?;
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            active_start,
            active_end,
            spread_start,
            spread_end,
            target_states,
            target_carriers,
            row.get::<_, i64>(10)? != 0,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, campaign_type, instance_name, email_template, start, end, spread_start, spread_end, states, carriers, active) =
            row?;
        out.push(CampaignInstance {
            id,
            campaign_type,
            instance_name,
            email_template,
            active_start_date: Date::parse_iso(&start)
                .map_err(|e| EngineError::Internal(format!("campaign_instances.{id}.active_start_date: {e}")))?,
            active_end_date: Date::parse_iso(&end)
                .map_err(|e| EngineError::Internal(format!("campaign_instances.{id}.active_end_date: {e}")))?,
            spread_start_date: spread_start.as_deref().map(Date::parse_iso).transpose().map_err(|e| {
                EngineError::Internal(format!("campaign_instances.{id}.spread_start_date: {e}"))
            })?,
            spread_end_date: spread_end
                .as_deref()
                .map(Date::parse_iso)
                .transpose()
                .map_err(|e| EngineError::Internal(format!("campaign_instances.{id}.spread_end_date: {e}")))?,
            target_states: TargetList::parse(&states),
            target_carriers: TargetList::parse(&carriers),
            active,
        });
    }
    Ok(out)
}

/// Persists the `active` flag transitions decided by the Lifecycle
/// Manager (C6), and records each transition plus a timestamp into
/// `campaign_instances.metadata` (spec §4.6: "record the transition in
/// instance metadata with a timestamp").
pub fn write_active_flags(
    tx: &rusqlite::Transaction,
    transitions: &[(i64, crate::lifecycle::Transition)],
) -> Result<(), EngineError> {
    let now = chrono::Utc::now().to_rfc3339();
    for (instance_id, transition) in transitions {
        let active = matches!(transition, crate::lifecycle::Transition::Activated);
        let transition_name = match transition {
            crate::lifecycle::Transition::Activated => "activated",
            crate::lifecycle::Transition::Deactivated => "deactivated",
        };
        let metadata = serde_json::json!({
            "last_transition": transition_name,
            "transitioned_at": now,
        })
        .to_string();
        tx.execute(
            "UPDATE campaign_instances SET active = ?1, metadata = ?2 WHERE id = ?3",
            rusqlite::params![active as i64, metadata, instance_id],
        )?;
    }
    Ok(())
}

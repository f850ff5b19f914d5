//! Contact reads (spec §6 `contacts` table).

use rusqlite::Connection;

use crate::date::Date;
use crate::error::EngineError;
use crate::model::{Contact, Jurisdiction};

/// Loads every contact row. A single bad row (unparseable date) is
/// isolated as a `ContactError` by the caller, not here — this function
/// only deals with store-level failure (spec §7: derivation errors are
/// attached to a contact id and isolated).
pub fn load_all(conn: &Connection) -> Result<Vec<Result<Contact, crate::error::ContactError>>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, birth_date, effective_date, state, zip_code, carrier, failed_underwriting FROM contacts",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, i64>(7)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, email, birth_date, effective_date, state, zip_code, carrier, failed_underwriting) = row?;
        out.push(parse_contact(id, email, birth_date, effective_date, state, zip_code, carrier, failed_underwriting));
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn parse_contact(
    id: i64,
    email: String,
    birth_date: Option<String>,
    effective_date: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    carrier: Option<String>,
    failed_underwriting: i64,
) -> Result<Contact, crate::error::ContactError> {
    let birth_date = birth_date
        .as_deref()
        .map(Date::parse_iso)
        .transpose()
        .map_err(|e| crate::error::ContactError::InvalidDate { contact_id: id, reason: e.to_string() })?;
    let effective_date = effective_date
        .as_deref()
        .map(Date::parse_iso)
        .transpose()
        .map_err(|e| crate::error::ContactError::InvalidDate { contact_id: id, reason: e.to_string() })?;

    Ok(Contact {
        id,
        email,
        zip_code,
        jurisdiction: state.as_deref().map(Jurisdiction::parse),
        birth_date,
        effective_date,
        carrier,
        failed_underwriting: failed_underwriting != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn loads_valid_contact() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO contacts (id, email, birth_date, state, zip_code, failed_underwriting)
                 VALUES (1, 'a@example.com', '1955-03-15', 'CA', '90210', 0)",
                [],
            )
            .unwrap();

        let loaded = load_all(store.conn()).unwrap();
        assert_eq!(loaded.len(), 1);
        let contact = loaded[0].clone().unwrap();
        assert_eq!(contact.jurisdiction, Some(Jurisdiction::CA));
        assert_eq!(contact.birth_date, Some(Date::new(1955, 3, 15).unwrap()));
    }

    #[test]
    fn invalid_date_isolated_as_contact_error() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO contacts (id, email, birth_date, failed_underwriting) VALUES (2, 'b@example.com', 'not-a-date', 0)",
                [],
            )
            .unwrap();

        let loaded = load_all(store.conn()).unwrap();
        assert!(loaded[0].is_err());
    }
}

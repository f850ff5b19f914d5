//! Per-contact-batch candidate derivation (C3-C5). Pure functions of
//! (contact, rules, config) — safe to call from multiple threads without
//! locking (§5).

pub mod anniversary;
pub mod campaign;
pub mod followup;

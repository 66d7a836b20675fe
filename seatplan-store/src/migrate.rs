//! Schema upgrades applied to raw snapshot JSON before it is deserialized.
//!
//! Payloads written before versioning carry no `schemaVersion` field and are
//! treated as version 0.

use serde_json::{Map, Value};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_VERSION_FIELD: &str = "schemaVersion";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot is not a JSON object")]
    NotAnObject,

    #[error("schemaVersion is not a non-negative integer")]
    InvalidVersion,

    #[error("schema version {0} is newer than supported version {max}", max = CURRENT_SCHEMA_VERSION)]
    Unsupported(u64),
}

/// Version recorded in the payload.
pub fn schema_version(value: &Value) -> Result<u64, MigrationError> {
    let object = value.as_object().ok_or(MigrationError::NotAnObject)?;
    match object.get(SCHEMA_VERSION_FIELD) {
        None => Ok(0),
        Some(v) => v.as_u64().ok_or(MigrationError::InvalidVersion),
    }
}

/// Bring a seating payload up to [`CURRENT_SCHEMA_VERSION`].
pub fn migrate_seating(value: &mut Value) -> Result<(), MigrationError> {
    let version = check_version(value)?;
    if version < 1 {
        seating_v0_to_v1(object_mut(value)?);
    }
    Ok(())
}

/// Bring a lodging payload up to [`CURRENT_SCHEMA_VERSION`].
pub fn migrate_lodging(value: &mut Value) -> Result<(), MigrationError> {
    let version = check_version(value)?;
    if version < 1 {
        lodging_v0_to_v1(object_mut(value)?);
    }
    Ok(())
}

fn check_version(value: &Value) -> Result<u64, MigrationError> {
    let version = schema_version(value)?;
    if version > u64::from(CURRENT_SCHEMA_VERSION) {
        return Err(MigrationError::Unsupported(version));
    }
    Ok(version)
}

fn object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, MigrationError> {
    value.as_object_mut().ok_or(MigrationError::NotAnObject)
}

// Legacy clients wrote "" for an empty seat.
fn seating_v0_to_v1(object: &mut Map<String, Value>) {
    if let Some(Value::Array(tables)) = object.get_mut("tables") {
        for table in tables {
            let Some(Value::Array(seats)) = table.get_mut("seats") else {
                continue;
            };
            for seat in seats {
                if let Some(guest_id) = seat.get_mut("guestId") {
                    if guest_id.as_str() == Some("") {
                        *guest_id = Value::Null;
                    }
                }
            }
        }
    }
    object.insert(SCHEMA_VERSION_FIELD.to_string(), Value::from(1));
}

// Legacy saves could omit the assignment list entirely.
fn lodging_v0_to_v1(object: &mut Map<String, Value>) {
    object
        .entry("assignments")
        .or_insert_with(|| Value::Array(Vec::new()));
    object.insert(SCHEMA_VERSION_FIELD.to_string(), Value::from(1));
}

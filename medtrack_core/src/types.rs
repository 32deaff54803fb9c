//! Core domain types for the medication tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medications and their frequency rules
//! - Doses, per-medication dose records and per-day entries
//! - The per-user data snapshot served by the API
//! - Request and response payloads of the HTTP API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{Error, Result};

// ============================================================================
// Medication Types
// ============================================================================

/// How often a medication is scheduled
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    #[default]
    Daily,
    EveryOtherDay,
    Weekly,
}

/// A tracked medication
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub name: String,
    #[serde(default = "default_times_per_day")]
    pub times_per_day: u32,
    #[serde(default)]
    pub frequency: Frequency,
    /// Weekday indices, 0 = Sunday through 6 = Saturday. Only consulted for weekly medications.
    #[serde(default, with = "weekday_indices")]
    pub days_of_week: BTreeSet<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_times_per_day() -> u32 {
    1
}

impl Medication {
    /// Check the fields a client must get right before a medication is saved
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("medication id must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("medication name must not be empty".into()));
        }
        if self.times_per_day < 1 {
            return Err(Error::InvalidInput("timesPerDay must be at least 1".into()));
        }
        if self.times_per_day as usize > MAX_DOSES_PER_DAY {
            return Err(Error::InvalidInput(format!(
                "timesPerDay must be at most {}",
                MAX_DOSES_PER_DAY
            )));
        }
        if self.frequency == Frequency::Weekly && self.days_of_week.is_empty() {
            return Err(Error::InvalidInput(
                "weekly medications need at least one day of the week".into(),
            ));
        }
        Ok(())
    }
}

/// Serde adapter for weekday sets.
///
/// Serialized as an array of strings (`["1","3"]`); numbers are accepted on input.
mod weekday_indices {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeSet;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawIndex {
        Number(u8),
        Text(String),
    }

    pub fn serialize<S: Serializer>(days: &BTreeSet<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(days.iter().map(|d| d.to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<u8>, D::Error> {
        let raw = Option::<Vec<RawIndex>>::deserialize(deserializer)?.unwrap_or_default();
        raw.into_iter()
            .map(|index| {
                let day = match index {
                    RawIndex::Number(n) => n,
                    RawIndex::Text(text) => text.trim().parse::<u8>().map_err(D::Error::custom)?,
                };
                if day > 6 {
                    return Err(D::Error::custom(format!("weekday index {} out of range 0-6", day)));
                }
                Ok(day)
            })
            .collect()
    }
}

// ============================================================================
// Dose and Entry Types
// ============================================================================

/// One recorded yes/no answer for a scheduled dose
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dose {
    pub taken: bool,
    /// ISO-8601 timestamp, kept exactly as supplied
    pub timestamp: String,
}

/// Upper bound on dose slots per medication and day, and so on `timesPerDay`
pub const MAX_DOSES_PER_DAY: usize = 64;

/// Reject dose indices past [`MAX_DOSES_PER_DAY`]
pub fn check_dose_index(index: usize) -> Result<usize> {
    if index >= MAX_DOSES_PER_DAY {
        return Err(Error::InvalidInput(format!(
            "doseIndex {} out of range 0-{}",
            index,
            MAX_DOSES_PER_DAY - 1
        )));
    }
    Ok(index)
}

/// The doses recorded for one medication on one day.
///
/// Slots are indexed by dose number. Writing slot `i` into a shorter list pads
/// the gap with nulls, so the list is never shorter than the highest touched
/// index + 1. Cleared slots stay in place as nulls.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoseRecord {
    #[serde(default)]
    pub doses: Vec<Option<Dose>>,
}

impl DoseRecord {
    pub fn get(&self, index: usize) -> Option<&Dose> {
        self.doses.get(index).and_then(Option::as_ref)
    }

    pub fn set(&mut self, index: usize, dose: Dose) -> Result<()> {
        let len = check_dose_index(index)?
            .checked_add(1)
            .ok_or_else(|| Error::InvalidInput(format!("doseIndex {} out of range", index)))?;
        if self.doses.len() < len {
            self.doses.resize(len, None);
        }
        self.doses[index] = Some(dose);
        Ok(())
    }

    /// Null out a slot, returning what was there
    pub fn clear(&mut self, index: usize) -> Option<Dose> {
        self.doses.get_mut(index).and_then(Option::take)
    }

    /// True when no slot holds a dose
    pub fn is_empty(&self) -> bool {
        self.doses.iter().all(Option::is_none)
    }

    /// Non-null doses with their slot index
    pub fn recorded(&self) -> impl Iterator<Item = (usize, &Dose)> {
        self.doses
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.as_ref().map(|d| (i, d)))
    }
}

/// Everything recorded on one date, keyed by medication id
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DayEntry(pub BTreeMap<String, DoseRecord>);

impl DayEntry {
    pub fn get(&self, medication_id: &str) -> Option<&DoseRecord> {
        self.0.get(medication_id)
    }

    pub fn dose(&self, medication_id: &str, index: usize) -> Option<&Dose> {
        self.get(medication_id).and_then(|r| r.get(index))
    }

    /// Fails with `InvalidInput` when `index` is past [`MAX_DOSES_PER_DAY`]; the entry is left as it was
    pub fn record_dose(&mut self, medication_id: &str, index: usize, dose: Dose) -> Result<()> {
        check_dose_index(index)?;
        self.0
            .entry(medication_id.to_string())
            .or_default()
            .set(index, dose)
    }

    /// Replace the timestamp of an existing dose
    pub fn set_timestamp(&mut self, medication_id: &str, index: usize, timestamp: &str) -> Result<&Dose> {
        let record = self.0.get_mut(medication_id).ok_or_else(|| {
            Error::NotFound(format!("no doses recorded for medication {}", medication_id))
        })?;
        let dose = record
            .doses
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "dose {} of medication {} is not recorded",
                    index, medication_id
                ))
            })?;
        dose.timestamp = timestamp.to_string();
        Ok(dose)
    }

    /// Null out a dose slot and drop the medication once none of its slots are set
    pub fn clear_dose(&mut self, medication_id: &str, index: usize) -> Option<Dose> {
        let record = self.0.get_mut(medication_id)?;
        let cleared = record.clear(index);
        if record.is_empty() {
            self.0.remove(medication_id);
        }
        cleared
    }

    /// True when no medication has a recorded dose
    pub fn is_empty(&self) -> bool {
        self.0.values().all(DoseRecord::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DoseRecord)> {
        self.0.iter()
    }
}

/// All day entries of a user, keyed by date
pub type Entries = BTreeMap<NaiveDate, DayEntry>;

/// Everything stored for one user.
///
/// The server keeps medications as the JSON a client sent (`UserData<Value>`)
/// so they read back unchanged; clients work with the parsed form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(bound(deserialize = "M: Deserialize<'de>"))]
pub struct UserData<M = Medication> {
    #[serde(default)]
    pub medications: Vec<M>,
    #[serde(default)]
    pub entries: Entries,
}

impl<M> Default for UserData<M> {
    fn default() -> Self {
        Self {
            medications: Vec::new(),
            entries: Entries::new(),
        }
    }
}

// ============================================================================
// API Payloads
// ============================================================================

/// Body of `POST /api/medications`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveMedicationsRequest<M = Medication> {
    pub medications: Vec<M>,
}

/// Body of `POST /api/entry`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDoseRequest {
    pub date: Option<NaiveDate>,
    pub medication_id: Option<String>,
    pub taken: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_index: Option<usize>,
}

/// Body of `PUT /api/entry`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDoseRequest {
    pub date: Option<NaiveDate>,
    pub medication_id: Option<String>,
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_index: Option<usize>,
}

/// Body of `DELETE /api/entry`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearDoseRequest {
    pub date: Option<NaiveDate>,
    pub medication_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_index: Option<usize>,
}

/// `{success}` acknowledgement
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Response of `POST /api/medications`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MedicationsResponse<M = Medication> {
    pub success: bool,
    pub medications: Vec<M>,
}

/// Response of `POST`/`PUT /api/entry`; `entry` is the updated day
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntryResponse {
    pub success: bool,
    pub entry: DayEntry,
}

/// `{error}` body returned with every 4xx/5xx
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

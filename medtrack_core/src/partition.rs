//! Per-user view of the key-value store.
//!
//! Each HTTP verb of the API maps onto one method here. The partition holds
//! no state of its own: every call reads what it needs from the store,
//! mutates it and writes it back. The read-modify-write is not atomic, so two
//! writers racing on the same date key end with last-write-wins.

use crate::store::{entries_key, entries_prefix, medications_key, parse_entries_key, KvStore};
use crate::types::check_dose_index;
use crate::{
    ClearDoseRequest, DayEntry, Dose, Entries, Error, Medication, RecordDoseRequest, Result,
    UpdateDoseRequest, UserData,
};
use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

/// The slice of the store owned by one user id
pub struct UserPartition<'a, S: KvStore + ?Sized> {
    store: &'a S,
    user_id: &'a str,
}

impl<'a, S: KvStore + ?Sized> UserPartition<'a, S> {
    pub fn new(store: &'a S, user_id: &'a str) -> Self {
        Self { store, user_id }
    }

    pub fn user_id(&self) -> &str {
        self.user_id
    }

    /// Medications plus every stored day, parsed for the client
    pub fn load(&self) -> Result<UserData> {
        let stored = self.load_stored()?;
        let medications = stored
            .medications
            .into_iter()
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| Error::Store(format!("stored medication unreadable: {}", e)))
            })
            .collect::<Result<Vec<Medication>>>()?;
        Ok(UserData {
            medications,
            entries: stored.entries,
        })
    }

    /// `GET /data`: medications exactly as last saved plus every stored day.
    /// Missing keys read as empty.
    pub fn load_stored(&self) -> Result<UserData<Value>> {
        let medications = self.medications()?;

        let mut entries = Entries::new();
        for key in self.store.list(&entries_prefix(self.user_id))? {
            let Some(date) = parse_entries_key(self.user_id, &key) else {
                tracing::warn!("Ignoring entries key with unparseable date: {}", key);
                continue;
            };
            match self.day(date) {
                Ok(Some(day)) if !day.is_empty() => {
                    entries.insert(date, day);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable entry {}: {}", key, e),
            }
        }

        tracing::debug!(
            user = self.user_id,
            medications = medications.len(),
            days = entries.len(),
            "Loaded user data"
        );
        Ok(UserData {
            medications,
            entries,
        })
    }

    /// Replace the list wholesale
    pub fn save_medications(&self, medications: &[Medication]) -> Result<()> {
        self.put_medications(medications)
    }

    /// `POST /medications`: keep the array exactly as sent, once every element
    /// reads as a medication
    pub fn save_medications_json(&self, medications: &[Value]) -> Result<()> {
        for (i, value) in medications.iter().enumerate() {
            Medication::deserialize(value)
                .map_err(|e| Error::InvalidInput(format!("medications[{}]: {}", i, e)))?;
        }
        self.put_medications(medications)
    }

    /// `DELETE /medication/{id}`: drop from the list, leave entry history alone
    pub fn delete_medication(&self, medication_id: &str) -> Result<()> {
        let mut medications = self.medications()?;
        let before = medications.len();
        medications.retain(|m| m.get("id").and_then(Value::as_str) != Some(medication_id));
        if medications.len() == before {
            tracing::debug!(user = self.user_id, medication_id, "Medication already absent");
            return Ok(());
        }
        self.put_medications(&medications)
    }

    /// `POST /entry`: set one dose slot, growing the list with nulls as needed
    pub fn record_dose(&self, req: &RecordDoseRequest) -> Result<DayEntry> {
        let (Some(date), Some(medication_id), Some(taken)) =
            (req.date, req.medication_id.as_deref(), req.taken)
        else {
            return Err(Error::InvalidInput(
                "date, medicationId and taken are required".into(),
            ));
        };
        let dose_index = check_dose_index(req.dose_index.unwrap_or(0))?;
        let timestamp = req.timestamp.clone().unwrap_or_else(now_timestamp);

        let mut day = self.day(date)?.unwrap_or_default();
        day.record_dose(medication_id, dose_index, Dose { taken, timestamp })?;
        self.put_day(date, &day)?;

        tracing::info!(
            user = self.user_id,
            %date,
            medication_id,
            dose_index,
            taken,
            "Recorded dose"
        );
        Ok(day)
    }

    /// `PUT /entry`: change the timestamp of a dose that already exists
    pub fn update_dose(&self, req: &UpdateDoseRequest) -> Result<DayEntry> {
        let (Some(date), Some(medication_id), Some(timestamp)) = (
            req.date,
            req.medication_id.as_deref(),
            req.timestamp.as_deref(),
        ) else {
            return Err(Error::InvalidInput(
                "date, medicationId and timestamp are required".into(),
            ));
        };
        let dose_index = check_dose_index(req.dose_index.unwrap_or(0))?;

        let mut day = self
            .day(date)?
            .ok_or_else(|| Error::NotFound(format!("no entry for {}", date)))?;
        day.set_timestamp(medication_id, dose_index, timestamp)?;
        self.put_day(date, &day)?;

        tracing::info!(user = self.user_id, %date, medication_id, dose_index, "Updated dose time");
        Ok(day)
    }

    /// `DELETE /entry`: null a slot and delete whatever becomes empty. Idempotent.
    pub fn clear_dose(&self, req: &ClearDoseRequest) -> Result<()> {
        let (Some(date), Some(medication_id)) = (req.date, req.medication_id.as_deref()) else {
            return Err(Error::InvalidInput("date and medicationId are required".into()));
        };
        let dose_index = check_dose_index(req.dose_index.unwrap_or(0))?;

        let Some(mut day) = self.day(date)? else {
            return Ok(());
        };
        day.clear_dose(medication_id, dose_index);

        if day.is_empty() {
            self.store.delete(&entries_key(self.user_id, date))?;
            tracing::info!(user = self.user_id, %date, "Removed empty day");
        } else {
            self.put_day(date, &day)?;
        }
        tracing::info!(user = self.user_id, %date, medication_id, dose_index, "Cleared dose");
        Ok(())
    }

    fn put_medications<M: serde::Serialize>(&self, medications: &[M]) -> Result<()> {
        let json = serde_json::to_string(medications)?;
        self.store.put(&medications_key(self.user_id), &json)?;
        tracing::info!(user = self.user_id, count = medications.len(), "Saved medications");
        Ok(())
    }

    fn medications(&self) -> Result<Vec<Value>> {
        match self.store.get(&medications_key(self.user_id))? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| Error::Store(format!("stored medications unreadable: {}", e))),
            None => Ok(Vec::new()),
        }
    }

    fn day(&self, date: NaiveDate) -> Result<Option<DayEntry>> {
        match self.store.get(&entries_key(self.user_id, date))? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| Error::Store(format!("stored entry for {} unreadable: {}", date, e))),
            None => Ok(None),
        }
    }

    fn put_day(&self, date: NaiveDate, day: &DayEntry) -> Result<()> {
        let json = serde_json::to_string(day)?;
        self.store.put(&entries_key(self.user_id, date), &json)
    }
}

/// Current time in the ISO-8601 form browsers produce
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

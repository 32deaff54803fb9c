//! Client-side state manager.
//!
//! Every mutation follows the same pattern:
//! 1. Apply it to the local [`TrackerState`], keeping an [`Undo`] token
//! 2. Send it to the [`Remote`]
//! 3. On failure, revert exactly that change and hand back the error,
//!    whose [`Error::user_message`] is what the user should see
//!
//! There is no retry. The state functions are plain methods on
//! [`TrackerState`] so they can be tested without any remote.

use crate::partition::now_timestamp;
use crate::remote::Remote;
use crate::schedule::{day_status, MedicationDayStatus};
use crate::types::check_dose_index;
use crate::{
    ClearDoseRequest, DayEntry, Dose, Entries, Error, Medication, RecordDoseRequest, Result,
    UpdateDoseRequest, UserData,
};
use chrono::NaiveDate;

/// Local copy of one user's medications and entries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerState {
    pub medications: Vec<Medication>,
    pub entries: Entries,
}

impl From<UserData> for TrackerState {
    fn from(data: UserData) -> Self {
        Self {
            medications: data.medications,
            entries: data.entries,
        }
    }
}

/// What a mutation overwrote, so it can be put back
#[derive(Clone, Debug)]
#[must_use]
pub enum Undo {
    Medications(Vec<Medication>),
    Day {
        date: NaiveDate,
        previous: Option<DayEntry>,
    },
}

impl TrackerState {
    pub fn medication(&self, id: &str) -> Option<&Medication> {
        self.medications.iter().find(|m| m.id == id)
    }

    /// Look a medication up by id, falling back to a case-insensitive name match
    pub fn find_medication(&self, query: &str) -> Option<&Medication> {
        self.medication(query).or_else(|| {
            self.medications
                .iter()
                .find(|m| m.name.eq_ignore_ascii_case(query))
        })
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayEntry> {
        self.entries.get(&date)
    }

    /// Scheduled medications on `date` with the status of each slot
    pub fn day_status(&self, date: NaiveDate) -> Vec<MedicationDayStatus> {
        day_status(&self.medications, self.day(date), date)
    }

    pub fn add_medication(&mut self, medication: Medication) -> Undo {
        let undo = Undo::Medications(self.medications.clone());
        self.medications.push(medication);
        undo
    }

    /// Drop a medication from the list. Its entry history stays.
    pub fn remove_medication(&mut self, medication_id: &str) -> Undo {
        let undo = Undo::Medications(self.medications.clone());
        self.medications.retain(|m| m.id != medication_id);
        undo
    }

    /// Fill a dose slot; an out-of-range index leaves the state untouched
    pub fn set_dose(
        &mut self,
        date: NaiveDate,
        medication_id: &str,
        index: usize,
        dose: Dose,
    ) -> Result<Undo> {
        check_dose_index(index)?;
        let undo = self.snapshot_day(date);
        self.entries
            .entry(date)
            .or_default()
            .record_dose(medication_id, index, dose)?;
        Ok(undo)
    }

    /// Change the timestamp of an existing dose; `NotFound` leaves the state untouched
    pub fn set_dose_time(
        &mut self,
        date: NaiveDate,
        medication_id: &str,
        index: usize,
        timestamp: &str,
    ) -> Result<Undo> {
        let undo = self.snapshot_day(date);
        let day = self
            .entries
            .get_mut(&date)
            .ok_or_else(|| Error::NotFound(format!("no entry for {}", date)))?;
        day.set_timestamp(medication_id, index, timestamp)?;
        Ok(undo)
    }

    /// Null a slot, dropping the medication and then the day once they are empty
    pub fn clear_dose(&mut self, date: NaiveDate, medication_id: &str, index: usize) -> Undo {
        let undo = self.snapshot_day(date);
        if let Some(day) = self.entries.get_mut(&date) {
            day.clear_dose(medication_id, index);
            if day.is_empty() {
                self.entries.remove(&date);
            }
        }
        undo
    }

    pub fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::Medications(previous) => self.medications = previous,
            Undo::Day {
                date,
                previous: Some(day),
            } => {
                self.entries.insert(date, day);
            }
            Undo::Day {
                date,
                previous: None,
            } => {
                self.entries.remove(&date);
            }
        }
    }

    fn snapshot_day(&self, date: NaiveDate) -> Undo {
        Undo::Day {
            date,
            previous: self.entries.get(&date).cloned(),
        }
    }
}

/// Optimistic state manager bound to a remote
pub struct Tracker<R: Remote> {
    state: TrackerState,
    remote: R,
}

impl<R: Remote> Tracker<R> {
    pub fn new(state: TrackerState, remote: R) -> Self {
        Self { state, remote }
    }

    /// Seed the state from the remote
    pub fn load(remote: R) -> Result<Self> {
        let data = remote.fetch_data()?;
        tracing::debug!(
            "Loaded {} medications and {} days",
            data.medications.len(),
            data.entries.len()
        );
        Ok(Self::new(data.into(), remote))
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn add_medication(&mut self, medication: Medication) -> Result<()> {
        medication.validate()?;
        if self.state.medication(&medication.id).is_some() {
            return Err(Error::InvalidInput(format!(
                "a medication with id {} already exists",
                medication.id
            )));
        }

        let undo = self.state.add_medication(medication);
        let result = self.remote.save_medications(&self.state.medications);
        self.settle(undo, result)
    }

    pub fn delete_medication(&mut self, medication_id: &str) -> Result<()> {
        let undo = self.state.remove_medication(medication_id);
        let result = self.remote.delete_medication(medication_id);
        self.settle(undo, result)
    }

    /// Answer a dose slot yes or no, stamped with the current time
    pub fn record_dose(
        &mut self,
        date: NaiveDate,
        medication_id: &str,
        index: usize,
        taken: bool,
    ) -> Result<Dose> {
        let dose = Dose {
            taken,
            timestamp: now_timestamp(),
        };
        self.record_dose_at(date, medication_id, index, dose.clone())?;
        Ok(dose)
    }

    pub fn record_dose_at(
        &mut self,
        date: NaiveDate,
        medication_id: &str,
        index: usize,
        dose: Dose,
    ) -> Result<()> {
        let req = RecordDoseRequest {
            date: Some(date),
            medication_id: Some(medication_id.to_string()),
            taken: Some(dose.taken),
            timestamp: Some(dose.timestamp.clone()),
            dose_index: Some(index),
        };

        let undo = self.state.set_dose(date, medication_id, index, dose)?;
        let result = self.remote.record_dose(&req);
        let day = self.settle(undo, result)?;
        self.adopt_day(date, day);
        Ok(())
    }

    /// Change when an existing dose happened. Fails locally if there is no dose.
    pub fn edit_dose_time(
        &mut self,
        date: NaiveDate,
        medication_id: &str,
        index: usize,
        timestamp: &str,
    ) -> Result<()> {
        let undo = self.state.set_dose_time(date, medication_id, index, timestamp)?;
        let req = UpdateDoseRequest {
            date: Some(date),
            medication_id: Some(medication_id.to_string()),
            timestamp: Some(timestamp.to_string()),
            dose_index: Some(index),
        };
        let result = self.remote.update_dose(&req);
        let day = self.settle(undo, result)?;
        self.adopt_day(date, day);
        Ok(())
    }

    pub fn clear_dose(&mut self, date: NaiveDate, medication_id: &str, index: usize) -> Result<()> {
        check_dose_index(index)?;
        let undo = self.state.clear_dose(date, medication_id, index);
        let req = ClearDoseRequest {
            date: Some(date),
            medication_id: Some(medication_id.to_string()),
            dose_index: Some(index),
        };
        let result = self.remote.clear_dose(&req);
        self.settle(undo, result)
    }

    fn settle<T>(&mut self, undo: Undo, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            tracing::warn!("Remote update failed, rolling back: {}", e);
            self.state.revert(undo);
            e
        })
    }

    /// Take the server's copy of a day it just wrote
    fn adopt_day(&mut self, date: NaiveDate, day: DayEntry) {
        if day.is_empty() {
            self.state.entries.remove(&date);
        } else {
            self.state.entries.insert(date, day);
        }
    }
}

//! The remote side of the tracker as seen by the client.
//!
//! [`Remote`] abstracts over where the key-value API lives: over HTTP
//! ([`crate::http_remote::HttpRemote`]) or in-process against a store
//! ([`LocalRemote`]).

use crate::partition::UserPartition;
use crate::store::KvStore;
use crate::{
    ClearDoseRequest, DayEntry, Medication, RecordDoseRequest, Result, UpdateDoseRequest,
    UserData,
};

/// Operations the client state manager needs from the API
pub trait Remote {
    fn fetch_data(&self) -> Result<UserData>;
    fn save_medications(&self, medications: &[Medication]) -> Result<()>;
    fn delete_medication(&self, medication_id: &str) -> Result<()>;
    fn record_dose(&self, req: &RecordDoseRequest) -> Result<DayEntry>;
    fn update_dose(&self, req: &UpdateDoseRequest) -> Result<DayEntry>;
    fn clear_dose(&self, req: &ClearDoseRequest) -> Result<()>;
}

impl<R: Remote + ?Sized> Remote for &R {
    fn fetch_data(&self) -> Result<UserData> {
        (**self).fetch_data()
    }

    fn save_medications(&self, medications: &[Medication]) -> Result<()> {
        (**self).save_medications(medications)
    }

    fn delete_medication(&self, medication_id: &str) -> Result<()> {
        (**self).delete_medication(medication_id)
    }

    fn record_dose(&self, req: &RecordDoseRequest) -> Result<DayEntry> {
        (**self).record_dose(req)
    }

    fn update_dose(&self, req: &UpdateDoseRequest) -> Result<DayEntry> {
        (**self).update_dose(req)
    }

    fn clear_dose(&self, req: &ClearDoseRequest) -> Result<()> {
        (**self).clear_dose(req)
    }
}

/// Talks to a store directly, without HTTP in between
pub struct LocalRemote<S: KvStore> {
    store: S,
    user_id: String,
}

impl<S: KvStore> LocalRemote<S> {
    pub fn new(store: S, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }

    fn partition(&self) -> UserPartition<'_, S> {
        UserPartition::new(&self.store, &self.user_id)
    }
}

impl<S: KvStore> Remote for LocalRemote<S> {
    fn fetch_data(&self) -> Result<UserData> {
        self.partition().load()
    }

    fn save_medications(&self, medications: &[Medication]) -> Result<()> {
        self.partition().save_medications(medications)
    }

    fn delete_medication(&self, medication_id: &str) -> Result<()> {
        self.partition().delete_medication(medication_id)
    }

    fn record_dose(&self, req: &RecordDoseRequest) -> Result<DayEntry> {
        self.partition().record_dose(req)
    }

    fn update_dose(&self, req: &UpdateDoseRequest) -> Result<DayEntry> {
        self.partition().update_dose(req)
    }

    fn clear_dose(&self, req: &ClearDoseRequest) -> Result<()> {
        self.partition().clear_dose(req)
    }
}

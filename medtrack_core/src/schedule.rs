//! Frequency rules and the per-day status view.

use crate::{DayEntry, Frequency, Medication};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Whether `medication` is due on `date`
///
/// - daily: always
/// - every-other-day: when the day of the month is even
/// - weekly: when the weekday (0 = Sunday) is one of `days_of_week`
pub fn should_track(medication: &Medication, date: NaiveDate) -> bool {
    match medication.frequency {
        Frequency::Daily => true,
        Frequency::EveryOtherDay => date.day() % 2 == 0,
        Frequency::Weekly => {
            let weekday = date.weekday().num_days_from_sunday() as u8;
            medication.days_of_week.contains(&weekday)
        }
    }
}

/// State of one scheduled dose slot
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Pending,
    Taken,
    Missed,
}

impl DoseStatus {
    pub fn symbol(self) -> char {
        match self {
            DoseStatus::Pending => '·',
            DoseStatus::Taken => '✓',
            DoseStatus::Missed => '✗',
        }
    }
}

/// Status of every slot of one medication on one day
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MedicationDayStatus {
    pub medication_id: String,
    pub name: String,
    pub slots: Vec<DoseStatus>,
}

/// Slot statuses for each medication scheduled on `date`, in list order
pub fn day_status(
    medications: &[Medication],
    day: Option<&DayEntry>,
    date: NaiveDate,
) -> Vec<MedicationDayStatus> {
    medications
        .iter()
        .filter(|m| should_track(m, date))
        .map(|m| {
            let slots = (0..m.times_per_day as usize)
                .map(|i| match day.and_then(|d| d.dose(&m.id, i)) {
                    Some(dose) if dose.taken => DoseStatus::Taken,
                    Some(_) => DoseStatus::Missed,
                    None => DoseStatus::Pending,
                })
                .collect();
            MedicationDayStatus {
                medication_id: m.id.clone(),
                name: m.name.clone(),
                slots,
            }
        })
        .collect()
}

//! Adherence statistics and calendar summaries.

use crate::schedule::{day_status, DoseStatus};
use crate::{Entries, Medication};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Taken vs. missed counts over recorded doses
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct AdherenceStats {
    pub taken: u32,
    pub missed: u32,
}

impl AdherenceStats {
    pub fn recorded(&self) -> u32 {
        self.taken + self.missed
    }

    /// Percentage of recorded doses that were taken; `None` when nothing is recorded
    pub fn rate(&self) -> Option<f64> {
        match self.recorded() {
            0 => None,
            n => Some(f64::from(self.taken) * 100.0 / f64::from(n)),
        }
    }

    fn count(&mut self, taken: bool) {
        if taken {
            self.taken += 1;
        } else {
            self.missed += 1;
        }
    }
}

/// Overall and per-medication adherence for an inclusive date range
#[derive(Clone, Debug, Default, Serialize)]
pub struct AdherenceReport {
    pub overall: AdherenceStats,
    pub by_medication: BTreeMap<String, AdherenceStats>,
}

/// Count recorded doses between `from` and `to` (inclusive).
///
/// Pending slots do not count against the rate; only doses answered yes or no do.
pub fn adherence(entries: &Entries, from: NaiveDate, to: NaiveDate) -> AdherenceReport {
    let mut report = AdherenceReport::default();
    if from > to {
        return report;
    }
    for (_, day) in entries.range(from..=to) {
        for (medication_id, record) in day.iter() {
            for (_, dose) in record.recorded() {
                report.overall.count(dose.taken);
                report
                    .by_medication
                    .entry(medication_id.clone())
                    .or_default()
                    .count(dose.taken);
            }
        }
    }
    report
}

/// One-word summary of a calendar day
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DaySummary {
    /// Nothing scheduled
    NoneScheduled,
    /// Every scheduled slot taken
    Complete,
    /// Some slots answered, none missed
    Partial,
    /// At least one slot missed
    Missed,
    /// Scheduled but nothing answered yet
    Pending,
}

/// Summaries for every date of the given month. Returns an empty map for an invalid month.
pub fn month_overview(
    medications: &[Medication],
    entries: &Entries,
    year: i32,
    month: u32,
) -> BTreeMap<NaiveDate, DaySummary> {
    let mut overview = BTreeMap::new();
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return overview;
    };

    for date in first.iter_days().take_while(|d| d.month() == month) {
        let slots: Vec<DoseStatus> = day_status(medications, entries.get(&date), date)
            .into_iter()
            .flat_map(|s| s.slots)
            .collect();

        let summary = if slots.is_empty() {
            DaySummary::NoneScheduled
        } else if slots.contains(&DoseStatus::Missed) {
            DaySummary::Missed
        } else if slots.iter().all(|&s| s == DoseStatus::Taken) {
            DaySummary::Complete
        } else if slots.contains(&DoseStatus::Taken) {
            DaySummary::Partial
        } else {
            DaySummary::Pending
        };
        overview.insert(date, summary);
    }
    overview
}

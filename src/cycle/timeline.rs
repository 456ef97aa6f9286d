use chrono::{Days, NaiveDate};

use crate::cycle::phase::PhaseKind;
use crate::error::{CycleError, Result};
use crate::models::CycleConfig;

/// The inclusive date range one phase kind occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSpan {
    pub kind: PhaseKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Four contiguous spans covering one cycle, Menstrual first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub start_date: NaiveDate,
    pub spans: [PhaseSpan; 4],
    pub cycle_length: i32,
}

impl Timeline {
    pub fn span(&self, kind: PhaseKind) -> &PhaseSpan {
        // spans are built in PhaseKind::ALL order
        &self.spans[kind.catalog_id() as usize - 1]
    }

    pub fn end_date(&self) -> NaiveDate {
        self.spans[3].end_date
    }
}

/// Lays the four phases end to end starting at `start_date`.
pub fn build_timeline(start_date: NaiveDate, config: &CycleConfig) -> Result<Timeline> {
    config.validate()?;

    let out_of_range =
        || CycleError::InvalidConfig(format!("cycle starting {start_date} runs past the calendar"));

    let mut cursor = start_date;
    let mut spans = Vec::with_capacity(4);
    for kind in PhaseKind::ALL {
        let length = config.length_of(kind) as u64;
        let end_date = cursor
            .checked_add_days(Days::new(length - 1))
            .ok_or_else(out_of_range)?;
        spans.push(PhaseSpan {
            kind,
            start_date: cursor,
            end_date,
        });
        cursor = end_date.succ_opt().ok_or_else(out_of_range)?;
    }

    let cycle_length = PhaseKind::ALL
        .into_iter()
        .map(|kind| config.length_of(kind))
        .sum();

    Ok(Timeline {
        start_date,
        spans: [spans[0], spans[1], spans[2], spans[3]],
        cycle_length,
    })
}

use chrono::NaiveDate;

use crate::models::PeriodRun;

/// Groups period dates into runs of consecutive days. Input order does not matter.
pub fn group_period_runs(dates: &[NaiveDate]) -> Vec<PeriodRun> {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut grouped: Vec<PeriodRun> = vec![];
    let mut current_run: Vec<NaiveDate> = vec![];

    for date in sorted {
        let gap = current_run
            .last()
            .map(|prev| date.signed_duration_since(*prev).num_days());

        if gap.is_some_and(|g| g > 1) {
            grouped.extend(close_run(std::mem::take(&mut current_run)));
        }
        current_run.push(date);
    }
    grouped.extend(close_run(current_run));

    grouped
}

fn close_run(days: Vec<NaiveDate>) -> Option<PeriodRun> {
    let start_date = *days.first()?;
    let end_date = *days.last()?;
    Some(PeriodRun {
        start_date,
        end_date,
        days,
    })
}

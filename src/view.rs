// Derived views: filtered, sorted, paginated task lists and aggregates

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::filter::{PriorityFilter, SortKey, StatusFilter, TimeFrame, ViewParams};
use crate::models::{Status, Task};

pub const PAGE_SIZE: usize = 6;

/// Calendar day of a timestamp in the local time zone
pub fn local_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

/// Filter then stable-sort the collection. The source is not reordered.
pub fn derive<'a>(tasks: &'a [Task], params: &ViewParams, today: NaiveDate) -> Vec<&'a Task> {
    let mut visible: Vec<&Task> = tasks.iter().filter(|t| params.matches(t, today)).collect();
    visible.sort_by(|a, b| params.sort.compare(a, b));
    visible
}

/// One page of a derived view
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    pub items: Vec<&'a Task>,
    /// Zero-based page index after clamping
    pub index: usize,
    pub total_pages: usize,
    /// Number of tasks in the view before pagination
    pub total_items: usize,
    pub page_size: usize,
}

impl Page<'_> {
    /// One-based (first, last) positions shown, `(0, 0)` for an empty view
    pub fn range(&self) -> (usize, usize) {
        if self.total_items == 0 {
            return (0, 0);
        }
        let first = self.index * self.page_size + 1;
        let last = (first - 1 + self.page_size).min(self.total_items);
        (first, last)
    }

    /// "Showing X-Y of Z"
    pub fn showing(&self) -> String {
        let (first, last) = self.range();
        format!("Showing {}-{} of {}", first, last, self.total_items)
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.total_pages
    }
}

pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size.max(1))
}

fn clamp_page(index: usize, total_pages: usize) -> usize {
    index.min(total_pages.saturating_sub(1))
}

/// Slice a view into a page; out-of-range indexes clamp to the last page
pub fn paginate<'a>(items: Vec<&'a Task>, index: usize, page_size: usize) -> Page<'a> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_pages(total_items, page_size);
    let index = clamp_page(index, total_pages);

    let items = items
        .into_iter()
        .skip(index * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        index,
        total_pages,
        total_items,
        page_size,
    }
}

/// View parameters plus the current page.
///
/// Changing any filter or the sort order returns to the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    params: ViewParams,
    page: usize,
    page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(ViewParams::default())
    }
}

impl ViewState {
    pub fn new(params: ViewParams) -> Self {
        Self {
            params,
            page: 0,
            page_size: PAGE_SIZE,
        }
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_params(&mut self, params: ViewParams) {
        if params != self.params {
            self.params = params;
            self.page = 0;
        }
    }

    pub fn set_priority(&mut self, priority: PriorityFilter) {
        self.set_params(ViewParams { priority, ..self.params });
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.set_params(ViewParams { status, ..self.params });
    }

    pub fn set_time_frame(&mut self, time_frame: Option<TimeFrame>) {
        self.set_params(ViewParams { time_frame, ..self.params });
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.set_params(ViewParams { sort, ..self.params });
    }

    pub fn set_pending_only(&mut self, pending_only: bool) {
        self.set_params(ViewParams {
            pending_only,
            ..self.params
        });
    }

    pub fn next_page(&mut self, total_items: usize) {
        let pages = total_pages(total_items, self.page_size);
        self.page = clamp_page(self.page + 1, pages);
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    pub fn goto_page(&mut self, index: usize, total_items: usize) {
        let pages = total_pages(total_items, self.page_size);
        self.page = clamp_page(index, pages);
    }

    /// Current page of the derived view
    pub fn render<'a>(&self, tasks: &'a [Task], today: NaiveDate) -> Page<'a> {
        paginate(derive(tasks, &self.params, today), self.page, self.page_size)
    }
}

/// Counters over the whole, unfiltered collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Aggregates {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub completion_percent: u32,
}

impl Aggregates {
    pub fn compute(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.status == Status::Complete).count();
        let in_progress = tasks.iter().filter(|t| t.status == Status::InProgress).count();

        Self {
            total,
            completed,
            in_progress,
            completion_percent: completion_percent(completed, total),
        }
    }

    pub fn pending(&self) -> usize {
        self.total - self.completed
    }
}

/// round(completed / total * 100), 0 when there are no tasks
pub fn completion_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round() as u32
}

/// Completed-task count per creation day, oldest day first
///
/// Days with tasks but no completions appear with a zero count.
pub fn completion_series(tasks: &[Task]) -> Vec<(NaiveDate, usize)> {
    let mut by_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for task in tasks {
        let count = by_day.entry(local_day(task.created_at)).or_default();
        if task.is_complete() {
            *count += 1;
        }
    }
    by_day.into_iter().collect()
}

/// Tasks created on a given local day, in collection order
pub fn created_on(tasks: &[Task], day: NaiveDate) -> Vec<&Task> {
    tasks.iter().filter(|t| local_day(t.created_at) == day).collect()
}

//! Filter/sort/paginate engine for the grades table.

use crate::error::{GradeFormError, Result};
use crate::model::{GradeEntryForm, Student, StudentRow};
use crate::store;
use rusqlite::Connection;
use serde::Serialize;
use std::cmp::Ordering;

pub const PER_PAGE_OPTIONS: [usize; 5] = [15, 30, 50, 100, 150];
pub const DEFAULT_PER_PAGE: usize = 15;
pub const DEFAULT_FILTER: &str = "none";
pub const DEFAULT_SORT: &str = "last_name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Every non-hidden student, ordered by user name.
    None,
}

impl FilterKind {
    pub const ALL: [FilterKind; 1] = [FilterKind::None];

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(FilterKind::None),
            other => Err(GradeFormError::UnknownFilter(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::None => "none",
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            FilterKind::None => "Show All",
        }
    }

    /// Produces the eligible students for `form`, in a deterministic base order.
    pub fn apply(self, conn: &Connection, _form: &GradeEntryForm) -> Result<Vec<Student>> {
        match self {
            FilterKind::None => store::list_visible_students(conn),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKind {
    LastName,
}

impl SortKind {
    /// Unknown or blank names fall back to `last_name`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "last_name" => SortKind::LastName,
            _ => SortKind::LastName,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SortKind::LastName => "last_name",
        }
    }

    pub fn compare(self, a: &StudentRow, b: &StudentRow) -> Ordering {
        match self {
            SortKind::LastName => a.last_name.to_lowercase().cmp(&b.last_name.to_lowercase()),
        }
    }

    pub fn sort_key(self, row: &StudentRow) -> &str {
        match self {
            SortKind::LastName => &row.last_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOption {
    pub name: &'static str,
    pub display: &'static str,
}

pub fn filter_options() -> Vec<FilterOption> {
    FilterKind::ALL
        .iter()
        .map(|f| FilterOption {
            name: f.name(),
            display: f.display(),
        })
        .collect()
}

/// Filters then stably sorts the roster as seen through `form`.
///
/// Rows with equal sort keys keep the filter's base order in both directions.
pub fn query(
    conn: &Connection,
    filter: FilterKind,
    sort: SortKind,
    desc: bool,
    form: &GradeEntryForm,
) -> Result<Vec<StudentRow>> {
    let students = filter.apply(conn, form)?;
    let released = store::released_by_student(conn, &form.id)?;

    let mut rows: Vec<StudentRow> = students
        .into_iter()
        .map(|s| StudentRow {
            released: released.get(&s.id).copied().unwrap_or(false),
            student_id: s.id,
            user_name: s.user_name,
            last_name: s.last_name,
            first_name: s.first_name,
        })
        .collect();

    if desc {
        rows.sort_by(|a, b| sort.compare(b, a));
    } else {
        rows.sort_by(|a, b| sort.compare(a, b));
    }
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub rows: &'a [T],
    pub page: usize,
    pub total_count: usize,
    pub total_pages: usize,
}

pub fn total_pages(count: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 1;
    }
    count.div_ceil(per_page).max(1)
}

/// Slices page `page` (1-indexed) out of `rows`. A page past the end is empty.
pub fn paginate<T>(rows: &[T], per_page: usize, page: usize) -> Page<'_, T> {
    let page = page.max(1);
    let total_count = rows.len();
    let pages = total_pages(total_count, per_page);
    let start = (page - 1).saturating_mul(per_page);
    let slice = if per_page == 0 || start >= total_count {
        &rows[0..0]
    } else {
        let end = (start + per_page).min(total_count);
        &rows[start..end]
    };
    Page {
        rows: slice,
        page,
        total_count,
        total_pages: pages,
    }
}

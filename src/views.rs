use crate::calc::{participation_rate, DashboardView, SchoolPerformance};
use crate::model::{DataFilters, Dataset, School, ALL};
use serde::Serialize;
use std::cmp::Ordering;

pub const DEFAULT_PAGE_SIZE: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCards {
    pub total_schools: usize,
    pub total_students: i64,
    pub students_participated: i64,
    pub overall_participation_rate: f64,
    pub display: CardDisplay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDisplay {
    pub total_schools: String,
    pub total_students: String,
    pub students_participated: String,
    pub overall_participation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeSlice {
    pub name: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationGauge {
    pub slices: Vec<GaugeSlice>,
    pub percent: f64,
    pub percent_label: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub districts: Vec<FilterOption>,
    pub schools: Vec<FilterOption>,
    pub grades: Vec<FilterOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolRow {
    #[serde(flatten)]
    pub performance: SchoolPerformance,
    pub participation_rate_label: String,
    pub avg_english_label: String,
    pub avg_math_label: String,
}

/// `1234567` -> `"1,234,567"`.
pub fn format_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_percent(p: f64) -> String {
    format!("{:.1}%", p)
}

pub fn dashboard_cards(view: &DashboardView, filters: &DataFilters) -> DashboardCards {
    let total_schools = if filters.selected_school != ALL {
        1
    } else {
        view.filtered_schools.len()
    };
    let rate = participation_rate(view.total_participated, view.total_registered);
    DashboardCards {
        total_schools,
        total_students: view.total_registered,
        students_participated: view.total_participated,
        overall_participation_rate: rate,
        display: CardDisplay {
            total_schools: total_schools.to_string(),
            total_students: format_count(view.total_registered),
            students_participated: format_count(view.total_participated),
            overall_participation: format_percent(rate),
        },
    }
}

pub fn participation_gauge(total: i64, participated: i64) -> ParticipationGauge {
    let percent = participation_rate(participated, total);
    ParticipationGauge {
        slices: vec![
            GaugeSlice {
                name: "Not Participated",
                value: 100.0 - percent,
            },
            GaugeSlice {
                name: "Participated",
                value: percent,
            },
        ],
        percent,
        percent_label: format_percent(percent),
        label: format!("{} / {}", participated, total),
    }
}

fn option(value: &str) -> FilterOption {
    FilterOption {
        value: value.to_string(),
        label: value.to_string(),
    }
}

fn all_option(label: &str) -> FilterOption {
    FilterOption {
        value: ALL.to_string(),
        label: label.to_string(),
    }
}

pub fn filter_options(dataset: &Dataset, filtered_schools: &[School]) -> FilterOptions {
    let mut districts = vec![all_option("All Districts")];
    districts.extend(dataset.districts.iter().map(|d| option(&d.district_name)));
    let mut schools = vec![all_option("All Schools")];
    schools.extend(filtered_schools.iter().map(|s| option(&s.school_name)));
    let mut grades = vec![all_option("All Grades")];
    grades.extend(dataset.grades.iter().map(|g| option(&g.grade_name)));
    FilterOptions {
        districts,
        schools,
        grades,
    }
}

/// Highest participation first. Ties keep their aggregation order.
pub fn school_rows(performance: &[SchoolPerformance]) -> Vec<SchoolRow> {
    let mut sorted = performance.to_vec();
    sorted.sort_by(|a, b| {
        b.participation_rate
            .partial_cmp(&a.participation_rate)
            .unwrap_or(Ordering::Equal)
    });
    sorted
        .into_iter()
        .map(|p| SchoolRow {
            participation_rate_label: format_percent(p.participation_rate),
            avg_english_label: format!("{:.2}", p.avg_english_performance),
            avg_math_label: format!("{:.2}", p.avg_math_performance),
            performance: p,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub total_pages: usize,
}

pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let size = page_size.max(1);
    let start = page.saturating_sub(1) * size;
    let rows = if start >= items.len() {
        Vec::new()
    } else {
        let end = std::cmp::min(start + size, items.len());
        items[start..end].to_vec()
    };
    Page {
        rows,
        page,
        page_size: size,
        total_rows: items.len(),
        total_pages: items.len().div_ceil(size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::compute_dashboard_view;
    use crate::model::{District, Fact, Grade};

    fn district(district_id: i64, name: &str) -> District {
        District {
            district_id,
            district_name: name.into(),
        }
    }

    fn school(school_id: i64, name: &str, district_id: i64) -> School {
        School {
            school_id,
            school_name: name.into(),
            district_id,
        }
    }

    fn grade(grade_id: i64, name: &str) -> Grade {
        Grade {
            grade_id,
            grade_name: name.into(),
        }
    }

    fn perf(name: &str, rate: f64) -> SchoolPerformance {
        SchoolPerformance {
            school_name: name.into(),
            district_name: "D".into(),
            total_registered: 100,
            total_participated: rate as i64,
            participation_rate: rate,
            avg_english_performance: -0.5,
            avg_math_performance: -1.0 / 3.0,
        }
    }

    #[test]
    fn counts_are_grouped_by_thousands() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1234), "1,234");
        assert_eq!(format_count(1234567), "1,234,567");
        assert_eq!(format_count(-4500), "-4,500");
    }

    #[test]
    fn school_rows_sort_by_rate_descending_and_stable() {
        let rows = school_rows(&[perf("A", 40.0), perf("B", 90.0), perf("C", 40.0)]);
        let names: Vec<&str> = rows
            .iter()
            .map(|r| r.performance.school_name.as_str())
            .collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert_eq!(rows[1].participation_rate_label, "40.0%");
        assert_eq!(rows[1].avg_english_label, "-0.50");
        assert_eq!(rows[1].avg_math_label, "-0.33");
    }

    #[test]
    fn paging_reports_totals_and_handles_overflow() {
        let items: Vec<i32> = (1..=15).collect();
        let p = paginate(&items, 3, 7);
        assert_eq!(p.rows, vec![15]);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.total_rows, 15);
        let past = paginate(&items, 4, 7);
        assert!(past.rows.is_empty());
        let empty: Page<i32> = paginate(&[], 1, 7);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn cards_count_one_school_when_a_school_is_selected() {
        let ds = Dataset {
            districts: vec![district(1, "D")],
            schools: vec![
                school(1, "S1", 1),
                school(2, "S2", 1),
            ],
            grades: vec![grade(1, "G1")],
            facts: vec![Fact {
                district_id: 1,
                school_id: 1,
                grade_id: 1,
                registered: 1200,
                participated: 300,
            }],
            student_details: vec![],
        };
        let all = DataFilters::default();
        let cards = dashboard_cards(&compute_dashboard_view(&ds, &all, ""), &all);
        assert_eq!(cards.total_schools, 2);
        assert_eq!(cards.display.total_students, "1,200");
        assert_eq!(cards.display.overall_participation, "25.0%");

        let one = DataFilters {
            selected_school: "S1".into(),
            ..DataFilters::default()
        };
        let cards = dashboard_cards(&compute_dashboard_view(&ds, &one, ""), &one);
        assert_eq!(cards.total_schools, 1);
    }

    #[test]
    fn gauge_splits_hundred_percent() {
        let g = participation_gauge(200, 50);
        assert_eq!(g.slices[0].value, 75.0);
        assert_eq!(g.slices[1].value, 25.0);
        assert_eq!(g.label, "50 / 200");
        let empty = participation_gauge(0, 0);
        assert_eq!(empty.percent, 0.0);
        assert_eq!(empty.slices[0].value, 100.0);
    }

    #[test]
    fn options_lead_with_all_entries() {
        let ds = Dataset {
            districts: vec![district(1, "North")],
            grades: vec![grade(1, "Grade 1")],
            ..Dataset::default()
        };
        let opts = filter_options(&ds, &[]);
        assert_eq!(opts.districts[0].value, "all");
        assert_eq!(opts.districts[0].label, "All Districts");
        assert_eq!(opts.districts[1].label, "North");
        assert_eq!(opts.schools.len(), 1);
        assert_eq!(opts.grades[1].value, "Grade 1");
    }
}

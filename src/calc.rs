use crate::model::{
    DataFilters, Dataset, District, Fact, FilterChange, Grade, School, StudentDetail, ALL,
};
use serde::Serialize;
use std::collections::HashMap;

/// Display order for gap-to-grade histograms. Levels outside this list are
/// appended after it in the order they were first seen.
pub const CANONICAL_LEVEL_ORDER: [&str; 6] = [
    "At Level", "Level 0", "Level -1", "Level -2", "Level -3", "Level -4",
];

pub const MISSING_LEVEL: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolvedFilters<'a> {
    pub district: Option<&'a District>,
    pub school: Option<&'a School>,
    pub grade: Option<&'a Grade>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeWiseParticipation {
    pub grade: String,
    pub registered: i64,
    pub participated: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapToGradeData {
    pub name: String,
    #[serde(rename = "Students")]
    pub students: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolPerformance {
    pub school_name: String,
    pub district_name: String,
    pub total_registered: i64,
    pub total_participated: i64,
    pub participation_rate: f64,
    pub avg_english_performance: f64,
    pub avg_math_performance: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactTotals {
    pub registered: i64,
    pub participated: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub filtered_schools: Vec<School>,
    pub total_registered: i64,
    pub total_participated: i64,
    pub grade_wise_participation: Vec<GradeWiseParticipation>,
    pub english_gap_to_grade: Vec<GapToGradeData>,
    pub math_gap_to_grade: Vec<GapToGradeData>,
    pub school_performance_data: Vec<SchoolPerformance>,
    pub filtered_student_details: Vec<StudentDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelField {
    English,
    Math,
}

impl LevelField {
    fn of(self, student: &StudentDetail) -> &str {
        match self {
            LevelField::English => &student.english_level,
            LevelField::Math => &student.math_level,
        }
    }
}

fn is_all(selection: &str) -> bool {
    selection == ALL
}

/// Resolves dropdown names against the reference tables. Unknown names behave
/// like `"all"`.
pub fn resolve_filters<'a>(dataset: &'a Dataset, filters: &DataFilters) -> ResolvedFilters<'a> {
    let district = if is_all(&filters.selected_district) {
        None
    } else {
        dataset
            .districts
            .iter()
            .find(|d| d.district_name == filters.selected_district)
    };
    let school = if is_all(&filters.selected_school) {
        None
    } else {
        dataset
            .schools
            .iter()
            .find(|s| s.school_name == filters.selected_school)
    };
    let grade = if is_all(&filters.selected_grade) {
        None
    } else {
        dataset
            .grades
            .iter()
            .find(|g| g.grade_name == filters.selected_grade)
    };
    ResolvedFilters {
        district,
        school,
        grade,
    }
}

/// Any district change clears the school selection, even when the district
/// value is unchanged.
pub fn apply_filter_change(current: &DataFilters, change: FilterChange) -> DataFilters {
    let mut next = current.clone();
    match change {
        FilterChange::District(value) => {
            next.selected_district = value;
            next.selected_school = ALL.to_string();
        }
        FilterChange::School(value) => next.selected_school = value,
        FilterChange::Grade(value) => next.selected_grade = value,
    }
    next
}

/// Schools offered by the school dropdown for the resolved district.
pub fn schools_for_district<'a>(
    dataset: &'a Dataset,
    resolved: &ResolvedFilters<'_>,
) -> Vec<&'a School> {
    match resolved.district {
        Some(d) => dataset
            .schools
            .iter()
            .filter(|s| s.district_id == d.district_id)
            .collect(),
        None => dataset.schools.iter().collect(),
    }
}

pub fn filter_facts<'a>(facts: &'a [Fact], resolved: &ResolvedFilters<'_>) -> Vec<&'a Fact> {
    facts
        .iter()
        .filter(|f| {
            resolved
                .district
                .map(|d| f.district_id == d.district_id)
                .unwrap_or(true)
                && resolved
                    .school
                    .map(|s| f.school_id == s.school_id)
                    .unwrap_or(true)
                && resolved
                    .grade
                    .map(|g| f.grade_id == g.grade_id)
                    .unwrap_or(true)
        })
        .collect()
}

pub fn sum_facts<'a, I>(facts: I) -> FactTotals
where
    I: IntoIterator<Item = &'a Fact>,
{
    let mut totals = FactTotals::default();
    for f in facts {
        totals.registered = totals.registered.saturating_add(f.registered);
        totals.participated = totals.participated.saturating_add(f.participated);
    }
    totals
}

/// Per-grade sums in the grade table's declared order; grades with nothing
/// registered and nothing participated are left out.
pub fn grade_wise_participation(grades: &[Grade], facts: &[&Fact]) -> Vec<GradeWiseParticipation> {
    grades
        .iter()
        .map(|grade| {
            let totals = sum_facts(
                facts
                    .iter()
                    .copied()
                    .filter(|f| f.grade_id == grade.grade_id),
            );
            GradeWiseParticipation {
                grade: grade.grade_name.clone(),
                registered: totals.registered,
                participated: totals.participated,
            }
        })
        .filter(|g| g.registered > 0 || g.participated > 0)
        .collect()
}

fn matches_search(student: &StudentDetail, needle: &str) -> bool {
    student.student_name.to_lowercase().contains(needle)
        || student.login_id.to_lowercase().contains(needle)
}

/// Student rows filtered by the raw selection names (not the resolved rows),
/// then by a case-insensitive search over name and login id.
pub fn filter_student_details<'a>(
    students: &'a [StudentDetail],
    filters: &DataFilters,
    search: &str,
) -> Vec<&'a StudentDetail> {
    let needle = search.to_lowercase();
    students
        .iter()
        .filter(|s| is_all(&filters.selected_district) || s.district == filters.selected_district)
        .filter(|s| is_all(&filters.selected_school) || s.school_name == filters.selected_school)
        .filter(|s| is_all(&filters.selected_grade) || s.grade == filters.selected_grade)
        .filter(|s| search.is_empty() || matches_search(s, &needle))
        .collect()
}

pub fn gap_to_grade(students: &[&StudentDetail], field: LevelField) -> Vec<GapToGradeData> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for student in students {
        let level = match field.of(student) {
            "" => MISSING_LEVEL,
            v => v,
        };
        match index.get(level) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(level, counts.len());
                counts.push((level, 1));
            }
        }
    }

    let mut out = Vec::with_capacity(counts.len());
    for level in CANONICAL_LEVEL_ORDER {
        if let Some(&i) = index.get(level) {
            out.push(GapToGradeData {
                name: level.to_string(),
                students: counts[i].1,
            });
        }
    }
    for (level, count) in &counts {
        if !CANONICAL_LEVEL_ORDER.contains(level) {
            out.push(GapToGradeData {
                name: level.to_string(),
                students: *count,
            });
        }
    }
    out
}

/// Leading integer the way a lenient text-to-number conversion reads it:
/// optional whitespace, optional sign, then at least one digit. Magnitudes
/// past `i64` keep their approximate value instead of failing.
fn parse_leading_int(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: f64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Grade levels relative to the student's grade: 0 at level, -N for N levels
/// below. Anything unrecognised scores 0.
pub fn level_to_score(level: &str) -> f64 {
    if level == "At Level" || level == "Level 0" {
        return 0.0;
    }
    match level.strip_prefix("Level ") {
        Some(rest) => parse_leading_int(rest).unwrap_or(0.0),
        None => 0.0,
    }
}

pub fn participation_rate(participated: i64, registered: i64) -> f64 {
    if registered > 0 {
        (participated as f64 / registered as f64) * 100.0
    } else {
        0.0
    }
}

fn average_score<'a, I>(levels: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sum = 0.0_f64;
    let mut count: usize = 0;
    for level in levels {
        sum += level_to_score(level);
        count += 1;
    }
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

struct SchoolTotals<'a> {
    school_name: &'a str,
    district_name: &'a str,
    registered: i64,
    participated: i64,
}

/// Per-school participation from the filtered facts. Average scores always
/// use the school's whole student body, matched by school name.
pub fn school_performance(dataset: &Dataset, facts: &[&Fact]) -> Vec<SchoolPerformance> {
    let mut groups: Vec<SchoolTotals<'_>> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for fact in facts {
        if !index.contains_key(&fact.school_id) {
            let school = dataset
                .schools
                .iter()
                .find(|s| s.school_id == fact.school_id);
            let district = dataset
                .districts
                .iter()
                .find(|d| d.district_id == fact.district_id);
            if let (Some(school), Some(district)) = (school, district) {
                index.insert(fact.school_id, groups.len());
                groups.push(SchoolTotals {
                    school_name: &school.school_name,
                    district_name: &district.district_name,
                    registered: 0,
                    participated: 0,
                });
            }
        }
        if let Some(&i) = index.get(&fact.school_id) {
            let group = &mut groups[i];
            group.registered = group.registered.saturating_add(fact.registered);
            group.participated = group.participated.saturating_add(fact.participated);
        }
    }

    groups
        .into_iter()
        .filter(|g| g.registered > 0)
        .map(|g| {
            let students: Vec<&StudentDetail> = dataset
                .student_details
                .iter()
                .filter(|s| s.school_name == g.school_name)
                .collect();
            SchoolPerformance {
                school_name: g.school_name.to_string(),
                district_name: g.district_name.to_string(),
                total_registered: g.registered,
                total_participated: g.participated,
                participation_rate: participation_rate(g.participated, g.registered),
                avg_english_performance: average_score(
                    students.iter().map(|s| s.english_level.as_str()),
                ),
                avg_math_performance: average_score(
                    students.iter().map(|s| s.math_level.as_str()),
                ),
            }
        })
        .collect()
}

pub fn compute_dashboard_view(
    dataset: &Dataset,
    filters: &DataFilters,
    search: &str,
) -> DashboardView {
    let resolved = resolve_filters(dataset, filters);
    let filtered_schools = schools_for_district(dataset, &resolved);
    let facts = filter_facts(&dataset.facts, &resolved);
    let totals = sum_facts(facts.iter().copied());
    let students = filter_student_details(&dataset.student_details, filters, search);

    DashboardView {
        filtered_schools: filtered_schools.into_iter().cloned().collect(),
        total_registered: totals.registered,
        total_participated: totals.participated,
        grade_wise_participation: grade_wise_participation(&dataset.grades, &facts),
        english_gap_to_grade: gap_to_grade(&students, LevelField::English),
        math_gap_to_grade: gap_to_grade(&students, LevelField::Math),
        school_performance_data: school_performance(dataset, &facts),
        filtered_student_details: students.into_iter().cloned().collect(),
    }
}

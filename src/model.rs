use serde::{Deserialize, Serialize};

pub const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    pub district_id: i64,
    pub district_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub school_id: i64,
    pub school_name: String,
    pub district_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub grade_id: i64,
    pub grade_name: String,
}

/// Registered/participated counts for one (district, school, grade) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub district_id: i64,
    pub school_id: i64,
    pub grade_id: i64,
    pub registered: i64,
    pub participated: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetail {
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub school_id: String,
    #[serde(default)]
    pub school_name: String,
    pub login_id: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub english_level: String,
    #[serde(default)]
    pub math_level: String,
}

/// The full read-only table set the dashboard is computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub districts: Vec<District>,
    #[serde(default)]
    pub schools: Vec<School>,
    #[serde(default)]
    pub grades: Vec<Grade>,
    #[serde(default)]
    pub facts: Vec<Fact>,
    #[serde(default)]
    pub student_details: Vec<StudentDetail>,
}

impl Dataset {
    pub fn counts(&self) -> DatasetCounts {
        DatasetCounts {
            districts: self.districts.len(),
            schools: self.schools.len(),
            grades: self.grades.len(),
            facts: self.facts.len(),
            student_details: self.student_details.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetCounts {
    pub districts: usize,
    pub schools: usize,
    pub grades: usize,
    pub facts: usize,
    pub student_details: usize,
}

fn all_selection() -> String {
    ALL.to_string()
}

/// Current dropdown selections. Each field is `"all"` or an exact reference name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFilters {
    #[serde(default = "all_selection")]
    pub selected_district: String,
    #[serde(default = "all_selection")]
    pub selected_school: String,
    #[serde(default = "all_selection")]
    pub selected_grade: String,
}

impl Default for DataFilters {
    fn default() -> Self {
        Self {
            selected_district: all_selection(),
            selected_school: all_selection(),
            selected_grade: all_selection(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    District(String),
    School(String),
    Grade(String),
}

use crate::model::Dataset;
use anyhow::Context;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl DatasetError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn parse_dataset_str(text: &str) -> anyhow::Result<Dataset> {
    // Exports saved from spreadsheet tools sometimes carry a BOM.
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    serde_json::from_str(text).context("dataset is not valid JSON")
}

pub fn parse_dataset_file(path: &Path) -> anyhow::Result<Dataset> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset {}", path.to_string_lossy()))?;
    parse_dataset_str(&text)
}

fn duplicates<I, K>(keys: I) -> Vec<K>
where
    I: IntoIterator<Item = K>,
    K: std::hash::Hash + Eq + Clone,
{
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for k in keys {
        if !seen.insert(k.clone()) && !dups.contains(&k) {
            dups.push(k);
        }
    }
    dups
}

/// Structural checks run before a dataset replaces the workspace tables.
/// Referential gaps are tolerated (the dashboard drops or ignores them) and
/// reported as warnings.
pub fn validate_dataset(ds: &Dataset) -> ValidationReport {
    let mut report = ValidationReport::default();

    for id in duplicates(ds.districts.iter().map(|d| d.district_id)) {
        report.errors.push(format!("duplicate district_id {}", id));
    }
    for id in duplicates(ds.schools.iter().map(|s| s.school_id)) {
        report.errors.push(format!("duplicate school_id {}", id));
    }
    for id in duplicates(ds.grades.iter().map(|g| g.grade_id)) {
        report.errors.push(format!("duplicate grade_id {}", id));
    }
    for login in duplicates(ds.student_details.iter().map(|s| s.login_id.as_str())) {
        report.errors.push(format!("duplicate loginId {}", login));
    }

    let district_ids: HashSet<i64> = ds.districts.iter().map(|d| d.district_id).collect();
    let school_ids: HashSet<i64> = ds.schools.iter().map(|s| s.school_id).collect();
    let grade_ids: HashSet<i64> = ds.grades.iter().map(|g| g.grade_id).collect();

    for s in &ds.schools {
        if !district_ids.contains(&s.district_id) {
            report.warnings.push(format!(
                "school {} references unknown district_id {}",
                s.school_id, s.district_id
            ));
        }
    }

    for (i, f) in ds.facts.iter().enumerate() {
        if f.registered < 0 || f.participated < 0 {
            report
                .errors
                .push(format!("facts[{}]: counts must not be negative", i));
        }
        if f.participated > f.registered {
            report.warnings.push(format!(
                "facts[{}]: participated {} exceeds registered {}",
                i, f.participated, f.registered
            ));
        }
        if !district_ids.contains(&f.district_id) {
            report.warnings.push(format!(
                "facts[{}]: unknown district_id {}",
                i, f.district_id
            ));
        }
        if !school_ids.contains(&f.school_id) {
            report
                .warnings
                .push(format!("facts[{}]: unknown school_id {}", i, f.school_id));
        }
        if !grade_ids.contains(&f.grade_id) {
            report
                .warnings
                .push(format!("facts[{}]: unknown grade_id {}", i, f.grade_id));
        }
    }

    report
}

/// Parse and validate in one step, the way `dataset.import` needs it.
pub fn load_validated(path: &Path) -> Result<(Dataset, ValidationReport), DatasetError> {
    let ds = parse_dataset_file(path)
        .map_err(|e| DatasetError::new("dataset_read_failed", format!("{e:#}")))?;
    let report = validate_dataset(&ds);
    if !report.is_ok() {
        return Err(
            DatasetError::new("invalid_dataset", "dataset failed validation").with_details(
                serde_json::json!({ "errors": report.errors, "warnings": report.warnings }),
            ),
        );
    }
    Ok((ds, report))
}

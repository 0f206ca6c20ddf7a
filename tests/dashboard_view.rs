mod test_support;

use serde_json::json;
use test_support::{request_ok, sidecar_with_sample};

fn names(list: &serde_json::Value, key: &str) -> Vec<String> {
    list.as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.get(key).and_then(|n| n.as_str()).map(|s| s.to_string()))
        .collect()
}

fn approx(v: &serde_json::Value, expected: f64) -> bool {
    v.as_f64().map(|x| (x - expected).abs() < 1e-9).unwrap_or(false)
}

#[test]
fn unfiltered_view_aggregates_the_whole_dataset() {
    let (_child, mut stdin, mut reader, _ws) = sidecar_with_sample("dashd-view-all");
    let view = request_ok(&mut stdin, &mut reader, "1", "dashboard.view", json!({}));

    assert_eq!(view["totalRegistered"], 590);
    assert_eq!(view["totalParticipated"], 355);
    assert_eq!(view["filteredSchools"].as_array().map(|a| a.len()), Some(4));
    assert_eq!(
        view["gradeWiseParticipation"],
        json!([
            { "grade": "Grade 3", "registered": 270, "participated": 120 },
            { "grade": "Grade 4", "registered": 180, "participated": 140 },
            { "grade": "Grade 5", "registered": 140, "participated": 95 }
        ])
    );
    assert_eq!(
        view["englishGapToGrade"],
        json!([
            { "name": "At Level", "Students": 3 },
            { "name": "Level -1", "Students": 3 },
            { "name": "Level -2", "Students": 2 },
            { "name": "Level -3", "Students": 1 },
            { "name": "Level -4", "Students": 1 },
            { "name": "N/A", "Students": 1 },
            { "name": "Above", "Students": 1 }
        ])
    );
    assert_eq!(
        view["mathGapToGrade"],
        json!([
            { "name": "At Level", "Students": 2 },
            { "name": "Level 0", "Students": 1 },
            { "name": "Level -1", "Students": 4 },
            { "name": "Level -2", "Students": 2 },
            { "name": "Level -3", "Students": 1 },
            { "name": "N/A", "Students": 2 }
        ])
    );

    let perf = &view["schoolPerformanceData"];
    assert_eq!(
        names(perf, "schoolName"),
        vec!["Maple Elementary", "Oak Middle", "Pine Academy"]
    );
    assert!(approx(&perf[0]["avgEnglishPerformance"], -0.75));
    assert!(approx(&perf[0]["avgMathPerformance"], -0.5));
    assert!(approx(&perf[1]["avgEnglishPerformance"], -4.0 / 3.0));
    assert!(approx(&perf[2]["participationRate"], 40.0));
    assert_eq!(view["filteredStudentDetails"].as_array().map(|a| a.len()), Some(12));

    assert_eq!(view["cards"]["totalSchools"], 4);
    assert_eq!(view["cards"]["display"]["totalStudents"], "590");
    assert_eq!(view["cards"]["display"]["overallParticipation"], "60.2%");
    assert_eq!(view["gauge"]["label"], "355 / 590");
    assert_eq!(view["gauge"]["slices"][1]["name"], "Participated");
}

#[test]
fn district_filter_restricts_schools_facts_and_students() {
    let (_child, mut stdin, mut reader, _ws) = sidecar_with_sample("dashd-view-north");
    let view = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dashboard.view",
        json!({ "filters": { "selectedDistrict": "North" } }),
    );
    assert_eq!(
        names(&view["filteredSchools"], "school_name"),
        vec!["Maple Elementary", "Oak Middle"]
    );
    assert_eq!(view["totalRegistered"], 390);
    assert_eq!(view["totalParticipated"], 275);
    assert_eq!(view["filteredStudentDetails"].as_array().map(|a| a.len()), Some(7));
    assert_eq!(view["cards"]["totalSchools"], 2);

    let options = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "filters.options",
        json!({ "filters": { "selectedDistrict": "North" } }),
    );
    assert_eq!(
        names(&options["schools"], "label"),
        vec!["All Schools", "Maple Elementary", "Oak Middle"]
    );
    assert_eq!(names(&options["districts"], "value"), vec!["all", "North", "South", "East"]);
}

#[test]
fn district_without_schools_yields_empty_aggregates() {
    let (_child, mut stdin, mut reader, _ws) = sidecar_with_sample("dashd-view-east");
    let view = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dashboard.view",
        json!({
            "filters": {
                "selectedDistrict": "East",
                "selectedSchool": "all",
                "selectedGrade": "all"
            }
        }),
    );
    assert_eq!(view["filteredSchools"], json!([]));
    assert_eq!(view["totalRegistered"], 0);
    assert_eq!(view["totalParticipated"], 0);
    assert_eq!(view["gradeWiseParticipation"], json!([]));
    assert_eq!(view["schoolPerformanceData"], json!([]));
    assert_eq!(view["englishGapToGrade"], json!([]));
    assert_eq!(view["cards"]["display"]["overallParticipation"], "0.0%");
}

#[test]
fn grade_filter_and_search_leave_school_averages_on_full_student_body() {
    let (_child, mut stdin, mut reader, _ws) = sidecar_with_sample("dashd-view-grade");
    let view = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dashboard.view",
        json!({ "filters": { "selectedGrade": "Grade 5" }, "search": "JULIA" }),
    );
    let students = view["filteredStudentDetails"].as_array().cloned().unwrap_or_default();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["loginId"], "S2003");
    assert_eq!(
        view["englishGapToGrade"],
        json!([{ "name": "At Level", "Students": 1 }])
    );

    let perf = &view["schoolPerformanceData"];
    assert_eq!(names(perf, "schoolName"), vec!["Oak Middle", "Pine Academy"]);
    assert!(approx(&perf[0]["participationRate"], 50.0));
    assert!(approx(&perf[1]["participationRate"], 100.0));
    assert!(approx(&perf[1]["avgEnglishPerformance"], -1.25));
    assert!(approx(&perf[1]["avgMathPerformance"], -0.75));
}

#[test]
fn unknown_selections_fall_back_for_facts_but_not_students() {
    let (_child, mut stdin, mut reader, _ws) = sidecar_with_sample("dashd-view-unknown");
    let view = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dashboard.view",
        json!({ "filters": { "selectedSchool": "Imaginary High" } }),
    );
    assert_eq!(view["totalRegistered"], 590);
    assert_eq!(view["cards"]["totalSchools"], 1);
    assert_eq!(view["filteredStudentDetails"], json!([]));
}

#[test]
fn repeated_requests_are_identical() {
    let (_child, mut stdin, mut reader, _ws) = sidecar_with_sample("dashd-view-idem");
    let params = json!({ "filters": { "selectedDistrict": "South" }, "search": "a" });
    let a = request_ok(&mut stdin, &mut reader, "1", "dashboard.view", params.clone());
    let b = request_ok(&mut stdin, &mut reader, "2", "dashboard.view", params);
    assert_eq!(a, b);
}

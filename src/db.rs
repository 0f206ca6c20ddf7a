use crate::model::{Dataset, DatasetCounts, District, Fact, Grade, School, StudentDetail};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "dashboard.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub import_id: String,
    pub imported_at: String,
    pub source_path: Option<String>,
    pub counts: DatasetCounts,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS districts(
            district_id INTEGER PRIMARY KEY,
            district_name TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schools(
            school_id INTEGER PRIMARY KEY,
            school_name TEXT NOT NULL,
            district_id INTEGER NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schools_district ON schools(district_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            grade_id INTEGER PRIMARY KEY,
            grade_name TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    // Facts may reference ids missing from the reference tables; the
    // dashboard ignores those rows instead of rejecting them, so no FKs here.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS facts(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            district_id INTEGER NOT NULL,
            school_id INTEGER NOT NULL,
            grade_id INTEGER NOT NULL,
            registered INTEGER NOT NULL,
            participated INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_facts_school ON facts(school_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_details(
            login_id TEXT PRIMARY KEY,
            district TEXT NOT NULL,
            school_id TEXT NOT NULL,
            school_name TEXT NOT NULL,
            student_name TEXT NOT NULL,
            grade TEXT NOT NULL,
            english_level TEXT NOT NULL,
            math_level TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_details_school ON student_details(school_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS imports(
            id TEXT PRIMARY KEY,
            imported_at TEXT NOT NULL,
            source_path TEXT,
            counts_json TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn load_dataset(conn: &Connection) -> anyhow::Result<Dataset> {
    let districts = conn
        .prepare("SELECT district_id, district_name FROM districts ORDER BY sort_order")?
        .query_map([], |r| {
            Ok(District {
                district_id: r.get(0)?,
                district_name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to load districts")?;

    let schools = conn
        .prepare("SELECT school_id, school_name, district_id FROM schools ORDER BY sort_order")?
        .query_map([], |r| {
            Ok(School {
                school_id: r.get(0)?,
                school_name: r.get(1)?,
                district_id: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to load schools")?;

    let grades = conn
        .prepare("SELECT grade_id, grade_name FROM grades ORDER BY sort_order")?
        .query_map([], |r| {
            Ok(Grade {
                grade_id: r.get(0)?,
                grade_name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to load grades")?;

    let facts = conn
        .prepare(
            "SELECT district_id, school_id, grade_id, registered, participated
             FROM facts
             ORDER BY id",
        )?
        .query_map([], |r| {
            Ok(Fact {
                district_id: r.get(0)?,
                school_id: r.get(1)?,
                grade_id: r.get(2)?,
                registered: r.get(3)?,
                participated: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to load facts")?;

    let student_details = conn
        .prepare(
            "SELECT district, school_id, school_name, login_id, student_name, grade,
                    english_level, math_level
             FROM student_details
             ORDER BY sort_order",
        )?
        .query_map([], |r| {
            Ok(StudentDetail {
                district: r.get(0)?,
                school_id: r.get(1)?,
                school_name: r.get(2)?,
                login_id: r.get(3)?,
                student_name: r.get(4)?,
                grade: r.get(5)?,
                english_level: r.get(6)?,
                math_level: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to load student details")?;

    Ok(Dataset {
        districts,
        schools,
        grades,
        facts,
        student_details,
    })
}

/// Swaps the whole table set in one transaction and records the import.
pub fn replace_dataset(
    conn: &mut Connection,
    ds: &Dataset,
    source_path: Option<&Path>,
) -> anyhow::Result<ImportRecord> {
    let tx = conn.transaction()?;
    for table in ["districts", "schools", "grades", "facts", "student_details"] {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }

    {
        let mut stmt = tx.prepare(
            "INSERT INTO districts(district_id, district_name, sort_order) VALUES(?, ?, ?)",
        )?;
        for (i, d) in ds.districts.iter().enumerate() {
            stmt.execute((d.district_id, &d.district_name, i as i64))?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO schools(school_id, school_name, district_id, sort_order)
             VALUES(?, ?, ?, ?)",
        )?;
        for (i, s) in ds.schools.iter().enumerate() {
            stmt.execute((s.school_id, &s.school_name, s.district_id, i as i64))?;
        }

        let mut stmt =
            tx.prepare("INSERT INTO grades(grade_id, grade_name, sort_order) VALUES(?, ?, ?)")?;
        for (i, g) in ds.grades.iter().enumerate() {
            stmt.execute((g.grade_id, &g.grade_name, i as i64))?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO facts(district_id, school_id, grade_id, registered, participated)
             VALUES(?, ?, ?, ?, ?)",
        )?;
        for f in &ds.facts {
            stmt.execute((
                f.district_id,
                f.school_id,
                f.grade_id,
                f.registered,
                f.participated,
            ))?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO student_details(
                login_id, district, school_id, school_name, student_name, grade,
                english_level, math_level, sort_order
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (i, s) in ds.student_details.iter().enumerate() {
            stmt.execute(rusqlite::params![
                s.login_id,
                s.district,
                s.school_id,
                s.school_name,
                s.student_name,
                s.grade,
                s.english_level,
                s.math_level,
                i as i64,
            ])?;
        }
    }

    let record = ImportRecord {
        import_id: Uuid::new_v4().to_string(),
        imported_at: chrono::Utc::now().to_rfc3339(),
        source_path: source_path.map(|p| p.to_string_lossy().to_string()),
        counts: ds.counts(),
    };
    tx.execute(
        "INSERT INTO imports(id, imported_at, source_path, counts_json) VALUES(?, ?, ?, ?)",
        (
            &record.import_id,
            &record.imported_at,
            &record.source_path,
            serde_json::to_string(&record.counts)?,
        ),
    )?;
    tx.commit()?;
    Ok(record)
}

pub fn last_import(conn: &Connection) -> anyhow::Result<Option<ImportRecord>> {
    let row = conn
        .query_row(
            "SELECT id, imported_at, source_path, counts_json
             FROM imports
             ORDER BY imported_at DESC, rowid DESC
             LIMIT 1",
            [],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((import_id, imported_at, source_path, counts_json)) = row else {
        return Ok(None);
    };
    let counts: DatasetCounts = serde_json::from_str(&counts_json).unwrap_or_default();
    Ok(Some(ImportRecord {
        import_id,
        imported_at,
        source_path,
        counts,
    }))
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(serde_json::from_str(&text).ok()),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

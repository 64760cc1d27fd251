use std::collections::HashMap;
use std::str::FromStr;

use anyhow::Context;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteQueryResult, SqliteRow};
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use crate::attendance::{AttendanceAggregate, AttendanceError};
use crate::auth;
use crate::models::{
    split_tags, AttendanceRecord, AttendanceStatus, CodingLog, NewAttendanceRecord,
    NewCodingLog, NewResource, NewSubject, NewTask, NewTimetableEntry, Resource, Subject,
    SubjectAttendance, Task, TaskFilter, TaskPriority, TaskStatus, TimetableEntry, User,
    DEFAULT_TARGET_ATTENDANCE,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailTaken,
    #[error("subject {0} not found")]
    SubjectNotFound(i64),
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid database url {database_url}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("failed to open SQLite database")?;
    Ok(pool)
}

/// A private in-memory database. Limited to one connection since every
/// SQLite memory connection is its own database.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    init_db(&pool).await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

// ---------- users ----------

pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> StoreResult<i64> {
    let result = sqlx::query(
        "INSERT INTO users (name, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(now())
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(StoreError::EmailTaken),
        Err(err) => Err(err.into()),
    }
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> StoreResult<Option<User>> {
    let row = sqlx::query(
        "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    }))
}

// ---------- subjects ----------

pub async fn list_subjects(pool: &SqlitePool, user_id: i64) -> StoreResult<Vec<Subject>> {
    let rows = sqlx::query(
        r#"
        SELECT id, COALESCE(code, '') AS code, name, COALESCE(credits, 0) AS credits,
               COALESCE(target_attendance, ?) AS target_attendance, created_at
        FROM subjects
        WHERE user_id = ?
        ORDER BY name
        "#,
    )
    .bind(DEFAULT_TARGET_ATTENDANCE)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut subjects = Vec::with_capacity(rows.len());
    for row in rows {
        subjects.push(Subject {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            credits: row.try_get("credits")?,
            target_attendance: row.try_get("target_attendance")?,
            created_at: row.try_get("created_at")?,
        });
    }
    Ok(subjects)
}

pub async fn add_subject(pool: &SqlitePool, user_id: i64, subject: &NewSubject) -> StoreResult<i64> {
    let done = sqlx::query(
        r#"
        INSERT INTO subjects (user_id, code, name, credits, target_attendance, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(&subject.code)
    .bind(&subject.name)
    .bind(subject.credits)
    .bind(subject.target_attendance)
    .bind(now())
    .execute(pool)
    .await?;
    Ok(done.last_insert_rowid())
}

pub async fn delete_subject(pool: &SqlitePool, user_id: i64, subject_id: i64) -> StoreResult<bool> {
    let done = sqlx::query("DELETE FROM subjects WHERE id = ? AND user_id = ?")
        .bind(subject_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

/// Guard appended to `INSERT ... SELECT` statements. Binds the subject id then the user id.
const SUBJECT_OWNED: &str = "EXISTS (SELECT 1 FROM subjects WHERE id = ? AND user_id = ?)";

/// An insert guarded by [`SUBJECT_OWNED`] writes nothing when the subject is gone or foreign.
fn require_subject(done: SqliteQueryResult, subject_id: i64) -> StoreResult<SqliteQueryResult> {
    if done.rows_affected() == 0 {
        return Err(StoreError::SubjectNotFound(subject_id));
    }
    Ok(done)
}

// ---------- timetable ----------

pub async fn classes_for_day(
    pool: &SqlitePool,
    user_id: i64,
    day_of_week: u8,
) -> StoreResult<Vec<TimetableEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.subject_id, t.day_of_week, t.start_time, t.end_time,
               COALESCE(t.location, '') AS location,
               s.name AS subject_name, COALESCE(s.code, '') AS subject_code
        FROM timetable_entries t
        JOIN subjects s ON s.id = t.subject_id
        WHERE t.user_id = ? AND t.day_of_week = ?
        ORDER BY t.start_time
        "#,
    )
    .bind(user_id)
    .bind(i64::from(day_of_week))
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let day: i64 = row.try_get("day_of_week")?;
        entries.push(TimetableEntry {
            id: row.try_get("id")?,
            subject_id: row.try_get("subject_id")?,
            subject_name: row.try_get("subject_name")?,
            subject_code: row.try_get("subject_code")?,
            day_of_week: day as u8,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            location: row.try_get("location")?,
        });
    }
    Ok(entries)
}

pub async fn add_timetable_entry(
    pool: &SqlitePool,
    user_id: i64,
    entry: &NewTimetableEntry,
) -> StoreResult<i64> {
    let sql = format!(
        r#"
        INSERT INTO timetable_entries
        (user_id, subject_id, day_of_week, start_time, end_time, location, created_at)
        SELECT ?, ?, ?, ?, ?, ?, ?
        WHERE {SUBJECT_OWNED}
        "#
    );
    let done = sqlx::query(&sql)
        .bind(user_id)
        .bind(entry.subject_id)
        .bind(i64::from(entry.day_of_week))
        .bind(&entry.start_time)
        .bind(&entry.end_time)
        .bind(&entry.location)
        .bind(now())
        .bind(entry.subject_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(require_subject(done, entry.subject_id)?.last_insert_rowid())
}

pub async fn delete_timetable_entry(
    pool: &SqlitePool,
    user_id: i64,
    entry_id: i64,
) -> StoreResult<bool> {
    let done = sqlx::query("DELETE FROM timetable_entries WHERE id = ? AND user_id = ?")
        .bind(entry_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

// ---------- attendance ----------

/// Per-subject totals for one user, each projected against the subject target.
pub async fn attendance_summary(
    pool: &SqlitePool,
    user_id: i64,
) -> StoreResult<Vec<SubjectAttendance>> {
    let rows = sqlx::query(
        r#"
        SELECT
            s.id AS subject_id,
            COALESCE(s.code, '') AS subject_code,
            s.name AS subject_name,
            COUNT(a.id) AS total_classes,
            COALESCE(SUM(CASE WHEN a.status = 'present' THEN 1 ELSE 0 END), 0) AS present_classes,
            COALESCE(s.target_attendance, ?) AS target_attendance
        FROM subjects s
        LEFT JOIN attendance_records a
            ON a.subject_id = s.id AND a.user_id = s.user_id
        WHERE s.user_id = ?
        GROUP BY s.id
        ORDER BY s.name
        "#,
    )
    .bind(DEFAULT_TARGET_ATTENDANCE)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut summary = Vec::with_capacity(rows.len());
    for row in rows {
        let total: i64 = row.try_get("total_classes")?;
        let present: i64 = row.try_get("present_classes")?;
        let target: f64 = row.try_get("target_attendance")?;

        let aggregate = AttendanceAggregate::new(
            u32::try_from(total).unwrap_or(u32::MAX),
            u32::try_from(present).unwrap_or(u32::MAX),
            target,
        )?;

        summary.push(SubjectAttendance {
            subject_id: row.try_get("subject_id")?,
            subject_code: row.try_get("subject_code")?,
            subject_name: row.try_get("subject_name")?,
            total_classes: aggregate.total_classes(),
            present_classes: aggregate.present_classes(),
            target_attendance: aggregate.target_percentage(),
            projection: aggregate.project(),
        });
    }
    Ok(summary)
}

pub async fn recent_attendance(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> StoreResult<Vec<AttendanceRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.subject_id, a.class_date, a.status, COALESCE(a.note, '') AS note,
               s.name AS subject_name, COALESCE(s.code, '') AS subject_code
        FROM attendance_records a
        JOIN subjects s ON s.id = a.subject_id
        WHERE a.user_id = ?
        ORDER BY a.class_date DESC, a.id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(AttendanceRecord {
            id: row.try_get("id")?,
            subject_id: row.try_get("subject_id")?,
            subject_name: row.try_get("subject_name")?,
            subject_code: row.try_get("subject_code")?,
            class_date: row.try_get("class_date")?,
            status: parse_column(&row, "status")?,
            note: row.try_get("note")?,
        });
    }
    Ok(records)
}

/// Records one class, replacing any earlier record for the same subject and date.
pub async fn mark_attendance(
    pool: &SqlitePool,
    user_id: i64,
    record: &NewAttendanceRecord,
) -> StoreResult<()> {
    upsert_attendance(pool, user_id, record).await
}

async fn upsert_attendance<'e, E>(
    executor: E,
    user_id: i64,
    record: &NewAttendanceRecord,
) -> StoreResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        INSERT INTO attendance_records (user_id, subject_id, class_date, status, note, created_at)
        SELECT ?, ?, ?, ?, ?, ?
        WHERE {SUBJECT_OWNED}
        ON CONFLICT (user_id, subject_id, class_date)
        DO UPDATE SET status = excluded.status, note = excluded.note
        "#
    );
    let done = sqlx::query(&sql)
        .bind(user_id)
        .bind(record.subject_id)
        .bind(record.class_date)
        .bind(record.status.as_str())
        .bind(&record.note)
        .bind(now())
        .bind(record.subject_id)
        .bind(user_id)
        .execute(executor)
        .await?;
    require_subject(done, record.subject_id)?;
    Ok(())
}

pub async fn delete_attendance(pool: &SqlitePool, user_id: i64, record_id: i64) -> StoreResult<bool> {
    let done = sqlx::query("DELETE FROM attendance_records WHERE id = ? AND user_id = ?")
        .bind(record_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

// ---------- tasks ----------

const TASK_COLUMNS: &str = "SELECT t.id, t.subject_id, t.title, t.due_at, t.priority, t.status, \
     t.created_at, s.name AS subject_name, s.code AS subject_code \
     FROM tasks t \
     LEFT JOIN subjects s ON s.id = t.subject_id \
     WHERE t.user_id = ?";

pub async fn list_tasks(pool: &SqlitePool, user_id: i64, filter: TaskFilter) -> StoreResult<Vec<Task>> {
    let mut query = String::from(TASK_COLUMNS);

    if filter.status().is_some() {
        query.push_str(" AND t.status = ?");
    }
    query.push_str(
        " ORDER BY CASE t.status WHEN 'todo' THEN 0 ELSE 1 END, \
         CASE t.priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, \
         t.due_at IS NULL, t.due_at DESC",
    );

    let mut rows = sqlx::query(&query).bind(user_id);
    if let Some(status) = filter.status() {
        rows = rows.bind(status.as_str());
    }

    let records = rows.fetch_all(pool).await?;
    records.iter().map(task_from_row).collect()
}

/// Open tasks that are undated or due before `horizon`, most urgent first.
pub async fn upcoming_tasks(
    pool: &SqlitePool,
    user_id: i64,
    horizon: NaiveDateTime,
    limit: i64,
) -> StoreResult<Vec<Task>> {
    let query = format!(
        "{TASK_COLUMNS} AND t.status = 'todo' AND (t.due_at IS NULL OR t.due_at <= ?) \
         ORDER BY CASE t.priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, \
         t.due_at IS NULL, t.due_at \
         LIMIT ?"
    );

    let records = sqlx::query(&query)
        .bind(user_id)
        .bind(horizon.format("%Y-%m-%dT%H:%M:%S").to_string())
        .bind(limit)
        .fetch_all(pool)
        .await?;
    records.iter().map(task_from_row).collect()
}

pub fn upcoming_horizon() -> NaiveDateTime {
    now() + Duration::days(7)
}

fn task_from_row(row: &SqliteRow) -> StoreResult<Task> {
    Ok(Task {
        id: row.try_get("id")?,
        subject_id: row.try_get("subject_id")?,
        subject_name: row.try_get("subject_name")?,
        subject_code: row.try_get("subject_code")?,
        title: row.try_get("title")?,
        due_at: row.try_get("due_at")?,
        priority: parse_column(row, "priority")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn add_task(pool: &SqlitePool, user_id: i64, task: &NewTask) -> StoreResult<i64> {
    let sql = format!(
        r#"
        INSERT INTO tasks (user_id, subject_id, title, due_at, priority, status, created_at)
        SELECT ?, ?, ?, ?, ?, 'todo', ?
        WHERE ? IS NULL OR {SUBJECT_OWNED}
        "#
    );
    let done = sqlx::query(&sql)
        .bind(user_id)
        .bind(task.subject_id)
        .bind(&task.title)
        .bind(task.due_at.as_deref())
        .bind(task.priority.as_str())
        .bind(now())
        .bind(task.subject_id)
        .bind(task.subject_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(require_subject(done, task.subject_id.unwrap_or_default())?.last_insert_rowid())
}

pub async fn set_task_status(
    pool: &SqlitePool,
    user_id: i64,
    task_id: i64,
    status: TaskStatus,
) -> StoreResult<bool> {
    let done = sqlx::query("UPDATE tasks SET status = ? WHERE id = ? AND user_id = ?")
        .bind(status.as_str())
        .bind(task_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

pub async fn delete_task(pool: &SqlitePool, user_id: i64, task_id: i64) -> StoreResult<bool> {
    let done = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
        .bind(task_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

// ---------- resources ----------

pub async fn list_resources(pool: &SqlitePool, user_id: i64, limit: i64) -> StoreResult<Vec<Resource>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.subject_id, r.title, r.url, COALESCE(r.tags, '') AS tags, r.created_at,
               s.name AS subject_name
        FROM resources r
        LEFT JOIN subjects s ON s.id = r.subject_id
        WHERE r.user_id = ?
        ORDER BY r.created_at DESC, r.id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut resources = Vec::with_capacity(rows.len());
    for row in rows {
        let tags: String = row.try_get("tags")?;
        resources.push(Resource {
            id: row.try_get("id")?,
            subject_id: row.try_get("subject_id")?,
            subject_name: row.try_get("subject_name")?,
            title: row.try_get("title")?,
            url: row.try_get("url")?,
            tags: split_tags(&tags),
            created_at: row.try_get("created_at")?,
        });
    }
    Ok(resources)
}

pub async fn add_resource(pool: &SqlitePool, user_id: i64, resource: &NewResource) -> StoreResult<i64> {
    let sql = format!(
        r#"
        INSERT INTO resources (user_id, subject_id, title, url, tags, created_at)
        SELECT ?, ?, ?, ?, ?, ?
        WHERE ? IS NULL OR {SUBJECT_OWNED}
        "#
    );
    let done = sqlx::query(&sql)
        .bind(user_id)
        .bind(resource.subject_id)
        .bind(&resource.title)
        .bind(&resource.url)
        .bind(&resource.tags)
        .bind(now())
        .bind(resource.subject_id)
        .bind(resource.subject_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(require_subject(done, resource.subject_id.unwrap_or_default())?.last_insert_rowid())
}

pub async fn delete_resource(pool: &SqlitePool, user_id: i64, resource_id: i64) -> StoreResult<bool> {
    let done = sqlx::query("DELETE FROM resources WHERE id = ? AND user_id = ?")
        .bind(resource_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

// ---------- coding logs ----------

pub async fn list_coding_logs(pool: &SqlitePool, user_id: i64, limit: i64) -> StoreResult<Vec<CodingLog>> {
    let rows = sqlx::query(
        r#"
        SELECT id, log_date, platform, problem,
               COALESCE(difficulty, '') AS difficulty,
               COALESCE(topic, '') AS topic,
               COALESCE(link, '') AS link
        FROM coding_logs
        WHERE user_id = ?
        ORDER BY log_date DESC, created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut logs = Vec::with_capacity(rows.len());
    for row in rows {
        logs.push(CodingLog {
            id: row.try_get("id")?,
            log_date: row.try_get("log_date")?,
            platform: row.try_get("platform")?,
            problem: row.try_get("problem")?,
            difficulty: row.try_get("difficulty")?,
            topic: row.try_get("topic")?,
            link: row.try_get("link")?,
        });
    }
    Ok(logs)
}

pub async fn add_coding_log(pool: &SqlitePool, user_id: i64, log: &NewCodingLog) -> StoreResult<i64> {
    let done = sqlx::query(
        r#"
        INSERT INTO coding_logs (user_id, log_date, platform, problem, difficulty, topic, link, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(log.log_date)
    .bind(&log.platform)
    .bind(&log.problem)
    .bind(&log.difficulty)
    .bind(&log.topic)
    .bind(&log.link)
    .bind(now())
    .execute(pool)
    .await?;
    Ok(done.last_insert_rowid())
}

pub async fn delete_coding_log(pool: &SqlitePool, user_id: i64, log_id: i64) -> StoreResult<bool> {
    let done = sqlx::query("DELETE FROM coding_logs WHERE id = ? AND user_id = ?")
        .bind(log_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|err: T::Err| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    })
}

// ---------- CLI helpers ----------

/// Imports attendance rows for one user inside a single transaction.
///
/// Expected headers: `subject_code,class_date,status,note`.
pub async fn import_attendance_csv(
    pool: &SqlitePool,
    user_id: i64,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        subject_code: String,
        class_date: NaiveDate,
        status: String,
        note: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut subject_ids: HashMap<String, i64> = HashMap::new();
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("malformed row on line {line}"))?;
        let code = row.subject_code.trim().to_string();

        let subject_id = match subject_ids.get(&code) {
            Some(id) => *id,
            None => {
                let found: Option<i64> =
                    sqlx::query_scalar("SELECT id FROM subjects WHERE user_id = ? AND code = ?")
                        .bind(user_id)
                        .bind(&code)
                        .fetch_optional(&mut *tx)
                        .await?;
                let id = found
                    .with_context(|| format!("unknown subject code {code:?} on line {line}"))?;
                subject_ids.insert(code.clone(), id);
                id
            }
        };

        let status: AttendanceStatus = row
            .status
            .parse()
            .with_context(|| format!("bad status on line {line}"))?;

        let record = NewAttendanceRecord {
            subject_id,
            class_date: row.class_date,
            status,
            note: row.note.unwrap_or_default().trim().to_string(),
        };
        upsert_attendance(&mut *tx, user_id, &record).await?;
        written += 1;
    }

    tx.commit().await?;
    Ok(written)
}

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "demo1234";

/// Inserts a demo account with a populated semester. Returns false when the
/// account already exists.
pub async fn seed(pool: &SqlitePool) -> anyhow::Result<bool> {
    if find_user_by_email(pool, DEMO_EMAIL).await?.is_some() {
        return Ok(false);
    }

    let password_hash = auth::hash_password(DEMO_PASSWORD)?;
    let user_id = create_user(pool, "Demo Student", DEMO_EMAIL, &password_hash).await?;

    let subjects = vec![
        ("CS301", "Operating Systems", 4, 75.0),
        ("CS302", "Computer Networks", 4, 75.0),
        ("CS303", "Database Systems", 3, 80.0),
        ("MA201", "Discrete Mathematics", 3, 75.0),
    ];

    let mut subject_ids = Vec::new();
    for (code, name, credits, target) in subjects {
        let id = add_subject(
            pool,
            user_id,
            &NewSubject {
                code: code.to_string(),
                name: name.to_string(),
                credits,
                target_attendance: target,
            },
        )
        .await?;
        subject_ids.push(id);
    }

    let slots = [("09:00", "10:00"), ("10:15", "11:15"), ("11:30", "12:30")];
    for day in 0..5u8 {
        for (slot, (start, end)) in slots.iter().enumerate() {
            let subject_id = subject_ids[(usize::from(day) + slot) % subject_ids.len()];
            add_timetable_entry(
                pool,
                user_id,
                &NewTimetableEntry {
                    subject_id,
                    day_of_week: day,
                    start_time: start.to_string(),
                    end_time: end.to_string(),
                    location: format!("LH-{}", 101 + slot),
                },
            )
            .await?;
        }
    }

    // Four weeks of history with a different absence pattern per subject.
    let today = Local::now().date_naive();
    for (index, subject_id) in subject_ids.iter().enumerate() {
        for offset in 1..=20i64 {
            let status = if offset % (index as i64 + 3) == 0 {
                AttendanceStatus::Absent
            } else {
                AttendanceStatus::Present
            };
            mark_attendance(
                pool,
                user_id,
                &NewAttendanceRecord {
                    subject_id: *subject_id,
                    class_date: today - Duration::days(offset),
                    status,
                    note: String::new(),
                },
            )
            .await?;
        }
    }

    let tasks = vec![
        (Some(subject_ids[0]), "Finish scheduler lab", 2, TaskPriority::High),
        (Some(subject_ids[1]), "Read chapter on TCP congestion control", 5, TaskPriority::Medium),
        (Some(subject_ids[2]), "Normalize the library schema", 9, TaskPriority::Low),
        (None, "Renew hostel form", 1, TaskPriority::Medium),
    ];
    for (subject_id, title, due_in, priority) in tasks {
        add_task(
            pool,
            user_id,
            &NewTask {
                subject_id,
                title: title.to_string(),
                due_at: Some((today + Duration::days(due_in)).format("%Y-%m-%d").to_string()),
                priority,
            },
        )
        .await?;
    }

    add_resource(
        pool,
        user_id,
        &NewResource {
            subject_id: Some(subject_ids[0]),
            title: "Operating Systems: Three Easy Pieces".to_string(),
            url: "https://pages.cs.wisc.edu/~remzi/OSTEP/".to_string(),
            tags: "book, os".to_string(),
        },
    )
    .await?;

    let logs = vec![
        ("LeetCode", "Two Sum", "easy", "hashing"),
        ("LeetCode", "Course Schedule", "medium", "graphs"),
        ("Codeforces", "Watermelon", "easy", "math"),
    ];
    for (offset, (platform, problem, difficulty, topic)) in logs.into_iter().enumerate() {
        add_coding_log(
            pool,
            user_id,
            &NewCodingLog {
                log_date: today - Duration::days(offset as i64),
                platform: platform.to_string(),
                problem: problem.to_string(),
                difficulty: difficulty.to_string(),
                topic: topic.to_string(),
                link: String::new(),
            },
        )
        .await?;
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn user(pool: &SqlitePool, email: &str) -> i64 {
        create_user(pool, "Test", email, "hash").await.unwrap()
    }

    async fn subject(pool: &SqlitePool, user_id: i64, code: &str, target: f64) -> i64 {
        add_subject(
            pool,
            user_id,
            &NewSubject {
                code: code.to_string(),
                name: format!("Subject {code}"),
                credits: 3,
                target_attendance: target,
            },
        )
        .await
        .unwrap()
    }

    async fn mark(pool: &SqlitePool, user_id: i64, subject_id: i64, day: u32, status: AttendanceStatus) {
        mark_attendance(
            pool,
            user_id,
            &NewAttendanceRecord {
                subject_id,
                class_date: NaiveDate::from_ymd_opt(2026, 9, day).unwrap(),
                status,
                note: String::new(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let pool = connect_in_memory().await.unwrap();
        user(&pool, "a@example.com").await;
        let err = create_user(&pool, "Other", "a@example.com", "hash").await.unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken));
    }

    #[tokio::test]
    async fn summary_projects_each_subject() {
        let pool = connect_in_memory().await.unwrap();
        let user_id = user(&pool, "a@example.com").await;
        let os = subject(&pool, user_id, "OS", 75.0).await;
        let empty = subject(&pool, user_id, "NW", 75.0).await;

        for day in 1..=10 {
            let status = if day <= 6 {
                AttendanceStatus::Present
            } else {
                AttendanceStatus::Absent
            };
            mark(&pool, user_id, os, day, status).await;
        }

        let summary = attendance_summary(&pool, user_id).await.unwrap();
        assert_eq!(summary.len(), 2);

        let row = summary.iter().find(|row| row.subject_id == os).unwrap();
        assert_eq!(row.total_classes, 10);
        assert_eq!(row.present_classes, 6);
        assert_eq!(row.projection.percentage, 60.0);
        assert_eq!(row.projection.need_attend, 6);
        assert!(row.below_target());

        let row = summary.iter().find(|row| row.subject_id == empty).unwrap();
        assert_eq!(row.total_classes, 0);
        assert_eq!(row.projection.percentage, 0.0);
        assert!(!row.below_target());
    }

    #[tokio::test]
    async fn marking_same_date_replaces_record() {
        let pool = connect_in_memory().await.unwrap();
        let user_id = user(&pool, "a@example.com").await;
        let os = subject(&pool, user_id, "OS", 75.0).await;

        mark(&pool, user_id, os, 3, AttendanceStatus::Absent).await;
        mark(&pool, user_id, os, 3, AttendanceStatus::Present).await;

        let records = recent_attendance(&pool, user_id, 50).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn other_users_rows_are_untouchable() {
        let pool = connect_in_memory().await.unwrap();
        let alice = user(&pool, "alice@example.com").await;
        let bob = user(&pool, "bob@example.com").await;
        let os = subject(&pool, alice, "OS", 75.0).await;

        assert!(!delete_subject(&pool, bob, os).await.unwrap());
        assert!(list_subjects(&pool, bob).await.unwrap().is_empty());

        let err = mark_attendance(
            &pool,
            bob,
            &NewAttendanceRecord {
                subject_id: os,
                class_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                status: AttendanceStatus::Present,
                note: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::SubjectNotFound(id) if id == os));

        assert!(delete_subject(&pool, alice, os).await.unwrap());
    }

    #[tokio::test]
    async fn inserts_against_missing_or_foreign_subjects_write_nothing() {
        let pool = connect_in_memory().await.unwrap();
        let alice = user(&pool, "alice@example.com").await;
        let bob = user(&pool, "bob@example.com").await;
        let os = subject(&pool, alice, "OS", 75.0).await;
        let gone = subject(&pool, bob, "NW", 75.0).await;
        assert!(delete_subject(&pool, bob, gone).await.unwrap());

        for subject_id in [os, gone] {
            let entry = NewTimetableEntry {
                subject_id,
                day_of_week: 1,
                start_time: "09:00".to_string(),
                end_time: "10:00".to_string(),
                location: String::new(),
            };
            let err = add_timetable_entry(&pool, bob, &entry).await.unwrap_err();
            assert!(matches!(err, StoreError::SubjectNotFound(id) if id == subject_id));

            let task = NewTask {
                subject_id: Some(subject_id),
                title: "lab".to_string(),
                due_at: None,
                priority: TaskPriority::Medium,
            };
            let err = add_task(&pool, bob, &task).await.unwrap_err();
            assert!(matches!(err, StoreError::SubjectNotFound(id) if id == subject_id));

            let resource = NewResource {
                subject_id: Some(subject_id),
                title: "notes".to_string(),
                url: "https://example.com".to_string(),
                tags: String::new(),
            };
            let err = add_resource(&pool, bob, &resource).await.unwrap_err();
            assert!(matches!(err, StoreError::SubjectNotFound(id) if id == subject_id));

            let record = NewAttendanceRecord {
                subject_id,
                class_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                status: AttendanceStatus::Present,
                note: String::new(),
            };
            let err = mark_attendance(&pool, bob, &record).await.unwrap_err();
            assert!(matches!(err, StoreError::SubjectNotFound(id) if id == subject_id));
        }

        assert!(classes_for_day(&pool, bob, 1).await.unwrap().is_empty());
        assert!(list_tasks(&pool, bob, TaskFilter::All).await.unwrap().is_empty());
        assert!(list_resources(&pool, bob, 50).await.unwrap().is_empty());
        assert!(recent_attendance(&pool, bob, 50).await.unwrap().is_empty());

        let loose = NewTask {
            subject_id: None,
            title: "read".to_string(),
            due_at: None,
            priority: TaskPriority::Low,
        };
        add_task(&pool, bob, &loose).await.unwrap();
        let loose = NewResource {
            subject_id: None,
            title: "notes".to_string(),
            url: "https://example.com".to_string(),
            tags: String::new(),
        };
        add_resource(&pool, bob, &loose).await.unwrap();
        assert_eq!(list_tasks(&pool, bob, TaskFilter::All).await.unwrap().len(), 1);
        assert_eq!(list_resources(&pool, bob, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn task_listing_orders_by_status_then_priority() {
        let pool = connect_in_memory().await.unwrap();
        let user_id = user(&pool, "a@example.com").await;

        let low = add_task(
            &pool,
            user_id,
            &NewTask {
                subject_id: None,
                title: "low".to_string(),
                due_at: Some("2026-09-10".to_string()),
                priority: TaskPriority::Low,
            },
        )
        .await
        .unwrap();
        let high = add_task(
            &pool,
            user_id,
            &NewTask {
                subject_id: None,
                title: "high".to_string(),
                due_at: None,
                priority: TaskPriority::High,
            },
        )
        .await
        .unwrap();
        let done = add_task(
            &pool,
            user_id,
            &NewTask {
                subject_id: None,
                title: "done".to_string(),
                due_at: None,
                priority: TaskPriority::High,
            },
        )
        .await
        .unwrap();
        assert!(set_task_status(&pool, user_id, done, TaskStatus::Done).await.unwrap());

        let all: Vec<i64> = list_tasks(&pool, user_id, TaskFilter::All)
            .await
            .unwrap()
            .iter()
            .map(|task| task.id)
            .collect();
        assert_eq!(all, vec![high, low, done]);

        let todo = list_tasks(&pool, user_id, TaskFilter::Todo).await.unwrap();
        assert_eq!(todo.len(), 2);
        let finished = list_tasks(&pool, user_id, TaskFilter::Done).await.unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn upcoming_tasks_skip_far_future() {
        let pool = connect_in_memory().await.unwrap();
        let user_id = user(&pool, "a@example.com").await;
        let horizon = NaiveDate::from_ymd_opt(2026, 9, 8)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        for (title, due) in [("soon", Some("2026-09-05")), ("later", Some("2026-10-01")), ("undated", None)] {
            add_task(
                &pool,
                user_id,
                &NewTask {
                    subject_id: None,
                    title: title.to_string(),
                    due_at: due.map(str::to_string),
                    priority: TaskPriority::Medium,
                },
            )
            .await
            .unwrap();
        }

        let titles: Vec<String> = upcoming_tasks(&pool, user_id, horizon, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|task| task.title)
            .collect();
        assert_eq!(titles, vec!["soon".to_string(), "undated".to_string()]);
    }

    #[tokio::test]
    async fn deleting_subject_detaches_tasks_and_drops_attendance() {
        let pool = connect_in_memory().await.unwrap();
        let user_id = user(&pool, "a@example.com").await;
        let os = subject(&pool, user_id, "OS", 75.0).await;
        mark(&pool, user_id, os, 1, AttendanceStatus::Present).await;
        add_task(
            &pool,
            user_id,
            &NewTask {
                subject_id: Some(os),
                title: "lab".to_string(),
                due_at: None,
                priority: TaskPriority::High,
            },
        )
        .await
        .unwrap();

        assert!(delete_subject(&pool, user_id, os).await.unwrap());
        assert!(recent_attendance(&pool, user_id, 50).await.unwrap().is_empty());
        let tasks = list_tasks(&pool, user_id, TaskFilter::All).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].subject_id, None);
    }

    #[tokio::test]
    async fn csv_import_upserts_rows() {
        let pool = connect_in_memory().await.unwrap();
        let user_id = user(&pool, "a@example.com").await;
        subject(&pool, user_id, "OS", 75.0).await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "subject_code,class_date,status,note").unwrap();
        writeln!(file, "OS,2026-09-01,present,").unwrap();
        writeln!(file, "OS,2026-09-02,Absent,sick").unwrap();
        writeln!(file, "OS,2026-09-02,present,recovered").unwrap();
        file.flush().unwrap();

        let written = import_attendance_csv(&pool, user_id, file.path()).await.unwrap();
        assert_eq!(written, 3);

        let summary = attendance_summary(&pool, user_id).await.unwrap();
        assert_eq!(summary[0].total_classes, 2);
        assert_eq!(summary[0].present_classes, 2);
    }

    #[tokio::test]
    async fn csv_import_rejects_unknown_subject() {
        let pool = connect_in_memory().await.unwrap();
        let user_id = user(&pool, "a@example.com").await;
        subject(&pool, user_id, "OS", 75.0).await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "subject_code,class_date,status,note").unwrap();
        writeln!(file, "OS,2026-09-01,present,").unwrap();
        writeln!(file, "XX,2026-09-02,present,").unwrap();
        file.flush().unwrap();

        let err = import_attendance_csv(&pool, user_id, file.path()).await.unwrap_err();
        assert!(err.to_string().contains("XX"));
        assert!(recent_attendance(&pool, user_id, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = connect_in_memory().await.unwrap();
        assert!(seed(&pool).await.unwrap());
        assert!(!seed(&pool).await.unwrap());

        let demo = find_user_by_email(&pool, DEMO_EMAIL).await.unwrap().unwrap();
        assert_eq!(list_subjects(&pool, demo.id).await.unwrap().len(), 4);
        assert!(auth::verify_password(DEMO_PASSWORD, &demo.password_hash));
    }
}

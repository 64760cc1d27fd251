use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use serde_json::json;

use crate::auth::{self, MIN_PASSWORD_LEN, SESSION_COOKIE};
use crate::db::{self, StoreError};
use crate::models::{Task, TaskFilter, TaskStatus, WEEKDAYS};
use crate::report;
use crate::web::error::{AppError, AppResult};
use crate::web::extract::CurrentUser;
use crate::web::forms::{
    AttendanceForm, CodingForm, CodingIdForm, LoginForm, RecordIdForm, RegisterForm,
    ResourceForm, ResourceIdForm, ShowQuery, SubjectForm, SubjectIdForm, TaskDeleteForm,
    TaskForm, TaskToggleForm, TimetableDeleteForm, TimetableForm, TimetableQuery,
};
use crate::web::AppState;

const RECENT_ATTENDANCE_LIMIT: i64 = 50;
const UPCOMING_TASK_LIMIT: i64 = 10;
const LIBRARY_LIMIT: i64 = 200;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

fn form_error(state: &AppState, page: &str, message: &str) -> AppResult<Response> {
    let html = state.templates.render(page, &json!({ "error": message }))?;
    Ok((StatusCode::BAD_REQUEST, html).into_response())
}

// ---------- auth ----------

pub async fn home(user: Option<CurrentUser>) -> Redirect {
    match user {
        Some(_) => Redirect::to("/dashboard"),
        None => Redirect::to("/login"),
    }
}

pub async fn register_form(State(state): State<AppState>) -> AppResult<Html<String>> {
    Ok(state.templates.render("register", &json!({}))?)
}

pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let name = form.name.trim().to_string();
    let email = auth::normalize_email(&form.email);

    if name.is_empty() || email.is_empty() {
        return form_error(&state, "register", "Name and email are required.");
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return form_error(&state, "register", "Password must be at least 6 characters.");
    }

    let password = form.password;
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??;

    match db::create_user(&state.pool, &name, &email, &password_hash).await {
        Ok(user_id) => {
            tracing::info!(user_id, "registered new user");
            Ok(Redirect::to("/login").into_response())
        }
        Err(StoreError::EmailTaken) => form_error(
            &state,
            "register",
            "Email already registered. Try logging in.",
        ),
        Err(err) => Err(err.into()),
    }
}

pub async fn login_form(State(state): State<AppState>) -> AppResult<Html<String>> {
    Ok(state.templates.render("login", &json!({}))?)
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let email = auth::normalize_email(&form.email);
    let Some(user) = db::find_user_by_email(&state.pool, &email).await? else {
        return form_error(&state, "login", "Invalid email or password.");
    };

    let password = form.password;
    let stored_hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored_hash))
        .await
        .map_err(anyhow::Error::from)?;
    if !verified {
        tracing::debug!(user_id = user.id, "rejected login");
        return form_error(&state, "login", "Invalid email or password.");
    }

    let session_id = state.sessions.create(user.id, &user.name, &user.email).await;
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    tracing::info!(user_id = user.id, "user logged in");
    Ok((jar.add(cookie), Redirect::to("/dashboard")).into_response())
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value()).await;
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/login"))
}

// ---------- dashboard ----------

pub async fn dashboard(State(state): State<AppState>, user: CurrentUser) -> AppResult<Html<String>> {
    let today = today();
    let classes = db::classes_for_day(&state.pool, user.id, weekday_index(today)).await?;
    let tasks = db::upcoming_tasks(
        &state.pool,
        user.id,
        db::upcoming_horizon(),
        UPCOMING_TASK_LIMIT,
    )
    .await?;
    let attendance = db::attendance_summary(&state.pool, user.id).await?;

    Ok(state.templates.render(
        "dashboard",
        &json!({
            "user": user,
            "today": today.to_string(),
            "weekday": today.format("%A").to_string(),
            "classes": classes,
            "tasks": tasks,
            "attendance": attendance,
        }),
    )?)
}

// ---------- subjects ----------

pub async fn subjects_page(State(state): State<AppState>, user: CurrentUser) -> AppResult<Html<String>> {
    let subjects = db::list_subjects(&state.pool, user.id).await?;
    Ok(state
        .templates
        .render("subjects", &json!({ "user": user, "subjects": subjects }))?)
}

pub async fn subjects_add(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<SubjectForm>,
) -> AppResult<Redirect> {
    let subject = form.validate()?;
    db::add_subject(&state.pool, user.id, &subject).await?;
    Ok(Redirect::to("/subjects"))
}

pub async fn subjects_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<SubjectIdForm>,
) -> AppResult<Redirect> {
    if !db::delete_subject(&state.pool, user.id, form.subject_id).await? {
        tracing::debug!(user_id = user.id, subject_id = form.subject_id, "no subject deleted");
    }
    Ok(Redirect::to("/subjects"))
}

// ---------- timetable ----------

#[derive(Serialize)]
struct DayTab {
    index: u8,
    label: &'static str,
    active: bool,
}

pub async fn timetable_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<TimetableQuery>,
) -> AppResult<Html<String>> {
    let day = query.day.unwrap_or_else(|| weekday_index(today()));
    let Some(day_label) = WEEKDAYS.get(usize::from(day)) else {
        return Err(AppError::bad_request("day must be between 0 (Mon) and 6 (Sun)"));
    };

    let subjects = db::list_subjects(&state.pool, user.id).await?;
    let entries = db::classes_for_day(&state.pool, user.id, day).await?;
    let days: Vec<DayTab> = WEEKDAYS
        .iter()
        .zip(0u8..)
        .map(|(&label, index)| DayTab {
            index,
            label,
            active: index == day,
        })
        .collect();

    Ok(state.templates.render(
        "timetable",
        &json!({
            "user": user,
            "day": day,
            "day_label": day_label,
            "days": days,
            "subjects": subjects,
            "entries": entries,
        }),
    )?)
}

pub async fn timetable_add(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<TimetableForm>,
) -> AppResult<Redirect> {
    let entry = form.validate()?;
    db::add_timetable_entry(&state.pool, user.id, &entry).await?;
    Ok(Redirect::to(&format!("/timetable?day={}", entry.day_of_week)))
}

pub async fn timetable_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<TimetableDeleteForm>,
) -> AppResult<Redirect> {
    db::delete_timetable_entry(&state.pool, user.id, form.entry_id).await?;
    Ok(Redirect::to(&format!("/timetable?day={}", form.day.min(6))))
}

// ---------- attendance ----------

pub async fn attendance_page(State(state): State<AppState>, user: CurrentUser) -> AppResult<Html<String>> {
    let subjects = db::list_subjects(&state.pool, user.id).await?;
    let recent = db::recent_attendance(&state.pool, user.id, RECENT_ATTENDANCE_LIMIT).await?;
    let summary = db::attendance_summary(&state.pool, user.id).await?;

    Ok(state.templates.render(
        "attendance",
        &json!({
            "user": user,
            "subjects": subjects,
            "recent": recent,
            "summary": summary,
            "today": today().to_string(),
        }),
    )?)
}

pub async fn attendance_mark(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<AttendanceForm>,
) -> AppResult<Redirect> {
    let record = form.validate()?;
    db::mark_attendance(&state.pool, user.id, &record).await?;
    Ok(Redirect::to("/attendance"))
}

pub async fn attendance_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<RecordIdForm>,
) -> AppResult<Redirect> {
    db::delete_attendance(&state.pool, user.id, form.record_id).await?;
    Ok(Redirect::to("/attendance"))
}

// ---------- tasks ----------

#[derive(Serialize)]
struct TaskView<'a> {
    #[serde(flatten)]
    task: &'a Task,
    next_status: TaskStatus,
}

fn tasks_url(show: &str) -> String {
    format!("/tasks?show={}", TaskFilter::parse_lenient(Some(show)))
}

pub async fn tasks_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ShowQuery>,
) -> AppResult<Html<String>> {
    let show = TaskFilter::parse_lenient(query.show.as_deref());
    let subjects = db::list_subjects(&state.pool, user.id).await?;
    let tasks = db::list_tasks(&state.pool, user.id, show).await?;
    let views: Vec<TaskView<'_>> = tasks
        .iter()
        .map(|task| TaskView {
            task,
            next_status: task.status.toggled(),
        })
        .collect();

    Ok(state.templates.render(
        "tasks",
        &json!({
            "user": user,
            "tasks": views,
            "subjects": subjects,
            "show": show,
            "today": today().to_string(),
        }),
    )?)
}

pub async fn tasks_add(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<TaskForm>,
) -> AppResult<Redirect> {
    let task = form.validate()?;
    db::add_task(&state.pool, user.id, &task).await?;
    Ok(Redirect::to("/tasks"))
}

pub async fn tasks_toggle(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<TaskToggleForm>,
) -> AppResult<Redirect> {
    let status: TaskStatus = form
        .next_status
        .parse()
        .map_err(|_| AppError::bad_request("Invalid status"))?;
    db::set_task_status(&state.pool, user.id, form.task_id, status).await?;
    Ok(Redirect::to(&tasks_url(&form.show)))
}

pub async fn tasks_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<TaskDeleteForm>,
) -> AppResult<Redirect> {
    db::delete_task(&state.pool, user.id, form.task_id).await?;
    Ok(Redirect::to(&tasks_url(&form.show)))
}

// ---------- resources ----------

pub async fn resources_page(State(state): State<AppState>, user: CurrentUser) -> AppResult<Html<String>> {
    let subjects = db::list_subjects(&state.pool, user.id).await?;
    let resources = db::list_resources(&state.pool, user.id, LIBRARY_LIMIT).await?;
    Ok(state.templates.render(
        "resources",
        &json!({ "user": user, "subjects": subjects, "resources": resources }),
    )?)
}

pub async fn resources_add(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ResourceForm>,
) -> AppResult<Redirect> {
    let resource = form.validate()?;
    db::add_resource(&state.pool, user.id, &resource).await?;
    Ok(Redirect::to("/resources"))
}

pub async fn resources_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ResourceIdForm>,
) -> AppResult<Redirect> {
    db::delete_resource(&state.pool, user.id, form.resource_id).await?;
    Ok(Redirect::to("/resources"))
}

// ---------- coding ----------

pub async fn coding_page(State(state): State<AppState>, user: CurrentUser) -> AppResult<Html<String>> {
    let logs = db::list_coding_logs(&state.pool, user.id, LIBRARY_LIMIT).await?;
    let by_platform = report::summarize_coding(&logs, |log| log.platform.as_str());
    let by_difficulty = report::summarize_coding(&logs, |log| log.difficulty.as_str());

    Ok(state.templates.render(
        "coding",
        &json!({
            "user": user,
            "logs": logs,
            "by_platform": by_platform,
            "by_difficulty": by_difficulty,
            "today": today().to_string(),
        }),
    )?)
}

pub async fn coding_add(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CodingForm>,
) -> AppResult<Redirect> {
    let log = form.validate()?;
    db::add_coding_log(&state.pool, user.id, &log).await?;
    Ok(Redirect::to("/coding"))
}

pub async fn coding_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CodingIdForm>,
) -> AppResult<Redirect> {
    db::delete_coding_log(&state.pool, user.id, form.log_id).await?;
    Ok(Redirect::to("/coding"))
}

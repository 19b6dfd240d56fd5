use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use super::error::{ApiResult, AppError};
use super::state::AppState;
use super::types::*;
use crate::access::{require, Capability, Identity, ResourceKind, ResourceRef, ScopeFilter};
use crate::auth::{encode_jwt, hash_password, verify_password};
use crate::chat::{self, ChatExchange};
use crate::db::{
    BacklogItem, CreateBacklogItem, CreatePerformanceLog, CreateProject, CreateSprint, CreateTask,
    CreateUser, PerformanceLog, Project, ProjectMember, Sprint, Task, TaskStatus, UpdateBacklogItem,
    UpdateProject, UpdateSprint, UpdateTask, UpdateUser, User,
};
use crate::lifecycle::{parse_status, set_status};

type Caller = Extension<Identity>;

fn item(id: i64) -> Option<ResourceRef> {
    Some(ResourceRef::Item(id))
}

fn in_project(project_id: i64) -> Option<ResourceRef> {
    Some(ResourceRef::InProject(project_id))
}

pub async fn health() -> &'static str {
    "ok"
}

// Auth

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || AppError::unauthorized("Invalid email or password");

    let (user, password_hash) = state.db.get_user_credentials(&req.email)?.ok_or_else(invalid)?;
    if !verify_password(&req.password, &password_hash) {
        tracing::warn!("Failed login for user {}", user.id);
        return Err(invalid());
    }

    let token = encode_jwt(&user, &state.auth.jwt_secret, state.auth.jwt_expiry_secs)
        .map_err(|e| crate::error::Error::Internal(format!("{:#}", e)))?;
    tracing::info!("User {} logged in", user.id);
    Ok(Json(LoginResponse { user, token }))
}

/// Re-issue a token carrying the role currently stored for the caller.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(caller): Caller,
) -> ApiResult<Json<LoginResponse>> {
    let user = state.db.get_user(caller.user_id)?;
    let token = encode_jwt(&user, &state.auth.jwt_secret, state.auth.jwt_expiry_secs)
        .map_err(|e| crate::error::Error::Internal(format!("{:#}", e)))?;
    tracing::debug!("Refreshed token for user {}", user.id);
    Ok(Json(LoginResponse { user, token }))
}

pub async fn me(State(state): State<AppState>, Extension(caller): Caller) -> ApiResult<Json<User>> {
    Ok(Json(state.db.get_user(caller.user_id)?))
}

// Users

pub async fn list_users(State(state): State<AppState>, Extension(caller): Caller) -> ApiResult<Json<Vec<User>>> {
    require(&state.db, &caller, ResourceKind::User, None, Capability::Read)?;
    Ok(Json(state.db.get_users()?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require(&state.db, &caller, ResourceKind::User, None, Capability::Manage)?;
    if req.full_name.trim().is_empty() {
        return Err(AppError::validation("fullName is required"));
    }
    if !req.email.contains('@') {
        return Err(AppError::validation("A valid email is required"));
    }

    let password_hash = hash_password(&req.password, state.auth.bcrypt_cost)?;
    let user = state.db.create_user(&CreateUser {
        full_name: req.full_name,
        email: req.email,
        password_hash,
        role: req.role,
    })?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<User>> {
    require(&state.db, &caller, ResourceKind::User, item(user_id), Capability::Read)?;
    Ok(Json(state.db.get_user(user_id)?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require(&state.db, &caller, ResourceKind::User, item(user_id), Capability::Manage)?;
    if let Some(email) = &req.email {
        if !email.contains('@') {
            return Err(AppError::validation("A valid email is required"));
        }
    }

    let password_hash = req
        .password
        .as_deref()
        .map(|p| hash_password(p, state.auth.bcrypt_cost))
        .transpose()?;
    let user = state.db.update_user(user_id, &UpdateUser {
        full_name: req.full_name,
        email: req.email,
        password_hash,
        role: req.role,
    })?;
    Ok(Json(user))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<User>> {
    require(&state.db, &caller, ResourceKind::User, item(user_id), Capability::Manage)?;
    Ok(Json(state.db.update_user_role(user_id, req.role)?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    require(&state.db, &caller, ResourceKind::User, item(user_id), Capability::Manage)?;
    if user_id == caller.user_id {
        return Err(AppError::validation("You cannot delete your own account"));
    }
    state.db.delete_user(user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Projects

pub async fn list_projects(State(state): State<AppState>, Extension(caller): Caller) -> ApiResult<Json<Vec<Project>>> {
    let decision = require(&state.db, &caller, ResourceKind::Project, None, Capability::Read)?;
    let projects = state
        .db
        .get_projects()?
        .into_iter()
        .filter(|p| decision.permits_project(p.id))
        .collect();
    Ok(Json(projects))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    require(&state.db, &caller, ResourceKind::Project, None, Capability::Manage)?;
    let project = state.db.create_project(&CreateProject {
        name: req.name,
        description: req.description,
        created_by: caller.user_id,
        start_date: req.start_date,
        end_date: req.end_date,
    })?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Project>> {
    require(&state.db, &caller, ResourceKind::Project, item(project_id), Capability::Read)?;
    Ok(Json(state.db.get_project(project_id)?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
    Json(req): Json<UpdateProject>,
) -> ApiResult<Json<Project>> {
    require(&state.db, &caller, ResourceKind::Project, item(project_id), Capability::Manage)?;
    Ok(Json(state.db.update_project(project_id, &req)?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
) -> ApiResult<StatusCode> {
    require(&state.db, &caller, ResourceKind::Project, item(project_id), Capability::Manage)?;
    state.db.delete_project(project_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<ProjectMember>>> {
    require(&state.db, &caller, ResourceKind::Project, item(project_id), Capability::Read)?;
    Ok(Json(state.db.get_members(project_id)?))
}

pub async fn add_member(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<AddMemberResponse>)> {
    require(&state.db, &caller, ResourceKind::Project, item(project_id), Capability::Manage)?;
    let response = match (req.user_id, req.employee_ids) {
        (Some(user_id), None) => AddMemberResponse::Single(state.db.assign_employee(project_id, user_id)?),
        (None, Some(ids)) => AddMemberResponse::Bulk(state.db.assign_employees(project_id, &ids)?),
        _ => return Err(AppError::validation("Provide either userId or employeeIds")),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path((project_id, user_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    require(&state.db, &caller, ResourceKind::Project, item(project_id), Capability::Manage)?;
    state.db.remove_member(project_id, user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Backlog

pub async fn list_backlog(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<BacklogItem>>> {
    require(&state.db, &caller, ResourceKind::BacklogItem, in_project(project_id), Capability::Read)?;
    Ok(Json(state.db.get_backlog(project_id)?))
}

pub async fn create_backlog_item(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
    Json(req): Json<CreateBacklogItemRequest>,
) -> ApiResult<(StatusCode, Json<BacklogItem>)> {
    require(&state.db, &caller, ResourceKind::BacklogItem, in_project(project_id), Capability::Manage)?;
    let item = state.db.create_backlog_item(&CreateBacklogItem {
        project_id,
        title: req.title,
        description: req.description,
        priority: req.priority,
    })?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_backlog_item(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(item_id): Path<i64>,
) -> ApiResult<Json<BacklogItem>> {
    require(&state.db, &caller, ResourceKind::BacklogItem, item(item_id), Capability::Read)?;
    Ok(Json(state.db.get_backlog_item(item_id)?))
}

pub async fn update_backlog_item(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(item_id): Path<i64>,
    Json(req): Json<UpdateBacklogItem>,
) -> ApiResult<Json<BacklogItem>> {
    require(&state.db, &caller, ResourceKind::BacklogItem, item(item_id), Capability::Manage)?;
    Ok(Json(state.db.update_backlog_item(item_id, &req)?))
}

pub async fn delete_backlog_item(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(item_id): Path<i64>,
) -> ApiResult<StatusCode> {
    require(&state.db, &caller, ResourceKind::BacklogItem, item(item_id), Capability::Manage)?;
    state.db.delete_backlog_item(item_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Sprints

pub async fn list_sprints(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<Sprint>>> {
    require(&state.db, &caller, ResourceKind::Sprint, in_project(project_id), Capability::Read)?;
    Ok(Json(state.db.get_sprints(project_id)?))
}

pub async fn create_sprint(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
    Json(req): Json<CreateSprintRequest>,
) -> ApiResult<(StatusCode, Json<Sprint>)> {
    require(&state.db, &caller, ResourceKind::Sprint, in_project(project_id), Capability::Manage)?;
    let sprint = state.db.create_sprint(&CreateSprint {
        project_id,
        name: req.name,
        start_date: req.start_date,
        end_date: req.end_date,
        status: req.status,
    })?;
    Ok((StatusCode::CREATED, Json(sprint)))
}

pub async fn get_sprint(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(sprint_id): Path<i64>,
) -> ApiResult<Json<Sprint>> {
    require(&state.db, &caller, ResourceKind::Sprint, item(sprint_id), Capability::Read)?;
    Ok(Json(state.db.get_sprint(sprint_id)?))
}

pub async fn update_sprint(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(sprint_id): Path<i64>,
    Json(req): Json<UpdateSprint>,
) -> ApiResult<Json<Sprint>> {
    require(&state.db, &caller, ResourceKind::Sprint, item(sprint_id), Capability::Manage)?;
    Ok(Json(state.db.update_sprint(sprint_id, &req)?))
}

pub async fn delete_sprint(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(sprint_id): Path<i64>,
) -> ApiResult<StatusCode> {
    require(&state.db, &caller, ResourceKind::Sprint, item(sprint_id), Capability::Manage)?;
    state.db.delete_sprint(sprint_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Tasks

pub async fn list_sprint_tasks(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(sprint_id): Path<i64>,
) -> ApiResult<Json<Vec<Task>>> {
    require(&state.db, &caller, ResourceKind::Sprint, item(sprint_id), Capability::Read)?;
    Ok(Json(state.db.get_tasks_for_sprint(sprint_id)?))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(sprint_id): Path<i64>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    require(&state.db, &caller, ResourceKind::Sprint, item(sprint_id), Capability::Manage)?;
    let status = match req.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => TaskStatus::Todo,
    };
    let task = state.db.create_task(&CreateTask {
        sprint_id,
        title: req.title,
        description: req.description,
        assigned_to: req.assigned_to,
        status,
    })?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks(State(state): State<AppState>, Extension(caller): Caller) -> ApiResult<Json<Vec<Task>>> {
    let decision = require(&state.db, &caller, ResourceKind::Task, None, Capability::Read)?;
    Ok(Json(state.db.get_tasks(decision.project_ids())?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<Task>> {
    require(&state.db, &caller, ResourceKind::Task, item(task_id), Capability::Read)?;
    Ok(Json(state.db.get_task(task_id)?))
}

/// Content fields need `Manage`; a `status` field goes through the state machine. Every check
/// runs before the first write, so a rejected request changes nothing.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(task_id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let status = req.status.as_deref().map(parse_status).transpose()?;

    let mut task = if req.has_content_changes() {
        require(&state.db, &caller, ResourceKind::Task, item(task_id), Capability::Manage)?;
        if status.is_some() {
            require(&state.db, &caller, ResourceKind::Task, item(task_id), Capability::UpdateStatus)?;
        }
        state.db.update_task(task_id, &UpdateTask {
            title: req.title,
            description: req.description,
            assigned_to: req.assigned_to,
        })?
    } else {
        require(&state.db, &caller, ResourceKind::Task, item(task_id), Capability::Read)?;
        state.db.get_task(task_id)?
    };

    if let Some(status) = status {
        task = crate::lifecycle::apply_status(&state.db, &caller, task_id, status)?;
    }
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(task_id): Path<i64>,
) -> ApiResult<StatusCode> {
    require(&state.db, &caller, ResourceKind::Task, item(task_id), Capability::Manage)?;
    state.db.delete_task(task_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_task_status(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(task_id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(set_status(&state.db, &caller, task_id, &req.status)?))
}

// Performance

pub async fn create_performance_log(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Json(req): Json<CreatePerformanceRequest>,
) -> ApiResult<(StatusCode, Json<PerformanceLog>)> {
    require(&state.db, &caller, ResourceKind::PerformanceLog, None, Capability::Manage)?;
    let log = state.db.create_performance_log(&CreatePerformanceLog {
        user_id: req.user_id,
        task_id: req.task_id,
        accuracy_score: req.accuracy_score,
        progress_percent: req.progress_percent,
        log_date: req.log_date,
    })?;
    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn my_performance(
    State(state): State<AppState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<PerformanceLog>>> {
    let decision = require(&state.db, &caller, ResourceKind::PerformanceLog, None, Capability::Read)?;
    let logs = state
        .db
        .get_performance_for_user(caller.user_id)?
        .into_iter()
        .filter(|log| !matches!(decision.filter, Some(ScopeFilter::User(id)) if id != log.user_id))
        .collect();
    Ok(Json(logs))
}

pub async fn user_performance(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<PerformanceLog>>> {
    require(
        &state.db,
        &caller,
        ResourceKind::PerformanceLog,
        Some(ResourceRef::OfUser(user_id)),
        Capability::Read,
    )?;
    Ok(Json(state.db.get_performance_for_user(user_id)?))
}

pub async fn project_performance(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<PerformanceLog>>> {
    require(&state.db, &caller, ResourceKind::PerformanceLog, in_project(project_id), Capability::Read)?;
    Ok(Json(state.db.get_performance_for_project(project_id)?))
}

// Chat

pub async fn post_chat_message(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
    Json(req): Json<ChatMessageRequest>,
) -> ApiResult<(StatusCode, Json<ChatExchange>)> {
    let exchange = chat::handle_incoming(&state.db, &caller, project_id, &req.message)?;
    Ok((StatusCode::CREATED, Json(exchange)))
}

pub async fn list_chat(
    State(state): State<AppState>,
    Extension(caller): Caller,
    Path(project_id): Path<i64>,
    Query(query): Query<ChatQuery>,
) -> ApiResult<Json<ChatListResponse>> {
    let chat_logs = chat::list_chat(&state.db, &caller, project_id, query.limit)?;
    Ok(Json(ChatListResponse {
        count: chat_logs.len(),
        chat_logs,
    }))
}

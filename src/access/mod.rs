//! Role- and assignment-scoped access decisions.
//!
//! Every handler asks [`resolve`] (or [`require`]) before touching the store. ADMIN sees
//! everything; an EMPLOYEE sees a project and everything under it only while a
//! `project_assignments` row links them, and may move a task's status only when the task is
//! assigned to them. Nothing is cached: each call re-reads the assignment rows.

use crate::db::{Database, Role, TaskScope};
use crate::error::{Error, Result};

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Project,
    BacklogItem,
    Sprint,
    Task,
    PerformanceLog,
    ChatLog,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Project => "project",
            ResourceKind::BacklogItem => "backlog item",
            ResourceKind::Sprint => "sprint",
            ResourceKind::Task => "task",
            ResourceKind::PerformanceLog => "performance log",
            ResourceKind::ChatLog => "chat log",
        }
    }
}

/// What a request points at. No reference means the global collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    /// A concrete row of the resource kind.
    Item(i64),
    /// The collection of that kind under a project.
    InProject(i64),
    /// The collection of that kind belonging to a user.
    OfUser(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Read,
    /// Post into a collection (chat).
    Append,
    UpdateStatus,
    /// Create, edit content, delete, assign.
    Manage,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Append => "post to",
            Capability::UpdateStatus => "change the status of",
            Capability::Manage => "manage",
        }
    }
}

/// Restriction a list operation must apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    Projects(Vec<i64>),
    User(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allow: bool,
    pub filter: Option<ScopeFilter>,
}

impl Decision {
    fn allow() -> Self {
        Self { allow: true, filter: None }
    }

    fn deny() -> Self {
        Self { allow: false, filter: None }
    }

    fn when(allow: bool) -> Self {
        Self { allow, filter: None }
    }

    fn filtered(filter: ScopeFilter) -> Self {
        Self { allow: true, filter: Some(filter) }
    }

    /// Whether a row in `project_id` survives this decision's filter.
    pub fn permits_project(&self, project_id: i64) -> bool {
        match &self.filter {
            None => self.allow,
            Some(ScopeFilter::Projects(ids)) => ids.contains(&project_id),
            Some(ScopeFilter::User(_)) => false,
        }
    }

    /// Project ids to restrict a query to; `None` means unrestricted.
    pub fn project_ids(&self) -> Option<&[i64]> {
        match &self.filter {
            Some(ScopeFilter::Projects(ids)) => Some(ids.as_slice()),
            Some(ScopeFilter::User(_)) => Some(&[][..]),
            None => None,
        }
    }
}

/// The row a reference lands on, reduced to what the rules look at.
enum Anchor {
    Global,
    Project(i64),
    Task(TaskScope),
    Owner(i64),
    User(i64),
}

fn missing(kind: ResourceKind, id: i64) -> Error {
    Error::NotFound(format!("{} {}", capitalize(kind.as_str()), id))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn locate(db: &Database, kind: ResourceKind, target: Option<ResourceRef>) -> Result<Anchor> {
    let anchor = match target {
        None => Anchor::Global,
        Some(ResourceRef::InProject(project_id)) => {
            if !db.project_exists(project_id)? {
                return Err(missing(ResourceKind::Project, project_id));
            }
            Anchor::Project(project_id)
        }
        Some(ResourceRef::OfUser(user_id)) => {
            if !db.user_exists(user_id)? {
                return Err(missing(ResourceKind::User, user_id));
            }
            Anchor::Owner(user_id)
        }
        Some(ResourceRef::Item(id)) => {
            let found = match kind {
                ResourceKind::User => db.user_exists(id)?.then_some(Anchor::User(id)),
                ResourceKind::Project => db.project_exists(id)?.then_some(Anchor::Project(id)),
                ResourceKind::BacklogItem => db.backlog_item_project(id)?.map(Anchor::Project),
                ResourceKind::Sprint => db.sprint_project(id)?.map(Anchor::Project),
                ResourceKind::Task => db.task_scope(id)?.map(Anchor::Task),
                ResourceKind::PerformanceLog => db.performance_log_owner(id)?.map(Anchor::Owner),
                ResourceKind::ChatLog => db.chat_log_project(id)?.map(Anchor::Project),
            };
            found.ok_or_else(|| missing(kind, id))?
        }
    };
    Ok(anchor)
}

/// Decide whether `identity` may exercise `capability` on the referenced resource.
///
/// A reference to a row that does not exist is `NotFound` for every role. For list requests
/// (`target == None`) an allowed EMPLOYEE decision carries the filter to apply.
pub fn resolve(
    db: &Database,
    identity: &Identity,
    kind: ResourceKind,
    target: Option<ResourceRef>,
    capability: Capability,
) -> Result<Decision> {
    let anchor = locate(db, kind, target)?;

    if identity.is_admin() {
        return Ok(Decision::allow());
    }

    let user_id = identity.user_id;
    let decision = match (kind, anchor, capability) {
        (_, _, Capability::Manage) => Decision::deny(),

        (ResourceKind::User, Anchor::User(id), Capability::Read) => Decision::when(id == user_id),
        (ResourceKind::User, _, _) => Decision::deny(),

        (ResourceKind::PerformanceLog, Anchor::Global, Capability::Read) => {
            Decision::filtered(ScopeFilter::User(user_id))
        }
        (ResourceKind::PerformanceLog, Anchor::Owner(owner), Capability::Read) => {
            Decision::when(owner == user_id)
        }
        (ResourceKind::PerformanceLog, _, _) => Decision::deny(),

        (ResourceKind::Task, Anchor::Task(scope), Capability::Read) => {
            Decision::when(db.is_assigned(scope.project_id, user_id)?)
        }
        (ResourceKind::Task, Anchor::Task(scope), Capability::UpdateStatus) => Decision::when(
            scope.assigned_to == Some(user_id) && db.is_assigned(scope.project_id, user_id)?,
        ),

        (ResourceKind::ChatLog, Anchor::Project(project_id), Capability::Read | Capability::Append) => {
            Decision::when(db.is_assigned(project_id, user_id)?)
        }

        (_, Anchor::Global, Capability::Read) => {
            Decision::filtered(ScopeFilter::Projects(db.assigned_project_ids(user_id)?))
        }
        (_, Anchor::Project(project_id), Capability::Read) => {
            Decision::when(db.is_assigned(project_id, user_id)?)
        }

        _ => Decision::deny(),
    };

    tracing::debug!(
        "Access {} for user {} to {} {} ({:?})",
        if decision.allow { "granted" } else { "denied" },
        user_id,
        capability.as_str(),
        kind.as_str(),
        target
    );
    Ok(decision)
}

/// [`resolve`], with a denial turned into `Forbidden`.
pub fn require(
    db: &Database,
    identity: &Identity,
    kind: ResourceKind,
    target: Option<ResourceRef>,
    capability: Capability,
) -> Result<Decision> {
    let decision = resolve(db, identity, kind, target, capability)?;
    if !decision.allow {
        tracing::warn!(
            "User {} may not {} {} {:?}",
            identity.user_id,
            capability.as_str(),
            kind.as_str(),
            target
        );
        return Err(Error::Forbidden(format!(
            "Not allowed to {} this {}",
            capability.as_str(),
            kind.as_str()
        )));
    }
    Ok(decision)
}

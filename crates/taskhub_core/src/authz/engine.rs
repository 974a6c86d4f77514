//! Stateless allow/deny evaluation for (actor, project, action).
//!
//! # Invariants
//! - The project creator is allowed every action, before membership or
//!   grants are consulted.
//! - Non-members are allowed open actions only.
//! - Missing or empty requirements deny (fail closed).
//! - Multi-permission requirements use OR semantics.
//! - A denial has no side effects beyond a log line.

use crate::authz::action::Action;
use crate::authz::policy::AuthorizationPolicy;
use crate::authz::source::{AccessSource, MembershipGrants};
use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::repo::{EntityKind, RepoError, RepoResult};
use log::{info, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Why an action was allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowBasis {
    Creator,
    OpenAction,
    /// First held permission satisfying the requirement.
    Permission(String),
}

/// Why an action was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAMember,
    NoPolicy,
    MissingPermission,
}

impl DenyReason {
    /// Machine-readable reason code.
    pub fn code(self) -> &'static str {
        match self {
            Self::NotAMember => "not_a_member",
            Self::NoPolicy => "no_policy",
            Self::MissingPermission => "missing_permission",
        }
    }
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(AllowBasis),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Policy-driven authorization engine.
///
/// Cheap to clone; the policy is shared.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationEngine {
    policy: Arc<AuthorizationPolicy>,
}

impl AuthorizationEngine {
    pub fn new(policy: AuthorizationPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    /// Decides whether `actor` may perform `action` on `project_id`.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when the project does not exist.
    /// - Storage errors from `source`.
    pub fn authorize(
        &self,
        source: &impl AccessSource,
        actor: &Principal,
        project_id: ProjectId,
        action: Action,
    ) -> RepoResult<Decision> {
        let creator = source
            .project_creator(project_id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Project, project_id))?;

        let decision = if &creator == actor {
            Decision::Allow(AllowBasis::Creator)
        } else {
            let membership = source.membership(project_id, actor)?;
            self.decide(membership.as_ref(), action)
        };

        log_decision(actor, project_id, action, &decision);
        Ok(decision)
    }

    /// Evaluates a non-creator actor given its resolved membership.
    pub fn decide(&self, membership: Option<&MembershipGrants>, action: Action) -> Decision {
        let open = self.policy.is_open(action);
        let Some(membership) = membership else {
            return if open {
                Decision::Allow(AllowBasis::OpenAction)
            } else {
                Decision::Deny(DenyReason::NotAMember)
            };
        };
        if open {
            return Decision::Allow(AllowBasis::OpenAction);
        }

        let required = match self.policy.requirements(action) {
            Some(required) if !required.is_empty() => required,
            _ => return Decision::Deny(DenyReason::NoPolicy),
        };
        match required
            .iter()
            .find(|name| membership.permissions.contains(*name))
        {
            Some(name) => Decision::Allow(AllowBasis::Permission(name.clone())),
            None => Decision::Deny(DenyReason::MissingPermission),
        }
    }
}

fn log_decision(actor: &Principal, project_id: ProjectId, action: Action, decision: &Decision) {
    let actor_type = actor.kind().as_str();
    match decision {
        Decision::Allow(basis) => {
            let basis = match basis {
                AllowBasis::Creator => "creator",
                AllowBasis::OpenAction => "open_action",
                AllowBasis::Permission(_) => "permission",
            };
            info!(
                "event=authz_decision module=authz status=allow action={action} project_id={project_id} actor_type={actor_type} basis={basis}"
            );
        }
        Decision::Deny(DenyReason::NotAMember) => {
            warn!(
                "event=authz_not_a_member module=authz status=deny action={action} project_id={project_id} actor_type={actor_type} reason=not_a_member"
            );
        }
        Decision::Deny(reason) => {
            warn!(
                "event=authz_decision module=authz status=deny action={action} project_id={project_id} actor_type={actor_type} reason={reason}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AllowBasis, AuthorizationEngine, Decision, DenyReason};
    use crate::authz::action::Action;
    use crate::authz::policy::AuthorizationPolicy;
    use crate::authz::source::{AccessSource, MembershipGrants};
    use crate::model::principal::Principal;
    use crate::model::project::ProjectId;
    use crate::repo::{EntityKind, RepoError, RepoResult};
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    #[derive(Default)]
    struct MemorySource {
        creators: BTreeMap<ProjectId, Principal>,
        members: BTreeMap<(ProjectId, Principal), BTreeSet<String>>,
    }

    impl MemorySource {
        fn with_project(mut self, project_id: ProjectId, creator: Principal) -> Self {
            self.creators.insert(project_id, creator);
            self
        }

        fn with_member(
            mut self,
            project_id: ProjectId,
            principal: Principal,
            permissions: &[&str],
        ) -> Self {
            self.members.insert(
                (project_id, principal),
                permissions.iter().map(|name| name.to_string()).collect(),
            );
            self
        }
    }

    impl AccessSource for MemorySource {
        fn project_creator(&self, project_id: ProjectId) -> RepoResult<Option<Principal>> {
            Ok(self.creators.get(&project_id).cloned())
        }

        fn membership(
            &self,
            project_id: ProjectId,
            principal: &Principal,
        ) -> RepoResult<Option<MembershipGrants>> {
            Ok(self
                .members
                .get(&(project_id, principal.clone()))
                .map(|permissions| MembershipGrants {
                    member_id: Uuid::nil(),
                    role: "member".to_string(),
                    permissions: permissions.clone(),
                }))
        }
    }

    fn user(id: &str) -> Principal {
        Principal::user(id).unwrap()
    }

    #[test]
    fn unknown_project_is_an_error_not_a_decision() {
        let engine = AuthorizationEngine::default();
        let missing = Uuid::new_v4();
        let err = engine
            .authorize(&MemorySource::default(), &user("a"), missing, Action::ViewProject)
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::NotFound {
                entity: EntityKind::Project,
                id
            } if id == missing
        ));
    }

    #[test]
    fn creator_is_allowed_every_action_without_membership() {
        let engine = AuthorizationEngine::default();
        let project = Uuid::new_v4();
        let source = MemorySource::default().with_project(project, user("owner"));
        for action in Action::ALL {
            assert_eq!(
                engine.authorize(&source, &user("owner"), project, action).unwrap(),
                Decision::Allow(AllowBasis::Creator)
            );
        }
    }

    #[test]
    fn creator_match_requires_same_kind() {
        let engine = AuthorizationEngine::default();
        let project = Uuid::new_v4();
        let source = MemorySource::default().with_project(project, user("shared"));
        let agent = Principal::agent("shared").unwrap();
        assert_eq!(
            engine
                .authorize(&source, &agent, project, Action::DeleteProject)
                .unwrap(),
            Decision::Deny(DenyReason::NotAMember)
        );
    }

    #[test]
    fn non_member_gets_open_actions_only() {
        let engine = AuthorizationEngine::default();
        let project = Uuid::new_v4();
        let source = MemorySource::default().with_project(project, user("owner"));
        assert_eq!(
            engine
                .authorize(&source, &user("stranger"), project, Action::ViewProject)
                .unwrap(),
            Decision::Allow(AllowBasis::OpenAction)
        );
        assert_eq!(
            engine
                .authorize(&source, &user("stranger"), project, Action::CreateTask)
                .unwrap(),
            Decision::Deny(DenyReason::NotAMember)
        );
    }

    #[test]
    fn any_required_permission_is_enough() {
        let engine = AuthorizationEngine::default();
        let project = Uuid::new_v4();
        let source = MemorySource::default()
            .with_project(project, user("owner"))
            .with_member(project, user("dev"), &["task_update"]);
        assert_eq!(
            engine
                .authorize(&source, &user("dev"), project, Action::AssignTask)
                .unwrap(),
            Decision::Allow(AllowBasis::Permission("task_update".to_string()))
        );
        assert_eq!(
            engine
                .authorize(&source, &user("dev"), project, Action::DeleteTask)
                .unwrap(),
            Decision::Deny(DenyReason::MissingPermission)
        );
    }

    #[test]
    fn missing_or_empty_requirement_fails_closed() {
        let mut policy = AuthorizationPolicy::standard();
        policy.action_requirements.remove(&Action::DeleteTask);
        policy
            .action_requirements
            .insert(Action::UpdateTask, BTreeSet::new());
        let engine = AuthorizationEngine::new(policy);
        let membership = MembershipGrants {
            member_id: Uuid::nil(),
            role: "editor".to_string(),
            permissions: BTreeSet::from(["task_delete".to_string(), "task_update".to_string()]),
        };

        assert_eq!(
            engine.decide(Some(&membership), Action::DeleteTask),
            Decision::Deny(DenyReason::NoPolicy)
        );
        assert_eq!(
            engine.decide(Some(&membership), Action::UpdateTask),
            Decision::Deny(DenyReason::NoPolicy)
        );
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(DenyReason::NotAMember.code(), "not_a_member");
        assert_eq!(DenyReason::NoPolicy.code(), "no_policy");
        assert_eq!(DenyReason::MissingPermission.code(), "missing_permission");
    }
}

use rusqlite::Connection;
use taskhub_core::{
    open_db_in_memory, Action, AllowBasis, AuthorizationEngine, AuthorizationPolicy, Decision,
    DenyReason, MemberDraft, MembershipService, PermissionService, Principal, ProjectDraft,
    ProjectService, ServiceError, SqliteAccessSource, TaskDraft, TaskService,
};
use uuid::Uuid;

fn user(id: &str) -> Principal {
    Principal::user(id).unwrap()
}

fn seeded_db() -> Connection {
    let mut conn = open_db_in_memory().unwrap();
    PermissionService::try_new(&mut conn)
        .unwrap()
        .seed_defaults(&AuthorizationPolicy::standard())
        .unwrap();
    conn
}

fn permission_id(conn: &mut Connection, name: &str) -> Uuid {
    PermissionService::try_new(conn)
        .unwrap()
        .get_by_name(name)
        .unwrap()
        .id
}

fn create_project(conn: &mut Connection, owner: &Principal) -> Uuid {
    ProjectService::try_new(conn, AuthorizationEngine::default())
        .unwrap()
        .create_project(owner, &ProjectDraft::new("Apollo"))
        .unwrap()
        .id
}

fn add_member(
    conn: &mut Connection,
    owner: &Principal,
    project_id: Uuid,
    member: &Principal,
    permissions: &[&str],
) -> Uuid {
    let ids: Vec<Uuid> = permissions
        .iter()
        .map(|name| permission_id(conn, name))
        .collect();
    MembershipService::try_new(conn, AuthorizationEngine::default())
        .unwrap()
        .add_member(
            owner,
            project_id,
            &MemberDraft::new(member.clone(), "editor").with_permissions(ids),
        )
        .unwrap()
        .id
}

fn decide(
    conn: &Connection,
    engine: &AuthorizationEngine,
    actor: &Principal,
    project_id: Uuid,
    action: Action,
) -> Decision {
    engine
        .authorize(&SqliteAccessSource::new(conn), actor, project_id, action)
        .unwrap()
}

#[test]
fn non_member_is_denied_restricted_actions() {
    let mut conn = seeded_db();
    let owner = user("owner");
    let project_id = create_project(&mut conn, &owner);
    let engine = AuthorizationEngine::default();

    for action in Action::ALL {
        let decision = decide(&conn, &engine, &user("stranger"), project_id, action);
        if action == Action::ViewProject {
            assert_eq!(decision, Decision::Allow(AllowBasis::OpenAction));
        } else {
            assert_eq!(decision, Decision::Deny(DenyReason::NotAMember), "{action}");
        }
    }
}

#[test]
fn creator_is_allowed_everything_without_grants() {
    let mut conn = seeded_db();
    let owner = user("owner");
    let project_id = create_project(&mut conn, &owner);
    let engine = AuthorizationEngine::default();

    for action in Action::ALL {
        assert_eq!(
            decide(&conn, &engine, &owner, project_id, action),
            Decision::Allow(AllowBasis::Creator)
        );
    }
}

#[test]
fn unknown_project_is_not_found() {
    let mut conn = seeded_db();
    let err = TaskService::try_new(&mut conn, AuthorizationEngine::default())
        .unwrap()
        .create_task(&user("owner"), Uuid::new_v4(), &TaskDraft::new("orphan"))
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn editor_grant_then_revoke_flips_create_task() {
    let mut conn = seeded_db();
    let owner = user("owner");
    let editor = user("editor");
    let project_id = create_project(&mut conn, &owner);
    let member_id = add_member(&mut conn, &owner, project_id, &editor, &[]);
    let task_create = permission_id(&mut conn, "task_create");
    let engine = AuthorizationEngine::default();

    assert_eq!(
        decide(&conn, &engine, &editor, project_id, Action::CreateTask),
        Decision::Deny(DenyReason::MissingPermission)
    );

    let granted = MembershipService::try_new(&mut conn, engine.clone())
        .unwrap()
        .grant_permission(&owner, member_id, task_create)
        .unwrap();
    assert!(granted);

    let task = TaskService::try_new(&mut conn, engine.clone())
        .unwrap()
        .create_task(&editor, project_id, &TaskDraft::new("Draft release notes"))
        .unwrap();
    assert_eq!(task.project_id, project_id);
    assert_eq!(
        decide(&conn, &engine, &editor, project_id, Action::CreateTask),
        Decision::Allow(AllowBasis::Permission("task_create".to_string()))
    );

    let revoked = MembershipService::try_new(&mut conn, engine.clone())
        .unwrap()
        .revoke_permission(&owner, member_id, task_create)
        .unwrap();
    assert!(revoked);

    let err = TaskService::try_new(&mut conn, engine.clone())
        .unwrap()
        .create_task(&editor, project_id, &TaskDraft::new("Second try"))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::AuthorizationDenied {
            action: Action::CreateTask,
            reason: DenyReason::MissingPermission,
        }
    ));
    assert_eq!(err.status_code(), 403);
    assert_eq!(err.error_code(), "missing_permission");
}

#[test]
fn double_grant_is_idempotent() {
    let mut conn = seeded_db();
    let owner = user("owner");
    let project_id = create_project(&mut conn, &owner);
    let member_id = add_member(&mut conn, &owner, project_id, &user("dev"), &["task_update"]);
    let task_update = permission_id(&mut conn, "task_update");

    let mut members =
        MembershipService::try_new(&mut conn, AuthorizationEngine::default()).unwrap();
    assert!(!members.grant_permission(&owner, member_id, task_update).unwrap());
    assert!(!members.grant_permission(&owner, member_id, task_update).unwrap());
    let names = members.list_permissions(&owner, member_id).unwrap();
    assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["task_update"]);
    drop(members);

    let grants: i64 = conn
        .query_row("SELECT COUNT(*) FROM member_permissions;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(grants, 1);
}

#[test]
fn revoking_unheld_permission_is_a_no_op() {
    let mut conn = seeded_db();
    let owner = user("owner");
    let project_id = create_project(&mut conn, &owner);
    let member_id = add_member(&mut conn, &owner, project_id, &user("dev"), &[]);
    let task_delete = permission_id(&mut conn, "task_delete");

    let revoked = MembershipService::try_new(&mut conn, AuthorizationEngine::default())
        .unwrap()
        .revoke_permission(&owner, member_id, task_delete)
        .unwrap();
    assert!(!revoked);
}

#[test]
fn any_listed_permission_satisfies_assign_task() {
    let mut conn = seeded_db();
    let owner = user("owner");
    let project_id = create_project(&mut conn, &owner);
    add_member(&mut conn, &owner, project_id, &user("assigner"), &["task_assign"]);
    add_member(&mut conn, &owner, project_id, &user("updater"), &["task_update"]);
    add_member(&mut conn, &owner, project_id, &user("viewer"), &["task_create"]);
    let engine = AuthorizationEngine::default();

    for name in ["assigner", "updater"] {
        assert!(decide(&conn, &engine, &user(name), project_id, Action::AssignTask).is_allowed());
    }
    assert_eq!(
        decide(&conn, &engine, &user("viewer"), project_id, Action::AssignTask),
        Decision::Deny(DenyReason::MissingPermission)
    );
}

#[test]
fn action_without_policy_entry_fails_closed() {
    let mut conn = seeded_db();
    let owner = user("owner");
    let project_id = create_project(&mut conn, &owner);
    add_member(&mut conn, &owner, project_id, &user("dev"), &["task_create"]);

    let mut policy = AuthorizationPolicy::standard();
    policy.action_requirements.remove(&Action::CreateTask);
    let engine = AuthorizationEngine::new(policy);

    assert_eq!(
        decide(&conn, &engine, &user("dev"), project_id, Action::CreateTask),
        Decision::Deny(DenyReason::NoPolicy)
    );
    assert_eq!(
        decide(&conn, &engine, &owner, project_id, Action::CreateTask),
        Decision::Allow(AllowBasis::Creator)
    );
}

#[test]
fn agents_and_users_with_same_id_are_distinct() {
    let mut conn = seeded_db();
    let owner = user("owner");
    let project_id = create_project(&mut conn, &owner);
    add_member(&mut conn, &owner, project_id, &user("bot-1"), &["task_create"]);
    let engine = AuthorizationEngine::default();

    let agent = Principal::agent("bot-1").unwrap();
    assert_eq!(
        decide(&conn, &engine, &agent, project_id, Action::CreateTask),
        Decision::Deny(DenyReason::NotAMember)
    );
}

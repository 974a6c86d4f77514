use rusqlite::Connection;
use taskhub_core::{
    open_db_in_memory, AuthorizationEngine, AuthorizationPolicy, ConflictKind, DenyReason,
    EntityKind, MemberDraft, MembershipService, PermissionService, Principal, ProjectDraft,
    ProjectService, ServiceError,
};
use uuid::Uuid;

fn user(id: &str) -> Principal {
    Principal::user(id).unwrap()
}

fn setup() -> (Connection, Principal, Uuid) {
    let mut conn = open_db_in_memory().unwrap();
    PermissionService::try_new(&mut conn)
        .unwrap()
        .seed_defaults(&AuthorizationPolicy::standard())
        .unwrap();
    let owner = user("owner");
    let project_id = ProjectService::try_new(&mut conn, AuthorizationEngine::default())
        .unwrap()
        .create_project(&owner, &ProjectDraft::new("Apollo"))
        .unwrap()
        .id;
    (conn, owner, project_id)
}

fn permission_id(conn: &mut Connection, name: &str) -> Uuid {
    PermissionService::try_new(conn)
        .unwrap()
        .get_by_name(name)
        .unwrap()
        .id
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn add_member_with_initial_grants() {
    let (mut conn, owner, project_id) = setup();
    let task_create = permission_id(&mut conn, "task_create");
    let task_update = permission_id(&mut conn, "task_update");

    let mut members =
        MembershipService::try_new(&mut conn, AuthorizationEngine::default()).unwrap();
    let member = members
        .add_member(
            &owner,
            project_id,
            &MemberDraft::new(user("dev"), "  editor ")
                .with_permissions([task_create, task_update, task_create]),
        )
        .unwrap();
    assert_eq!(member.project_id, project_id);
    assert_eq!(member.member, user("dev"));
    assert_eq!(member.role, "editor");

    let names = members.list_permissions(&owner, member.id).unwrap();
    assert_eq!(
        names.into_iter().collect::<Vec<_>>(),
        vec!["task_create", "task_update"]
    );
    let listed = members.list_members(&owner, project_id).unwrap();
    assert_eq!(listed, vec![member]);
}

#[test]
fn adding_existing_member_is_conflict() {
    let (mut conn, owner, project_id) = setup();
    let mut members =
        MembershipService::try_new(&mut conn, AuthorizationEngine::default()).unwrap();
    members
        .add_member(&owner, project_id, &MemberDraft::new(user("dev"), "editor"))
        .unwrap();

    let err = members
        .add_member(&owner, project_id, &MemberDraft::new(user("dev"), "viewer"))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Conflict(ConflictKind::AlreadyMember(ref principal)) if *principal == user("dev")
    ));
    assert_eq!(err.error_code(), "already_member");

    // Same id under the other principal kind is a different member.
    members
        .add_member(
            &owner,
            project_id,
            &MemberDraft::new(Principal::agent("dev").unwrap(), "bot"),
        )
        .unwrap();
    assert_eq!(members.list_members(&owner, project_id).unwrap().len(), 2);
}

#[test]
fn dangling_permission_id_persists_nothing() {
    let (mut conn, owner, project_id) = setup();
    let task_create = permission_id(&mut conn, "task_create");
    let missing = Uuid::new_v4();

    let err = MembershipService::try_new(&mut conn, AuthorizationEngine::default())
        .unwrap()
        .add_member(
            &owner,
            project_id,
            &MemberDraft::new(user("dev"), "editor").with_permissions([task_create, missing]),
        )
        .unwrap_err();
    match err {
        ServiceError::DanglingReference { entity, ref id } => {
            assert_eq!(entity, EntityKind::Permission);
            assert_eq!(*id, missing.to_string());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&conn, "project_members"), 0);
    assert_eq!(count(&conn, "member_permissions"), 0);
}

#[test]
fn failed_grant_insert_rolls_back_member() {
    let (mut conn, owner, project_id) = setup();
    let task_create = permission_id(&mut conn, "task_create");
    let task_update = permission_id(&mut conn, "task_update");
    conn.execute_batch(&format!(
        "CREATE TEMP TRIGGER fail_second_grant
         BEFORE INSERT ON member_permissions
         WHEN NEW.permission_id = '{task_update}'
         BEGIN
             SELECT RAISE(ABORT, 'simulated failure');
         END;"
    ))
    .unwrap();

    let err = MembershipService::try_new(&mut conn, AuthorizationEngine::default())
        .unwrap()
        .add_member(
            &owner,
            project_id,
            &MemberDraft::new(user("dev"), "editor").with_permissions([task_create, task_update]),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
    assert_eq!(err.status_code(), 500);
    assert_eq!(count(&conn, "project_members"), 0);
    assert_eq!(count(&conn, "member_permissions"), 0);
}

#[test]
fn grant_with_unknown_permission_is_dangling_reference() {
    let (mut conn, owner, project_id) = setup();
    let mut members =
        MembershipService::try_new(&mut conn, AuthorizationEngine::default()).unwrap();
    let member = members
        .add_member(&owner, project_id, &MemberDraft::new(user("dev"), "editor"))
        .unwrap();

    let err = members
        .grant_permission(&owner, member.id, Uuid::new_v4())
        .unwrap_err();
    assert_eq!(err.error_code(), "dangling_reference");

    let err = members
        .grant_permission(&owner, Uuid::new_v4(), Uuid::new_v4())
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn remove_member_cascades_grants() {
    let (mut conn, owner, project_id) = setup();
    let task_delete = permission_id(&mut conn, "task_delete");
    let mut members =
        MembershipService::try_new(&mut conn, AuthorizationEngine::default()).unwrap();
    members
        .add_member(
            &owner,
            project_id,
            &MemberDraft::new(user("dev"), "editor").with_permissions([task_delete]),
        )
        .unwrap();

    members.remove_member(&owner, project_id, &user("dev")).unwrap();
    assert!(members.list_members(&owner, project_id).unwrap().is_empty());
    drop(members);

    assert_eq!(count(&conn, "member_permissions"), 0);
    assert_eq!(count(&conn, "permissions"), 9);
}

#[test]
fn removing_non_member_is_not_found() {
    let (mut conn, owner, project_id) = setup();
    let err = MembershipService::try_new(&mut conn, AuthorizationEngine::default())
        .unwrap()
        .remove_member(&owner, project_id, &user("ghost"))
        .unwrap_err();
    match err {
        ServiceError::NotFound { entity, ref id } => {
            assert_eq!(entity, EntityKind::Member);
            assert_eq!(id, "USER:ghost");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn update_member_role_replaces_label_only() {
    let (mut conn, owner, project_id) = setup();
    let task_create = permission_id(&mut conn, "task_create");
    let mut members =
        MembershipService::try_new(&mut conn, AuthorizationEngine::default()).unwrap();
    let member = members
        .add_member(
            &owner,
            project_id,
            &MemberDraft::new(user("dev"), "editor").with_permissions([task_create]),
        )
        .unwrap();

    let updated = members
        .update_member_role(&owner, member.id, "lead")
        .unwrap();
    assert_eq!(updated.id, member.id);
    assert_eq!(updated.role, "lead");
    assert!(updated.updated_at >= member.updated_at);
    assert!(members
        .list_permissions(&owner, member.id)
        .unwrap()
        .contains("task_create"));

    let err = members.update_member_role(&owner, member.id, "   ").unwrap_err();
    assert_eq!(err.status_code(), 422);
}

#[test]
fn non_member_cannot_invite() {
    let (mut conn, _owner, project_id) = setup();
    let err = MembershipService::try_new(&mut conn, AuthorizationEngine::default())
        .unwrap()
        .add_member(
            &user("stranger"),
            project_id,
            &MemberDraft::new(user("friend"), "editor"),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::AuthorizationDenied {
            reason: DenyReason::NotAMember,
            ..
        }
    ));
    assert_eq!(err.status_code(), 403);
    assert_eq!(err.error_code(), "not_a_member");
    assert_eq!(count(&conn, "project_members"), 0);
}

#[test]
fn member_with_invite_permission_can_invite_but_not_grant() {
    let (mut conn, owner, project_id) = setup();
    let member_invite = permission_id(&mut conn, "member_invite");
    let task_create = permission_id(&mut conn, "task_create");
    let mut members =
        MembershipService::try_new(&mut conn, AuthorizationEngine::default()).unwrap();
    members
        .add_member(
            &owner,
            project_id,
            &MemberDraft::new(user("recruiter"), "hr").with_permissions([member_invite]),
        )
        .unwrap();

    let recruit = members
        .add_member(
            &user("recruiter"),
            project_id,
            &MemberDraft::new(user("recruit"), "editor"),
        )
        .unwrap();
    let err = members
        .grant_permission(&user("recruiter"), recruit.id, task_create)
        .unwrap_err();
    assert_eq!(err.error_code(), "missing_permission");
}

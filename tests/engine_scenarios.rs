//! End-to-end engine scenarios over the in-memory directory
//!
//! Each test drives the public API exactly as a batch driver would and
//! asserts on the directory's mutation log, not on log output.

use std::sync::Arc;

use permsync::{
    AdminOverrideScope, CachePolicy, ContainerState, DirectoryClient, DirectoryService,
    InMemoryDirectory, Mutation, Outcome, Permission, Project, ProjectPermission, ProjectRef,
    ProjectRole, ReconcileEngine, ReconcileOptions, TeamMembership, TopologyCache, User,
    UserProfile, Workspace, WorkspacePermission, WorkspaceRole,
};

fn workspace(id: &str, name: &str) -> Workspace {
    Workspace {
        id: id.to_string(),
        name: name.to_string(),
        state: ContainerState::Open,
    }
}

fn project(id: &str, name: &str, workspace: &Workspace) -> Project {
    Project {
        id: id.to_string(),
        name: name.to_string(),
        state: ContainerState::Open,
        workspace: workspace.to_ref(),
    }
}

fn user(username: &str, object_id: &str) -> User {
    User {
        object_id: object_id.to_string(),
        ref_: format!("/user/{}", object_id),
        username: username.to_string(),
        email: username.to_string(),
        display_name: None,
        first_name: None,
        last_name: None,
        disabled: false,
        subscription_admin: false,
        permissions: vec![],
        team_memberships: vec![],
        profile: UserProfile::default(),
    }
}

fn project_permission(ref_: &str, project: &Project, role: ProjectRole) -> Permission {
    Permission::Project(ProjectPermission {
        ref_: ref_.to_string(),
        project: ProjectRef {
            id: project.id.clone(),
            name: project.name.clone(),
            workspace: project.workspace.clone(),
        },
        role,
    })
}

fn workspace_permission(ref_: &str, workspace: &Workspace, role: WorkspaceRole) -> Permission {
    Permission::Workspace(WorkspacePermission {
        ref_: ref_.to_string(),
        workspace: workspace.to_ref(),
        role,
    })
}

fn engine_with(directory: &Arc<InMemoryDirectory>, options: ReconcileOptions) -> ReconcileEngine {
    let service: Arc<dyn DirectoryService> = directory.clone();
    let topology = Arc::new(TopologyCache::new(
        std::env::temp_dir(),
        CachePolicy::default(),
    ));
    ReconcileEngine::new(DirectoryClient::new(service, topology), options)
}

fn fixture() -> (Arc<InMemoryDirectory>, Workspace, Project, Project) {
    let directory = Arc::new(InMemoryDirectory::new("9001", "Acme"));
    let main = workspace("100", "Main");
    let alpha = project("777", "Alpha", &main);
    let beta = project("778", "Beta", &main);
    directory.add_workspace(main.clone());
    directory.add_project(alpha.clone());
    directory.add_project(beta.clone());
    (directory, main, alpha, beta)
}

// Scenario A: no access → Editor with upgrade-only off creates exactly one
// permission and leaves team membership alone.
#[tokio::test]
async fn editor_grant_creates_one_permission_and_no_membership_change() {
    let (directory, _, alpha, _) = fixture();
    directory.add_user(user("mark@acme.com", "555"));
    let mut engine = engine_with(&directory, ReconcileOptions::default());

    let outcome = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::Editor)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Updated);
    assert_eq!(
        directory.mutations(),
        vec![Mutation::CreateProjectPermission {
            username: "mark@acme.com".to_string(),
            project_id: "777".to_string(),
            role: "Editor".to_string(),
        }]
    );
    assert!(!directory.user("mark@acme.com").unwrap().is_team_member("777"));
}

// Scenario B: Editor → Viewer with upgrade-only on is suppressed.
#[tokio::test]
async fn downgrade_is_suppressed_in_upgrade_only_mode() {
    let (directory, _, alpha, _) = fixture();
    let mut mark = user("mark@acme.com", "555");
    mark.permissions
        .push(project_permission("/projectpermission/1", &alpha, ProjectRole::Editor));
    directory.add_user(mark);

    let mut engine = engine_with(
        &directory,
        ReconcileOptions {
            upgrade_only: true,
            ..ReconcileOptions::default()
        },
    );

    let outcome = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::Viewer)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::DowngradeSuppressed);
    assert_eq!(directory.mutation_count(), 0);
    assert_eq!(
        directory.user("mark@acme.com").unwrap().project_role("777"),
        Some(&ProjectRole::Editor)
    );
}

// Scenario C: membership toggle issues exactly one call; repeating it issues
// none.
#[tokio::test]
async fn membership_set_is_one_call_then_idempotent() {
    let (directory, _, alpha, _) = fixture();
    let mut mark = user("mark@acme.com", "555");
    mark.permissions
        .push(project_permission("/projectpermission/1", &alpha, ProjectRole::Editor));
    directory.add_user(mark);
    let mut engine = engine_with(&directory, ReconcileOptions::default());

    assert!(
        engine
            .set_team_membership("mark@acme.com", &alpha, true)
            .await
            .unwrap()
    );
    assert_eq!(
        directory.mutations(),
        vec![Mutation::SetTeamMember {
            project_id: "777".to_string(),
            user_id: "555".to_string(),
            member: true,
        }]
    );

    assert!(
        !engine
            .set_team_membership("mark@acme.com", &alpha, true)
            .await
            .unwrap()
    );
    assert_eq!(directory.mutation_count(), 1);
}

// Scenario D: sync updates P1 to Editor and removes P2; the source's
// workspace permission does not produce a bogus project delta.
#[tokio::test]
async fn sync_updates_and_removes_to_mirror_the_source() {
    let (directory, main, alpha, beta) = fixture();

    let mut template = user("template@acme.com", "10");
    template
        .permissions
        .push(workspace_permission("/workspacepermission/5", &main, WorkspaceRole::Admin));
    template
        .permissions
        .push(project_permission("/projectpermission/6", &alpha, ProjectRole::Editor));
    directory.add_user(template);

    let mut recruit = user("recruit@acme.com", "11");
    recruit
        .permissions
        .push(project_permission("/projectpermission/7", &alpha, ProjectRole::Viewer));
    recruit
        .permissions
        .push(project_permission("/projectpermission/8", &beta, ProjectRole::Editor));
    directory.add_user(recruit);

    let mut engine = engine_with(&directory, ReconcileOptions::default());
    let report = engine
        .sync_project_permissions("template@acme.com", "recruit@acme.com")
        .await
        .unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(report.removed, 1);

    let after = directory.user("recruit@acme.com").unwrap();
    assert_eq!(after.project_role("777"), Some(&ProjectRole::Editor));
    assert_eq!(after.project_role("778"), None);
}

// Idempotence: the same (user, container, role) applied twice mutates once.
#[tokio::test]
async fn second_application_is_a_no_op() {
    let (directory, _, alpha, _) = fixture();
    directory.add_user(user("mark@acme.com", "555"));
    let mut engine = engine_with(&directory, ReconcileOptions::default());

    let first = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::Editor)
        .await
        .unwrap();
    let second = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::Editor)
        .await
        .unwrap();

    assert_eq!(first, Outcome::Updated);
    assert_eq!(second, Outcome::NoChange);
    assert_eq!(directory.mutation_count(), 1);
}

// Upgrade monotonicity across the whole (existing, proposed) grid.
#[tokio::test]
async fn upgrade_only_mode_is_monotonic_over_all_role_pairs() {
    let roles = [
        ProjectRole::Viewer,
        ProjectRole::Editor,
        ProjectRole::ProjectAdmin,
    ];

    for existing in &roles {
        for proposed in &roles {
            let (directory, _, alpha, _) = fixture();
            let mut mark = user("mark@acme.com", "555");
            mark.permissions.push(project_permission(
                "/projectpermission/1",
                &alpha,
                existing.clone(),
            ));
            directory.add_user(mark);

            let mut engine = engine_with(
                &directory,
                ReconcileOptions {
                    upgrade_only: true,
                    ..ReconcileOptions::default()
                },
            );
            engine
                .apply_project_role("mark@acme.com", &alpha, proposed)
                .await
                .unwrap();

            let existing_rank = match existing {
                ProjectRole::Viewer => 1,
                ProjectRole::Editor => 2,
                _ => 3,
            };
            let proposed_rank = match proposed {
                ProjectRole::Viewer => 1,
                ProjectRole::Editor => 2,
                _ => 3,
            };

            if proposed_rank > existing_rank {
                assert_eq!(
                    directory.mutation_count(),
                    1,
                    "{existing} -> {proposed} should mutate exactly once"
                );
            } else {
                assert_eq!(
                    directory.mutation_count(),
                    0,
                    "{existing} -> {proposed} should not mutate"
                );
            }
        }
    }
}

// Admin override: a subscription admin is never touched, whatever the role
// or container.
#[tokio::test]
async fn subscription_admin_produces_zero_mutations() {
    let (directory, main, alpha, _) = fixture();
    let mut root = user("root@acme.com", "1");
    root.subscription_admin = true;
    directory.add_user(root);
    let mut engine = engine_with(&directory, ReconcileOptions::default());

    for role in [
        ProjectRole::NoAccess,
        ProjectRole::Viewer,
        ProjectRole::Editor,
        ProjectRole::ProjectAdmin,
    ] {
        let outcome = engine
            .apply_project_role("root@acme.com", &alpha, &role)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::SkippedSubscriptionAdmin);
    }
    let outcome = engine
        .apply_workspace_role("root@acme.com", &main, &WorkspaceRole::User)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::SkippedSubscriptionAdmin);
    assert_eq!(directory.mutation_count(), 0);
}

// Sync completeness: with upgrade-only off, the target's project permission
// set ends equal to the source's, except containers where the target holds
// Workspace Admin.
#[tokio::test]
async fn sync_makes_target_match_source_except_admin_containers() {
    let directory = Arc::new(InMemoryDirectory::new("9001", "Acme"));
    let main = workspace("100", "Main");
    let ops = workspace("200", "Ops");
    let alpha = project("777", "Alpha", &main);
    let beta = project("778", "Beta", &main);
    let gamma = project("900", "Gamma", &ops);
    directory.add_workspace(main.clone());
    directory.add_workspace(ops.clone());
    directory.add_project(alpha.clone());
    directory.add_project(beta.clone());
    directory.add_project(gamma.clone());

    let mut template = user("template@acme.com", "10");
    template
        .permissions
        .push(project_permission("/projectpermission/1", &alpha, ProjectRole::Editor));
    template
        .permissions
        .push(project_permission("/projectpermission/2", &beta, ProjectRole::Viewer));
    template
        .permissions
        .push(project_permission("/projectpermission/3", &gamma, ProjectRole::Viewer));
    directory.add_user(template);

    // The target administers Ops, so Gamma must be left alone
    let mut recruit = user("recruit@acme.com", "11");
    recruit
        .permissions
        .push(workspace_permission("/workspacepermission/4", &ops, WorkspaceRole::Admin));
    recruit
        .permissions
        .push(project_permission("/projectpermission/5", &gamma, ProjectRole::Editor));
    directory.add_user(recruit);

    let mut engine = engine_with(&directory, ReconcileOptions::default());
    engine
        .sync_project_permissions("template@acme.com", "recruit@acme.com")
        .await
        .unwrap();

    let after = directory.user("recruit@acme.com").unwrap();
    assert_eq!(after.project_role("777"), Some(&ProjectRole::Editor));
    assert_eq!(after.project_role("778"), Some(&ProjectRole::Viewer));
    // Excluded: target holds Workspace Admin over Gamma's workspace
    assert_eq!(after.project_role("900"), Some(&ProjectRole::Editor));
}

// Upgrade-only sync never removes access the target already has.
#[tokio::test]
async fn upgrade_only_sync_suppresses_removals() {
    let (directory, _, alpha, beta) = fixture();

    let mut template = user("template@acme.com", "10");
    template
        .permissions
        .push(project_permission("/projectpermission/1", &alpha, ProjectRole::Editor));
    directory.add_user(template);

    let mut recruit = user("recruit@acme.com", "11");
    recruit
        .permissions
        .push(project_permission("/projectpermission/2", &beta, ProjectRole::Editor));
    directory.add_user(recruit);

    let mut engine = engine_with(
        &directory,
        ReconcileOptions {
            upgrade_only: true,
            ..ReconcileOptions::default()
        },
    );
    let report = engine
        .sync_project_permissions("template@acme.com", "recruit@acme.com")
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.removed, 0);
    let after = directory.user("recruit@acme.com").unwrap();
    assert_eq!(after.project_role("777"), Some(&ProjectRole::Editor));
    assert_eq!(after.project_role("778"), Some(&ProjectRole::Editor));
}

// A subscription-admin source is refused wholesale.
#[tokio::test]
async fn sync_refuses_subscription_admin_source() {
    let (directory, _, _, _) = fixture();
    let mut root = user("root@acme.com", "10");
    root.subscription_admin = true;
    directory.add_user(root);
    directory.add_user(user("recruit@acme.com", "11"));

    let mut engine = engine_with(&directory, ReconcileOptions::default());
    let report = engine
        .sync_project_permissions("root@acme.com", "recruit@acme.com")
        .await
        .unwrap();

    assert_eq!(report, permsync::SyncReport::default());
    assert_eq!(directory.mutation_count(), 0);
}

// Membership sync mirrors the source's memberships after the permission sync
// put the roles in place.
#[tokio::test]
async fn membership_sync_mirrors_source_memberships() {
    let (directory, _, alpha, beta) = fixture();

    let mut template = user("template@acme.com", "10");
    template.team_memberships.push(TeamMembership::new("/project/777"));
    directory.add_user(template);

    let mut recruit = user("recruit@acme.com", "11");
    recruit
        .permissions
        .push(project_permission("/projectpermission/1", &alpha, ProjectRole::Editor));
    recruit
        .permissions
        .push(project_permission("/projectpermission/2", &beta, ProjectRole::Editor));
    recruit.team_memberships.push(TeamMembership::new("/project/778"));
    directory.add_user(recruit);

    let mut engine = engine_with(&directory, ReconcileOptions::default());
    let (added, removed) = engine
        .sync_team_memberships("template@acme.com", "recruit@acme.com")
        .await
        .unwrap();

    assert_eq!((added, removed), (1, 1));
    let after = directory.user("recruit@acme.com").unwrap();
    assert!(after.is_team_member("777"));
    assert!(!after.is_team_member("778"));
}

// Mixed-case usernames resolve to the same account.
#[tokio::test]
async fn usernames_resolve_case_insensitively() {
    let (directory, _, alpha, _) = fixture();
    directory.add_user(user("mark@acme.com", "555"));
    let mut engine = engine_with(&directory, ReconcileOptions::default());

    let outcome = engine
        .apply_project_role("Mark@Acme.COM", &alpha, &ProjectRole::Viewer)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Updated);
    assert_eq!(directory.mutation_count(), 1);
}

// The admin-override scopes drive the full loader/grant/update matrix.
#[tokio::test]
async fn override_scope_selects_which_admins_are_exempt() {
    let (directory, main, alpha, _) = fixture();
    let mut lead = user("lead@acme.com", "20");
    lead.permissions
        .push(workspace_permission("/workspacepermission/1", &main, WorkspaceRole::Admin));
    directory.add_user(lead);
    let mut owner = user("owner@acme.com", "21");
    owner
        .permissions
        .push(project_permission("/projectpermission/2", &alpha, ProjectRole::ProjectAdmin));
    directory.add_user(owner);

    // WorkspaceOnly: the workspace admin is exempt, the project admin is not
    let mut granting = engine_with(
        &directory,
        ReconcileOptions {
            upgrade_only: true,
            admin_override: AdminOverrideScope::WorkspaceOnly,
            ..ReconcileOptions::default()
        },
    );
    let lead_outcome = granting
        .apply_project_role("lead@acme.com", &alpha, &ProjectRole::Viewer)
        .await
        .unwrap();
    let owner_outcome = granting
        .apply_project_role("owner@acme.com", &alpha, &ProjectRole::Viewer)
        .await
        .unwrap();
    assert_eq!(lead_outcome, Outcome::SkippedWorkspaceAdmin);
    // Upgrade-only keeps the project admin safe from the downgrade instead
    assert_eq!(owner_outcome, Outcome::DowngradeSuppressed);

    // WorkspaceAndProject: both are exempt
    let mut updating = engine_with(
        &directory,
        ReconcileOptions {
            admin_override: AdminOverrideScope::WorkspaceAndProject,
            ..ReconcileOptions::default()
        },
    );
    let owner_outcome = updating
        .apply_project_role("owner@acme.com", &alpha, &ProjectRole::Viewer)
        .await
        .unwrap();
    assert_eq!(owner_outcome, Outcome::SkippedProjectAdmin);
    assert_eq!(directory.mutation_count(), 0);
}

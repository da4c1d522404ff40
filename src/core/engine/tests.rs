//! Engine unit tests over the in-memory directory

use std::sync::Arc;

use super::*;
use crate::cache::{CachePolicy, TopologyCache};
use crate::core::models::{
    ContainerState, Permission, ProjectPermission, ProjectRef, TeamMembership, UserProfile,
    WorkspacePermission,
};
use crate::directory::{DirectoryClient, DirectoryService, InMemoryDirectory, Mutation};

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

fn grant_project(user: &mut User, ref_: &str, project: &Project, role: ProjectRole) {
    user.permissions.push(Permission::Project(ProjectPermission {
        ref_: ref_.to_string(),
        project: ProjectRef {
            id: project.id.clone(),
            name: project.name.clone(),
            workspace: project.workspace.clone(),
        },
        role,
    }));
}

fn grant_workspace(user: &mut User, ref_: &str, workspace: &Workspace, role: WorkspaceRole) {
    user.permissions.push(Permission::Workspace(WorkspacePermission {
        ref_: ref_.to_string(),
        workspace: workspace.to_ref(),
        role,
    }));
}

fn engine(directory: &Arc<InMemoryDirectory>, options: ReconcileOptions) -> ReconcileEngine {
    let service: Arc<dyn DirectoryService> = directory.clone();
    let topology = Arc::new(TopologyCache::new(
        std::env::temp_dir(),
        CachePolicy::default(),
    ));
    ReconcileEngine::new(DirectoryClient::new(service, topology), options)
}

fn fixture() -> (Arc<InMemoryDirectory>, Workspace, Project) {
    let directory = Arc::new(InMemoryDirectory::new("9001", "Acme"));
    let main = workspace("100", "Main");
    let alpha = project("777", "Alpha", &main);
    directory.add_workspace(main.clone());
    directory.add_project(alpha.clone());
    (directory, main, alpha)
}

#[tokio::test]
async fn grant_creates_permission_for_absent_record() {
    let (directory, _, alpha) = fixture();
    directory.add_user(user("mark@acme.com", "555"));
    let mut engine = engine(&directory, ReconcileOptions::default());

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
    assert_eq!(engine.stats().updated, 1);
}

#[tokio::test]
async fn identical_role_is_a_no_op() {
    let (directory, _, alpha) = fixture();
    let mut mark = user("mark@acme.com", "555");
    grant_project(&mut mark, "/projectpermission/1", &alpha, ProjectRole::Editor);
    directory.add_user(mark);
    let mut engine = engine(&directory, ReconcileOptions::default());

    let outcome = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::Editor)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::NoChange);
    assert_eq!(directory.mutation_count(), 0);
}

#[tokio::test]
async fn upgrade_only_suppresses_downgrades_and_allows_upgrades() {
    let (directory, _, alpha) = fixture();
    let mut mark = user("mark@acme.com", "555");
    grant_project(&mut mark, "/projectpermission/1", &alpha, ProjectRole::Editor);
    directory.add_user(mark);
    let options = ReconcileOptions {
        upgrade_only: true,
        ..ReconcileOptions::default()
    };
    let mut engine = engine(&directory, options);

    let downgrade = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::Viewer)
        .await
        .unwrap();
    assert_eq!(downgrade, Outcome::DowngradeSuppressed);
    assert_eq!(directory.mutation_count(), 0);

    let upgrade = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::ProjectAdmin)
        .await
        .unwrap();
    assert_eq!(upgrade, Outcome::Updated);
    assert_eq!(directory.mutation_count(), 1);
    assert_eq!(engine.stats().downgrades_suppressed, 1);
    assert_eq!(engine.stats().updated, 1);
}

#[tokio::test]
async fn subscription_admin_is_skipped_even_with_no_override_scope() {
    let (directory, main, alpha) = fixture();
    let mut admin = user("root@acme.com", "1");
    admin.subscription_admin = true;
    directory.add_user(admin);
    let mut engine = engine(&directory, ReconcileOptions::default());

    let project_outcome = engine
        .apply_project_role("root@acme.com", &alpha, &ProjectRole::Viewer)
        .await
        .unwrap();
    let workspace_outcome = engine
        .apply_workspace_role("root@acme.com", &main, &WorkspaceRole::User)
        .await
        .unwrap();

    assert_eq!(project_outcome, Outcome::SkippedSubscriptionAdmin);
    assert_eq!(workspace_outcome, Outcome::SkippedSubscriptionAdmin);
    assert_eq!(directory.mutation_count(), 0);
    assert_eq!(engine.stats().skipped_subscription_admins, 2);
}

#[tokio::test]
async fn workspace_admin_exemption_depends_on_scope() {
    let (directory, main, alpha) = fixture();
    let mut lead = user("lead@acme.com", "2");
    grant_workspace(&mut lead, "/workspacepermission/1", &main, WorkspaceRole::Admin);
    directory.add_user(lead);

    // Scope None: the workspace admin is reconciled like anyone else
    let mut permissive = engine(&directory, ReconcileOptions::default());
    let outcome = permissive
        .apply_project_role("lead@acme.com", &alpha, &ProjectRole::Viewer)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Updated);
    assert_eq!(directory.mutation_count(), 1);

    // Scope WorkspaceOnly: skipped
    let options = ReconcileOptions {
        admin_override: AdminOverrideScope::WorkspaceOnly,
        ..ReconcileOptions::default()
    };
    let mut guarded = engine(&directory, options);
    let outcome = guarded
        .apply_project_role("lead@acme.com", &alpha, &ProjectRole::Editor)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::SkippedWorkspaceAdmin);
    assert_eq!(directory.mutation_count(), 1);
}

#[tokio::test]
async fn project_admin_exemption_only_in_full_scope() {
    let (directory, _, alpha) = fixture();
    let mut owner = user("owner@acme.com", "3");
    grant_project(
        &mut owner,
        "/projectpermission/1",
        &alpha,
        ProjectRole::ProjectAdmin,
    );
    directory.add_user(owner);

    let options = ReconcileOptions {
        admin_override: AdminOverrideScope::WorkspaceAndProject,
        ..ReconcileOptions::default()
    };
    let mut engine = engine(&directory, options);
    let outcome = engine
        .apply_project_role("owner@acme.com", &alpha, &ProjectRole::Viewer)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::SkippedProjectAdmin);
    assert_eq!(directory.mutation_count(), 0);
    assert_eq!(engine.stats().skipped_project_admins, 1);
}

#[tokio::test]
async fn no_access_deletes_the_existing_record() {
    let (directory, _, alpha) = fixture();
    let mut mark = user("mark@acme.com", "555");
    grant_project(&mut mark, "/projectpermission/1", &alpha, ProjectRole::Viewer);
    directory.add_user(mark);
    let mut engine = engine(&directory, ReconcileOptions::default());

    let outcome = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::NoAccess)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Updated);
    assert_eq!(
        directory.mutations(),
        vec![Mutation::DeletePermission {
            permission_ref: "/projectpermission/1".to_string(),
        }]
    );
    assert!(
        directory
            .user("mark@acme.com")
            .unwrap()
            .project_role("777")
            .is_none()
    );
}

#[tokio::test]
async fn no_access_for_absent_record_issues_no_mutation() {
    let (directory, _, alpha) = fixture();
    directory.add_user(user("mark@acme.com", "555"));
    let mut engine = engine(&directory, ReconcileOptions::default());

    engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::NoAccess)
        .await
        .unwrap();

    assert_eq!(directory.mutation_count(), 0);
}

#[tokio::test]
async fn refused_deletion_is_a_warning_not_a_failure() {
    let (directory, _, alpha) = fixture();
    let mut mark = user("mark@acme.com", "555");
    grant_project(&mut mark, "/projectpermission/1", &alpha, ProjectRole::Viewer);
    directory.add_user(mark);
    directory.fail_delete("/projectpermission/1");
    let mut engine = engine(&directory, ReconcileOptions::default());

    let outcome = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::NoAccess)
        .await;

    assert!(outcome.is_ok());
    assert_eq!(directory.mutation_count(), 0);
    // The record survives the refused deletion
    assert!(
        directory
            .user("mark@acme.com")
            .unwrap()
            .project_role("777")
            .is_some()
    );
}

#[tokio::test]
async fn dry_run_decides_but_does_not_mutate() {
    let (directory, _, alpha) = fixture();
    directory.add_user(user("mark@acme.com", "555"));
    let options = ReconcileOptions {
        dry_run: true,
        ..ReconcileOptions::default()
    };
    let mut engine = engine(&directory, options);

    let outcome = engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::Editor)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Updated);
    assert_eq!(directory.mutation_count(), 0);
}

#[tokio::test]
async fn project_admin_grant_writes_the_create_form() {
    let (directory, _, alpha) = fixture();
    directory.add_user(user("mark@acme.com", "555"));
    let mut engine = engine(&directory, ReconcileOptions::default());

    engine
        .apply_project_role("mark@acme.com", &alpha, &ProjectRole::ProjectAdmin)
        .await
        .unwrap();

    assert_eq!(
        directory.mutations(),
        vec![Mutation::CreateProjectPermission {
            username: "mark@acme.com".to_string(),
            project_id: "777".to_string(),
            role: "Project Admin".to_string(),
        }]
    );
}

#[tokio::test]
async fn unranked_proposed_role_is_rejected() {
    let (directory, _, alpha) = fixture();
    directory.add_user(user("mark@acme.com", "555"));
    let mut engine = engine(&directory, ReconcileOptions::default());

    let result = engine
        .apply_project_role(
            "mark@acme.com",
            &alpha,
            &ProjectRole::Other("Superuser".to_string()),
        )
        .await;

    assert!(matches!(result, Err(SyncError::InvalidRole(_))));
    assert_eq!(directory.mutation_count(), 0);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let (directory, _, alpha) = fixture();
    let mut engine = engine(&directory, ReconcileOptions::default());

    let result = engine
        .apply_project_role("ghost@acme.com", &alpha, &ProjectRole::Viewer)
        .await;

    assert!(matches!(result, Err(SyncError::NotFound(_))));
}

#[tokio::test]
async fn set_team_membership_is_idempotent() {
    let (directory, _, alpha) = fixture();
    let mut mark = user("mark@acme.com", "555");
    grant_project(&mut mark, "/projectpermission/1", &alpha, ProjectRole::Editor);
    directory.add_user(mark);
    let mut engine = engine(&directory, ReconcileOptions::default());

    let changed = engine
        .set_team_membership("mark@acme.com", &alpha, true)
        .await
        .unwrap();
    assert!(changed);
    assert_eq!(
        directory.mutations(),
        vec![Mutation::SetTeamMember {
            project_id: "777".to_string(),
            user_id: "555".to_string(),
            member: true,
        }]
    );

    let changed_again = engine
        .set_team_membership("mark@acme.com", &alpha, true)
        .await
        .unwrap();
    assert!(!changed_again);
    assert_eq!(directory.mutation_count(), 1);
}

#[tokio::test]
async fn membership_sync_requires_editor_on_target() {
    let (directory, _, alpha) = fixture();

    let mut template = user("template@acme.com", "10");
    template.team_memberships.push(TeamMembership::new("/project/777"));
    directory.add_user(template);

    // Viewer only: the add must be skipped
    let mut viewer = user("viewer@acme.com", "11");
    grant_project(&mut viewer, "/projectpermission/2", &alpha, ProjectRole::Viewer);
    directory.add_user(viewer);

    let mut engine = engine(&directory, ReconcileOptions::default());
    let (added, removed) = engine
        .sync_team_memberships("template@acme.com", "viewer@acme.com")
        .await
        .unwrap();

    assert_eq!((added, removed), (0, 0));
    assert_eq!(directory.mutation_count(), 0);
}

#[tokio::test]
async fn stats_display_reports_all_counters() {
    let stats = RunStats {
        updated: 3,
        unchanged: 2,
        downgrades_suppressed: 1,
        ..RunStats::default()
    };
    let summary = stats.to_string();
    assert!(summary.contains("3 updated"));
    assert!(summary.contains("2 unchanged"));
    assert!(summary.contains("1 downgrade(s) suppressed"));
}

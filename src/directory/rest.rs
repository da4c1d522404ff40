//! REST implementation of the directory service contract

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::core::models::{
    Project, ProjectRef, ProjectRole, Subscription, User, UserFields, Workspace, WorkspaceRef,
    WorkspaceRole,
};
use crate::directory::DirectoryService;
use crate::directory::query::{Query, and, eq};
use crate::directory::types::{
    CreateEnvelope, OperationEnvelope, QueryEnvelope, WireContainer, WireSubscription, WireUser,
    WireUsername,
};
use crate::utils::error::{Result, SyncError};

/// Field list for the detailed per-user query: permissions, containers, team
/// memberships, profile, and the subscription-admin flag.
const DETAIL_USER_FETCH: &str = "UserName,EmailAddress,FirstName,LastName,DisplayName,Disabled,\
     SubscriptionAdmin,UserPermissions,Name,Role,Workspace,ObjectID,Project,State,\
     TeamMemberships,UserProfile,TimeZone,DefaultWorkspace,DefaultProject";

/// Directory service over the platform's REST API
pub struct RestDirectory {
    client: Client,
    config: ServiceConfig,
}

impl RestDirectory {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .user_agent(concat!("permsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Absolute URL for an API path (`path` starts with `/`).
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/webservice/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            path
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("ZSESSIONID", key),
            None => request.basic_auth(&self.config.username, Some(&self.config.password)),
        }
    }

    /// Map transport-level failures before parsing a body.
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::auth(format!(
                "directory service rejected credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::service(status.as_u16(), message));
        }
        Ok(response)
    }

    /// Fetch all pages of a query result from `url`, up to `limit` records.
    async fn fetch_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(String, String)],
        page_size: usize,
        limit: usize,
    ) -> Result<Vec<T>> {
        let mut results: Vec<T> = Vec::new();
        let mut start = 1usize;

        loop {
            let request = self
                .authorize(self.client.get(url))
                .query(params)
                .query(&[
                    ("pagesize", page_size.to_string()),
                    ("start", start.to_string()),
                ]);
            let response = self.check(request.send().await?).await?;
            let envelope: QueryEnvelope<T> = response.json().await?;
            let page = envelope.query_result;

            if !page.errors.is_empty() {
                return Err(SyncError::service(422, page.errors.join("; ")));
            }
            for warning in &page.warnings {
                warn!("Directory service warning: {}", warning);
            }

            let total = page.total_result_count as usize;
            let fetched = page.results.len();
            results.extend(page.results);
            start += fetched;

            if fetched == 0 || results.len() >= total || results.len() >= limit {
                break;
            }
        }

        results.truncate(limit);
        Ok(results)
    }

    async fn run_query<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>> {
        let url = self.endpoint(&format!("/{}", query.object_type()));
        debug!("Querying {}", query.object_type());
        self.fetch_pages(
            &url,
            &query.params(),
            query.results_per_page(),
            query.max_results(),
        )
        .await
    }

    /// POST a mutation body and surface service-reported errors.
    async fn post_mutation(&self, url: &str, body: serde_json::Value) -> Result<Vec<String>> {
        let request = self.authorize(self.client.post(url)).json(&body);
        let response = self.check(request.send().await?).await?;
        let text = response.text().await?;

        // Create and update responses differ only in the envelope key.
        let errors = if let Ok(envelope) = serde_json::from_str::<CreateEnvelope>(&text) {
            envelope.create_result.errors
        } else if let Ok(envelope) = serde_json::from_str::<OperationEnvelope>(&text) {
            envelope.operation_result.errors
        } else {
            Vec::new()
        };
        Ok(errors)
    }

    fn base_query(&self, object_type: &str) -> Query {
        Query::new(object_type)
            .page_size(self.config.page_size)
            .limit(self.config.limit)
    }
}

#[async_trait]
impl DirectoryService for RestDirectory {
    async fn current_subscription(&self) -> Result<Subscription> {
        let query = self
            .base_query("subscription")
            .fetch("Name,SubscriptionID")
            .order("Name Asc");
        let results: Vec<WireSubscription> = self.run_query(&query).await?;
        results
            .first()
            .map(WireSubscription::to_subscription)
            .ok_or_else(|| SyncError::not_found("no subscription visible to this account"))
    }

    async fn subscription_workspaces(&self) -> Result<Vec<Workspace>> {
        let query = self
            .base_query("subscription")
            .fetch("Name,SubscriptionID,Workspaces,State,ObjectID")
            .order("Name Asc");
        let results: Vec<WireSubscription> = self.run_query(&query).await?;
        Ok(results
            .into_iter()
            .flat_map(|s| s.workspaces)
            .map(WireContainer::into_workspace)
            .collect())
    }

    async fn open_projects(&self, workspace_id: &str) -> Result<Vec<Project>> {
        let query = self
            .base_query("project")
            .fetch("Name,State,ObjectID,Workspace")
            .filter(eq("State", "Open"))
            .workspace_scope(format!("/workspace/{}", workspace_id));
        let results: Vec<WireContainer> = self.run_query(&query).await?;
        Ok(results
            .into_iter()
            .filter_map(WireContainer::into_project)
            .collect())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let query = self
            .base_query("user")
            .fetch(DETAIL_USER_FETCH)
            .filter(eq("UserName", username))
            .order("UserName Asc");
        let results: Vec<WireUser> = self.run_query(&query).await?;
        Ok(results.into_iter().next().map(WireUser::into_user))
    }

    async fn enabled_usernames(&self) -> Result<Vec<String>> {
        let query = self
            .base_query("user")
            .fetch("UserName")
            .filter(eq("Disabled", "False"))
            .order("UserName Asc");
        let results: Vec<WireUsername> = self.run_query(&query).await?;
        Ok(results.into_iter().map(|u| u.username).collect())
    }

    async fn create_user(&self, username: &str, fields: &UserFields) -> Result<()> {
        let mut body = json!({
            "UserName": username,
            "EmailAddress": username,
        });
        if let Some(first_name) = &fields.first_name {
            body["FirstName"] = json!(first_name);
        }
        if let Some(last_name) = &fields.last_name {
            body["LastName"] = json!(last_name);
        }
        if let Some(display_name) = &fields.display_name {
            body["DisplayName"] = json!(display_name);
        }

        let url = self.endpoint("/user/create");
        let errors = self.post_mutation(&url, json!({ "User": body })).await?;
        if !errors.is_empty() {
            return Err(SyncError::service(422, errors.join("; ")));
        }
        Ok(())
    }

    async fn set_user_disabled(&self, user_ref: &str, disabled: bool) -> Result<()> {
        let url = self.endpoint(user_ref);
        let body = json!({ "User": { "Disabled": disabled } });
        let errors = self.post_mutation(&url, body).await?;
        if !errors.is_empty() {
            return Err(SyncError::service(422, errors.join("; ")));
        }
        Ok(())
    }

    async fn workspace_by_id(&self, id: &str) -> Result<Option<Workspace>> {
        let query = self
            .base_query("workspace")
            .fetch("Name,State,ObjectID")
            .filter(and(&eq("ObjectID", id), &eq("State", "Open")));
        let results: Vec<WireContainer> = self.run_query(&query).await?;
        Ok(results.into_iter().next().map(WireContainer::into_workspace))
    }

    async fn workspaces_by_name(&self, name: &str) -> Result<Vec<Workspace>> {
        let query = self
            .base_query("workspace")
            .fetch("Name,State,ObjectID")
            .filter(and(&eq("Name", name), &eq("State", "Open")));
        let results: Vec<WireContainer> = self.run_query(&query).await?;
        Ok(results
            .into_iter()
            .map(WireContainer::into_workspace)
            .collect())
    }

    async fn project_by_id(&self, id: &str) -> Result<Option<Project>> {
        let query = self
            .base_query("project")
            .fetch("Name,State,ObjectID,Workspace")
            .filter(and(&eq("ObjectID", id), &eq("State", "Open")));
        let results: Vec<WireContainer> = self.run_query(&query).await?;
        Ok(results.into_iter().next().and_then(WireContainer::into_project))
    }

    async fn projects_by_name(&self, name: &str) -> Result<Vec<Project>> {
        let query = self
            .base_query("project")
            .fetch("Name,State,ObjectID,Workspace")
            .filter(and(&eq("Name", name), &eq("State", "Open")));
        let results: Vec<WireContainer> = self.run_query(&query).await?;
        Ok(results
            .into_iter()
            .filter_map(WireContainer::into_project)
            .collect())
    }

    async fn create_workspace_permission(
        &self,
        user: &User,
        workspace: &WorkspaceRef,
        role: &WorkspaceRole,
    ) -> Result<()> {
        let body = json!({
            "WorkspacePermission": {
                "Workspace": workspace.object_ref(),
                "User": user.ref_,
                "Role": role.to_wire()?,
            }
        });
        let url = self.endpoint("/workspacepermission/create");
        let errors = self.post_mutation(&url, body).await?;
        if !errors.is_empty() {
            return Err(SyncError::service(422, errors.join("; ")));
        }
        Ok(())
    }

    async fn create_project_permission(
        &self,
        user: &User,
        project: &ProjectRef,
        role: &ProjectRole,
    ) -> Result<()> {
        let body = json!({
            "ProjectPermission": {
                "Workspace": project.workspace.object_ref(),
                "Project": project.object_ref(),
                "User": user.ref_,
                "Role": role.to_wire()?,
            }
        });
        let url = self.endpoint("/projectpermission/create");
        let errors = self.post_mutation(&url, body).await?;
        if !errors.is_empty() {
            return Err(SyncError::service(422, errors.join("; ")));
        }
        Ok(())
    }

    async fn delete_permission(&self, permission_ref: &str) -> Result<()> {
        let url = self.endpoint(permission_ref);
        let request = self.authorize(self.client.delete(&url));
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::auth(format!(
                "directory service rejected credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::constraint_violation(message));
        }

        let text = response.text().await?;
        if let Ok(envelope) = serde_json::from_str::<OperationEnvelope>(&text) {
            if !envelope.operation_result.errors.is_empty() {
                return Err(SyncError::constraint_violation(
                    envelope.operation_result.errors.join("; "),
                ));
            }
        }
        Ok(())
    }

    // NON-STANDARD endpoint: direct PUT outside the query language. The URL
    // shape and payload are fixed by the remote service and may require
    // renegotiation if it changes.
    async fn set_team_member(&self, project_id: &str, user_id: &str, member: bool) -> Result<()> {
        let url = self.endpoint(&format!(
            "/project/{}/projectuser/{}.js",
            project_id, user_id
        ));
        let body = json!({
            "projectuser": { "TeamMember": if member { "true" } else { "false" } }
        });
        let request = self.authorize(self.client.put(&url)).json(&body);
        let response = self.check(request.send().await?).await?;
        let text = response.text().await?;
        if let Ok(envelope) = serde_json::from_str::<OperationEnvelope>(&text) {
            if !envelope.operation_result.errors.is_empty() {
                return Err(SyncError::service(
                    422,
                    envelope.operation_result.errors.join("; "),
                ));
            }
        }
        Ok(())
    }

    // NON-STANDARD endpoint: direct GET outside the query language.
    async fn project_usernames(&self, project_id: &str) -> Result<Vec<String>> {
        let url = self.endpoint(&format!("/project/{}/projectusers.js", project_id));
        let params = vec![
            ("fetch".to_string(), "UserName".to_string()),
            ("order".to_string(), "UserName Asc".to_string()),
        ];
        let results: Vec<WireUsername> = self
            .fetch_pages(&url, &params, self.config.page_size, self.config.limit)
            .await?;
        Ok(results.into_iter().map(|u| u.username).collect())
    }
}

//! Disk-backed cache of the subscription → workspace → project tree
//!
//! The organizational tree changes slowly, so batch runs load it from three
//! delimited files instead of re-walking the service. `ensure_fresh` is the
//! single entry point: it judges staleness (missing files, age, or a
//! subscription switch) and then either refreshes from the service or loads
//! from disk according to the configured policy.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cache::{CachePolicy, OnStale, StaleReason};
use crate::core::models::{ContainerState, Project, Subscription, Workspace, WorkspaceRef};
use crate::directory::DirectoryService;
use crate::utils::error::{Result, SyncError};

const SUBSCRIPTION_CACHE: &str = "cached_subscription.txt";
const WORKSPACE_CACHE: &str = "cached_workspaces.txt";
const PROJECT_CACHE: &str = "cached_projects.txt";

const COLUMN_DELIMITER: char = '\t';

const SUBSCRIPTION_FIELDS: [&str; 2] = ["SubscriptionID", "Name"];
const WORKSPACE_FIELDS: [&str; 3] = ["ObjectID", "Name", "State"];
const PROJECT_FIELDS: [&str; 5] = ["ObjectID", "Name", "State", "WorkspaceName", "WorkspaceOID"];

#[derive(Default)]
struct TopologyState {
    subscription: Option<Subscription>,
    workspaces: HashMap<String, Workspace>,
    projects: HashMap<String, Project>,
    workspaces_by_name: HashMap<String, String>,
    projects_by_name: HashMap<String, String>,
    duplicate_workspace_names: HashSet<String>,
    duplicate_project_names: HashSet<String>,
    projects_by_workspace: HashMap<String, Vec<String>>,
}

impl TopologyState {
    fn insert_workspace(&mut self, workspace: Workspace) {
        if self.workspaces_by_name.contains_key(&workspace.name) {
            self.duplicate_workspace_names.insert(workspace.name.clone());
            warn!(
                "Duplicate workspace name {}; only the first instance is addressable by name",
                workspace.name
            );
        } else {
            self.workspaces_by_name
                .insert(workspace.name.clone(), workspace.id.clone());
        }
        self.workspaces.insert(workspace.id.clone(), workspace);
    }

    fn insert_project(&mut self, project: Project) {
        if self.projects_by_name.contains_key(&project.name) {
            self.duplicate_project_names.insert(project.name.clone());
            warn!(
                "Duplicate project name {}; only the first instance is addressable by name",
                project.name
            );
        } else {
            self.projects_by_name
                .insert(project.name.clone(), project.id.clone());
        }
        self.projects_by_workspace
            .entry(project.workspace.id.clone())
            .or_default()
            .push(project.id.clone());
        self.projects.insert(project.id.clone(), project);
    }
}

/// Cached subscription → workspace → project tree
pub struct TopologyCache {
    dir: PathBuf,
    policy: CachePolicy,
    state: RwLock<TopologyState>,
}

impl TopologyCache {
    pub fn new<P: Into<PathBuf>>(dir: P, policy: CachePolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
            state: RwLock::new(TopologyState::default()),
        }
    }

    fn subscription_path(&self) -> PathBuf {
        self.dir.join(SUBSCRIPTION_CACHE)
    }

    fn workspace_path(&self) -> PathBuf {
        self.dir.join(WORKSPACE_CACHE)
    }

    fn project_path(&self) -> PathBuf {
        self.dir.join(PROJECT_CACHE)
    }

    /// Load or refresh according to staleness and policy. Missing files
    /// always force a refresh; nothing can be loaded from them.
    pub async fn ensure_fresh(&self, service: &dyn DirectoryService) -> Result<()> {
        match self.staleness(service).await? {
            None => {
                info!("Reading workspace/project tree from local cache");
                self.load()
            }
            Some(StaleReason::MissingFiles) => {
                info!("Cache refresh required: {}", StaleReason::MissingFiles);
                self.refresh(service).await
            }
            Some(reason) => match self.policy.on_stale {
                OnStale::Refresh => {
                    info!("Cache refresh required: {}", reason);
                    self.refresh(service).await
                }
                OnStale::LoadAnyway => {
                    warn!("Cache is stale ({}); loading anyway per policy", reason);
                    self.load()
                }
            },
        }
    }

    /// Judge staleness without mutating anything. `None` means fresh.
    pub async fn staleness(&self, service: &dyn DirectoryService) -> Result<Option<StaleReason>> {
        let paths = [
            self.subscription_path(),
            self.workspace_path(),
            self.project_path(),
        ];
        if paths.iter().any(|p| !p.exists()) {
            return Ok(Some(StaleReason::MissingFiles));
        }

        // All three files are rewritten together, so the youngest age stands
        // for the set.
        let age_days = paths
            .iter()
            .filter_map(|p| file_age_days(p))
            .min()
            .unwrap_or(u64::MAX);
        if age_days > self.policy.max_age_days {
            return Ok(Some(StaleReason::Expired {
                age_days,
                max_age_days: self.policy.max_age_days,
            }));
        }

        let cached = self.read_subscription_file()?;
        let live = service.current_subscription().await?;
        if cached.id != live.id {
            return Ok(Some(StaleReason::SubscriptionChanged {
                cached: cached.id,
                live: live.id,
            }));
        }

        Ok(None)
    }

    /// Staleness as a `(stale, reason)` pair for callers that log the reason.
    pub async fn is_stale(&self, service: &dyn DirectoryService) -> Result<(bool, String)> {
        match self.staleness(service).await? {
            Some(reason) => Ok((true, reason.to_string())),
            None => Ok((false, "no cache refresh currently required".to_string())),
        }
    }

    /// Rebuild the tree from the directory service and overwrite the cache
    /// files.
    ///
    /// Closed workspaces and projects are excluded. A workspace whose
    /// open-project lookup fails or returns nothing is dropped entirely;
    /// downstream code assumes every cached workspace has at least one
    /// project.
    pub async fn refresh(&self, service: &dyn DirectoryService) -> Result<()> {
        let subscription = service.current_subscription().await?;
        let workspaces = service.subscription_workspaces().await?;
        info!(
            "Subscription {} has {} workspace(s)",
            subscription.id,
            workspaces.len()
        );

        let mut state = TopologyState {
            subscription: Some(subscription),
            ..TopologyState::default()
        };

        for workspace in workspaces {
            if !workspace.is_open() {
                warn!("Workspace {} is closed; not cached", workspace.name);
                continue;
            }

            let projects = match service.open_projects(&workspace.id).await {
                Ok(projects) => projects,
                Err(e) if !e.is_fatal() => {
                    warn!(
                        "Open-project lookup failed for workspace {} ({}); not cached",
                        workspace.name, e
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            let open_projects: Vec<Project> =
                projects.into_iter().filter(Project::is_open).collect();
            if open_projects.is_empty() {
                warn!(
                    "Workspace {} has no open projects; not cached",
                    workspace.name
                );
                continue;
            }

            info!(
                "Caching workspace {} with {} open project(s)",
                workspace.name,
                open_projects.len()
            );
            state.insert_workspace(workspace);
            for project in open_projects {
                state.insert_project(project);
            }
        }

        self.write_files(&state)?;
        *self.state.write() = state;
        Ok(())
    }

    /// Rebuild the in-memory tree from the cache files. Does not validate
    /// against the live service; that is `staleness`'s job, called first by
    /// convention.
    pub fn load(&self) -> Result<()> {
        let mut state = TopologyState {
            subscription: Some(self.read_subscription_file()?),
            ..TopologyState::default()
        };

        for line in data_rows(&fs::read_to_string(self.workspace_path())?) {
            let fields: Vec<&str> = line.split(COLUMN_DELIMITER).collect();
            if fields.len() < WORKSPACE_FIELDS.len() {
                warn!("Malformed workspace cache row skipped: {:?}", line);
                continue;
            }
            state.insert_workspace(Workspace {
                id: fields[0].trim().to_string(),
                name: fields[1].trim().to_string(),
                state: ContainerState::parse(fields[2].trim()),
            });
        }

        for line in data_rows(&fs::read_to_string(self.project_path())?) {
            let fields: Vec<&str> = line.split(COLUMN_DELIMITER).collect();
            if fields.len() < PROJECT_FIELDS.len() {
                warn!("Malformed project cache row skipped: {:?}", line);
                continue;
            }
            state.insert_project(Project {
                id: fields[0].trim().to_string(),
                name: fields[1].trim().to_string(),
                state: ContainerState::parse(fields[2].trim()),
                workspace: WorkspaceRef {
                    name: fields[3].trim().to_string(),
                    id: fields[4].trim().to_string(),
                },
            });
        }

        info!(
            "Loaded {} workspace(s) and {} project(s) from local cache",
            state.workspaces.len(),
            state.projects.len()
        );
        *self.state.write() = state;
        Ok(())
    }

    fn read_subscription_file(&self) -> Result<Subscription> {
        let content = fs::read_to_string(self.subscription_path())?;
        let row = data_rows(&content)
            .next()
            .ok_or_else(|| SyncError::cache("subscription cache file has no data row"))?;
        let fields: Vec<&str> = row.split(COLUMN_DELIMITER).collect();
        if fields.len() < SUBSCRIPTION_FIELDS.len() {
            return Err(SyncError::cache("malformed subscription cache row"));
        }
        Ok(Subscription {
            id: fields[0].trim().to_string(),
            name: fields[1].trim().to_string(),
        })
    }

    fn write_files(&self, state: &TopologyState) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let subscription = state
            .subscription
            .as_ref()
            .ok_or_else(|| SyncError::cache("no subscription to write"))?;
        write_table(
            &self.subscription_path(),
            &SUBSCRIPTION_FIELDS,
            std::iter::once(vec![subscription.id.clone(), subscription.name.clone()]),
        )?;

        let mut workspaces: Vec<&Workspace> = state.workspaces.values().collect();
        workspaces.sort_by(|a, b| a.id.cmp(&b.id));
        write_table(
            &self.workspace_path(),
            &WORKSPACE_FIELDS,
            workspaces.iter().map(|w| {
                vec![
                    w.id.clone(),
                    w.name.clone(),
                    w.state.as_str().to_string(),
                ]
            }),
        )?;

        let mut projects: Vec<&Project> = state.projects.values().collect();
        projects.sort_by(|a, b| {
            a.workspace
                .id
                .cmp(&b.workspace.id)
                .then_with(|| a.id.cmp(&b.id))
        });
        write_table(
            &self.project_path(),
            &PROJECT_FIELDS,
            projects.iter().map(|p| {
                vec![
                    p.id.clone(),
                    p.name.clone(),
                    p.state.as_str().to_string(),
                    p.workspace.name.clone(),
                    p.workspace.id.clone(),
                ]
            }),
        )?;

        info!("Wrote workspace/project cache files to {:?}", self.dir);
        Ok(())
    }

    // In-memory accessors

    pub fn subscription(&self) -> Option<Subscription> {
        self.state.read().subscription.clone()
    }

    pub fn workspace(&self, id: &str) -> Option<Workspace> {
        self.state.read().workspaces.get(id).cloned()
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.state.read().projects.get(id).cloned()
    }

    /// Workspace lookup by name, with a duplicate flag. Only the first
    /// instance of a duplicated name is addressable.
    pub fn workspace_by_name(&self, name: &str) -> Option<(Workspace, bool)> {
        let state = self.state.read();
        let id = state.workspaces_by_name.get(name)?;
        let workspace = state.workspaces.get(id)?.clone();
        let duplicate = state.duplicate_workspace_names.contains(name);
        Some((workspace, duplicate))
    }

    /// Project lookup by name, with a duplicate flag.
    pub fn project_by_name(&self, name: &str) -> Option<(Project, bool)> {
        let state = self.state.read();
        let id = state.projects_by_name.get(name)?;
        let project = state.projects.get(id)?.clone();
        let duplicate = state.duplicate_project_names.contains(name);
        Some((project, duplicate))
    }

    /// Projects cached under a workspace.
    pub fn workspace_projects(&self, workspace_id: &str) -> Vec<Project> {
        let state = self.state.read();
        state
            .projects_by_workspace
            .get(workspace_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.projects.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Cache a workspace resolved live after a cache miss.
    pub fn insert_workspace(&self, workspace: Workspace) {
        self.state.write().insert_workspace(workspace);
    }

    /// Cache a project resolved live after a cache miss.
    pub fn insert_project(&self, project: Project) {
        self.state.write().insert_project(project);
    }

    pub fn workspace_count(&self) -> usize {
        self.state.read().workspaces.len()
    }

    pub fn project_count(&self) -> usize {
        self.state.read().projects.len()
    }
}

/// Lines of a cache file after the always-skipped header row.
fn data_rows(content: &str) -> impl Iterator<Item = &str> {
    content.lines().skip(1).filter(|l| !l.trim().is_empty())
}

/// Age of a file in whole days, fractional days rounded up.
fn file_age_days(path: &Path) -> Option<u64> {
    let modified: DateTime<Utc> = fs::metadata(path).ok()?.modified().ok()?.into();
    let elapsed_secs = (Utc::now() - modified).num_seconds().max(0) as u64;
    Some(elapsed_secs.div_ceil(86_400))
}

fn write_table<P: AsRef<Path>, R: Iterator<Item = Vec<String>>>(
    path: P,
    header: &[&str],
    rows: R,
) -> Result<()> {
    let mut content = String::new();
    content.push_str(&header.join(&COLUMN_DELIMITER.to_string()));
    content.push('\n');
    for row in rows {
        content.push_str(&row.join(&COLUMN_DELIMITER.to_string()));
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

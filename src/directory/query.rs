//! Query construction for the directory service's query language
//!
//! The service exposes one generic query endpoint per object type with a
//! small equality/boolean filter expression language over fields, a fetch
//! list, ordering, and offset pagination.

/// A single query against one object type
#[derive(Debug, Clone)]
pub struct Query {
    object_type: String,
    fetch: String,
    filter: Option<String>,
    order: Option<String>,
    workspace_scope: Option<String>,
    page_size: usize,
    limit: usize,
}

impl Query {
    pub fn new<S: Into<String>>(object_type: S) -> Self {
        Self {
            object_type: object_type.into(),
            fetch: "true".to_string(),
            filter: None,
            order: None,
            workspace_scope: None,
            page_size: 200,
            limit: 99_999,
        }
    }

    /// Comma-separated field list to fetch.
    pub fn fetch<S: Into<String>>(mut self, fetch: S) -> Self {
        self.fetch = fetch.into();
        self
    }

    /// Filter expression, usually built with [`eq`] and [`and`].
    pub fn filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Order clause, e.g. `UserName Asc`.
    pub fn order<S: Into<String>>(mut self, order: S) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Scope the query to one workspace by object reference.
    pub fn workspace_scope<S: Into<String>>(mut self, workspace_ref: S) -> Self {
        self.workspace_scope = Some(workspace_ref.into());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn max_results(&self) -> usize {
        self.limit
    }

    pub fn results_per_page(&self) -> usize {
        self.page_size
    }

    /// Render the non-paging query parameters.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("fetch".to_string(), self.fetch.clone())];
        if let Some(filter) = &self.filter {
            params.push(("query".to_string(), filter.clone()));
        }
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(workspace) = &self.workspace_scope {
            params.push(("workspace".to_string(), workspace.clone()));
        }
        params
    }
}

/// An equality term: `(Field = "value")`.
pub fn eq(field: &str, value: &str) -> String {
    format!("({} = \"{}\")", field, value)
}

/// Conjunction of two terms: `(left AND right)`.
pub fn and(left: &str, right: &str) -> String {
    format!("({} AND {})", left, right)
}

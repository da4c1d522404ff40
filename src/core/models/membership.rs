//! Team membership references
//!
//! A membership is a bare reference from a user to a project. It is
//! orthogonal to permissions but only meaningful while the user holds Editor
//! or Project Admin on the project.

/// A reference from a user to a project's team
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMembership {
    /// Object reference of the project, e.g. `/project/777` or a full URL
    /// ending in `/project/777.js`
    pub ref_: String,
}

impl TeamMembership {
    pub fn new<S: Into<String>>(ref_: S) -> Self {
        Self { ref_: ref_.into() }
    }

    /// Project identifier extracted from the reference path.
    ///
    /// The identifier is the trailing path segment with any `.js`-style
    /// extension stripped.
    pub fn project_id(&self) -> Option<&str> {
        let segment = self.ref_.rsplit('/').next()?;
        let id = segment.split('.').next()?;
        if id.is_empty() { None } else { Some(id) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trailing_segment() {
        let membership = TeamMembership::new("/project/777");
        assert_eq!(membership.project_id(), Some("777"));
    }

    #[test]
    fn strips_extension_from_full_urls() {
        let membership =
            TeamMembership::new("https://agile.example.com/slm/webservice/v2.0/project/777.js");
        assert_eq!(membership.project_id(), Some("777"));
    }

    #[test]
    fn empty_ref_yields_none() {
        assert_eq!(TeamMembership::new("").project_id(), None);
        assert_eq!(TeamMembership::new("/project/").project_id(), None);
    }
}

// Dashboard list state: fetched projects, search, sort and pagination.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::listing::{matches_search, Pager};
use crate::types::{NewProject, Project};

/// Default number of project cards per dashboard page.
pub const PROJECTS_PER_PAGE: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectFormError {
    #[error("project name is required")]
    MissingName,

    #[error("project description is required")]
    MissingDescription,
}

/// Validate the create-project form before anything is sent.
pub fn validate_new_project(name: &str, description: &str) -> Result<NewProject, ProjectFormError> {
    let name = name.trim();
    let description = description.trim();
    if name.is_empty() {
        return Err(ProjectFormError::MissingName);
    }
    if description.is_empty() {
        return Err(ProjectFormError::MissingDescription);
    }
    Ok(NewProject { project_name: name.to_string(), description: description.to_string() })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectSort {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
}

impl ProjectSort {
    fn compare(self, a: &Project, b: &Project) -> Ordering {
        match self {
            // Projects without timestamps sink to the end either way.
            Self::Newest => match (a.last_activity(), b.last_activity()) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            Self::Oldest => match (a.last_activity(), b.last_activity()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            Self::NameAsc => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            Self::NameDesc => b.name.to_lowercase().cmp(&a.name.to_lowercase()),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::NameAsc => "name-asc",
            Self::NameDesc => "name-desc",
        }
    }
}

impl fmt::Display for ProjectSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "name-asc" | "name" => Ok(Self::NameAsc),
            "name-desc" => Ok(Self::NameDesc),
            other => Err(format!(
                "unknown sort `{other}` (expected newest, oldest, name-asc or name-desc)"
            )),
        }
    }
}

/// The dashboard's single state record.
#[derive(Debug, Clone)]
pub struct Dashboard {
    projects: Vec<Project>,
    search: String,
    sort: ProjectSort,
    pager: Pager,
}

impl Dashboard {
    pub fn new(projects: Vec<Project>, page_size: usize) -> Self {
        Self { projects, search: String::new(), sort: ProjectSort::default(), pager: Pager::new(page_size) }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort(&self) -> ProjectSort {
        self.sort
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Replace the cached list after a refetch.
    pub fn set_projects(&mut self, projects: Vec<Project>) {
        self.projects = projects;
        self.clamp();
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.pager.reset();
        self.clamp();
    }

    pub fn set_sort(&mut self, sort: ProjectSort) {
        self.sort = sort;
        self.clamp();
    }

    pub fn go_to_page(&mut self, page: usize) -> bool {
        let len = self.visible().len();
        self.pager.go_to(page, len)
    }

    /// Filtered and sorted projects, across all pages.
    pub fn visible(&self) -> Vec<&Project> {
        let mut visible: Vec<&Project> = self
            .projects
            .iter()
            .filter(|project| matches_search(&self.search, &[&project.name, &project.description]))
            .collect();
        visible.sort_by(|a, b| self.sort.compare(a, b));
        visible
    }

    pub fn current_page(&self) -> Vec<&Project> {
        let visible = self.visible();
        let range = self.pager.range(visible.len());
        visible[range].to_vec()
    }

    pub fn total_pages(&self) -> usize {
        self.pager.total_pages(self.visible().len())
    }

    /// Optimistically add a project the backend just created.
    ///
    /// The search is cleared and the view jumps to the first page so the new
    /// entry is visible.
    pub fn insert_created(&mut self, project: Project) {
        self.projects.insert(0, project);
        self.search.clear();
        self.pager.reset();
        self.clamp();
    }

    /// Drop exactly the project with `id` from the cached list.
    pub fn remove(&mut self, id: &str) -> Option<Project> {
        let index = self.projects.iter().position(|project| project.id == id)?;
        let removed = self.projects.remove(index);
        self.clamp();
        Some(removed)
    }

    fn clamp(&mut self) {
        let len = self.visible().len();
        self.pager.clamp(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_timestamp;

    fn project(id: &str, name: &str, description: &str, updated: Option<&str>) -> Project {
        Project {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            status: None,
            created_at: None,
            updated_at: updated.and_then(parse_timestamp),
        }
    }

    fn sample() -> Vec<Project> {
        vec![
            project("1", "Project Alpha", "user engagement", Some("2024-03-15T10:00:00Z")),
            project("2", "Project Beta", "core platform features", Some("2024-05-10T14:30:00Z")),
            project("3", "Gamma", "awaiting commencement", None),
            project("4", "Delta", "new market segments", Some("2024-01-25T16:45:00Z")),
        ]
    }

    #[test]
    fn form_validation_rejects_blank_fields() {
        assert_eq!(validate_new_project("  ", "desc"), Err(ProjectFormError::MissingName));
        assert_eq!(validate_new_project("Alpha", ""), Err(ProjectFormError::MissingDescription));
        let ok = validate_new_project(" Alpha ", " desc ").unwrap();
        assert_eq!(ok.project_name, "Alpha");
        assert_eq!(ok.description, "desc");
    }

    #[test]
    fn newest_first_with_undated_last() {
        let dashboard = Dashboard::new(sample(), 10);
        let ids: Vec<&str> = dashboard.visible().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "4", "3"]);
    }

    #[test]
    fn name_sort_is_case_insensitive() {
        let mut dashboard = Dashboard::new(sample(), 10);
        dashboard.set_sort(ProjectSort::NameAsc);
        let names: Vec<&str> = dashboard.visible().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Delta", "Gamma", "Project Alpha", "Project Beta"]);
    }

    #[test]
    fn search_covers_name_and_description() {
        let mut dashboard = Dashboard::new(sample(), 10);
        dashboard.set_search("PLATFORM");
        assert_eq!(dashboard.visible().len(), 1);
        dashboard.set_search("project");
        assert_eq!(dashboard.visible().len(), 2);
    }

    #[test]
    fn search_resets_to_first_page() {
        let mut dashboard = Dashboard::new(sample(), 1);
        assert!(dashboard.go_to_page(3));
        dashboard.set_search("a");
        assert_eq!(dashboard.pager().current_page(), 1);
    }

    #[test]
    fn create_then_delete_touches_exactly_one_entry() {
        let mut dashboard = Dashboard::new(sample(), 3);
        dashboard.set_search("delta");
        dashboard.insert_created(project("99", "Alpha", "desc", None));
        assert_eq!(dashboard.projects().len(), 5);
        assert_eq!(dashboard.search(), "");
        assert_eq!(dashboard.projects()[0].name, "Alpha");

        let removed = dashboard.remove("99").unwrap();
        assert_eq!(removed.description, "desc");
        let ids: Vec<&str> = dashboard.projects().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert!(dashboard.remove("99").is_none());
    }

    #[test]
    fn delete_on_last_page_clamps() {
        let mut dashboard = Dashboard::new(sample(), 2);
        assert!(dashboard.go_to_page(2));
        dashboard.remove("3");
        dashboard.remove("4");
        assert_eq!(dashboard.total_pages(), 1);
        assert_eq!(dashboard.pager().current_page(), 1);
        assert_eq!(dashboard.current_page().len(), 2);
    }

    #[test]
    fn sort_parses_from_cli_words() {
        assert_eq!("name".parse::<ProjectSort>().unwrap(), ProjectSort::NameAsc);
        assert_eq!("Oldest".parse::<ProjectSort>().unwrap(), ProjectSort::Oldest);
        assert!("status".parse::<ProjectSort>().is_err());
    }
}

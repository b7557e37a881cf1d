// Project navigation: the per-project sections and their routes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Overview,
    SourceFiles,
    Inventory,
    Requirements,
    Artifacts,
}

impl Section {
    pub const ALL: [Section; 5] =
        [Self::Overview, Self::SourceFiles, Self::Inventory, Self::Requirements, Self::Artifacts];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::SourceFiles => "Source Files",
            Self::Inventory => "Inventory",
            Self::Requirements => "Requirements",
            Self::Artifacts => "Artifacts",
        }
    }

    const fn suffix(self) -> &'static str {
        match self {
            Self::Overview => "",
            Self::SourceFiles => "/source-files",
            Self::Inventory => "/inventory",
            Self::Requirements => "/requirements",
            Self::Artifacts => "/artifacts",
        }
    }

    pub fn route(self, project_id: &str) -> String {
        format!("/project/{project_id}{}", self.suffix())
    }

    /// Section addressed by a route, if it belongs to a project.
    pub fn from_route(route: &str) -> Option<(String, Section)> {
        let rest = route.trim_end_matches('/').strip_prefix("/project/")?;
        let (id, tail) = match rest.split_once('/') {
            Some((id, tail)) => (id, format!("/{tail}")),
            None => (rest, String::new()),
        };
        if id.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|section| section.suffix() == tail)
            .map(|section| (id.to_string(), section))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .into_iter()
            .find(|section| section.label().to_ascii_lowercase().replace(' ', "-") == wanted)
            .ok_or_else(|| format!("unknown section `{s}`"))
    }
}

/// Name shown in the project header, falling back to the id while the
/// project is unknown or unnamed.
pub fn display_name(project_id: &str, project: Option<&Project>) -> String {
    match project.map(|project| project.name.trim()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Project ID: {project_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_round_trip() {
        for section in Section::ALL {
            let route = section.route("42");
            assert_eq!(Section::from_route(&route), Some(("42".to_string(), section)));
        }
        assert_eq!(Section::Overview.route("42"), "/project/42");
        assert_eq!(Section::SourceFiles.route("42"), "/project/42/source-files");
    }

    #[test]
    fn foreign_routes_are_rejected() {
        assert_eq!(Section::from_route("/dashboard"), None);
        assert_eq!(Section::from_route("/project/"), None);
        assert_eq!(Section::from_route("/project/42/settings"), None);
    }

    #[test]
    fn sections_parse_from_labels() {
        assert_eq!("source files".parse::<Section>().unwrap(), Section::SourceFiles);
        assert_eq!("source_files".parse::<Section>().unwrap(), Section::SourceFiles);
        assert!("billing".parse::<Section>().is_err());
    }

    #[test]
    fn display_name_falls_back_to_id() {
        assert_eq!(display_name("7", None), "Project ID: 7");
        let unnamed = Project { id: "7".into(), ..Project::default() };
        assert_eq!(display_name("7", Some(&unnamed)), "Project ID: 7");
        let named = Project { id: "7".into(), name: "Payroll".into(), ..Project::default() };
        assert_eq!(display_name("7", Some(&named)), "Payroll");
    }
}

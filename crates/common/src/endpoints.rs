// REST endpoint paths, derived from contracts/rest-endpoints.json.
//
// Templates use `{name}` placeholders; builders below fill them in.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters that cannot appear raw inside one path segment.
const PATH_SEGMENT: &AsciiSet =
    &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'/').add(b'<').add(b'>').add(b'?').add(b'`').add(b'{').add(b'}');

// ── Projects ───────────────────────────────────────────────────────
pub const PROJECTS_LIST: &str = "/projects";
pub const PROJECT_CREATE: &str = "/projects/";
pub const PROJECT_DETAIL: &str = "/projects/{project_id}";

// ── Source files ───────────────────────────────────────────────────
pub const SOURCE_FILES_LIST: &str = "/files/{project_id}/source_files";
pub const SOURCE_FILES_UPLOAD: &str = "/files/{project_id}/upload_source_files/";
pub const SOURCE_FILE_DETAIL: &str = "/files/source_files/{file_id}";
pub const SOURCE_FILE_CONTENT: &str = "/files/source_files/{file_id}/content";

// ── Inventory metadata ─────────────────────────────────────────────
pub const METADATA_DB_FILES: &str = "/projects/{project_id}/metadata/m204_files/databases";
pub const METADATA_OTHER_FILES: &str = "/projects/{project_id}/metadata/m204_files/other";
pub const METADATA_PROCEDURES: &str = "/projects/{project_id}/metadata/procedures/";
pub const METADATA_VARIABLES: &str = "/projects/{project_id}/metadata/variables/";
pub const METADATA_M204_FILE_UPDATE: &str = "/projects/{project_id}/metadata/m204_files/{item_id}";
pub const METADATA_PROCEDURE_UPDATE: &str = "/projects/{project_id}/metadata/procedures/{item_id}";
pub const METADATA_VARIABLE_UPDATE: &str = "/projects/{project_id}/metadata/variables/{item_id}";

// ── Analysis ───────────────────────────────────────────────────────
pub const ANALYZE_ORDERED: &str = "/analysis/project/{project_id}/analyze-ordered";
pub const PARMLIB_UPLOAD: &str = "/analysis/project/{project_id}/upload_and_analyze_parmlib";
pub const FIX_MERMAID: &str = "/analysis/fix-mermaid";

// ── Requirements ───────────────────────────────────────────────────
pub const REQUIREMENTS_GENERATE: &str = "/requirements/projects/{project_id}/generate-document";
pub const REQUIREMENTS_LATEST: &str = "/requirements/projects/{project_id}/latest-document";
pub const REQUIREMENTS_UPDATE: &str = "/requirements/projects/{project_id}/documents/{document_id}";

// ── Artifacts ──────────────────────────────────────────────────────
pub const ARTIFACTS_GENERATE: &str = "/artifacts/generate/project/{project_id}";

/// Every endpoint template the client issues requests against.
pub const ALL_ENDPOINTS: &[&str] = &[
    PROJECTS_LIST,
    PROJECT_CREATE,
    PROJECT_DETAIL,
    SOURCE_FILES_LIST,
    SOURCE_FILES_UPLOAD,
    SOURCE_FILE_DETAIL,
    SOURCE_FILE_CONTENT,
    METADATA_DB_FILES,
    METADATA_OTHER_FILES,
    METADATA_PROCEDURES,
    METADATA_VARIABLES,
    METADATA_M204_FILE_UPDATE,
    METADATA_PROCEDURE_UPDATE,
    METADATA_VARIABLE_UPDATE,
    ANALYZE_ORDERED,
    PARMLIB_UPLOAD,
    FIX_MERMAID,
    REQUIREMENTS_GENERATE,
    REQUIREMENTS_LATEST,
    REQUIREMENTS_UPDATE,
    ARTIFACTS_GENERATE,
];

/// Substitute `{key}` placeholders in `template`.
///
/// Each value is percent-encoded as a single path segment.
pub fn fill(template: &str, params: &[(&str, &str)]) -> String {
    let mut path = template.to_string();
    for (key, value) in params {
        let placeholder = format!("{{{key}}}");
        let segment = utf8_percent_encode(value, PATH_SEGMENT).to_string();
        path = path.replace(&placeholder, &segment);
    }
    path
}

pub fn project(project_id: &str) -> String {
    fill(PROJECT_DETAIL, &[("project_id", project_id)])
}

pub fn source_files(project_id: &str) -> String {
    fill(SOURCE_FILES_LIST, &[("project_id", project_id)])
}

pub fn upload_source_files(project_id: &str) -> String {
    fill(SOURCE_FILES_UPLOAD, &[("project_id", project_id)])
}

pub fn source_file(file_id: &str) -> String {
    fill(SOURCE_FILE_DETAIL, &[("file_id", file_id)])
}

pub fn source_file_content(file_id: &str) -> String {
    fill(SOURCE_FILE_CONTENT, &[("file_id", file_id)])
}

pub fn analyze_ordered(project_id: &str) -> String {
    fill(ANALYZE_ORDERED, &[("project_id", project_id)])
}

pub fn parmlib_upload(project_id: &str) -> String {
    fill(PARMLIB_UPLOAD, &[("project_id", project_id)])
}

pub fn requirements_generate(project_id: &str) -> String {
    fill(REQUIREMENTS_GENERATE, &[("project_id", project_id)])
}

pub fn requirements_latest(project_id: &str) -> String {
    fill(REQUIREMENTS_LATEST, &[("project_id", project_id)])
}

pub fn requirements_update(project_id: &str, document_id: &str) -> String {
    fill(REQUIREMENTS_UPDATE, &[("project_id", project_id), ("document_id", document_id)])
}

pub fn artifacts_generate(project_id: &str) -> String {
    fill(ARTIFACTS_GENERATE, &[("project_id", project_id)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_single_placeholder() {
        assert_eq!(project("12"), "/projects/12");
        assert_eq!(source_files("p1"), "/files/p1/source_files");
        assert_eq!(upload_source_files("p1"), "/files/p1/upload_source_files/");
    }

    #[test]
    fn fills_multiple_placeholders() {
        assert_eq!(requirements_update("3", "doc-9"), "/requirements/projects/3/documents/doc-9");
    }

    #[test]
    fn slashes_in_ids_cannot_escape_the_segment() {
        assert_eq!(source_file("a/b"), "/files/source_files/a%2Fb");
    }

    #[test]
    fn m204_names_are_encoded_as_one_segment() {
        assert_eq!(
            fill(METADATA_VARIABLE_UPDATE, &[("project_id", "7"), ("item_id", "%CUST ID?X#1")]),
            "/projects/7/metadata/variables/%25CUST%20ID%3FX%231"
        );
    }

    #[test]
    fn every_template_starts_with_a_slash() {
        for endpoint in ALL_ENDPOINTS {
            assert!(endpoint.starts_with('/'), "{endpoint}");
        }
    }
}

// Zip archive of generated artifacts.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use anyhow::{Context, Result};
use m204_common::artifacts::Artifact;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Last path component of a backend-supplied name, if it is a usable file
/// name. Both `/` and `\` count as separators.
pub fn file_name_component(name: &str) -> Option<&str> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    (!last.is_empty() && last != "." && last != "..").then_some(last)
}

/// Write every artifact under its file name with its exact content.
///
/// Names are reduced to their last component. A name already used in the
/// archive is stored as `<source>/<name>`, then with a numeric suffix.
pub fn write_zip<W: Write + Seek>(writer: W, artifacts: &[Artifact]) -> Result<W> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let mut used = HashSet::new();

    for artifact in artifacts {
        let entry_name = entry_name(&mut used, artifact);
        zip.start_file(entry_name.as_str(), options).with_context(|| format!("adding {entry_name} to archive"))?;
        zip.write_all(artifact.content.as_bytes()).with_context(|| format!("writing {entry_name} to archive"))?;
    }

    zip.finish().context("finishing archive")
}

fn entry_name(used: &mut HashSet<String>, artifact: &Artifact) -> String {
    let name = file_name_component(&artifact.name)
        .or_else(|| file_name_component(&artifact.id))
        .unwrap_or("artifact");
    let dir = file_name_component(&artifact.source).map(|source| format!("{source}/")).unwrap_or_default();

    let mut candidates = vec![name.to_string(), format!("{dir}{name}")];
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    let mut counter = 2;
    loop {
        let candidate = if candidates.is_empty() {
            let numbered = format!("{dir}{stem}-{counter}{ext}");
            counter += 1;
            numbered
        } else {
            candidates.remove(0)
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
}

pub fn write_zip_file(path: &Path, artifacts: &[Artifact]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_zip(file, artifacts)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use m204_common::artifacts::ArtifactKind;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn artifact(source: &str, name: &str, content: &str) -> Artifact {
        Artifact {
            id: format!("{source}_{name}"),
            name: name.into(),
            kind: ArtifactKind::Cobol,
            content: content.into(),
            size: String::new(),
            description: String::new(),
            source: source.into(),
        }
    }

    fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut out = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn archive_holds_exact_contents() {
        let artifacts = vec![
            artifact("PAYROLL.M204", "PAYROLL.cbl", "       IDENTIFICATION DIVISION.\r\n  é\n"),
            artifact("PAYROLL.M204", "PAYROLL.jcl", "//PAYROLL JOB\n"),
            artifact("EMPTY.M204", "EMPTY.cbl", ""),
        ];
        let cursor = write_zip(Cursor::new(Vec::new()), &artifacts).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();

        assert_eq!(archive.len(), 3);
        assert_eq!(read_entry(&mut archive, "PAYROLL.cbl"), artifacts[0].content);
        assert_eq!(read_entry(&mut archive, "PAYROLL.jcl"), "//PAYROLL JOB\n");
        assert_eq!(read_entry(&mut archive, "EMPTY.cbl"), "");
    }

    #[test]
    fn duplicate_names_are_prefixed_with_source() {
        let artifacts = vec![artifact("A.M204", "COMMON.cpy", "a"), artifact("B.M204", "COMMON.cpy", "b")];
        let cursor = write_zip(Cursor::new(Vec::new()), &artifacts).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(read_entry(&mut archive, "COMMON.cpy"), "a");
        assert_eq!(read_entry(&mut archive, "B.M204/COMMON.cpy"), "b");
    }

    #[test]
    fn repeated_source_and_name_get_a_counter() {
        let artifacts = vec![
            artifact("A.M204", "COMMON.cpy", "1"),
            artifact("A.M204", "COMMON.cpy", "2"),
            artifact("A.M204", "COMMON.cpy", "3"),
        ];
        let cursor = write_zip(Cursor::new(Vec::new()), &artifacts).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.len(), 3);
        assert_eq!(read_entry(&mut archive, "COMMON.cpy"), "1");
        assert_eq!(read_entry(&mut archive, "A.M204/COMMON.cpy"), "2");
        assert_eq!(read_entry(&mut archive, "A.M204/COMMON-2.cpy"), "3");
    }

    #[test]
    fn entry_names_cannot_leave_the_archive_root() {
        let artifacts = vec![
            artifact("../../SRC", "../../etc/PAYROLL.cbl", "a"),
            artifact("C:\\SRC", "C:\\out\\PAYROLL.jcl", "b"),
        ];
        let cursor = write_zip(Cursor::new(Vec::new()), &artifacts).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["PAYROLL.cbl", "PAYROLL.jcl"]);
        assert_eq!(read_entry(&mut archive, "PAYROLL.cbl"), "a");
    }

    #[test]
    fn file_name_component_strips_directories() {
        assert_eq!(file_name_component("../x.cbl"), Some("x.cbl"));
        assert_eq!(file_name_component("/etc/passwd"), Some("passwd"));
        assert_eq!(file_name_component("dir\\PAYROLL.jcl"), Some("PAYROLL.jcl"));
        assert_eq!(file_name_component(".."), None);
        assert_eq!(file_name_component("out/"), None);
    }

    #[test]
    fn writes_to_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Payroll_artifacts.zip");
        write_zip_file(&path, &[artifact("A.M204", "A.cbl", "x")]).unwrap();
        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn unwritable_target_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.zip");
        assert!(write_zip_file(&path, &[]).is_err());
    }
}

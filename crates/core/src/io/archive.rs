//! Zip archive extraction for vector sources.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Names of the archive entries whose extension matches, case-insensitively.
/// Directories and macOS resource forks are skipped.
fn matching_entries<'a>(names: impl Iterator<Item = &'a str>, extension: &str) -> Vec<String> {
    names
        .filter(|name| !name.ends_with('/') && !name.starts_with("__MACOSX/"))
        .filter(|name| {
            Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case(extension))
        })
        .map(str::to_string)
        .collect()
}

/// Extract `archive_path` into `dest` and return the path of its single
/// `.extension` member.
///
/// Every entry is extracted so companion files (`.dbf`, `.prj`, `.shx`)
/// sit next to the member. `label` names the archive in errors.
pub fn extract_single(
    archive_path: &Path,
    dest: &Path,
    extension: &str,
    label: &str,
) -> Result<PathBuf> {
    let file = File::open(archive_path).map_err(|e| Error::unavailable(label, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| Error::unavailable(label, e))?;

    let mut matches = matching_entries(archive.file_names(), extension);
    if matches.len() != 1 {
        return Err(Error::AmbiguousArchive {
            archive: label.to_string(),
            extension: extension.to_string(),
            matches: matches.len(),
        });
    }
    let member = matches.remove(0);

    archive
        .extract(dest)
        .map_err(|e| Error::unavailable(label, e))?;
    debug!(archive = label, member = %member, entries = archive.len(), "extracted");

    Ok(dest.join(member))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_entries() {
        let names = [
            "countries/ne_110m.shp",
            "countries/ne_110m.dbf",
            "countries/",
            "__MACOSX/countries/._ne_110m.shp",
            "README.SHP.txt",
            "other.SHP",
        ];
        let hits = matching_entries(names.iter().copied(), "shp");
        assert_eq!(hits, vec!["countries/ne_110m.shp", "other.SHP"]);
    }
}

use anyhow::bail;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use ignore::WalkBuilder;

/// Whether `path` is a template with the given extension. Multi-part
/// extensions such as `html.ego` are matched against the whole file name.
pub fn has_extension(path: &Utf8Path, extension: &str) -> bool {
    path.file_name().is_some_and(|name| {
        name.len() > extension.len() + 1
            && name.ends_with(extension)
            && name[..name.len() - extension.len()].ends_with('.')
    })
}

/// Collect template files under `paths`.
///
/// Files named directly are kept when they carry the extension. Directories
/// are walked recursively with `.gitignore` rules applied and hidden entries
/// skipped. Paths keep the form they were given in, so `//line` pragmas in the
/// generated code stay relative when the roots are. The result is sorted and
/// deduplicated.
pub fn walk_templates(paths: &[Utf8PathBuf], extension: &str) -> Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            if has_extension(path, extension) {
                files.push(clean(path));
            }
            continue;
        }

        if !path.is_dir() {
            bail!("file not found: {path}");
        }

        for entry in WalkBuilder::new(path.as_std_path()).build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(utf8) = Utf8Path::from_path(entry.path()) else {
                tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 path");
                continue;
            };
            if has_extension(utf8, extension) {
                files.push(clean(utf8));
            }
        }
    }

    files.sort();
    files.dedup();
    tracing::debug!(count = files.len(), "discovered templates");
    Ok(files)
}

/// Drop the `./` prefix the walker adds under a `.` root.
fn clean(path: &Utf8Path) -> Utf8PathBuf {
    path.strip_prefix(".").unwrap_or(path).to_owned()
}

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::IngestConfig;

/// Expand CLI paths into the files to ingest.
///
/// Plain files are taken as given. Directories are walked and filtered by
/// `include_globs`/`exclude_globs`, matched against the path relative to
/// that directory. VCS and build directories are always excluded.
pub fn scan_paths(paths: &[PathBuf], config: &IngestConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    for root in paths {
        if !root.exists() {
            bail!("Path does not exist: {}", root.display());
        }

        if root.is_file() {
            files.push(root.clone());
            continue;
        }

        let mut found = walk_dir(root, config.follow_symlinks, &include_set, &exclude_set)?;
        // Sort for deterministic ordering
        found.sort();
        files.extend(found);
    }

    Ok(files)
}

fn walk_dir(
    root: &Path,
    follow_symlinks: bool,
    include_set: &GlobSet,
    exclude_set: &GlobSet,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

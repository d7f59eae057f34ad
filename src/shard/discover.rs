use std::fs;
use std::path::{Path, PathBuf};

/// Recursively collects files under `dir` whose file name ends with any of
/// `extensions`. Paths are absolute and sorted. Unreadable directories are
/// logged and skipped; a missing root yields no shards.
pub fn discover_shards(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let root = match fs::canonicalize(dir) {
        Ok(root) => root,
        Err(err) => {
            tracing::warn!(
                dir = %dir.display(),
                error = %err,
                "shard discovery: input directory is not accessible"
            );
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    collect_matching_files(&root, extensions, &mut out);
    out.sort();
    tracing::debug!(
        dir = %root.display(),
        shard_count = out.len(),
        "shard discovery: finished"
    );
    out
}

fn collect_matching_files(dir: &Path, extensions: &[String], out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(
                dir = %dir.display(),
                error = %err,
                "shard discovery: failed to read directory"
            );
            return;
        }
    };
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %err,
                    "shard discovery: failed to read directory entry"
                );
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            collect_matching_files(&path, extensions, out);
            continue;
        }
        if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| extensions.iter().any(|ext| name.ends_with(ext.as_str())))
        {
            out.push(path);
        }
    }
}

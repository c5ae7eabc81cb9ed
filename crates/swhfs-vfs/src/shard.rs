//! Small pure helpers for the recursively sharded trees (§4.4.12, §4.4.14):
//! computing a branch's relative alias target, and grouping paths into the
//! next directory level.

use std::collections::BTreeSet;

/// The relative symlink target for a `Snapshot` alias branch (§4.4.14):
/// from the alias branch's *parent* directory inside the snapshot tree, to
/// the full path of the branch it aliases.
///
/// `alias_path` is the full path of the alias branch itself (e.g.
/// `["refs", "tags", "alias-different-subdir"]`); `target_path` is the
/// full path of the branch it points at (e.g. `["refs", "heads",
/// "master"]`).
pub fn relative_branch_path(alias_path: &[String], target_path: &[String]) -> String {
    let from = &alias_path[..alias_path.len().saturating_sub(1)];
    let common = from
        .iter()
        .zip(target_path.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let ups = from.len() - common;
    let mut parts: Vec<&str> = std::iter::repeat("..").take(ups).collect();
    parts.extend(target_path[common..].iter().map(String::as_str));
    parts.join("/")
}

/// Partition `full_paths` (each a `/`-joined path under a shard whose
/// `consumed` prefix has already been walked) into the names that should
/// appear as subdirectories one level down, versus the leaf names (paths
/// exactly `consumed.len() + 1` segments long).
///
/// Returns `(subdirectory_names, leaf_names)`, both de-duplicated and
/// sorted.
pub fn next_level<'a>(full_paths: impl Iterator<Item = &'a str>, consumed: &[String]) -> (Vec<String>, Vec<String>) {
    let mut dirs = BTreeSet::new();
    let mut leaves = BTreeSet::new();
    for path in full_paths {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < consumed.len() {
            continue;
        }
        if segments[..consumed.len()] != consumed.iter().map(String::as_str).collect::<Vec<_>>()[..] {
            continue;
        }
        let remaining = &segments[consumed.len()..];
        match remaining {
            [] => continue,
            [leaf] => {
                leaves.insert((*leaf).to_owned());
            }
            [next, ..] => {
                dirs.insert((*next).to_owned());
            }
        }
    }
    (dirs.into_iter().collect(), leaves.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_relative_path_goes_up_to_common_ancestor() {
        let alias = vec!["refs".to_owned(), "tags".to_owned(), "alias-different-subdir".to_owned()];
        let target = vec!["refs".to_owned(), "heads".to_owned(), "master".to_owned()];
        assert_eq!(relative_branch_path(&alias, &target), "../heads/master");
    }

    #[test]
    fn alias_relative_path_same_directory() {
        let alias = vec!["tags".to_owned(), "v1-alias".to_owned()];
        let target = vec!["tags".to_owned(), "v1".to_owned()];
        assert_eq!(relative_branch_path(&alias, &target), "v1");
    }

    #[test]
    fn next_level_splits_dirs_from_leaves() {
        let paths = vec!["refs/tags/v1", "refs/tags/v2", "refs/heads/master"];
        let (dirs, leaves) = next_level(paths.into_iter(), &["refs".to_owned()]);
        assert_eq!(dirs, vec!["heads".to_owned(), "tags".to_owned()]);
        assert!(leaves.is_empty());

        let (dirs, leaves) = next_level(
            vec!["refs/tags/v1", "refs/tags/v2"].into_iter(),
            &["refs".to_owned(), "tags".to_owned()],
        );
        assert!(dirs.is_empty());
        assert_eq!(leaves, vec!["v1".to_owned(), "v2".to_owned()]);
    }
}

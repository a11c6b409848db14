//! Depth-first remote tree traversal with a caller-supplied visitor.

use tracing::{info, warn};

use crate::client::SftpClient;
use crate::error::Result;
use crate::path::{join_remote, strip_leading_slash};
use crate::types::DirEntry;

/// Directory listing as the walker consumes it. The traversal logic only
/// needs this one operation, so it is kept behind a seam.
pub(crate) trait Lister {
    async fn list_entries(&self, path: &str) -> Result<Vec<DirEntry>>;
}

impl Lister for SftpClient {
    async fn list_entries(&self, path: &str) -> Result<Vec<DirEntry>> {
        self.list(path).await
    }
}

impl SftpClient {
    /// Walk the remote tree under `remote_path` depth-first.
    ///
    /// A leading `/` is stripped before the first listing; some servers
    /// reject absolute paths in listing requests but accept the same path
    /// relative. The visitor receives the full joined path (slash-stripped
    /// form) and the entry. Each entry is visited before its children, and a
    /// directory is fully recursed into before its next sibling.
    ///
    /// Listing failures due to permission denied or a vanished path skip
    /// that subtree and continue. Any other listing failure on the entry
    /// path is retried once with the normalized path; if the retry fails
    /// too, the walk aborts with that error. A visitor error aborts the
    /// walk immediately — it is a cooperative cancellation signal
    /// propagated up as the result, not an exception.
    pub async fn walk<F>(&self, remote_path: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, &DirEntry) -> Result<()>,
    {
        let normalized = strip_leading_slash(remote_path);
        walk_tree(self, normalized, remote_path, &mut visit).await
    }
}

async fn walk_tree<L: Lister>(
    lister: &L,
    path: &str,
    requested: &str,
    visit: &mut dyn FnMut(&str, &DirEntry) -> Result<()>,
) -> Result<()> {
    let entries = match lister.list_entries(path).await {
        Ok(entries) => entries,
        Err(e) if e.is_permission_denied() => {
            info!("permission denied, skipping: {}", path);
            return Ok(());
        }
        Err(e) if e.is_not_found() => {
            info!("no such file or directory, skipping: {}", path);
            return Ok(());
        }
        Err(e) if path != requested => {
            warn!(
                "listing {} failed ({}), retrying with normalized path {}",
                requested, e, path
            );
            lister.list_entries(path).await?
        }
        Err(e) => return Err(e),
    };

    for entry in entries {
        let full_path = join_remote(path, &entry.name);

        visit(&full_path, &entry)?;

        if entry.is_dir {
            Box::pin(walk_tree(lister, &full_path, &full_path, visit)).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn file(name: &str) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            size: 1,
            is_dir: false,
            modified: 0,
            permissions: "644".to_string(),
        }
    }

    fn dir(name: &str) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            size: 0,
            is_dir: true,
            modified: 0,
            permissions: "755".to_string(),
        }
    }

    fn denied_listing(path: &str) -> Error {
        Error::local(
            "list",
            path.to_string(),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        )
    }

    fn vanished_listing(path: &str) -> Error {
        Error::local(
            "list",
            path.to_string(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        )
    }

    /// In-memory tree. Errors in `fail_once` are consumed on the first
    /// listing of their path; later listings fall through to `entries`.
    struct FakeTree {
        entries: HashMap<String, Vec<DirEntry>>,
        fail_once: RefCell<HashMap<String, Error>>,
    }

    impl FakeTree {
        fn new(tree: &[(&str, Vec<DirEntry>)]) -> Self {
            Self {
                entries: tree
                    .iter()
                    .map(|(path, entries)| (path.to_string(), entries.clone()))
                    .collect(),
                fail_once: RefCell::new(HashMap::new()),
            }
        }

        fn fail_once(self, path: &str, err: Error) -> Self {
            self.fail_once.borrow_mut().insert(path.to_string(), err);
            self
        }
    }

    impl Lister for FakeTree {
        async fn list_entries(&self, path: &str) -> Result<Vec<DirEntry>> {
            if let Some(err) = self.fail_once.borrow_mut().remove(path) {
                return Err(err);
            }
            self.entries
                .get(path)
                .cloned()
                .ok_or_else(|| vanished_listing(path))
        }
    }

    async fn collect_walk(tree: &FakeTree, start: &str) -> Result<Vec<String>> {
        let mut visited = Vec::new();
        let normalized = strip_leading_slash(start);
        walk_tree(tree, normalized, start, &mut |path, _entry| {
            visited.push(path.to_string());
            Ok(())
        })
        .await?;
        Ok(visited)
    }

    #[tokio::test]
    async fn test_depth_first_visit_order() {
        let tree = FakeTree::new(&[
            ("root", vec![file("f1"), dir("sub"), file("f3")]),
            ("root/sub", vec![file("f2")]),
        ]);

        let visited = collect_walk(&tree, "root").await.unwrap();
        // Entry before its children, subtree before the next sibling.
        assert_eq!(visited, vec!["root/f1", "root/sub", "root/sub/f2", "root/f3"]);
    }

    #[tokio::test]
    async fn test_leading_slash_is_stripped_before_listing() {
        let tree = FakeTree::new(&[("root", vec![file("f1")])]);

        let visited = collect_walk(&tree, "/root").await.unwrap();
        assert_eq!(visited, vec!["root/f1"]);
    }

    #[tokio::test]
    async fn test_unreadable_subtree_is_skipped() {
        let tree = FakeTree::new(&[
            ("root", vec![dir("locked"), file("f1")]),
            ("root/locked", vec![file("hidden")]),
        ])
        .fail_once("root/locked", denied_listing("root/locked"));

        let visited = collect_walk(&tree, "root").await.unwrap();
        // The directory entry itself is visited; its contents are not.
        assert_eq!(visited, vec!["root/locked", "root/f1"]);
    }

    #[tokio::test]
    async fn test_vanished_subtree_is_skipped() {
        let tree = FakeTree::new(&[
            ("root", vec![dir("gone"), file("f1")]),
            ("root/gone", vec![file("late")]),
        ])
        .fail_once("root/gone", vanished_listing("root/gone"));

        let visited = collect_walk(&tree, "root").await.unwrap();
        assert_eq!(visited, vec!["root/gone", "root/f1"]);
    }

    #[tokio::test]
    async fn test_normalized_root_listing_is_retried_once() {
        let tree = FakeTree::new(&[("root", vec![file("f1")])])
            .fail_once("root", Error::Protocol("transient".to_string()));

        // Requested "/root", listed as "root": the transient failure is
        // retried with the normalized path and the walk completes.
        let visited = collect_walk(&tree, "/root").await.unwrap();
        assert_eq!(visited, vec!["root/f1"]);
    }

    #[tokio::test]
    async fn test_unnormalized_listing_failure_is_not_retried() {
        let tree = FakeTree::new(&[("root", vec![file("f1")])])
            .fail_once("root", Error::Protocol("transient".to_string()));

        let result = collect_walk(&tree, "root").await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_visitor_error_aborts_the_walk() {
        let tree = FakeTree::new(&[
            ("root", vec![file("f1"), dir("sub"), file("f3")]),
            ("root/sub", vec![file("f2")]),
        ]);

        let mut visited = Vec::new();
        let result = walk_tree(&tree, "root", "root", &mut |path, _entry| {
            visited.push(path.to_string());
            if path.ends_with("f2") {
                Err(Error::Protocol("stop".to_string()))
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(visited, vec!["root/f1", "root/sub", "root/sub/f2"]);
    }
}

use crate::error::{Error, Result};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Object, Repository};
use std::path::Path;
use tracing::{debug, warn};

/// Clone `url` into `dest` and pin it to `revision` when the repository knows it.
///
/// The revision is tried as given, as a remote branch and with a `v` prefix.
/// An unknown revision keeps the default branch.
pub(super) fn clone(url: &str, revision: &str, dest: &Path) -> Result<()> {
    debug!(url, dest = %dest.display(), "cloning");

    let repo = RepoBuilder::new()
        .clone(url, dest)
        .map_err(|err| Error::fetch(url, err))?;

    if revision.trim().is_empty() {
        return Ok(());
    }

    let outcome = match resolve_revision(&repo, revision) {
        Some(object) => checkout_detached(&repo, &object).map_err(|err| Error::fetch(url, err)),
        None => {
            warn!(url, revision, "revision not found, keeping default branch");
            Ok(())
        }
    };
    outcome
}

fn resolve_revision<'r>(repo: &'r Repository, revision: &str) -> Option<Object<'r>> {
    let candidates = [
        revision.to_string(),
        format!("origin/{revision}"),
        format!("v{revision}"),
    ];

    candidates
        .iter()
        .find_map(|candidate| repo.revparse_single(candidate).ok())
}

fn checkout_detached(repo: &Repository, object: &Object<'_>) -> Result<(), git2::Error> {
    let commit = object.peel_to_commit()?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(commit.id())
}

use std::path::Path;
use std::process::Command;

use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};

const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

const FILE_MODE: i32 = 0o100644;
const SCRIPT_MODE: i32 = 0o100755;

pub fn git_command() -> Command {
    let mut cmd = Command::new("git");
    for key in GIT_ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd
}

/// Commit the working copy at `path` currently has checked out.
pub fn head_commit(path: &Path) -> Oid {
    let repo = Repository::open(path).unwrap();
    repo.head().unwrap().peel_to_commit().unwrap().id()
}

/// Bare repository playing the provider side of a deploy.
///
/// Every commit gets a committer date one minute after the previous one,
/// so tag order by date is the creation order.
pub struct Remote {
    repo: Repository,
    clock: i64,
}

impl Remote {
    pub fn init(path: &Path) -> Self {
        let mut opts = RepositoryInitOptions::new();
        opts.bare(true).initial_head("master");
        let repo = Repository::init_opts(path, &opts).unwrap();
        Self {
            repo,
            clock: 1_600_000_000,
        }
    }

    /// Commit plain files on top of `branch`.
    pub fn commit(&mut self, branch: &str, files: &[(&str, &str)], message: &str) -> Oid {
        let entries: Vec<(&str, &str, i32)> = files
            .iter()
            .map(|(name, content)| (*name, *content, FILE_MODE))
            .collect();
        self.write_commit(branch, &entries, message)
    }

    /// Commit an executable lifecycle script on top of `branch`.
    pub fn script(&mut self, branch: &str, name: &str, body: &str) -> Oid {
        self.write_commit(branch, &[(name, body, SCRIPT_MODE)], &format!("add {}", name))
    }

    pub fn branch(&self, name: &str, from: Oid) {
        let commit = self.repo.find_commit(from).unwrap();
        self.repo.branch(name, &commit, false).unwrap();
    }

    pub fn tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }

    fn write_commit(&mut self, branch: &str, entries: &[(&str, &str, i32)], message: &str) -> Oid {
        let refname = format!("refs/heads/{}", branch);
        let parent = self
            .repo
            .find_reference(&refname)
            .ok()
            .and_then(|r| r.peel_to_commit().ok());
        let base_tree = parent.as_ref().map(|c| c.tree().unwrap());

        let mut builder = self.repo.treebuilder(base_tree.as_ref()).unwrap();
        for (name, content, mode) in entries {
            let blob = self.repo.blob(content.as_bytes()).unwrap();
            builder.insert(name, blob, *mode).unwrap();
        }
        let tree = self.repo.find_tree(builder.write().unwrap()).unwrap();

        self.clock += 60;
        let sig = Signature::new(
            "Deployer Test",
            "deployer@example.com",
            &Time::new(self.clock, 0),
        )
        .unwrap();
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(Some(&refname), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }
}

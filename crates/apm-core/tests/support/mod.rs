#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Commit, IndexAddOption, Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

/// A local origin repository served over `file://`.
///
/// master history:
/// - `v1.0` (lightweight): roles/motd, roles/ntp, files/*.json, README.md
/// - `v2.0` (annotated): roles/motd/tasks/main.yml changed to "v2"
pub struct Origin {
    pub temp: TempDir,
    pub root: PathBuf,
    pub url: String,
    pub v1: Oid,
    pub v2: Oid,
}

impl Origin {
    pub fn repo(&self) -> Repository {
        Repository::open(&self.root).expect("origin should open")
    }

    /// Commit more files on master.
    pub fn commit(&self, files: &[(&str, &str)], message: &str) -> Oid {
        commit_files(&self.repo(), files, message)
    }
}

pub fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) -> Oid {
    let root = repo.workdir().expect("origin has a workdir");
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test User", "test@example.com").unwrap();

    let parents: Vec<Commit> = repo
        .head()
        .ok()
        .and_then(|head| head.target())
        .map(|oid| vec![repo.find_commit(oid).unwrap()])
        .unwrap_or_default();
    let parent_refs: Vec<&Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .unwrap()
}

pub fn origin() -> Origin {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path().join("origin");
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("master");
    let repo = Repository::init_opts(&root, &opts).unwrap();

    let v1 = commit_files(
        &repo,
        &[
            ("README.md", "# roles\n"),
            ("roles/motd/tasks/main.yml", "v1"),
            ("roles/ntp/tasks/main.yml", "ntp"),
            ("files/a.json", "{\"a\": 1}"),
            ("files/b.json", "{\"b\": 2}"),
            ("files/notes.txt", "notes"),
        ],
        "v1",
    );
    repo.tag_lightweight("v1.0", &repo.find_object(v1, None).unwrap(), false)
        .unwrap();

    let v2 = commit_files(&repo, &[("roles/motd/tasks/main.yml", "v2")], "v2");
    let sig = Signature::now("Test User", "test@example.com").unwrap();
    repo.tag(
        "v2.0",
        &repo.find_object(v2, None).unwrap(),
        &sig,
        "release 2.0",
        false,
    )
    .unwrap();

    let url = url::Url::from_file_path(&root)
        .expect("origin path should convert to file URL")
        .to_string();

    Origin {
        temp,
        root,
        url,
        v1,
        v2,
    }
}

/// Isolated project and storage directories.
pub struct Workspace {
    pub temp: TempDir,
    pub project: PathBuf,
    pub storage: PathBuf,
}

pub fn workspace() -> Workspace {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let project = temp.path().join("project");
    let storage = temp.path().join("storage");
    fs::create_dir_all(&project).expect("Failed to create project dir");
    Workspace {
        temp,
        project,
        storage,
    }
}

pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

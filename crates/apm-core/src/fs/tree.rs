//! Recursive directory copy used to move staged checkouts into the cache.

use std::fs;
use std::io;
use std::path::Path;

/// Copy `src` into `dst`, skipping entries whose file name is in `skip`.
///
/// `dst` must already exist. Symlinks inside the tree are recreated as
/// symlinks with the same target rather than followed.
pub fn copy_tree_filtered(src: &Path, dst: &Path, skip: &[&str]) -> io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if skip.iter().any(|name| file_name == *name) {
            continue;
        }
        let ty = entry.file_type()?;
        let from = entry.path();
        let to = dst.join(&file_name);

        if ty.is_dir() {
            fs::create_dir_all(&to)?;
            copy_tree_filtered(&from, &to, skip)?;
        } else if ty.is_symlink() {
            copy_symlink(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_nested_files_and_skips_git() {
        let src = tempfile::tempdir().expect("tempdir should succeed");
        let dst = tempfile::tempdir().expect("tempdir should succeed");

        fs::create_dir_all(src.path().join(".git").join("objects")).unwrap();
        fs::write(src.path().join(".git").join("HEAD"), "x").unwrap();
        fs::create_dir_all(src.path().join("tasks")).unwrap();
        fs::write(src.path().join("tasks").join("main.yml"), "---\n").unwrap();
        fs::write(src.path().join("README.md"), "# role\n").unwrap();

        copy_tree_filtered(src.path(), dst.path(), &[".git"]).unwrap();

        assert!(dst.path().join("README.md").is_file());
        assert_eq!(
            fs::read_to_string(dst.path().join("tasks").join("main.yml")).unwrap(),
            "---\n"
        );
        assert!(!dst.path().join(".git").exists());
    }

    #[cfg(unix)]
    #[test]
    fn preserves_symlinks() {
        let src = tempfile::tempdir().expect("tempdir should succeed");
        let dst = tempfile::tempdir().expect("tempdir should succeed");

        fs::write(src.path().join("defaults.yml"), "a: 1\n").unwrap();
        std::os::unix::fs::symlink("defaults.yml", src.path().join("vars.yml")).unwrap();

        copy_tree_filtered(src.path(), dst.path(), &[]).unwrap();

        let link = dst.path().join("vars.yml");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("defaults.yml"));
    }
}

//! Assertions over produced mirror trees

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use walkdir::WalkDir;

/// Every file and directory below `root`, as `/`-joined relative paths
pub fn tree(root: &Path) -> BTreeSet<String> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| relative(root, entry.unwrap().path()))
        .collect()
}

/// Contents of every file below `root`
pub fn file_contents(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| (relative(root, entry.path()), std::fs::read(entry.path()).unwrap()))
        .collect()
}

/// Member names of the zip at `path`
pub fn zip_members(path: &Path) -> BTreeSet<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

pub fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap()
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

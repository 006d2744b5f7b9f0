use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Every `.json` file under `path`, in a stable order. A file path is
/// returned as is.
pub(crate) fn find_all_json_files(path: &Path) -> Vec<PathBuf> {
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .map(DirEntry::into_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_nested_json_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("sub/c.json"), "{}").unwrap();

        let found = find_all_json_files(dir.path());
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            [PathBuf::from("a.json"), PathBuf::from("b.json"), PathBuf::from("sub/c.json")]
        );
    }

    #[test]
    fn single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("spec.json");
        fs::write(&file, "{}").unwrap();
        assert_eq!(find_all_json_files(&file), [file]);
    }
}

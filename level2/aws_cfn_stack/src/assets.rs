//! Local file assets: directories that get zipped for Lambda or copied
//! verbatim into a bucket.

use std::path::{Path, PathBuf};

use crate::AssetError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// path relative to the asset root, always `/` separated.
    pub key: String,
    pub path: PathBuf,
}

/// every regular file under `root`, sorted by key so archives and uploads
/// come out the same on every run.
pub fn collect_files(root: &Path) -> Result<Vec<AssetFile>, AssetError> {
    let mut out = vec![];
    if root.is_file() {
        let key = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        out.push(AssetFile { key, path: root.to_path_buf() });
        return Ok(out);
    }
    walk(root, root, &mut out)?;
    if out.is_empty() {
        return Err(AssetError::Empty(root.to_path_buf()));
    }
    out.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<AssetFile>) -> Result<(), AssetError> {
    let entries = std::fs::read_dir(dir).map_err(|e| AssetError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| AssetError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| AssetError::io(&path, e))?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_file() {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            out.push(AssetFile { key, path });
        }
    }
    Ok(())
}

/// `Content-Type` for an uploaded object, guessed from its extension.
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key).first_or_octet_stream().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_nested_files_in_key_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body {}").unwrap();
        std::fs::write(dir.path().join("error.html"), "oops").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let keys: Vec<&str> = files.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["css/site.css", "error.html", "index.html"]);
    }

    #[test]
    fn single_file_uses_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{}").unwrap();
        let files = collect_files(&path).unwrap();
        assert_eq!(files, vec![AssetFile { key: "data.json".into(), path }]);
    }

    #[test]
    fn empty_or_missing_dirs_fail() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(collect_files(dir.path()), Err(AssetError::Empty(_))));
        assert!(matches!(collect_files(&dir.path().join("nope")), Err(AssetError::Io { .. })));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("index.html"), "text/html");
        assert_eq!(content_type_for("css/SITE.CSS"), "text/css");
        assert_eq!(content_type_for("data.json"), "application/json");
        assert_eq!(content_type_for("LICENSE"), "application/octet-stream");
        assert_eq!(content_type_for("media/intro.mp4"), "video/mp4");
        assert_eq!(content_type_for("resume.csv"), "text/csv");
        assert_eq!(content_type_for("img/hero.PNG"), "image/png");
    }
}

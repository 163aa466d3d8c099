use crate::annotations::Annotation;
use crate::tree::ElementTree;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid annotation file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read a markdown file and mirror it as an element tree
pub fn read_document(path: &Path) -> Result<ElementTree, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    let source = fs::read_to_string(path)?;
    Ok(ElementTree::from_markdown(&source))
}

/// Load stored annotations. A missing file is an empty store.
pub fn load_annotations(path: &Path) -> Result<Vec<Annotation>, IoError> {
    if !path.exists() {
        log::debug!("no annotation file at {}", path.display());
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write annotations as pretty JSON, replacing the file
pub fn save_annotations(path: &Path, annotations: &[Annotation]) -> Result<(), IoError> {
    // Create parent directories if they don't exist
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(annotations).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json + "\n")?;
    Ok(())
}

/// Annotations for `notes.md` live next to it in `notes.anchors.json`
pub fn default_annotations_path(document: &Path) -> PathBuf {
    document.with_extension("anchors.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::{FingerprintLimits, create_fingerprint};
    use crate::tests::{create_test_dir, create_test_file};
    use crate::tree::DocumentTree;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_document() {
        // Given a markdown file on disk
        let dir = create_test_dir();
        let path = create_test_file(&dir, "notes.md", "# Notes\n\n- Budget review\n");

        // When reading it
        let tree = read_document(&path).unwrap();

        // Then the blocks are there
        assert_eq!(tree.nodes_by_tag("h1").len(), 1);
        assert_eq!(tree.normalized_text(tree.nodes_by_tag("li")[0]), "Budget review");
    }

    #[test]
    fn test_read_document_not_found() {
        let dir = create_test_dir();
        let result = read_document(&dir.path().join("missing.md"));
        assert!(matches!(result, Err(IoError::NotFound(_))));
    }

    #[test]
    fn test_missing_annotation_file_is_empty() {
        let dir = create_test_dir();
        let annotations = load_annotations(&dir.path().join("none.anchors.json")).unwrap();
        assert!(annotations.is_empty());
    }

    #[test]
    fn test_save_and_load_annotations() {
        // Given annotations on a document
        let dir = create_test_dir();
        let tree = ElementTree::from_markdown("First\n\nSecond\n");
        let annotations: Vec<Annotation> = tree
            .nodes_by_tag("p")
            .into_iter()
            .map(|p| Annotation::new(create_fingerprint(&tree, p, &FingerprintLimits::default())))
            .collect();

        // When saving into a directory that does not exist yet
        let path = dir.path().join("store").join("notes.anchors.json");
        save_annotations(&path, &annotations).unwrap();

        // Then loading returns the same annotations
        assert_eq!(load_annotations(&path).unwrap(), annotations);
    }

    #[test]
    fn test_invalid_annotation_file() {
        let dir = create_test_dir();
        let path = create_test_file(&dir, "broken.anchors.json", "{ not json");

        let result = load_annotations(&path);

        assert!(matches!(result, Err(IoError::Json { .. })));
        assert!(result.unwrap_err().to_string().contains("broken.anchors.json"));
    }

    #[test]
    fn test_default_annotations_path() {
        assert_eq!(
            default_annotations_path(Path::new("/notes/weekly.md")),
            PathBuf::from("/notes/weekly.anchors.json")
        );
    }
}

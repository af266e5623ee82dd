//! Manifest loading, source-file hydration and output writing.

use crate::errors::ConfigError;
use crate::model::{Document, Manifest};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Reads a manifest in either the wrapped (`{"documents": [...]}`) or bare-array form.
pub fn load_manifest(path: &Path) -> Result<Manifest, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ManifestNotFound {
            path: path.display().to_string(),
        });
    }
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ManifestParse {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    let manifest = parse_manifest(&raw).map_err(|detail| ConfigError::ManifestParse {
        path: path.display().to_string(),
        detail,
    })?;
    tracing::info!(
        manifest = %path.display(),
        documents = manifest.documents.len(),
        "manifest loaded"
    );
    Ok(manifest)
}

#[derive(Deserialize)]
struct WrappedManifest {
    documents: Vec<Document>,
}

/// The shape is checked on a `Value` first; the typed read then runs on the raw text so
/// errors keep their line and column.
fn parse_manifest(raw: &str) -> Result<Manifest, String> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let documents = match &value {
        serde_json::Value::Array(_) => {
            serde_json::from_str::<Vec<Document>>(raw).map_err(|e| e.to_string())?
        }
        serde_json::Value::Object(map) if map.contains_key("documents") => {
            serde_json::from_str::<WrappedManifest>(raw)
                .map_err(|e| e.to_string())?
                .documents
        }
        serde_json::Value::Object(_) => {
            return Err("expected a document list or an object with a \"documents\" key".into())
        }
        other => return Err(format!("expected a JSON array or object, got {}", kind_of(other))),
    };
    Ok(Manifest { documents })
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Replaces `path` references without text by the file contents. Relative paths resolve
/// against `base_dir` (normally the manifest's directory). Returns how many texts were filled.
pub fn hydrate_manifest(manifest: &mut Manifest, base_dir: &Path) -> anyhow::Result<usize> {
    let mut hydrated = 0;
    for (index, document) in manifest.documents.iter_mut().enumerate() {
        let label = document.label(index);

        if document.text.is_none() {
            if let Some(path) = document.path.clone() {
                let text = read_source(&resolve(base_dir, &path))
                    .with_context(|| format!("hydrating document '{}'", label))?;
                document.text = Some(text);
                hydrated += 1;
            }
        }

        for translation in &mut document.translations {
            let Some(path) = translation.path.take() else {
                continue;
            };
            if !translation.text.is_empty() {
                continue;
            }
            translation.text = read_source(&resolve(base_dir, &path)).with_context(|| {
                format!(
                    "hydrating {} translation of '{}' by {}",
                    translation.language, label, translation.author
                )
            })?;
            hydrated += 1;
        }
    }
    tracing::debug!(hydrated, "manifest hydrated");
    Ok(hydrated)
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// `.pdf` goes through `pdftotext`; anything else is read as UTF-8 text.
pub fn read_source(path: &Path) -> anyhow::Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        let pages = extract_pdf_pages(path)?;
        return Ok(pages.concat().trim().to_string());
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Text layer of every page, in page order. Trailing blank pages are dropped.
pub fn extract_pdf_pages(pdf_path: &Path) -> anyhow::Result<Vec<String>> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg("-f")
        .arg("1")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
}

/// Splits `pdftotext` output on form feeds, strips NUL bytes and drops trailing blank pages.
pub fn split_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();
    while pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Indented JSON. serde_json never escapes non-ASCII, so text stays byte-identical.
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Writes `value` to `out`, or to stdout when no path is given.
pub fn write_output<T: Serialize + ?Sized>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    let mut body = to_json_pretty(value)?;
    body.push('\n');
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(path, body)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(output = %path.display(), "output written");
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(body.as_bytes())?;
            lock.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_is_not_found() {
        let err = load_manifest(Path::new("/no/such/manifest.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ManifestNotFound { .. }));
    }

    #[test]
    fn malformed_and_wrong_shape_are_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            load_manifest(&bad),
            Err(ConfigError::ManifestParse { .. })
        ));

        let shape = dir.path().join("shape.json");
        std::fs::write(&shape, r#"{"docs": []}"#).unwrap();
        match load_manifest(&shape) {
            Err(ConfigError::ManifestParse { detail, .. }) => assert!(detail.contains("documents")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn type_errors_inside_documents_keep_their_position() {
        let wrapped = "{\"documents\": [\n  {\"name\": \"a\", \"translations\": 5}\n]}";
        let detail = parse_manifest(wrapped).unwrap_err();
        assert!(detail.contains("invalid type"), "{detail}");
        assert!(detail.contains("line 2"), "{detail}");
        assert!(!detail.contains("untagged"), "{detail}");

        let bare = "[\n  {\"name\": 7}\n]";
        let detail = parse_manifest(bare).unwrap_err();
        assert!(detail.contains("invalid type"), "{detail}");
        assert!(detail.contains("line 2"), "{detail}");
    }

    #[test]
    fn pages_split_on_form_feeds() {
        let pages = split_pages("Page one\n\u{000C}Page two\n\u{000C}Page three\n");
        assert_eq!(pages, vec!["Page one\n", "Page two\n", "Page three\n"]);
        assert_eq!(pages.concat().trim(), "Page one\nPage two\nPage three");
    }

    #[test]
    fn trailing_blank_pages_are_dropped() {
        let pages = split_pages("Only page\n\u{000C}\n\u{000C}  \n\u{000C}");
        assert_eq!(pages, vec!["Only page\n"]);
        let blank_middle = split_pages("A\u{000C}\u{000C}B\u{000C}");
        assert_eq!(blank_middle, vec!["A", "", "B"]);
    }

    #[test]
    fn empty_output_has_no_pages() {
        assert!(split_pages("").is_empty());
        assert!(split_pages("\u{000C}").is_empty());
    }

    #[test]
    fn nul_bytes_are_stripped() {
        let pages = split_pages("Bene\u{0000}fits\u{000C}ap\u{0000}\u{0000}proved");
        assert_eq!(pages, vec!["Benefits", "approved"]);
    }

    #[test]
    fn hydrates_relative_txt_paths_and_clears_them() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("text")).unwrap();
        std::fs::write(dir.path().join("text/notice.txt"), "Aviso — página 1\n").unwrap();
        std::fs::write(dir.path().join("source.txt"), "Original notice").unwrap();
        let raw = r#"{"documents": [{
            "name": "notice",
            "path": "source.txt",
            "translations": [
                {"language": "Spanish", "author": "baseline", "path": "text/notice.txt"},
                {"language": "English", "author": "baseline", "text": "Notice"}
            ]
        }]}"#;
        let mut manifest = parse_manifest(raw).unwrap();

        let n = hydrate_manifest(&mut manifest, dir.path()).unwrap();

        assert_eq!(n, 2);
        let doc = &manifest.documents[0];
        assert_eq!(doc.text.as_deref(), Some("Original notice"));
        assert_eq!(doc.translations[0].text, "Aviso — página 1\n");
        assert!(doc.translations[0].path.is_none());
        assert_eq!(doc.translations[1].text, "Notice");
    }

    #[test]
    fn hydration_reports_missing_file_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let raw = r#"[{"name": "gone", "translations": [{"language": "English", "path": "missing.txt"}]}]"#;
        let mut manifest = parse_manifest(raw).unwrap();
        let err = hydrate_manifest(&mut manifest, dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("'gone'"));
    }

    #[test]
    fn output_file_is_pretty_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out.json");
        let manifest = parse_manifest(
            r#"[{"name": "zh", "translations": [{"language": "Chinese", "text": "你好"}]}]"#,
        )
        .unwrap();
        write_output(&manifest, Some(&out)).unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("你好"));
        assert!(written.starts_with("{\n  \"documents\""));
    }
}

//! Packages a deployment's saved artifacts into a downloadable ZIP with a
//! single top-level directory (§4.13, §6 "Bundle archive").

use std::io::Write;

use rb_repository::Repository;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::errors::ArtifactError;
use crate::extractor::RAW_ADDRESSES_ARTIFACT;

const STATE_ARTIFACT_TYPE: &str = "deployment_state";

fn is_internal_only(artifact_type: &str) -> bool {
    artifact_type == RAW_ADDRESSES_ARTIFACT || artifact_type == STATE_ARTIFACT_TYPE
}

/// Lowercases, keeps `[a-z0-9_-]`, maps spaces to `-`, drops everything
/// else; falls back to `default` if the result would be empty.
fn sanitize(name: &str, default: &str) -> String {
    let sanitized: String = name
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '-' => Some(c),
            ' ' => Some('-'),
            _ => None,
        })
        .collect();
    if sanitized.is_empty() {
        default.to_string()
    } else {
        sanitized
    }
}

/// Unwraps a plain-text artifact stored via the base64 envelope before
/// inserting it into the archive; binary artifacts are inserted as-is.
fn unwrap_text_artifact(content: &[u8]) -> Vec<u8> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(content) {
        if value.get("_type").and_then(serde_json::Value::as_str) == Some("base64") {
            return rb_repository::Artifact::from_envelope(&value);
        }
    }
    content.to_vec()
}

pub async fn create_bundle(repository: &dyn Repository, deployment_id: &str, name: &str) -> Result<Vec<u8>, ArtifactError> {
    let directory = sanitize(name, "deployment-bundle");
    let prefix = format!("{directory}-bundle/");

    let mut buffer = Vec::new();
    {
        let mut writer = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default();

        for artifact in repository.list_artifacts(deployment_id).await? {
            if is_internal_only(&artifact.artifact_type) {
                continue;
            }
            writer.start_file(format!("{prefix}{}", artifact.artifact_type), options)?;
            writer.write_all(&unwrap_text_artifact(&artifact.content))?;
        }
        writer.finish()?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sanitize_lowercases_and_maps_spaces() {
        assert_eq!(sanitize("My Chain!", "default"), "my-chain");
    }

    #[test]
    fn sanitize_falls_back_on_empty_result() {
        assert_eq!(sanitize("!!!", "default"), "default");
    }

    #[tokio::test]
    async fn bundle_excludes_internal_artifacts_and_nests_under_one_directory() {
        let repo = rb_repository::InMemoryRepository::new();
        repo.put_artifact(rb_repository::Artifact::new("d1", "README.md", b"hello".to_vec())).await.unwrap();
        repo.put_artifact(rb_repository::Artifact::new("d1", STATE_ARTIFACT_TYPE, b"{}".to_vec())).await.unwrap();

        let zip_bytes = create_bundle(&repo, "d1", "My Chain").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let names: Vec<String> = (0..archive.len()).map(|i| archive.by_index(i).unwrap().name().to_string()).collect();
        assert_eq!(names, vec!["my-chain-bundle/README.md".to_string()]);
    }
}

use tracing::{debug, error, info};

use crate::config::UploadTarget;
use crate::contract::{RemoteFileRef, RemoteRepository, UploadError};

/// Look up `path` on the target branch and, when it exists and `with_content`
/// is set, fetch its decoded content into [`RemoteFileRef::decoded_content`].
///
/// An absent path is `Ok(None)`; content is never fetched for it.
pub async fn lookup_remote<R>(
    remote: &R,
    target: &UploadTarget,
    path: &str,
    with_content: bool,
) -> Result<Option<RemoteFileRef>, UploadError>
where
    R: RemoteRepository + ?Sized,
{
    let found = remote.lookup(target, path).await.map_err(|e| {
        error!(path, error = %e, "[LOOKUP][ERROR] Remote lookup failed");
        e
    })?;

    let Some(mut file_ref) = found else {
        info!(path, "[LOOKUP] Remote path does not exist yet");
        return Ok(None);
    };
    debug!(path, sha = %file_ref.sha, "[LOOKUP] Remote path exists");

    if with_content && file_ref.decoded_content.is_none() {
        let content = remote.fetch_content(target, path).await.map_err(|e| {
            error!(path, error = %e, "[LOOKUP][ERROR] Fetching remote content failed");
            e
        })?;
        debug!(path, size = content.len(), "[LOOKUP] Fetched remote content");
        file_ref.decoded_content = Some(content);
    }
    Ok(Some(file_ref))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockRemoteRepository;

    fn target() -> UploadTarget {
        UploadTarget::new("octocat", "notes", "main", "token")
    }

    #[tokio::test]
    async fn absent_path_skips_content_fetch() {
        let mut remote = MockRemoteRepository::new();
        remote.expect_lookup().return_once(|_, _| Ok(None));
        remote.expect_fetch_content().never();

        let found = lookup_remote(&remote, &target(), "notes.txt", true)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn present_path_fetches_content_on_request() {
        let mut remote = MockRemoteRepository::new();
        remote.expect_lookup().return_once(|_, path| {
            Ok(Some(RemoteFileRef {
                path: path.to_string(),
                sha: "abc123".into(),
                decoded_content: None,
            }))
        });
        remote
            .expect_fetch_content()
            .withf(|_, path| path == "notes.txt")
            .times(1)
            .returning(|_, _| Ok(b"hello\nworld".to_vec()));

        let found = lookup_remote(&remote, &target(), "notes.txt", true)
            .await
            .unwrap()
            .expect("path should exist");
        assert_eq!(found.sha, "abc123");
        assert_eq!(found.decoded_content.as_deref(), Some(&b"hello\nworld"[..]));
    }

    #[tokio::test]
    async fn metadata_only_lookup_leaves_content_empty() {
        let mut remote = MockRemoteRepository::new();
        remote.expect_lookup().return_once(|_, path| {
            Ok(Some(RemoteFileRef {
                path: path.to_string(),
                sha: "abc123".into(),
                decoded_content: None,
            }))
        });
        remote.expect_fetch_content().never();

        let found = lookup_remote(&remote, &target(), "big.log.part1", false)
            .await
            .unwrap()
            .unwrap();
        assert!(found.decoded_content.is_none());
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let mut remote = MockRemoteRepository::new();
        remote.expect_lookup().return_once(|_, _| {
            Err(UploadError::Transport {
                status: Some(500),
                status_text: "Internal Server Error".into(),
            })
        });

        let err = lookup_remote(&remote, &target(), "notes.txt", true)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Internal Server Error");
    }
}

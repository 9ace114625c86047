use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, error, info};

use crate::config::UploadTarget;
use crate::contract::{RemoteFileRef, RemoteRepository, WriteRequest};
use crate::progress::UnitOutcome;

/// Commit message used for every write.
pub fn change_message(path: &str) -> String {
    format!("Upload/Overwrite {path}")
}

/// Build the create-or-overwrite request for `path`.
///
/// `prior` carries the current remote version; without it the remote treats
/// the write as a create and refuses it if the path already exists.
pub fn build_write_request(
    target: &UploadTarget,
    path: &str,
    content: &[u8],
    prior: Option<&RemoteFileRef>,
) -> WriteRequest {
    WriteRequest {
        path: path.to_string(),
        message: change_message(path),
        content: STANDARD.encode(content),
        branch: target.branch.clone(),
        sha: prior.map(|r| r.sha.clone()),
    }
}

/// Write one payload to the remote. Never fails the caller: a refused or
/// broken write comes back as [`UnitOutcome::Failed`] with the remote's message.
pub async fn upload<R>(
    remote: &R,
    target: &UploadTarget,
    path: &str,
    content: &[u8],
    prior: Option<&RemoteFileRef>,
) -> UnitOutcome
where
    R: RemoteRepository + ?Sized,
{
    let request = build_write_request(target, path, content, prior);
    info!(
        path,
        size = content.len(),
        overwrite = request.sha.is_some(),
        "[UPLOAD] Writing file to remote"
    );
    debug!(path, message = %request.message, branch = %request.branch, "[UPLOAD][DEBUG] Write request");

    match remote.put_contents(target, &request).await {
        Ok(receipt) => {
            info!(path, status = receipt.status, sha = ?receipt.sha, "[UPLOAD] Write succeeded");
            UnitOutcome::Uploaded
        }
        Err(e) => {
            error!(path, error = %e, "[UPLOAD][ERROR] Write failed");
            UnitOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{MockRemoteRepository, UploadError, WriteReceipt};

    fn target() -> UploadTarget {
        UploadTarget::new("octocat", "notes", "dev", "token")
    }

    #[test]
    fn request_for_new_file_has_no_sha() {
        let req = build_write_request(&target(), "notes.txt", b"hello\nworld", None);
        assert_eq!(req.path, "notes.txt");
        assert_eq!(req.message, "Upload/Overwrite notes.txt");
        assert_eq!(req.content, "aGVsbG8Kd29ybGQ=");
        assert_eq!(req.branch, "dev");
        assert!(req.sha.is_none());
    }

    #[test]
    fn request_for_existing_file_carries_prior_sha() {
        let prior = RemoteFileRef {
            path: "notes.txt".into(),
            sha: "ce01362".into(),
            decoded_content: None,
        };
        let req = build_write_request(&target(), "notes.txt", b"x", Some(&prior));
        assert_eq!(req.sha.as_deref(), Some("ce01362"));
    }

    #[tokio::test]
    async fn rejected_write_reports_remote_message() {
        let mut remote = MockRemoteRepository::new();
        remote.expect_put_contents().return_once(|_, _| {
            Err(UploadError::Rejected {
                status: 409,
                message: "Conflict".into(),
            })
        });

        let outcome = upload(&remote, &target(), "notes.txt", b"x", None).await;
        assert_eq!(outcome, UnitOutcome::Failed("Conflict".into()));
    }

    #[tokio::test]
    async fn accepted_write_reports_uploaded() {
        let mut remote = MockRemoteRepository::new();
        remote
            .expect_put_contents()
            .withf(|_, req| req.path == "notes.txt" && req.sha.is_none())
            .return_once(|_, _| {
                Ok(WriteReceipt {
                    status: 201,
                    sha: Some("new".into()),
                })
            });

        let outcome = upload(&remote, &target(), "notes.txt", b"x", None).await;
        assert_eq!(outcome, UnitOutcome::Uploaded);
    }
}

//! Teardown orchestration: closing every file of a tree or session, and
//! full session cleanup. All entry points are idempotent; re-entry finds
//! empty sets and returns cleanly.

use smb_msg::FileId;

use crate::handler::{Handler, OpenFile};
use crate::services::{Credentials, LockOwner};

impl Handler {
    /// Closes every open file owned by `session_id`.
    pub async fn close_all_files_for_session(&self, session_id: u64) {
        self.close_matching_files(|file| file.session_id == session_id)
            .await;
    }

    /// Closes every open file of one tree connection.
    pub async fn close_all_files_for_tree(&self, tree_id: u32, session_id: u64) {
        self.close_matching_files(|file| {
            file.tree_id == tree_id && file.session_id == session_id
        })
        .await;
    }

    /// Two passes: release backend resources for each matching open, then
    /// drop the registry entries.
    async fn close_matching_files(&self, matches: impl Fn(&OpenFile) -> bool) {
        let matching: Vec<FileId> = self
            .file_ids()
            .into_iter()
            .filter(|id| {
                self.files
                    .get(id)
                    .map(|file| matches(&file))
                    .unwrap_or(false)
            })
            .collect();

        for file_id in &matching {
            let Some(file) = self.files.get(file_id).map(|f| f.clone()) else {
                continue;
            };
            let creds = self.credentials_or_root(file.session_id);
            self.release_file_resources(&file, &creds).await;
            self.drop_notifies_for(file_id);
        }
        for file_id in &matching {
            self.files.remove(file_id);
        }
    }

    /// The owning session's credentials, falling back to root once the
    /// session is gone. The CREATE that set delete-on-close already
    /// validated DELETE access; reverting the disposition would leak the
    /// file.
    fn credentials_or_root(&self, session_id: u64) -> Credentials {
        match self.sessions.get(session_id) {
            Some(session) => session.credentials(),
            None => Credentials::Root,
        }
    }

    /// Releases the backend state behind one open: pipe close, byte-range
    /// locks, payload flush, lease, delete-on-close, metadata handle.
    /// Failures are logged and never propagated.
    pub(crate) async fn release_file_resources(&self, file: &OpenFile, creds: &Credentials) {
        if file.is_pipe {
            let name = file.pipe_name.as_deref().unwrap_or_default();
            if let Err(error) = self.services.pipes.close(name, file.session_id).await {
                log::warn!("pipe close of {name} failed: {error}");
            }
            return;
        }

        let Some(handle) = file.metadata else {
            return;
        };

        let owner = LockOwner {
            protocol: "smb2",
            client: String::new(),
            share: String::new(),
            session_id: file.session_id,
        };
        if let Err(error) = self
            .services
            .metadata
            .unlock_all_for_session(handle, &owner)
            .await
        {
            log::warn!("releasing locks on handle {handle} failed: {error}");
        }

        if let Some(payload) = file.payload {
            if let Err(error) = self.services.payload.flush(payload).await {
                log::warn!("flush of payload {payload} failed: {error}");
            }
        }

        if let Some(key) = file.lease_key {
            if let Err(error) = self.leases.release(key).await {
                log::warn!("lease release of {key:#x} failed: {error}");
            }
        }

        if file.delete_pending {
            if let Some(target) = &file.delete_target {
                let removal = if file.is_directory {
                    self.services
                        .metadata
                        .remove_directory(creds, target.parent, &target.name)
                        .await
                } else {
                    self.services
                        .metadata
                        .remove_file(creds, target.parent, &target.name)
                        .await
                };
                if let Err(error) = removal {
                    log::warn!("delete-on-close of {} failed: {error}", target.name);
                }
            }
        }

        if let Err(error) = self.services.metadata.close(handle).await {
            log::warn!("metadata close of handle {handle} failed: {error}");
        }
    }

    /// Full session teardown: files, then trees, then the pending auth and
    /// the session record itself.
    pub async fn cleanup_session(&self, session_id: u64) {
        self.close_all_files_for_session(session_id).await;

        let trees: Vec<u32> = self
            .trees
            .iter()
            .filter(|tree| tree.session_id == session_id)
            .map(|tree| tree.id)
            .collect();
        for tree_id in trees {
            self.trees.remove(&tree_id);
        }

        self.pending_auths.remove(&session_id);
        self.sessions.delete(session_id);
    }
}

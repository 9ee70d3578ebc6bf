//! End-to-end dispatcher scenarios over in-memory collaborators.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;

use smb_fscc::{FileAccessMask, FileAttributes, FileBothDirectoryInformation};
use smb_msg::*;
use smb_srv::DispatchOutcome;

fn header(command: Command, session_id: u64, tree_id: u32, message_id: u64) -> Header {
    Header {
        credit_charge: 1,
        status: 0,
        command,
        credit_request: 1,
        flags: HeaderFlags::new(),
        next_command: 0,
        message_id,
        tree_id: Some(tree_id),
        async_id: None,
        session_id,
        signature: 0,
    }
}

async fn dispatch_ok(
    fx: &Fixture,
    header: &Header,
    content: RequestContent,
) -> (Status, ResponseContent, Option<u64>) {
    match fx.handler.dispatch(header, content, &fx.ctx).await {
        DispatchOutcome::Respond(response) => {
            (response.status, response.content, response.session_id)
        }
        other => panic!("expected a response, got {other:?}"),
    }
}

async fn dispatch_error(fx: &Fixture, header: &Header, content: RequestContent) -> Status {
    match fx.handler.dispatch(header, content, &fx.ctx).await {
        DispatchOutcome::ErrorOnly(status) => status,
        other => panic!("expected an error outcome, got {other:?}"),
    }
}

fn negotiate_request(dialects: Vec<Dialect>) -> NegotiateRequest {
    NegotiateRequest {
        security_mode: NegotiateSecurityMode::from_bytes(0x0001u16.to_le_bytes()),
        capabilities: GlobalCapabilities::from_bytes(0x05u32.to_le_bytes()),
        client_guid: "11111111-2222-3333-4444-555566667777".parse().unwrap(),
        dialects,
        negotiate_context_list: None,
    }
}

/// Negotiates, authenticates and connects the `data` share.
async fn connect(fx: &Fixture) -> (u64, u32) {
    connect_with_dialects(fx, vec![Dialect::Smb0202, Dialect::Smb021, Dialect::Smb030]).await
}

async fn connect_with_dialects(fx: &Fixture, dialects: Vec<Dialect>) -> (u64, u32) {
    let (status, _, _) = dispatch_ok(
        fx,
        &header(Command::Negotiate, 0, 0, 1),
        RequestContent::Negotiate(negotiate_request(dialects)),
    )
    .await;
    assert_eq!(Status::Success, status);

    let (status, _, session_id) = dispatch_ok(
        fx,
        &header(Command::SessionSetup, 0, 0, 2),
        RequestContent::SessionSetup(SessionSetupRequest {
            flags: SessionSetupFlags::new(),
            security_mode: SessionSecurityMode::new().with_signing_enabled(true),
            capabilities: GlobalCapabilities::new(),
            previous_session_id: 0,
            buffer: Vec::new(),
        }),
    )
    .await;
    assert_eq!(Status::Success, status);
    let session_id = session_id.expect("session id granted");

    let (status, content, _) = dispatch_ok(
        fx,
        &header(Command::TreeConnect, session_id, 0, 3),
        RequestContent::TreeConnect(TreeConnectRequest::new(r"\\srv\data")),
    )
    .await;
    assert_eq!(Status::Success, status);
    content.as_tree_connect().expect("tree connect response");
    // Tree IDs are allocated from 1 on a fresh handler.
    (session_id, 1)
}

fn create_request(path: &str, directory: bool) -> CreateRequest {
    CreateRequest {
        requested_oplock_level: OplockLevel::None,
        impersonation_level: ImpersonationLevel::Impersonation,
        desired_access: FileAccessMask::new()
            .with_file_read_data(true)
            .with_file_write_data(true)
            .with_file_read_attributes(true)
            .with_delete(true),
        file_attributes: FileAttributes::new(),
        share_access: ShareAccessFlags::new().with_read(true).with_write(true),
        create_disposition: CreateDisposition::OpenIf,
        create_options: if directory {
            smb_msg::CreateOptions::new().with_directory_file(true)
        } else {
            smb_msg::CreateOptions::new()
        },
        name: path.into(),
        contexts: Default::default(),
    }
}

async fn open_path(fx: &Fixture, session_id: u64, tree_id: u32, path: &str, dir: bool) -> FileId {
    let (status, content, _) = dispatch_ok(
        fx,
        &header(Command::Create, session_id, tree_id, 10),
        RequestContent::Create(create_request(path, dir)),
    )
    .await;
    assert_eq!(Status::Success, status);
    content.as_create().unwrap().file_id
}

#[test_log::test(tokio::test)]
async fn test_echo_round_trip() {
    let fx = fixture();
    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::Echo, 0, 0, 1),
        RequestContent::Echo(EchoRequest::default()),
    )
    .await;
    assert_eq!(Status::Success, status);
    content.as_echo().unwrap();
}

#[test_log::test(tokio::test)]
async fn test_negotiate_selects_highest_common_dialect() {
    let fx = fixture();
    let (_, content, _) = dispatch_ok(
        &fx,
        &header(Command::Negotiate, 0, 0, 1),
        RequestContent::Negotiate(negotiate_request(vec![
            Dialect::Smb0202,
            Dialect::Smb021,
            Dialect::Smb030,
            Dialect::Smb0311,
        ])),
    )
    .await;
    let response = content.to_negotiate().unwrap();
    // 3.1.1 is not in the server's configured set; 3.0 wins.
    assert_eq!(NegotiateDialect::Smb030, response.dialect_revision);
    assert_eq!(1024 * 1024, response.max_read_size);
    assert_eq!(1024 * 1024, response.max_write_size);
    assert_eq!(1024 * 1024, response.max_transact_size);
}

#[test_log::test(tokio::test)]
async fn test_session_setup_two_leg_exchange() {
    let fx = fixture();
    dispatch_ok(
        &fx,
        &header(Command::Negotiate, 0, 0, 1),
        RequestContent::Negotiate(negotiate_request(vec![Dialect::Smb021])),
    )
    .await;

    let (status, content, session_id) = dispatch_ok(
        &fx,
        &header(Command::SessionSetup, 0, 0, 2),
        RequestContent::SessionSetup(SessionSetupRequest {
            flags: SessionSetupFlags::new(),
            security_mode: SessionSecurityMode::new(),
            capabilities: GlobalCapabilities::new(),
            previous_session_id: 0,
            buffer: b"NEGOTIATE".to_vec(),
        }),
    )
    .await;
    assert_eq!(Status::MoreProcessingRequired, status);
    let interim = content.to_session_setup().unwrap();
    assert_eq!(b"CHALLENGE".to_vec(), interim.buffer);
    let session_id = session_id.unwrap();

    let (status, _, _) = dispatch_ok(
        &fx,
        &header(Command::SessionSetup, session_id, 0, 3),
        RequestContent::SessionSetup(SessionSetupRequest {
            flags: SessionSetupFlags::new(),
            security_mode: SessionSecurityMode::new(),
            capabilities: GlobalCapabilities::new(),
            previous_session_id: 0,
            buffer: b"AUTHENTICATE".to_vec(),
        }),
    )
    .await;
    assert_eq!(Status::Success, status);

    // A second completion finds no pending record.
    let status = dispatch_error(
        &fx,
        &header(Command::SessionSetup, session_id + 999, 0, 4),
        RequestContent::SessionSetup(SessionSetupRequest {
            flags: SessionSetupFlags::new(),
            security_mode: SessionSecurityMode::new(),
            capabilities: GlobalCapabilities::new(),
            previous_session_id: 0,
            buffer: b"AUTHENTICATE".to_vec(),
        }),
    )
    .await;
    assert_eq!(Status::UserSessionDeleted, status);
}

#[test_log::test(tokio::test)]
async fn test_empty_directory_lists_dot_entries() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_node("emptydir", smb_srv::services::FileKind::Directory);
    let dir = open_path(&fx, session_id, tree_id, "emptydir", true).await;

    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::QueryDirectory, session_id, tree_id, 20),
        RequestContent::QueryDirectory(QueryDirectoryRequest {
            file_information_class: smb_fscc::QueryDirectoryInfoClass::BothDirectory,
            flags: QueryDirectoryFlags::new(),
            file_index: 0,
            file_id: dir,
            output_buffer_length: 64 * 1024,
            file_name: "*".into(),
        }),
    )
    .await;
    assert_eq!(Status::Success, status);

    let response = content.to_query_directory().unwrap();
    let entries = response
        .read_output::<FileBothDirectoryInformation>()
        .unwrap();
    assert_eq!(2, entries.len());
    assert_eq!(entries[0].file_name, ".");
    assert_eq!(entries[1].file_name, "..");
    assert!(entries[0].file_attributes.directory());
    assert!(entries[1].file_attributes.directory());

    // The enumeration is complete; the next call reports no more files.
    let status = dispatch_error(
        &fx,
        &header(Command::QueryDirectory, session_id, tree_id, 21),
        RequestContent::QueryDirectory(QueryDirectoryRequest {
            file_information_class: smb_fscc::QueryDirectoryInfoClass::BothDirectory,
            flags: QueryDirectoryFlags::new(),
            file_index: 0,
            file_id: dir,
            output_buffer_length: 64 * 1024,
            file_name: "*".into(),
        }),
    )
    .await;
    assert_eq!(Status::NoMoreFiles, status);
}

#[test_log::test(tokio::test)]
async fn test_pattern_change_restarts_enumeration() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_node("docs", smb_srv::services::FileKind::Directory);
    fx.fs.add_file("docs\\a.txt", b"a");
    fx.fs.add_file("docs\\b.log", b"b");
    let dir = open_path(&fx, session_id, tree_id, "docs", true).await;

    let single = |pattern: &str| {
        RequestContent::QueryDirectory(QueryDirectoryRequest {
            file_information_class: smb_fscc::QueryDirectoryInfoClass::Names,
            flags: QueryDirectoryFlags::new().with_return_single_entry(true),
            file_index: 0,
            file_id: dir,
            output_buffer_length: 4096,
            file_name: pattern.into(),
        })
    };

    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::QueryDirectory, session_id, tree_id, 30),
        single("*.txt"),
    )
    .await;
    assert_eq!(Status::Success, status);
    let names = content
        .to_query_directory()
        .unwrap()
        .read_output::<smb_fscc::FileNamesInformation>()
        .unwrap();
    assert_eq!(names[0].file_name, "a.txt");

    // Switching the pattern resets the cursor: the first matching entry of
    // the new pattern comes back, not the second entry of the old one.
    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::QueryDirectory, session_id, tree_id, 31),
        single("*.log"),
    )
    .await;
    assert_eq!(Status::Success, status);
    let names = content
        .to_query_directory()
        .unwrap()
        .read_output::<smb_fscc::FileNamesInformation>()
        .unwrap();
    assert_eq!(names[0].file_name, "b.log");
}

fn names_request(dir: FileId, pattern: &str, output_buffer_length: u32) -> RequestContent {
    RequestContent::QueryDirectory(QueryDirectoryRequest {
        file_information_class: smb_fscc::QueryDirectoryInfoClass::Names,
        flags: QueryDirectoryFlags::new(),
        file_index: 0,
        file_id: dir,
        output_buffer_length,
        file_name: pattern.into(),
    })
}

async fn query_names(
    fx: &Fixture,
    session_id: u64,
    tree_id: u32,
    message_id: u64,
    request: RequestContent,
) -> Vec<String> {
    let (status, content, _) = dispatch_ok(
        fx,
        &header(Command::QueryDirectory, session_id, tree_id, message_id),
        request,
    )
    .await;
    assert_eq!(Status::Success, status);
    content
        .to_query_directory()
        .unwrap()
        .read_output::<smb_fscc::FileNamesInformation>()
        .unwrap()
        .into_iter()
        .map(|entry| entry.file_name.to_string())
        .collect()
}

#[test_log::test(tokio::test)]
async fn test_truncated_enumeration_continues_where_it_stopped() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_node("many", smb_srv::services::FileKind::Directory);
    for index in 0..6 {
        fx.fs.add_file(&format!("many\\f{index}.txt"), b"x");
    }
    let dir = open_path(&fx, session_id, tree_id, "many", true).await;

    // A Names record for "fN.txt" is 24 bytes; 60 bytes fit exactly two
    // entries, so each call must pick up where the previous one stopped.
    let names = query_names(&fx, session_id, tree_id, 32, names_request(dir, "*.txt", 60)).await;
    assert_eq!(vec!["f0.txt", "f1.txt"], names);
    let names = query_names(&fx, session_id, tree_id, 33, names_request(dir, "*.txt", 60)).await;
    assert_eq!(vec!["f2.txt", "f3.txt"], names);
    let names = query_names(&fx, session_id, tree_id, 34, names_request(dir, "*.txt", 60)).await;
    assert_eq!(vec!["f4.txt", "f5.txt"], names);

    let status = dispatch_error(
        &fx,
        &header(Command::QueryDirectory, session_id, tree_id, 35),
        names_request(dir, "*.txt", 60),
    )
    .await;
    assert_eq!(Status::NoMoreFiles, status);
}

#[test_log::test(tokio::test)]
async fn test_enumeration_pages_through_backend_cursor() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_node("paged", smb_srv::services::FileKind::Directory);
    fx.fs.add_file("paged\\a.txt", b"a");
    fx.fs.add_file("paged\\b.txt", b"b");
    fx.fs.add_file("paged\\c.txt", b"c");
    fx.fs.set_dir_page_size(2);
    let dir = open_path(&fx, session_id, tree_id, "paged", true).await;

    // First call consumes the first backend page; `.` and `..` lead it.
    let names = query_names(&fx, session_id, tree_id, 36, names_request(dir, "*", 64 * 1024)).await;
    assert_eq!(vec![".", "..", "a.txt", "b.txt"], names);

    // The second call resumes from the cursor the backend handed out, and
    // the special entries do not reappear.
    let names = query_names(&fx, session_id, tree_id, 37, names_request(dir, "*", 64 * 1024)).await;
    assert_eq!(vec!["c.txt"], names);
    assert_eq!(vec![None, Some(2)], fx.fs.dir_cursors_seen());

    let status = dispatch_error(
        &fx,
        &header(Command::QueryDirectory, session_id, tree_id, 38),
        names_request(dir, "*", 64 * 1024),
    )
    .await;
    assert_eq!(Status::NoMoreFiles, status);
}

#[test_log::test(tokio::test)]
async fn test_lock_conflict_rolls_back_acquired_locks() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_file("locked.bin", &[0u8; 256]);
    let file = open_path(&fx, session_id, tree_id, "locked.bin", false).await;

    let element = |offset, length, exclusive: bool| LockElement {
        offset,
        length,
        flags: LockFlag::new()
            .with_exclusive(exclusive)
            .with_shared(!exclusive)
            .with_fail_immediately(true),
    };

    // Overlapping exclusive elements: the second fails, the first must be
    // rolled back.
    let status = dispatch_error(
        &fx,
        &header(Command::Lock, session_id, tree_id, 40),
        RequestContent::Lock(LockRequest {
            lock_sequence: LockSequence::new(),
            file_id: file,
            locks: vec![element(0, 100, true), element(50, 50, true)],
        }),
    )
    .await;
    assert_eq!(Status::LockNotGranted, status);
    assert!(fx.fs.locks_for_session(session_id).is_empty());
}

#[test_log::test(tokio::test)]
async fn test_lock_rollback_preserves_completed_unlocks() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_file("mixed.bin", &[0u8; 256]);
    let file = open_path(&fx, session_id, tree_id, "mixed.bin", false).await;

    // Take a lock to be unlocked later.
    let (status, _, _) = dispatch_ok(
        &fx,
        &header(Command::Lock, session_id, tree_id, 41),
        RequestContent::Lock(LockRequest {
            lock_sequence: LockSequence::new(),
            file_id: file,
            locks: vec![LockElement {
                offset: 0,
                length: 10,
                flags: LockFlag::new().with_exclusive(true).with_fail_immediately(true),
            }],
        }),
    )
    .await;
    assert_eq!(Status::Success, status);

    // Plant a foreign lock so the second element conflicts.
    fx.fs.plant_lock("mixed.bin", 999, true);

    // [unlock 0..10, lock 0..10 (conflicts with the foreign full-file
    // lock)] - the request fails, but the unlock stays effective.
    let status = dispatch_error(
        &fx,
        &header(Command::Lock, session_id, tree_id, 42),
        RequestContent::Lock(LockRequest {
            lock_sequence: LockSequence::new(),
            file_id: file,
            locks: vec![
                LockElement {
                    offset: 0,
                    length: 10,
                    flags: LockFlag::new().with_unlock(true),
                },
                LockElement {
                    offset: 0,
                    length: 10,
                    flags: LockFlag::new().with_exclusive(true).with_fail_immediately(true),
                },
            ],
        }),
    )
    .await;
    assert_eq!(Status::LockNotGranted, status);
    assert!(fx.fs.locks_for_session(session_id).is_empty());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_blocking_lock_granted_when_range_frees_up() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_file("busy.bin", &[0u8; 64]);
    let file = open_path(&fx, session_id, tree_id, "busy.bin", false).await;

    fx.fs.plant_lock("busy.bin", 999, true);
    let fs = fx.fs.clone();
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(700)).await;
        fs.release_planted_lock(999);
    });

    let (status, _, _) = dispatch_ok(
        &fx,
        &header(Command::Lock, session_id, tree_id, 50),
        RequestContent::Lock(LockRequest {
            lock_sequence: LockSequence::new(),
            file_id: file,
            locks: vec![LockElement {
                offset: 0,
                length: 16,
                flags: LockFlag::new().with_exclusive(true),
            }],
        }),
    )
    .await;
    assert_eq!(Status::Success, status);
    release.await.unwrap();
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_blocking_lock_times_out_after_deadline() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_file("stuck.bin", &[0u8; 64]);
    let file = open_path(&fx, session_id, tree_id, "stuck.bin", false).await;

    fx.fs.plant_lock("stuck.bin", 999, true);
    let started = tokio::time::Instant::now();
    let status = dispatch_error(
        &fx,
        &header(Command::Lock, session_id, tree_id, 51),
        RequestContent::Lock(LockRequest {
            lock_sequence: LockSequence::new(),
            file_id: file,
            locks: vec![LockElement {
                offset: 0,
                length: 16,
                flags: LockFlag::new().with_exclusive(true),
            }],
        }),
    )
    .await;
    assert_eq!(Status::LockNotGranted, status);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(4900), "waited {waited:?}");
    assert!(waited <= Duration::from_millis(5200), "waited {waited:?}");
}

#[test_log::test(tokio::test)]
async fn test_validate_negotiate_info_match() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;

    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::Ioctl, session_id, tree_id, 60),
        RequestContent::Ioctl(IoctlRequest {
            ctl_code: FsctlCodes::ValidateNegotiateInfo as u32,
            file_id: FileId::FULL,
            max_input_response: 0,
            max_output_response: 64,
            flags: IoctlRequestFlags::new().with_is_fsctl(true),
            buffer: IoctlReqData::FsctlValidateNegotiateInfo(ValidateNegotiateInfoRequest {
                capabilities: 0x05,
                guid: "11111111-2222-3333-4444-555566667777".parse().unwrap(),
                security_mode: NegotiateSecurityMode::from_bytes(0x0001u16.to_le_bytes()),
                dialects: vec![Dialect::Smb0202, Dialect::Smb021, Dialect::Smb030],
            }),
        }),
    )
    .await;
    assert_eq!(Status::Success, status);

    let response = content.to_ioctl().unwrap();
    let parsed = binrw::BinRead::read_le(&mut std::io::Cursor::new(&response.out_buffer));
    let validated: ValidateNegotiateInfoResponse = parsed.unwrap();
    assert_eq!(NegotiateDialect::Smb030, validated.dialect);
}

#[test_log::test(tokio::test)]
async fn test_validate_negotiate_info_mismatch_drops_connection() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;

    let outcome = fx
        .handler
        .dispatch(
            &header(Command::Ioctl, session_id, tree_id, 61),
            RequestContent::Ioctl(IoctlRequest {
                ctl_code: FsctlCodes::ValidateNegotiateInfo as u32,
                file_id: FileId::FULL,
                max_input_response: 0,
                max_output_response: 64,
                flags: IoctlRequestFlags::new().with_is_fsctl(true),
                buffer: IoctlReqData::FsctlValidateNegotiateInfo(ValidateNegotiateInfoRequest {
                    // Tampered capabilities.
                    capabilities: 0x07,
                    guid: "11111111-2222-3333-4444-555566667777".parse().unwrap(),
                    security_mode: NegotiateSecurityMode::from_bytes(0x0001u16.to_le_bytes()),
                    dialects: vec![Dialect::Smb0202, Dialect::Smb021, Dialect::Smb030],
                }),
            }),
            &fx.ctx,
        )
        .await;
    assert!(matches!(outcome, DispatchOutcome::DropConnection));
}

#[test_log::test(tokio::test)]
async fn test_validate_negotiate_info_always_drops_on_311() {
    let mut config = test_config();
    config.dialects.push(Dialect::Smb0311);
    let fx = fixture_with_config(config);
    let (session_id, tree_id) = connect_with_dialects(
        &fx,
        vec![Dialect::Smb030, Dialect::Smb0311],
    )
    .await;

    let outcome = fx
        .handler
        .dispatch(
            &header(Command::Ioctl, session_id, tree_id, 62),
            RequestContent::Ioctl(IoctlRequest {
                ctl_code: FsctlCodes::ValidateNegotiateInfo as u32,
                file_id: FileId::FULL,
                max_input_response: 0,
                max_output_response: 64,
                flags: IoctlRequestFlags::new().with_is_fsctl(true),
                buffer: IoctlReqData::FsctlValidateNegotiateInfo(ValidateNegotiateInfoRequest {
                    capabilities: 0x05,
                    guid: "11111111-2222-3333-4444-555566667777".parse().unwrap(),
                    security_mode: NegotiateSecurityMode::from_bytes(0x0001u16.to_le_bytes()),
                    dialects: vec![Dialect::Smb030, Dialect::Smb0311],
                }),
            }),
            &fx.ctx,
        )
        .await;
    assert!(matches!(outcome, DispatchOutcome::DropConnection));
}

#[test_log::test(tokio::test)]
async fn test_unknown_fsctl_is_not_supported() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;

    let status = dispatch_error(
        &fx,
        &header(Command::Ioctl, session_id, tree_id, 63),
        RequestContent::Ioctl(IoctlRequest {
            ctl_code: 0x00FFFFFF,
            file_id: FileId::FULL,
            max_input_response: 0,
            max_output_response: 1024,
            flags: IoctlRequestFlags::new().with_is_fsctl(true),
            buffer: IoctlReqData::Ioctl(IoctlBuffer::default()),
        }),
    )
    .await;
    assert_eq!(Status::NotSupported, status);
}

fn lease_create_request(path: &str, key: u128, state: LeaseState) -> CreateRequest {
    let mut request = create_request(path, false);
    request.requested_oplock_level = OplockLevel::Lease;
    request.contexts = vec![CreateContextRequest {
        name: CREATE_CONTEXT_LEASE.to_vec(),
        data: CreateContextRequestData::Lease(LeaseContext::V1(LeaseContextV1 {
            lease_key: key,
            lease_state: state,
        })),
    }]
    .into();
    request
}

#[test_log::test(tokio::test)]
async fn test_lease_denied_by_cross_protocol_lock() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_file("nlm.bin", b"x");
    fx.lock_store
        .plant_nlm_lock(fx.fs.node_id("nlm.bin").unwrap(), true);

    let status = dispatch_error(
        &fx,
        &header(Command::Create, session_id, tree_id, 70),
        RequestContent::Create(lease_create_request(
            "nlm.bin",
            0xAAAA,
            LeaseState::new().with_read_caching(true).with_write_caching(true),
        )),
    )
    .await;
    assert_eq!(Status::LockNotGranted, status);
    assert_eq!(1, fx.metrics.denied.load(Ordering::SeqCst));
}

#[test_log::test(tokio::test)]
async fn test_lease_grant_and_break_on_conflicting_key() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_file("leased.bin", b"x");

    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::Create, session_id, tree_id, 71),
        RequestContent::Create(lease_create_request(
            "leased.bin",
            0xA1,
            LeaseState::new()
                .with_read_caching(true)
                .with_write_caching(true)
                .with_handle_caching(true),
        )),
    )
    .await;
    assert_eq!(Status::Success, status);
    let response = content.to_create().unwrap();
    assert_eq!(OplockLevel::Lease, response.oplock_level);
    assert_eq!(1, response.create_contexts.len());

    // A second open with a different key conflicts: no lease, break sent.
    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::Create, session_id, tree_id, 72),
        RequestContent::Create(lease_create_request(
            "leased.bin",
            0xB2,
            LeaseState::new().with_read_caching(true),
        )),
    )
    .await;
    assert_eq!(Status::Success, status);
    let response = content.to_create().unwrap();
    assert_eq!(OplockLevel::None, response.oplock_level);
    assert!(response.create_contexts.is_empty());

    // The break notification goes out through the fire-and-forget task.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let breaks = fx.notifier.breaks.lock().unwrap().clone();
    assert_eq!(1, breaks.len());
    let (break_session, key, current, target, _epoch) = breaks[0];
    assert_eq!(session_id, break_session);
    assert_eq!(0xA1, key);
    assert_eq!(
        smb_srv::lease::LEASE_READ | smb_srv::lease::LEASE_WRITE | smb_srv::lease::LEASE_HANDLE,
        current
    );
    assert_eq!(smb_srv::lease::LEASE_READ, target);

    // Acknowledge the break down to read caching.
    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::OplockBreak, session_id, tree_id, 73),
        RequestContent::LeaseBreakAck(LeaseBreakAck {
            lease_key: 0xA1,
            lease_state: LeaseState::new().with_read_caching(true),
        }),
    )
    .await;
    assert_eq!(Status::Success, status);
    assert!(matches!(content, ResponseContent::LeaseBreak(_)));
    let (state, breaking) = fx.lock_store.lease_state_of(0xA1).unwrap();
    assert_eq!(smb_srv::lease::LEASE_READ, state);
    assert!(!breaking);
}

#[test_log::test(tokio::test)]
async fn test_write_read_round_trip() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    let file = open_path(&fx, session_id, tree_id, "notes.txt", false).await;

    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::Write, session_id, tree_id, 80),
        RequestContent::Write(WriteRequest {
            offset: 0,
            file_id: file,
            flags: WriteFlags::new(),
            buffer: b"hello world".to_vec(),
        }),
    )
    .await;
    assert_eq!(Status::Success, status);
    assert_eq!(11, content.to_write().unwrap().count);

    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::Read, session_id, tree_id, 81),
        RequestContent::Read(ReadRequest {
            flags: ReadFlags::new(),
            length: 5,
            offset: 6,
            file_id: file,
            minimum_count: 0,
        }),
    )
    .await;
    assert_eq!(Status::Success, status);
    assert_eq!(b"world".to_vec(), content.to_read().unwrap().buffer);

    // Reading past the end of file reports EOF.
    let status = dispatch_error(
        &fx,
        &header(Command::Read, session_id, tree_id, 82),
        RequestContent::Read(ReadRequest {
            flags: ReadFlags::new(),
            length: 16,
            offset: 4096,
            file_id: file,
            minimum_count: 0,
        }),
    )
    .await;
    assert_eq!(Status::EndOfFile, status);
}

#[test_log::test(tokio::test)]
async fn test_delete_on_close_removes_file() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_file("doomed.txt", b"bye");
    let file = open_path(&fx, session_id, tree_id, "doomed.txt", false).await;

    let (status, _, _) = dispatch_ok(
        &fx,
        &header(Command::SetInfo, session_id, tree_id, 90),
        RequestContent::SetInfo(SetInfoRequest {
            info_type: InfoType::File,
            info_class: SetInfoClass::File(smb_fscc::SetFileInfoClass::Disposition),
            additional_information: 0,
            file_id: file,
            buffer: vec![0x01],
        }),
    )
    .await;
    assert_eq!(Status::Success, status);

    let (status, _, _) = dispatch_ok(
        &fx,
        &header(Command::Close, session_id, tree_id, 91),
        RequestContent::Close(CloseRequest {
            flags: CloseFlags::new(),
            file_id: file,
        }),
    )
    .await;
    assert_eq!(Status::Success, status);
    assert!(!fx.fs.exists("doomed.txt"));
}

#[test_log::test(tokio::test)]
async fn test_cleanup_session_is_idempotent() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_file("left-open.txt", b"data");
    let _file = open_path(&fx, session_id, tree_id, "left-open.txt", false).await;

    fx.handler.cleanup_session(session_id).await;
    // Second pass finds empty sets and returns cleanly.
    fx.handler.cleanup_session(session_id).await;

    let status = dispatch_error(
        &fx,
        &header(Command::TreeDisconnect, session_id, tree_id, 95),
        RequestContent::TreeDisconnect(TreeDisconnectRequest::default()),
    )
    .await;
    assert_eq!(Status::UserSessionDeleted, status);
}

#[test_log::test(tokio::test)]
async fn test_file_id_counters_are_unique() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;

    let mut persistent = Vec::new();
    for index in 0..16 {
        let id = open_path(
            &fx,
            session_id,
            tree_id,
            &format!("file-{index}.bin"),
            false,
        )
        .await;
        persistent.push(id.persistent);
    }
    let mut deduped = persistent.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(persistent.len(), deduped.len());
}

#[test_log::test(tokio::test)]
async fn test_get_reparse_point() {
    let fx = fixture();
    let (session_id, tree_id) = connect(&fx).await;
    fx.fs.add_symlink("link", "target.txt");
    fx.fs.add_file("plain.txt", b"not a link");
    let link = open_path(&fx, session_id, tree_id, "link", false).await;
    let plain = open_path(&fx, session_id, tree_id, "plain.txt", false).await;

    let (status, content, _) = dispatch_ok(
        &fx,
        &header(Command::Ioctl, session_id, tree_id, 100),
        RequestContent::Ioctl(IoctlRequest {
            ctl_code: FsctlCodes::GetReparsePoint as u32,
            file_id: link,
            max_input_response: 0,
            max_output_response: 4096,
            flags: IoctlRequestFlags::new().with_is_fsctl(true),
            buffer: IoctlReqData::FsctlGetReparsePoint(()),
        }),
    )
    .await;
    assert_eq!(Status::Success, status);
    let response = content.to_ioctl().unwrap();
    let parsed: SymbolicLinkReparseDataBuffer =
        binrw::BinRead::read_le(&mut std::io::Cursor::new(&response.out_buffer)).unwrap();
    assert_eq!(parsed.target, "target.txt");
    assert_eq!(1, parsed.flags);

    let status = dispatch_error(
        &fx,
        &header(Command::Ioctl, session_id, tree_id, 101),
        RequestContent::Ioctl(IoctlRequest {
            ctl_code: FsctlCodes::GetReparsePoint as u32,
            file_id: plain,
            max_input_response: 0,
            max_output_response: 4096,
            flags: IoctlRequestFlags::new().with_is_fsctl(true),
            buffer: IoctlReqData::FsctlGetReparsePoint(()),
        }),
    )
    .await;
    assert_eq!(Status::NotAReparsePoint, status);
}

#[test_log::test(tokio::test)]
async fn test_pipe_write_routes_to_pipe_manager() {
    let fx = fixture();
    dispatch_ok(
        &fx,
        &header(Command::Negotiate, 0, 0, 1),
        RequestContent::Negotiate(negotiate_request(vec![Dialect::Smb021])),
    )
    .await;
    let (_, _, session_id) = dispatch_ok(
        &fx,
        &header(Command::SessionSetup, 0, 0, 2),
        RequestContent::SessionSetup(SessionSetupRequest {
            flags: SessionSetupFlags::new(),
            security_mode: SessionSecurityMode::new(),
            capabilities: GlobalCapabilities::new(),
            previous_session_id: 0,
            buffer: Vec::new(),
        }),
    )
    .await;
    let session_id = session_id.unwrap();
    let (status, _, _) = dispatch_ok(
        &fx,
        &header(Command::TreeConnect, session_id, 0, 3),
        RequestContent::TreeConnect(TreeConnectRequest::new(r"\\srv\IPC$")),
    )
    .await;
    assert_eq!(Status::Success, status);
    let tree_id = 1;

    let pipe = open_path(&fx, session_id, tree_id, "srvsvc", false).await;
    let (status, _, _) = dispatch_ok(
        &fx,
        &header(Command::Write, session_id, tree_id, 4),
        RequestContent::Write(WriteRequest {
            offset: 0,
            file_id: pipe,
            flags: WriteFlags::new(),
            buffer: b"rpc-bind".to_vec(),
        }),
    )
    .await;
    assert_eq!(Status::Success, status);
    assert_eq!(
        vec![b"rpc-bind".to_vec()],
        fx.pipes.written.lock().unwrap().clone()
    );
}

#[test_log::test(tokio::test)]
async fn test_cancel_produces_no_response() {
    let fx = fixture();
    let outcome = fx
        .handler
        .dispatch(
            &header(Command::Cancel, 0, 0, 1),
            RequestContent::Cancel(CancelRequest::default()),
            &fx.ctx,
        )
        .await;
    assert!(matches!(outcome, DispatchOutcome::NoResponse));
}

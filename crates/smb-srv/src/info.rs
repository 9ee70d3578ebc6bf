//! QUERY_INFO and SET_INFO handlers.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};

use smb_dtyp::FileTime;
use smb_fscc::{
    FileAccessInformation, FileAccessMask, FileAllInformation, FileAllocationInformation,
    FileAlignmentInformation, FileAttributeTagInformation, FileBasicInformation,
    FileDispositionInformation, FileEaInformation, FileEndOfFileInformation,
    FileFsAttributeInformation, FileFsDeviceInformation, FileFsFullSizeInformation,
    FileFsSizeInformation, FileFsVolumeInformation, FileIdInformation, FileInternalInformation,
    FileModeInformation, FileNameInformation, FileNetworkOpenInformation, FilePositionInformation,
    FileRenameInformation2, FileStandardInformation, DeviceType, FileSystemAttributes,
    IO_REPARSE_TAG_SYMLINK, QueryFileInfoClass, QueryFileSystemInfoClass, SetFileInfoClass,
};
use smb_msg::{
    Header, InfoType, QueryInfoClass, QueryInfoRequest, QueryInfoResponse, ResponseContent,
    SetInfoClass, SetInfoRequest, SetInfoResponse,
};

use crate::dirlist::file_attributes;
use crate::handler::{Handler, OpenFile};
use crate::services::{FileInfo, FileKind, ServiceError, SetBasicInfo};
use crate::{Result, ServerError};

fn encode<T>(value: &T) -> Result<Vec<u8>>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(Vec::new());
    value
        .write_le(&mut cursor)
        .map_err(|error| ServerError::Internal(format!("info encoding: {error}")))?;
    Ok(cursor.into_inner())
}

fn decode<T>(buffer: &[u8]) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    T::read_le(&mut Cursor::new(buffer))
        .map_err(|error| ServerError::Malformed(format!("info payload: {error}")))
}

impl Handler {
    pub(crate) async fn query_info(
        &self,
        header: &Header,
        request: QueryInfoRequest,
    ) -> Result<ResponseContent> {
        self.session(header.session_id)?;
        let file = self.file(&request.file_id)?;

        let buffer = match (request.info_type, request.info_class) {
            (InfoType::File, QueryInfoClass::File(class)) => {
                self.query_file_info(&file, class).await?
            }
            (InfoType::FileSystem, QueryInfoClass::FileSystem(class)) => {
                self.query_filesystem_info(header, &file, class).await?
            }
            (InfoType::Security | InfoType::Quota, _) => {
                return Err(ServerError::UnsupportedFsctl(request.info_type as u32));
            }
            _ => return Err(ServerError::InvalidInfoClass),
        };

        if buffer.len() as u32 > request.output_buffer_length {
            return Err(ServerError::InfoTooSmall);
        }
        Ok(ResponseContent::QueryInfo(QueryInfoResponse { buffer }))
    }

    async fn query_file_info(&self, file: &OpenFile, class: QueryFileInfoClass) -> Result<Vec<u8>> {
        if file.is_pipe {
            return Err(ServerError::WrongHandleType);
        }
        let handle = file.metadata_handle()?;
        let info = self.services.metadata.get_file(handle).await?;

        match class {
            QueryFileInfoClass::Basic => encode(&basic_info(&info)),
            QueryFileInfoClass::Standard => encode(&standard_info(&info, file)),
            QueryFileInfoClass::Internal => encode(&FileInternalInformation {
                index_number: info.id,
            }),
            QueryFileInfoClass::Ea => encode(&FileEaInformation { ea_size: 0 }),
            QueryFileInfoClass::Access => encode(&FileAccessInformation {
                access_flags: FileAccessMask::from_bytes(file.desired_access.to_le_bytes()),
            }),
            QueryFileInfoClass::Position => encode(&FilePositionInformation::default()),
            QueryFileInfoClass::Mode => encode(&FileModeInformation::new()),
            QueryFileInfoClass::Alignment => encode(&FileAlignmentInformation::Byte),
            QueryFileInfoClass::All => encode(&FileAllInformation {
                basic: basic_info(&info),
                standard: standard_info(&info, file),
                internal: FileInternalInformation {
                    index_number: info.id,
                },
                ea: FileEaInformation { ea_size: 0 },
                access: FileAccessInformation {
                    access_flags: FileAccessMask::from_bytes(file.desired_access.to_le_bytes()),
                },
                position: FilePositionInformation::default(),
                mode: FileModeInformation::new(),
                alignment: FileAlignmentInformation::Byte,
                name: FileNameInformation::from(file.path.as_str()),
            }),
            QueryFileInfoClass::NetworkOpen => encode(&FileNetworkOpenInformation {
                creation_time: info.creation_time,
                last_access_time: info.last_access_time,
                last_write_time: info.last_write_time,
                change_time: info.change_time,
                allocation_size: info.allocation_size,
                end_of_file: info.size,
                file_attributes: file_attributes(&info),
            }),
            QueryFileInfoClass::AttributeTag => encode(&FileAttributeTagInformation {
                file_attributes: file_attributes(&info),
                reparse_tag: if info.kind == FileKind::Symlink {
                    IO_REPARSE_TAG_SYMLINK
                } else {
                    0
                },
            }),
            QueryFileInfoClass::Id => encode(&FileIdInformation {
                volume_serial_number: self.config.volume_serial,
                file_id: info.id as u128,
            }),
        }
    }

    async fn query_filesystem_info(
        &self,
        header: &Header,
        file: &OpenFile,
        class: QueryFileSystemInfoClass,
    ) -> Result<Vec<u8>> {
        let tree = self.tree(file.tree_id, header.session_id)?;
        let stats = self
            .services
            .metadata
            .get_filesystem_statistics(&tree.share)
            .await?;
        let block = stats.block_size.max(512) as u64;

        match class {
            QueryFileSystemInfoClass::Volume => encode(&FileFsVolumeInformation {
                volume_creation_time: FileTime::ZERO,
                volume_serial_number: self.config.volume_serial as u32,
                supports_objects: false.into(),
                volume_label: self.config.volume_label.as_str().into(),
            }),
            QueryFileSystemInfoClass::Size => encode(&FileFsSizeInformation {
                total_allocation_units: stats.total_bytes / block,
                available_allocation_units: stats.available_bytes / block,
                sectors_per_allocation_unit: 1,
                bytes_per_sector: stats.block_size.max(512),
            }),
            QueryFileSystemInfoClass::FullSize => encode(&FileFsFullSizeInformation {
                total_allocation_units: stats.total_bytes / block,
                caller_available_allocation_units: stats.available_bytes / block,
                actual_available_allocation_units: stats.free_bytes / block,
                sectors_per_allocation_unit: 1,
                bytes_per_sector: stats.block_size.max(512),
            }),
            QueryFileSystemInfoClass::Attribute => encode(&FileFsAttributeInformation {
                attributes: FileSystemAttributes::new()
                    .with_case_preserved_names(true)
                    .with_case_sensitive_search(true)
                    .with_unicode_on_disk(true)
                    .with_supports_sparse_files(true)
                    .with_supports_reparse_points(true),
                maximum_component_name_length: 255,
                file_system_name: self.config.filesystem_name.as_str().into(),
            }),
            QueryFileSystemInfoClass::Device => encode(&FileFsDeviceInformation {
                device_type: DeviceType::Disk,
                characteristics: 0,
            }),
        }
    }

    pub(crate) async fn set_info(
        &self,
        header: &Header,
        request: SetInfoRequest,
    ) -> Result<ResponseContent> {
        let session = self.session(header.session_id)?;
        let file = self.file(&request.file_id)?;
        if file.is_pipe {
            return Err(ServerError::WrongHandleType);
        }
        let tree = self.tree(file.tree_id, session.id)?;
        if !tree.permission.allows_write() {
            return Err(ServerError::AccessDenied);
        }

        let class = match (request.info_type, request.info_class) {
            (InfoType::File, SetInfoClass::File(class)) => class,
            (InfoType::File, SetInfoClass::Raw(_)) => return Err(ServerError::InvalidInfoClass),
            _ => return Err(ServerError::UnsupportedFsctl(request.info_type as u32)),
        };
        let handle = file.metadata_handle()?;

        match class {
            SetFileInfoClass::Basic => {
                let basic: FileBasicInformation = decode(&request.buffer)?;
                self.apply_basic_info(&request.file_id, handle, &basic).await?;
            }
            SetFileInfoClass::Rename => {
                let rename: FileRenameInformation2 = decode(&request.buffer)?;
                self.services
                    .metadata
                    .rename(
                        handle,
                        &rename.file_name.to_string(),
                        rename.replace_if_exists.into(),
                    )
                    .await
                    .map_err(|error| match error {
                        ServiceError::InvalidArgument => ServerError::NameCollision,
                        other => ServerError::Backend(other),
                    })?;
            }
            SetFileInfoClass::Disposition => {
                let disposition: FileDispositionInformation = decode(&request.buffer)?;
                let delete: bool = disposition.delete_pending.into();
                let mask = FileAccessMask::from_bytes(file.desired_access.to_le_bytes());
                if delete && !mask.wants_delete() {
                    return Err(ServerError::AccessDenied);
                }
                if let Some(mut entry) = self.files.get_mut(&request.file_id) {
                    entry.delete_pending = delete;
                }
            }
            SetFileInfoClass::EndOfFile => {
                let eof: FileEndOfFileInformation = decode(&request.buffer)?;
                let reservation = self
                    .services
                    .metadata
                    .prepare_write(handle, eof.end_of_file)
                    .await?;
                self.services.metadata.commit_write(reservation).await?;
            }
            SetFileInfoClass::Allocation => {
                let allocation: FileAllocationInformation = decode(&request.buffer)?;
                let reservation = self
                    .services
                    .metadata
                    .prepare_write(handle, allocation.allocation_size)
                    .await?;
                self.services.metadata.commit_write(reservation).await?;
            }
        }
        Ok(ResponseContent::SetInfo(SetInfoResponse::default()))
    }

    /// Applies a basic-info set, honouring the timestamp freeze/thaw
    /// sentinels: an explicit value sets the timestamp and freezes it for
    /// this handle, -1 freezes at the current value, -2 thaws, 0 is a
    /// no-op.
    async fn apply_basic_info(
        &self,
        file_id: &smb_msg::FileId,
        handle: crate::services::MetadataHandle,
        basic: &FileBasicInformation,
    ) -> Result<()> {
        let current = self.services.metadata.get_file(handle).await?;
        let mut update = SetBasicInfo::default();
        let mut frozen = self
            .file(file_id)
            .map(|file| file.frozen)
            .unwrap_or_default();

        let mut apply = |wire: FileTime,
                         frozen_slot: &mut Option<FileTime>,
                         update_slot: &mut Option<FileTime>,
                         current: FileTime| {
            match wire.to_100ns() {
                0 => {}
                FileBasicInformation::TIME_FREEZE => *frozen_slot = Some(current),
                FileBasicInformation::TIME_THAW => *frozen_slot = None,
                _ => {
                    *update_slot = Some(wire);
                    *frozen_slot = Some(wire);
                }
            }
        };

        apply(
            basic.last_write_time,
            &mut frozen.mtime,
            &mut update.last_write_time,
            current.last_write_time,
        );
        apply(
            basic.change_time,
            &mut frozen.ctime,
            &mut update.change_time,
            current.change_time,
        );
        apply(
            basic.last_access_time,
            &mut frozen.atime,
            &mut update.last_access_time,
            current.last_access_time,
        );
        if basic.creation_time.to_100ns() != 0 {
            update.creation_time = Some(basic.creation_time);
        }
        if u32::from_le_bytes(smb_fscc::FileAttributes::into_bytes(basic.file_attributes)) != 0 {
            update.readonly = Some(basic.file_attributes.readonly());
        }

        self.services.metadata.set_basic_info(handle, &update).await?;
        if let Some(mut entry) = self.files.get_mut(file_id) {
            entry.frozen = frozen;
        }
        Ok(())
    }
}

fn basic_info(info: &FileInfo) -> FileBasicInformation {
    FileBasicInformation {
        creation_time: info.creation_time,
        last_access_time: info.last_access_time,
        last_write_time: info.last_write_time,
        change_time: info.change_time,
        file_attributes: file_attributes(info),
    }
}

fn standard_info(info: &FileInfo, file: &OpenFile) -> FileStandardInformation {
    FileStandardInformation {
        allocation_size: info.allocation_size,
        end_of_file: info.size,
        number_of_links: info.links,
        delete_pending: file.delete_pending.into(),
        directory: file.is_directory.into(),
    }
}

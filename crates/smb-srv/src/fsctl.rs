//! IOCTL dispatch: the FSCTL switch, including the anti-downgrade
//! VALIDATE_NEGOTIATE_INFO guard.

use std::io::Cursor;

use binrw::BinWrite;

use smb_dtyp::FileTime;
use smb_msg::{
    Dialect, FileId, Header, IoctlReqData, IoctlRequest, IoctlResponse, NegotiateDialect,
    NegotiateSecurityMode, NtfsVolumeDataBuffer, ReadFileUsnDataRequest, ResponseContent, Status,
    SrvSnapshotArray, SymbolicLinkReparseDataBuffer, UsnRecordV2, UsnRecordV3,
    ValidateNegotiateInfoRequest, ValidateNegotiateInfoResponse,
};

use crate::dispatch::{DispatchOutcome, Response};
use crate::handler::{Handler, NegotiateState};
use crate::services::ServiceError;
use crate::{Result, ServerError};

fn encode<T>(value: &T) -> Result<Vec<u8>>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(Vec::new());
    value
        .write_le(&mut cursor)
        .map_err(|error| ServerError::Internal(format!("fsctl encoding: {error}")))?;
    Ok(cursor.into_inner())
}

impl Handler {
    /// Handles an IOCTL request. Most control codes produce a wrapped
    /// response; a failed VALIDATE_NEGOTIATE_INFO tears the connection
    /// down instead.
    pub(crate) async fn ioctl(
        &self,
        header: &Header,
        request: IoctlRequest,
    ) -> Result<DispatchOutcome> {
        if !request.flags.is_fsctl() {
            return Err(ServerError::UnsupportedFsctl(request.ctl_code));
        }

        let out_buffer = match &request.buffer {
            IoctlReqData::FsctlValidateNegotiateInfo(validate) => {
                match self.validate_negotiate_info(&request.file_id, validate)? {
                    ValidationVerdict::Drop => return Ok(DispatchOutcome::DropConnection),
                    ValidationVerdict::Reply(response) => encode(&response)?,
                }
            }
            IoctlReqData::FsctlPipeTransceive(input) => {
                let file = self.file(&request.file_id)?;
                if !file.is_pipe {
                    return Err(ServerError::WrongHandleType);
                }
                let name = file.pipe_name.as_deref().unwrap_or_default();
                self.services
                    .pipes
                    .transact(name, header.session_id, input, request.max_output_response)
                    .await?
            }
            IoctlReqData::FsctlGetReparsePoint(()) => {
                self.get_reparse_point(&request.file_id).await?
            }
            IoctlReqData::FsctlGetNtfsVolumeData(()) => {
                self.get_ntfs_volume_data(header).await?
            }
            IoctlReqData::FsctlReadFileUsnData(usn) => {
                self.read_file_usn_data(&request.file_id, usn).await?
            }
            IoctlReqData::FsctlSrvEnumerateSnapshots(()) => encode(&SrvSnapshotArray::default())?,
            IoctlReqData::Ioctl(_) => {
                return Err(ServerError::UnsupportedFsctl(request.ctl_code));
            }
        };

        if out_buffer.len() as u32 > request.max_output_response {
            return Err(ServerError::InfoTooSmall);
        }
        Ok(DispatchOutcome::Respond(Response::new(
            Status::Success,
            ResponseContent::Ioctl(IoctlResponse {
                ctl_code: request.ctl_code,
                file_id: request.file_id,
                out_buffer,
            }),
        )))
    }

    /// The VALIDATE_NEGOTIATE_INFO guard (MS-SMB2 3.3.5.15.12).
    ///
    /// For 3.0/3.0.2 connections any divergence from the recorded NEGOTIATE
    /// parameters drops the connection; a 3.1.1 connection is dropped
    /// outright (pre-auth integrity supersedes this FSCTL there). The 2.x
    /// fallback validates only the re-selected dialect and echoes the
    /// wildcard, failing soft with INVALID_PARAMETER.
    fn validate_negotiate_info(
        &self,
        file_id: &FileId,
        request: &ValidateNegotiateInfoRequest,
    ) -> Result<ValidationVerdict> {
        if *file_id != FileId::FULL {
            return Err(ServerError::Malformed(
                "validate-negotiate with a real file id".to_string(),
            ));
        }
        let Some(state) = self.negotiated() else {
            return Err(ServerError::Malformed("no negotiation recorded".to_string()));
        };

        if state.dialect == Dialect::Smb0311 {
            return Ok(ValidationVerdict::Drop);
        }

        // Re-select a dialect from the replayed list the same way the
        // NEGOTIATE handler does.
        let reselected = self.select_dialect(&request.dialects);

        if state.dialect.is_smb3() {
            if !self.crypto_state_matches(&state, request, reselected) {
                return Ok(ValidationVerdict::Drop);
            }
        } else {
            // Legacy 2.x path: only the dialect selection is validated.
            if reselected != Some(state.dialect) {
                return Err(ServerError::Malformed(
                    "replayed dialects select differently".to_string(),
                ));
            }
            return Ok(ValidationVerdict::Reply(self.vneg_reply(
                NegotiateDialect::Smb02Wildcard,
            )));
        }

        Ok(ValidationVerdict::Reply(self.vneg_reply(state.dialect.into())))
    }

    fn crypto_state_matches(
        &self,
        state: &NegotiateState,
        request: &ValidateNegotiateInfoRequest,
        reselected: Option<Dialect>,
    ) -> bool {
        let request_mode = u16::from_le_bytes(NegotiateSecurityMode::into_bytes(
            request.security_mode,
        ));
        reselected == Some(state.dialect)
            && request.capabilities == state.client_capabilities
            && request.guid == state.client_guid
            && request_mode == state.client_security_mode
    }

    fn vneg_reply(&self, dialect: NegotiateDialect) -> ValidateNegotiateInfoResponse {
        ValidateNegotiateInfoResponse {
            capabilities: u32::from_le_bytes(smb_msg::GlobalCapabilities::into_bytes(
                self.config.capabilities,
            )),
            guid: self.config.server_guid,
            security_mode: self.config.security_mode,
            dialect,
        }
    }

    /// Selects the highest mutually supported dialect, as NEGOTIATE does.
    pub(crate) fn select_dialect(&self, offered: &[Dialect]) -> Option<Dialect> {
        offered
            .iter()
            .filter(|dialect| self.config.dialects.contains(dialect))
            .max()
            .copied()
    }

    async fn get_reparse_point(&self, file_id: &FileId) -> Result<Vec<u8>> {
        let file = self.file(file_id)?;
        let handle = file.metadata_handle()?;
        let target = self
            .services
            .metadata
            .read_symlink(handle)
            .await
            .map_err(|error| match error {
                ServiceError::InvalidArgument => ServerError::NotAReparsePoint,
                other => ServerError::Backend(other),
            })?;
        encode(&SymbolicLinkReparseDataBuffer {
            flags: SymbolicLinkReparseDataBuffer::SYMLINK_FLAG_RELATIVE,
            target: target.as_str().into(),
        })
    }

    async fn get_ntfs_volume_data(&self, header: &Header) -> Result<Vec<u8>> {
        // Values are nominal; only the serial number is load-bearing, and
        // it must agree with FILE_ID_INFORMATION and USN records.
        let share = header
            .tree_id
            .and_then(|id| self.trees.get(&id).map(|tree| tree.share.clone()));
        let stats = match share {
            Some(share) => {
                self.services
                    .metadata
                    .get_filesystem_statistics(&share)
                    .await?
            }
            None => crate::services::FsStatistics {
                total_bytes: 0,
                free_bytes: 0,
                available_bytes: 0,
                block_size: 4096,
            },
        };
        let bytes_per_cluster = stats.block_size.max(512);
        encode(&NtfsVolumeDataBuffer {
            volume_serial_number: self.config.volume_serial,
            number_sectors: stats.total_bytes / 512,
            total_clusters: stats.total_bytes / bytes_per_cluster as u64,
            free_clusters: stats.free_bytes / bytes_per_cluster as u64,
            total_reserved: 0,
            bytes_per_sector: 512,
            bytes_per_cluster,
            bytes_per_file_record_segment: 1024,
            clusters_per_file_record_segment: 0,
            mft_valid_data_length: 0,
            mft_start_lcn: 0,
            mft2_start_lcn: 0,
            mft_zone_start: 0,
            mft_zone_end: 0,
        })
    }

    async fn read_file_usn_data(
        &self,
        file_id: &FileId,
        request: &ReadFileUsnDataRequest,
    ) -> Result<Vec<u8>> {
        let file = self.file(file_id)?;
        let handle = file.metadata_handle()?;
        let info = self.services.metadata.get_file(handle).await?;
        let name = file
            .path
            .rsplit('\\')
            .next()
            .unwrap_or(file.path.as_str())
            .to_string();
        let attributes = u32::from_le_bytes(smb_fscc::FileAttributes::into_bytes(
            crate::dirlist::file_attributes(&info),
        ));

        let (_, max_major) = request.version_range();
        if max_major >= 3 {
            // V3 carries the 128-bit reference matching FILE_ID_INFORMATION.
            encode(&UsnRecordV3 {
                file_reference_number: info.id as u128,
                parent_file_reference_number: 0,
                usn: 0,
                time_stamp: FileTime::now(),
                reason: 0,
                source_info: 0,
                security_id: 0,
                file_attributes: attributes,
                file_name: name.as_str().into(),
            })
        } else {
            encode(&UsnRecordV2 {
                file_reference_number: info.id,
                parent_file_reference_number: 0,
                usn: 0,
                time_stamp: FileTime::now(),
                reason: 0,
                source_info: 0,
                security_id: 0,
                file_attributes: attributes,
                file_name: name.as_str().into(),
            })
        }
    }
}

enum ValidationVerdict {
    Drop,
    Reply(ValidateNegotiateInfoResponse),
}

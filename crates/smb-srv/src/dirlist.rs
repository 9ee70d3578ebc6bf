//! Directory enumeration: DOS wildcard matching, 8.3 short names, entry
//! encoding with boundary truncation, and the QUERY_DIRECTORY handler.

use std::io::Cursor;

use binrw::BinWrite;

use smb_fscc::{
    FileAttributes, FileBothDirectoryInformation, FileDirectoryInformation,
    FileFullDirectoryInformation, FileIdBothDirectoryInformation, FileIdFullDirectoryInformation,
    FileName83, FileNamesInformation, IO_REPARSE_TAG_SYMLINK, QueryDirectoryInfoClass,
};
use smb_msg::{Header, QueryDirectoryRequest, QueryDirectoryResponse, ResponseContent};

use crate::handler::Handler;
use crate::services::{DirEntry, FileInfo, FileKind};
use crate::{Result, ServerError};

/// Size of one backend directory page.
const DIR_PAGE_BYTES: u32 = 1024 * 1024;

/// Case-insensitive DOS wildcard match per MS-FSCC 2.1.4.4:
/// `*` and `?` as usual, `<` (DOS_STAR) consumes up to and including the
/// last dot, `>` (DOS_QM) matches one character but collapses at dots and
/// at the end of the name, `"` (DOS_DOT) matches a dot or the end.
pub fn match_pattern(name: &str, pattern: &str) -> bool {
    let name: Vec<char> = name.chars().flat_map(char::to_uppercase).collect();
    let pattern: Vec<char> = pattern.chars().flat_map(char::to_uppercase).collect();
    match_inner(&name, &pattern)
}

fn match_inner(name: &[char], pattern: &[char]) -> bool {
    let Some(&p) = pattern.first() else {
        return name.is_empty();
    };
    let rest = &pattern[1..];
    match p {
        '*' => match_inner(name, rest) || (!name.is_empty() && match_inner(&name[1..], pattern)),
        '<' => {
            let mut i = 0;
            loop {
                if match_inner(&name[i..], rest) {
                    return true;
                }
                if i >= name.len() {
                    return false;
                }
                if name[i] == '.' && !name[i + 1..].contains(&'.') {
                    // The final dot: DOS_STAR consumes it and stops.
                    return match_inner(&name[i + 1..], rest);
                }
                i += 1;
            }
        }
        '>' => {
            if name.is_empty() || name[0] == '.' {
                match_inner(name, rest)
            } else {
                match_inner(&name[1..], rest)
            }
        }
        '"' => {
            if name.is_empty() {
                match_inner(name, rest)
            } else if name[0] == '.' {
                match_inner(&name[1..], rest)
            } else {
                false
            }
        }
        '?' => !name.is_empty() && match_inner(&name[1..], rest),
        literal => !name.is_empty() && name[0] == literal && match_inner(&name[1..], rest),
    }
}

/// Patterns that match every entry; only these (on a fresh enumeration)
/// make `.` and `..` appear.
pub fn pattern_matches_all(pattern: &str) -> bool {
    matches!(pattern, "" | "*" | "*.*" | "<")
}

/// Generates the 8.3 short name for a long name: uppercase, restricted to
/// alphanumerics plus `_`, `-` and `~`, base truncated to six characters
/// plus `~1` when too long, extension truncated to three. `.` and `..`
/// have no short name.
pub fn generate_short_name(name: &str) -> String {
    if name == "." || name == ".." {
        return String::new();
    }

    let (base, extension) = match name.rsplit_once('.') {
        Some((base, extension)) if !base.is_empty() => (base, extension),
        _ => (name, ""),
    };

    let clean = |part: &str| -> String {
        part.chars()
            .flat_map(char::to_uppercase)
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '~'))
            .collect()
    };

    let mut short_base = clean(base);
    if short_base.len() > 8 {
        short_base.truncate(6);
        short_base.push_str("~1");
    }
    let mut short_ext = clean(extension);
    short_ext.truncate(3);

    if short_ext.is_empty() {
        short_base
    } else {
        format!("{short_base}.{short_ext}")
    }
}

/// A directory entry resolved and ready to encode.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedEntry {
    pub name: String,
    pub info: FileInfo,
    /// Overrides the backend node ID; `.` carries the directory's own ID
    /// and `..` carries zero.
    pub id_override: Option<u64>,
}

impl ResolvedEntry {
    fn node_id(&self) -> u64 {
        self.id_override.unwrap_or(self.info.id)
    }

    fn attributes(&self) -> FileAttributes {
        file_attributes(&self.info)
    }

    /// EA size field; doubles as the reparse tag for reparse points.
    fn ea_or_tag(&self) -> u32 {
        if self.info.kind == FileKind::Symlink {
            IO_REPARSE_TAG_SYMLINK
        } else {
            0
        }
    }
}

/// Wire attributes of a node.
pub(crate) fn file_attributes(info: &FileInfo) -> FileAttributes {
    let mut attributes = FileAttributes::new();
    match info.kind {
        FileKind::Directory => attributes.set_directory(true),
        FileKind::Symlink => {
            attributes.set_reparse_point(true);
            attributes.set_archive(true);
        }
        _ => attributes.set_archive(true),
    }
    if info.readonly {
        attributes.set_readonly(true);
    }
    attributes
}

/// Encodes one entry in the requested class, including the 4-byte
/// next-entry prefix (left zero; the chain assembler patches it).
fn encode_one(class: QueryDirectoryInfoClass, entry: &ResolvedEntry) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(vec![0u8; 4]);
    cursor.set_position(4);

    let info = &entry.info;
    let write_result = match class {
        QueryDirectoryInfoClass::Directory => FileDirectoryInformation {
            file_index: 0,
            creation_time: info.creation_time,
            last_access_time: info.last_access_time,
            last_write_time: info.last_write_time,
            change_time: info.change_time,
            end_of_file: info.size,
            allocation_size: info.allocation_size,
            file_attributes: entry.attributes(),
            file_name: entry.name.as_str().into(),
        }
        .write_le(&mut cursor),
        QueryDirectoryInfoClass::FullDirectory => FileFullDirectoryInformation {
            file_index: 0,
            creation_time: info.creation_time,
            last_access_time: info.last_access_time,
            last_write_time: info.last_write_time,
            change_time: info.change_time,
            end_of_file: info.size,
            allocation_size: info.allocation_size,
            file_attributes: entry.attributes(),
            ea_size: entry.ea_or_tag(),
            file_name: entry.name.as_str().into(),
        }
        .write_le(&mut cursor),
        QueryDirectoryInfoClass::IdFullDirectory => FileIdFullDirectoryInformation {
            file_index: 0,
            creation_time: info.creation_time,
            last_access_time: info.last_access_time,
            last_write_time: info.last_write_time,
            change_time: info.change_time,
            end_of_file: info.size,
            allocation_size: info.allocation_size,
            file_attributes: entry.attributes(),
            ea_size: entry.ea_or_tag(),
            file_id: entry.node_id(),
            file_name: entry.name.as_str().into(),
        }
        .write_le(&mut cursor),
        QueryDirectoryInfoClass::BothDirectory => FileBothDirectoryInformation {
            file_index: 0,
            creation_time: info.creation_time,
            last_access_time: info.last_access_time,
            last_write_time: info.last_write_time,
            change_time: info.change_time,
            end_of_file: info.size,
            allocation_size: info.allocation_size,
            file_attributes: entry.attributes(),
            ea_size: entry.ea_or_tag(),
            short_name: FileName83::from(generate_short_name(&entry.name).as_str()),
            file_name: entry.name.as_str().into(),
        }
        .write_le(&mut cursor),
        QueryDirectoryInfoClass::IdBothDirectory => FileIdBothDirectoryInformation {
            file_index: 0,
            creation_time: info.creation_time,
            last_access_time: info.last_access_time,
            last_write_time: info.last_write_time,
            change_time: info.change_time,
            end_of_file: info.size,
            allocation_size: info.allocation_size,
            file_attributes: entry.attributes(),
            ea_size: entry.ea_or_tag(),
            short_name: FileName83::from(generate_short_name(&entry.name).as_str()),
            file_id: entry.node_id(),
            file_name: entry.name.as_str().into(),
        }
        .write_le(&mut cursor),
        QueryDirectoryInfoClass::Names => FileNamesInformation {
            file_index: 0,
            file_name: entry.name.as_str().into(),
        }
        .write_le(&mut cursor),
    };
    write_result.map_err(|error| ServerError::Internal(format!("entry encoding: {error}")))?;
    Ok(cursor.into_inner())
}

/// Assembles encoded entries into a NextEntryOffset chain, truncating at
/// the last complete entry that fits `max_bytes`. Returns the chain and
/// the number of entries it consumed, so the caller can resume after the
/// truncation point; `None` when not even the first entry fits.
pub(crate) fn encode_entries(
    class: QueryDirectoryInfoClass,
    entries: &[ResolvedEntry],
    max_bytes: u32,
) -> Result<Option<(Vec<u8>, usize)>> {
    let max_bytes = max_bytes as usize;
    let mut out: Vec<u8> = Vec::new();
    let mut previous_start: usize = 0;
    let mut written = 0usize;

    for entry in entries {
        let record = encode_one(class, entry)?;
        let start = if written == 0 {
            0
        } else {
            out.len().div_ceil(8) * 8
        };
        if start + record.len() > max_bytes {
            break;
        }
        if written > 0 {
            out.resize(start, 0);
            let link = ((start - previous_start) as u32).to_le_bytes();
            out[previous_start..previous_start + 4].copy_from_slice(&link);
        }
        previous_start = start;
        out.extend_from_slice(&record);
        written += 1;
    }

    if written == 0 {
        return Ok(None);
    }
    // The final record keeps its zero next-entry offset.
    Ok(Some((out, written)))
}

impl Handler {
    /// Handles QUERY_DIRECTORY: cursor maintenance, pattern filtering,
    /// special-entry injection, and buffer-bounded encoding.
    pub(crate) async fn query_directory(
        &self,
        header: &Header,
        request: QueryDirectoryRequest,
    ) -> Result<ResponseContent> {
        let file = self.file(&request.file_id)?;
        if !file.is_directory {
            return Err(ServerError::WrongHandleType);
        }
        self.session(header.session_id)?;
        let handle = file.metadata_handle()?;

        let mut state = file.enumeration.clone();
        let flags = request.flags;
        let new_pattern = request.file_name.to_string();

        if flags.reopen() {
            state.reset();
            state.pattern.clear();
        }
        // A changed pattern restarts the enumeration.
        if !state.pattern.is_empty()
            && !new_pattern.is_empty()
            && state.pattern != new_pattern
        {
            state.reset();
        }
        if flags.restart_scans() {
            state.reset();
        }
        if state.complete {
            self.store_enum_state(&request.file_id, state);
            return Err(ServerError::NoMoreFiles);
        }

        if !new_pattern.is_empty() {
            state.pattern = new_pattern;
        }
        let pattern = state.pattern.clone();

        loop {
            // One backend page per iteration, resumed from the cursor the
            // previous call (or iteration) left behind.
            let page_cursor = state.cursor;
            let (entries, next_cursor) = self
                .services
                .metadata
                .read_directory(handle, page_cursor, DIR_PAGE_BYTES)
                .await?;

            let filtered: Vec<&DirEntry> = entries
                .iter()
                .filter(|entry| !entry.info.kind.is_special())
                .filter(|entry| pattern.is_empty() || match_pattern(&entry.name, &pattern))
                .collect();

            // `.` and `..` lead the first page of a match-all scan;
            // continuation calls resuming inside that page must see the
            // same sequence, so this keys off the page, not the index.
            let include_special = page_cursor.is_none() && pattern_matches_all(&pattern);
            let mut combined: Vec<ResolvedEntry> = Vec::with_capacity(filtered.len() + 2);
            if include_special {
                let self_info = self.services.metadata.get_file(handle).await?;
                combined.push(ResolvedEntry {
                    name: ".".to_string(),
                    info: self_info,
                    id_override: Some(self_info.id),
                });
                combined.push(ResolvedEntry {
                    name: "..".to_string(),
                    info: self_info,
                    id_override: Some(0),
                });
            }
            combined.extend(filtered.into_iter().map(|entry| ResolvedEntry {
                name: entry.name.clone(),
                info: entry.info,
                id_override: None,
            }));

            if state.index >= combined.len() {
                // This page is spent (or fully filtered out); move on to
                // the next one, or finish.
                if let Some(next) = next_cursor {
                    if !entries.is_empty() {
                        state.cursor = Some(next);
                        state.index = 0;
                        continue;
                    }
                }
                state.complete = true;
                self.store_enum_state(&request.file_id, state);
                return Err(ServerError::NoMoreFiles);
            }

            let to_encode: &[ResolvedEntry] = if flags.return_single_entry() {
                &combined[state.index..state.index + 1]
            } else {
                &combined[state.index..]
            };

            let Some((output_buffer, consumed)) = encode_entries(
                request.file_information_class,
                to_encode,
                request.output_buffer_length,
            )?
            else {
                self.store_enum_state(&request.file_id, state);
                return Err(ServerError::NoMoreFiles);
            };

            // Advance only past what was actually encoded; anything the
            // buffer limit cut off stays retrievable by the next call.
            state.index += consumed;
            if state.index >= combined.len() {
                match next_cursor {
                    Some(next) if !entries.is_empty() => {
                        state.cursor = Some(next);
                        state.index = 0;
                    }
                    _ => state.complete = true,
                }
            }
            self.store_enum_state(&request.file_id, state);
            return Ok(ResponseContent::QueryDirectory(QueryDirectoryResponse {
                output_buffer,
            }));
        }
    }

    fn store_enum_state(&self, file_id: &smb_msg::FileId, state: crate::handler::DirEnumState) {
        if let Some(mut file) = self.files.get_mut(file_id) {
            file.enumeration = state;
        }
    }
}

/// Decoder for packed `FILE_DIRECTORY_INFORMATION` records.
///
/// `NtQueryDirectoryFile` fills the caller's buffer with variable-length
/// records chained by `NextEntryOffset` (0 on the last record of a batch).
/// Decoding is plain byte arithmetic so it is shared by the Windows listing
/// source and exercised by tests on every platform.
///
/// Record layout (all little-endian):
///
/// ```text
///   0: NextEntryOffset (u32)
///   4: FileIndex       (u32)
///   8: CreationTime    (i64)
///  16: LastAccessTime  (i64)
///  24: LastWriteTime   (i64)
///  32: ChangeTime      (i64)
///  40: EndOfFile       (i64)
///  48: AllocationSize  (i64)
///  56: FileAttributes  (u32)
///  60: FileNameLength  (u32, bytes)
///  64: FileName        (UTF-16, not NUL-terminated)
/// ```
use super::listing::{DirEntry, RawRecord};
use compact_str::CompactString;
use std::ffi::OsString;

pub const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
pub const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
pub const FILE_ATTRIBUTE_OFFLINE: u32 = 0x1000;

/// Offset of the first name character; also the smallest valid record.
pub const FILE_NAME_OFFSET: usize = 64;

/// Longest possible record: a 255-character name, padded to 8 bytes. A
/// listing buffer smaller than this cannot hold every entry.
pub const MAX_RECORD_SIZE: usize = (FILE_NAME_OFFSET + 255 * 2).next_multiple_of(8);

/// Decode the record starting at `offset`.
///
/// Returns the record and its `NextEntryOffset`, or `None` if the record
/// does not fit inside `batch`.
pub fn decode_record(batch: &[u8], offset: usize) -> Option<(RawRecord, u32)> {
    let rec = batch.get(offset..)?;
    if rec.len() < FILE_NAME_OFFSET {
        return None;
    }

    let next = read_u32(rec, 0);
    let last_write = read_i64(rec, 24);
    let end_of_file = read_i64(rec, 40);
    let allocation = read_i64(rec, 48);
    let attributes = read_u32(rec, 56);
    let name_len = read_u32(rec, 60) as usize;

    let name_bytes = rec.get(FILE_NAME_OFFSET..FILE_NAME_OFFSET.checked_add(name_len)?)?;
    let units: Vec<u16> = name_bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let name: CompactString = char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or('\u{FFFD}'))
        .collect();

    let record = RawRecord {
        entry: DirEntry {
            os_name: os_name_from_wide(&units, &name),
            name,
            logical_size: end_of_file,
            allocated_size: allocation,
            is_directory: attributes & FILE_ATTRIBUTE_DIRECTORY != 0,
            last_modified_raw: last_write,
        },
        reparse_point: attributes & FILE_ATTRIBUTE_REPARSE_POINT != 0,
        offline: attributes & FILE_ATTRIBUTE_OFFLINE != 0,
    };
    Some((record, next))
}

/// NTFS names may hold unpaired surrogates; only the wide form keeps them.
#[cfg(windows)]
fn os_name_from_wide(units: &[u16], _display: &str) -> OsString {
    use std::os::windows::ffi::OsStringExt;
    OsString::from_wide(units)
}

#[cfg(not(windows))]
fn os_name_from_wide(_units: &[u16], display: &str) -> OsString {
    OsString::from(display)
}

#[inline]
fn read_u32(rec: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([rec[at], rec[at + 1], rec[at + 2], rec[at + 3]])
}

#[inline]
fn read_i64(rec: &[u8], at: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&rec[at..at + 8]);
    i64::from_le_bytes(raw)
}

/// Encode records the way the kernel packs them. Test-only.
#[cfg(test)]
pub(crate) fn encode_batch(records: &[(&str, i64, i64, u32, i64)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, (name, eof, alloc, attrs, mtime)) in records.iter().enumerate() {
        let name_utf16: Vec<u8> = name.encode_utf16().flat_map(u16::to_le_bytes).collect();
        // Records are 8-byte aligned inside a batch.
        let len = (FILE_NAME_OFFSET + name_utf16.len()).next_multiple_of(8);
        let next = if i + 1 == records.len() { 0 } else { len as u32 };

        let mut rec = vec![0u8; len];
        rec[0..4].copy_from_slice(&next.to_le_bytes());
        rec[24..32].copy_from_slice(&mtime.to_le_bytes());
        rec[40..48].copy_from_slice(&eof.to_le_bytes());
        rec[48..56].copy_from_slice(&alloc.to_le_bytes());
        rec[56..60].copy_from_slice(&attrs.to_le_bytes());
        rec[60..64].copy_from_slice(&(name_utf16.len() as u32).to_le_bytes());
        rec[FILE_NAME_OFFSET..FILE_NAME_OFFSET + name_utf16.len()].copy_from_slice(&name_utf16);
        out.extend_from_slice(&rec);
    }
    out
}

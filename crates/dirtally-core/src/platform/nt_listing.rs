/// Batched directory listing via `NtQueryDirectoryFile`.
///
/// `FindFirstFile` / `FindNextFile` cost one user/kernel round-trip per
/// entry. `NtQueryDirectoryFile` instead fills a caller-supplied buffer with
/// as many `FILE_DIRECTORY_INFORMATION` records as fit, so a directory of
/// 50 000 entries is read in a few calls.
///
/// # Algorithm
///
/// 1. `CreateFileW` with `FILE_LIST_DIRECTORY` and
///    `FILE_FLAG_BACKUP_SEMANTICS` (required to get a directory handle).
/// 2. `NtQueryDirectoryFile(FileDirectoryInformation)` into the reusable
///    buffer until `STATUS_NO_MORE_FILES`.
/// 3. Walk each batch with [`nt_records::decode_record`].
use super::listing::{ListingSource, RawRecord, LISTING_BUFFER_SIZE};
use super::nt_records;
use crate::error::ScanError;
use std::ffi::c_void;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_FLAG_BACKUP_SEMANTICS, FILE_LIST_DIRECTORY, FILE_SHARE_DELETE,
    FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};

const FILE_DIRECTORY_INFORMATION_CLASS: u32 = 1;
const STATUS_SUCCESS: i32 = 0;
const STATUS_NO_MORE_FILES: i32 = 0x8000_0006_u32 as i32;

#[repr(C)]
struct IoStatusBlock {
    /// `Status` / `Pointer` union.
    status: usize,
    information: usize,
}

#[link(name = "ntdll")]
extern "system" {
    fn NtQueryDirectoryFile(
        file_handle: HANDLE,
        event: HANDLE,
        apc_routine: *const c_void,
        apc_context: *const c_void,
        io_status_block: *mut IoStatusBlock,
        file_information: *mut c_void,
        length: u32,
        file_information_class: u32,
        return_single_entry: u8,
        file_name: *const c_void,
        restart_scan: u8,
    ) -> i32;
}

/// Listing source backed by the native batched query.
///
/// Owns the scratch buffer; one instance must not serve two scans at once,
/// which `&mut self` on [`open`](ListingSource::open) already guarantees.
pub struct NtListing {
    // u64 elements keep the buffer 8-byte aligned as the kernel requires.
    buffer: Box<[u64]>,
}

impl NtListing {
    pub fn new() -> Self {
        Self::with_buffer_size(LISTING_BUFFER_SIZE)
    }

    /// Use a buffer of at least `bytes` bytes, rounded up to 8 and never
    /// smaller than one maximum-length record.
    pub fn with_buffer_size(bytes: usize) -> Self {
        let words = bytes.max(nt_records::MAX_RECORD_SIZE).div_ceil(8);
        Self {
            buffer: vec![0u64; words].into_boxed_slice(),
        }
    }
}

impl Default for NtListing {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingSource for NtListing {
    type Records<'a>
        = NtRecords<'a>
    where
        Self: 'a;

    fn open<'a>(&'a mut self, dir: &Path) -> Result<NtRecords<'a>, ScanError> {
        let wide: Vec<u16> = dir
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                FILE_LIST_DIRECTORY.0,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                None,
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS,
                None,
            )
        }
        .map_err(|e| ScanError::access_denied(dir, io::Error::other(e)))?;

        Ok(NtRecords {
            handle: DirHandle(handle),
            dir: dir.to_path_buf(),
            buffer: &mut self.buffer,
            batch_len: 0,
            offset: None,
            done: false,
        })
    }
}

/// Closes the directory handle on drop.
struct DirHandle(HANDLE);

impl Drop for DirHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// Lazily refilling record stream over one open directory.
pub struct NtRecords<'a> {
    handle: DirHandle,
    dir: PathBuf,
    buffer: &'a mut [u64],
    /// Bytes the last query wrote into `buffer`.
    batch_len: usize,
    /// Offset of the next undecoded record in the current batch.
    offset: Option<usize>,
    done: bool,
}

impl NtRecords<'_> {
    /// Issue one batched query. Returns `Ok(false)` when the directory is exhausted.
    fn refill(&mut self) -> Result<bool, ScanError> {
        let mut iosb = IoStatusBlock {
            status: 0,
            information: 0,
        };
        let capacity = std::mem::size_of_val(&*self.buffer);
        let status = unsafe {
            NtQueryDirectoryFile(
                self.handle.0,
                HANDLE::default(),
                std::ptr::null(),
                std::ptr::null(),
                &mut iosb,
                self.buffer.as_mut_ptr().cast(),
                capacity as u32,
                FILE_DIRECTORY_INFORMATION_CLASS,
                0,
                std::ptr::null(),
                0,
            )
        };

        match status {
            STATUS_SUCCESS if iosb.information > 0 => {
                self.batch_len = iosb.information.min(capacity);
                self.offset = Some(0);
                Ok(true)
            }
            STATUS_SUCCESS | STATUS_NO_MORE_FILES => Ok(false),
            other => Err(ScanError::access_denied(
                self.dir.clone(),
                io::Error::other(format!("NtQueryDirectoryFile NTSTATUS {:#010x}", other as u32)),
            )),
        }
    }
}

impl Iterator for NtRecords<'_> {
    type Item = Result<RawRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(offset) = self.offset {
                let batch = &as_bytes(self.buffer)[..self.batch_len];
                match nt_records::decode_record(batch, offset) {
                    Some((record, next)) => {
                        self.offset = (next != 0).then(|| offset + next as usize);
                        return Some(Ok(record));
                    }
                    None => {
                        self.done = true;
                        return Some(Err(ScanError::access_denied(
                            self.dir.clone(),
                            io::Error::new(
                                io::ErrorKind::InvalidData,
                                format!("malformed directory record at offset {offset}"),
                            ),
                        )));
                    }
                }
            }

            match self.refill() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

fn as_bytes(words: &[u64]) -> &[u8] {
    // SAFETY: u8 has no alignment or validity requirements and the length
    // covers exactly the memory owned by `words`.
    unsafe { std::slice::from_raw_parts(words.as_ptr().cast(), std::mem::size_of_val(words)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_buffer_never_smaller_than_one_record() {
        let listing = NtListing::with_buffer_size(0);
        assert!(std::mem::size_of_val(&*listing.buffer) >= nt_records::MAX_RECORD_SIZE);
    }

    #[test]
    fn test_small_buffer_refills_until_exhausted() {
        let tmp = TempDir::new().unwrap();
        for i in 0..40 {
            std::fs::write(tmp.path().join(format!("file-{i:02}.dat")), [0u8; 3]).unwrap();
        }
        let long_name = "n".repeat(255);
        std::fs::create_dir(tmp.path().join(&long_name)).unwrap();

        // Room for a handful of records per query, so the listing needs many.
        let mut listing = NtListing::with_buffer_size(1024);
        let records: Vec<RawRecord> = listing
            .open(tmp.path())
            .unwrap()
            .map(Result::unwrap)
            .collect();

        let files = records
            .iter()
            .filter(|r| r.entry.name.starts_with("file-"))
            .inspect(|r| assert_eq!(r.entry.logical_size, 3))
            .count();
        assert_eq!(files, 40);
        assert!(records
            .iter()
            .any(|r| r.entry.is_directory && r.entry.name == long_name.as_str()));
    }
}

/// Volume capacity and free space.
///
/// Windows uses `GetDiskFreeSpaceExW`; Unix uses `statvfs`. The free value
/// is the volume's total free space, not the caller's quota-limited share,
/// so `total - free` is the space actually occupied on the media.
use crate::model::VolumeSpace;
use std::io;
use std::path::{Path, PathBuf};

/// Source of capacity / free-space figures for a volume root.
pub trait VolumeInfo {
    fn space(&self, root: &Path) -> io::Result<VolumeSpace>;
}

/// Reads volume figures from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemVolumes;

impl VolumeInfo for SystemVolumes {
    #[cfg(windows)]
    fn space(&self, root: &Path) -> io::Result<VolumeSpace> {
        use std::os::windows::ffi::OsStrExt;
        use windows::core::PCWSTR;
        use windows::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

        let wide: Vec<u16> = root
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let mut free_caller: u64 = 0;
        let mut total: u64 = 0;
        let mut free_total: u64 = 0;
        unsafe {
            GetDiskFreeSpaceExW(
                PCWSTR(wide.as_ptr()),
                Some(&mut free_caller as *mut u64),
                Some(&mut total as *mut u64),
                Some(&mut free_total as *mut u64),
            )
        }
        .map_err(io::Error::other)?;

        Ok(VolumeSpace::new(clamp(total as u128), clamp(free_total as u128)))
    }

    #[cfg(unix)]
    fn space(&self, root: &Path) -> io::Result<VolumeSpace> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(root.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        let frsize = stats.f_frsize as u128;
        Ok(VolumeSpace::new(
            clamp((stats.f_blocks as u128).saturating_mul(frsize)),
            clamp((stats.f_bfree as u128).saturating_mul(frsize)),
        ))
    }

    #[cfg(not(any(windows, unix)))]
    fn space(&self, _root: &Path) -> io::Result<VolumeSpace> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "volume space queries are not supported on this platform",
        ))
    }
}

fn clamp(bytes: u128) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

/// Turn a drive identifier into the path of the volume root.
///
/// `"C:"` and `"c"` become `C:\`; anything else is used as a path as-is.
pub fn volume_root(drive_id: &str) -> PathBuf {
    let trimmed = drive_id.trim_end_matches(|c: char| c == '\\' || c == '/');
    let bytes = trimmed.as_bytes();
    let is_letter = match bytes {
        [l] | [l, b':'] => l.is_ascii_alphabetic(),
        _ => false,
    };
    if is_letter {
        PathBuf::from(format!("{}:\\", bytes[0].to_ascii_uppercase() as char))
    } else if trimmed.is_empty() {
        PathBuf::from(drive_id)
    } else {
        PathBuf::from(trimmed)
    }
}

/// Display name for a volume root node: `"C:"` for drive letters.
pub fn volume_label(drive_id: &str) -> String {
    let root = volume_root(drive_id);
    let s = root.to_string_lossy();
    match s.strip_suffix('\\') {
        Some(letter) if letter.len() == 2 && letter.ends_with(':') => letter.to_string(),
        _ => s.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_root_drive_letters() {
        assert_eq!(volume_root("C:"), PathBuf::from("C:\\"));
        assert_eq!(volume_root("d"), PathBuf::from("D:\\"));
        assert_eq!(volume_root("e:\\"), PathBuf::from("E:\\"));
        assert_eq!(volume_label("c:"), "C:");
    }

    #[test]
    fn test_volume_root_paths() {
        assert_eq!(volume_root("/"), PathBuf::from("/"));
        assert_eq!(volume_root("/mnt/data/"), PathBuf::from("/mnt/data"));
        assert_eq!(volume_label("/mnt/data"), "/mnt/data");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_volume_space_is_sane() {
        let space = SystemVolumes.space(Path::new("/")).unwrap();
        assert!(space.total > 0);
        assert!(space.free <= space.total);
    }
}

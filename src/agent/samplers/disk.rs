//! Disk usage sampler (`spec.md` §4.1 "Disk usage").
//!
//! Root is always sampled; `EXTRA_FILESYSTEMS` (or a `FILESYSTEM` override
//! for root) add more. Reported names are device basenames, not mount paths.
//! Uses `libc::statvfs` directly, the way the donor crate already depends on
//! `libc` "for disk space checks".

use std::ffi::CString;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DiskSamplerError {
    #[error("failed to read /proc/mounts: {0}")]
    Mounts(#[from] std::io::Error),
    #[error("statvfs failed for {0}")]
    Statvfs(String),
    #[error("no mount point found for device/mount {0:?}")]
    NotMounted(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UsageReading {
    pub total: u64,
    pub used: u64,
    pub used_pct: f64,
    pub inodes_total: u64,
    pub inodes_used: u64,
}

/// One parsed `/proc/mounts` entry.
#[derive(Debug, Clone)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

const PSEUDO_FS: &[&str] = &[
    "proc", "sysfs", "devtmpfs", "devpts", "tmpfs", "cgroup", "cgroup2", "overlay", "squashfs",
    "mqueue", "debugfs", "tracefs", "securityfs", "pstore", "bpf", "autofs", "binfmt_misc",
];

pub fn read_mounts() -> Result<Vec<MountEntry>, DiskSamplerError> {
    let contents = std::fs::read_to_string("/proc/mounts")?;
    Ok(parse_mounts(&contents))
}

fn parse_mounts(contents: &str) -> Vec<MountEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device = parts.next()?.to_string();
            let mount_point = parts.next()?.to_string();
            let fs_type = parts.next()?.to_string();
            if PSEUDO_FS.contains(&fs_type.as_str()) {
                return None;
            }
            Some(MountEntry { device, mount_point, fs_type })
        })
        .collect()
}

/// Device basename (e.g. `/dev/sda1` -> `sda1`).
pub fn device_basename(device: &str) -> String {
    Path::new(device)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| device.to_string())
}

/// Resolve the root filesystem's mount entry, honoring a `FILESYSTEM`
/// device-basename override.
pub fn resolve_root<'a>(
    mounts: &'a [MountEntry],
    filesystem_override: Option<&str>,
) -> Option<&'a MountEntry> {
    if let Some(device) = filesystem_override {
        return mounts.iter().find(|m| device_basename(&m.device) == device);
    }
    mounts.iter().find(|m| m.mount_point == "/")
}

/// Resolve `EXTRA_FILESYSTEMS` entries (comma-list of device basenames or
/// mount-point directories) against the parsed mount table.
pub fn resolve_extra<'a>(mounts: &'a [MountEntry], extra: &[String]) -> Vec<&'a MountEntry> {
    extra
        .iter()
        .filter_map(|want| {
            mounts
                .iter()
                .find(|m| device_basename(&m.device) == *want || m.mount_point == *want)
        })
        .collect()
}

/// Usage stats (and inode counts) for one mount point, via `statvfs(2)`.
pub fn usage_for_mount(mount_point: &str) -> Result<UsageReading, DiskSamplerError> {
    let c_path = CString::new(mount_point)
        .map_err(|_| DiskSamplerError::Statvfs(mount_point.to_string()))?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(DiskSamplerError::Statvfs(mount_point.to_string()));
    }

    let block_size = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * block_size;
    let free = stat.f_bfree as u64 * block_size;
    let used = total.saturating_sub(free);
    let used_pct = if total == 0 {
        0.0
    } else {
        (used as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
    };

    let inodes_total = stat.f_files as u64;
    let inodes_free = stat.f_ffree as u64;
    let inodes_used = inodes_total.saturating_sub(inodes_free);

    Ok(UsageReading {
        total,
        used,
        used_pct,
        inodes_total,
        inodes_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTS: &str = "\
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw,relatime 0 0
/dev/sdb1 /data ext4 rw,relatime 0 0
tmpfs /tmp tmpfs rw 0 0
";

    #[test]
    fn pseudo_filesystems_excluded() {
        let mounts = parse_mounts(MOUNTS);
        assert!(mounts.iter().all(|m| m.fs_type != "proc" && m.fs_type != "tmpfs"));
        assert_eq!(mounts.len(), 2);
    }

    #[test]
    fn root_resolved_by_mount_point() {
        let mounts = parse_mounts(MOUNTS);
        let root = resolve_root(&mounts, None).unwrap();
        assert_eq!(device_basename(&root.device), "sda1");
    }

    #[test]
    fn root_override_resolved_by_device_basename() {
        let mounts = parse_mounts(MOUNTS);
        let root = resolve_root(&mounts, Some("sdb1")).unwrap();
        assert_eq!(root.mount_point, "/data");
    }

    #[test]
    fn extra_filesystems_resolved_by_device_or_mount_dir() {
        let mounts = parse_mounts(MOUNTS);
        let extra = resolve_extra(&mounts, &["sdb1".to_string()]);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].mount_point, "/data");
    }

    #[test]
    fn usage_names_are_basenames_not_paths() {
        assert_eq!(device_basename("/dev/sda1"), "sda1");
        assert_eq!(device_basename("sda1"), "sda1");
    }
}

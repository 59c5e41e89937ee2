//! Shared POSIX helpers for the filesystem resources

use anyhow::{Context, Result, bail};
use reconcile::{ApplyContext, PropertyMap};
use serde_json::Value;
use std::fs;
use std::path::Path;

const PASSWD: &str = "/etc/passwd";
const GROUP: &str = "/etc/group";

/// What `lstat` tells us about a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Permission bits as a four-digit octal string
    pub mode: String,
    pub owner: String,
    pub group: String,
}

/// Stat a path without following symlinks; `None` when it does not exist
pub fn stat(path: &Path) -> Result<Option<(fs::Metadata, Stat)>> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to stat {}", path.display()));
        }
    };

    let stat = describe(&meta);
    Ok(Some((meta, stat)))
}

#[cfg(unix)]
fn describe(meta: &fs::Metadata) -> Stat {
    use std::os::unix::fs::MetadataExt;

    Stat {
        mode: format!("{:04o}", meta.mode() & 0o7777),
        owner: user_name(meta.uid()),
        group: group_name(meta.gid()),
    }
}

#[cfg(not(unix))]
fn describe(meta: &fs::Metadata) -> Stat {
    let mode = if meta.permissions().readonly() {
        "0444"
    } else {
        "0644"
    };
    Stat {
        mode: mode.to_string(),
        owner: String::new(),
        group: String::new(),
    }
}

/// Add `mode`, `owner` and `group` to a read-back map
pub fn report(map: &mut PropertyMap, stat: &Stat) {
    map.insert("mode".into(), Value::from(stat.mode.clone()));
    map.insert("owner".into(), Value::from(stat.owner.clone()));
    map.insert("group".into(), Value::from(stat.group.clone()));
}

/// Sync one of the shared ownership/permission properties
///
/// Returns `Ok(false)` when `property` is not one of them.
pub fn sync_attribute(
    path: &Path,
    property: &str,
    desired: &Value,
    ctx: &mut ApplyContext,
) -> Result<bool> {
    let path_str = path.to_string_lossy();
    match property {
        "mode" => set_mode(path, as_str(property, desired)?)?,
        "owner" => ctx
            .runner
            .run_checked("chown", &[as_str(property, desired)?, &*path_str])?,
        "group" => ctx
            .runner
            .run_checked("chgrp", &[as_str(property, desired)?, &*path_str])?,
        _ => return Ok(false),
    }
    Ok(true)
}

fn as_str<'v>(property: &str, value: &'v Value) -> Result<&'v str> {
    match value.as_str() {
        Some(s) => Ok(s),
        None => bail!("{property} must be a string, got {value}"),
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let bits = u32::from_str_radix(mode, 8).with_context(|| format!("Invalid mode: {mode}"))?;
    fs::set_permissions(path, fs::Permissions::from_mode(bits))
        .with_context(|| format!("Failed to chmod {mode} {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: &str) -> Result<()> {
    bail!("Cannot set mode {mode} on {}: not a unix platform", path.display())
}

/// Resolve a uid to its name, falling back to the number
pub fn user_name(uid: u32) -> String {
    lookup_name(PASSWD, uid)
}

/// Resolve a gid to its name, falling back to the number
pub fn group_name(gid: u32) -> String {
    lookup_name(GROUP, gid)
}

fn lookup_name(database: &str, id: u32) -> String {
    fs::read_to_string(database)
        .ok()
        .and_then(|content| name_for_id(&content, id))
        .unwrap_or_else(|| id.to_string())
}

/// Find the name whose third colon-separated field is `id`
///
/// Works for both `/etc/passwd` and `/etc/group` lines.
pub fn name_for_id(content: &str, id: u32) -> Option<String> {
    content
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let entry_id = fields.nth(1)?.parse::<u32>().ok()?;
            (entry_id == id).then(|| name.to_string())
        })
}

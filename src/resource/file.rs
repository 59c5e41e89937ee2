//! File resource - regular files with content, mode and ownership

use anyhow::{Context, Result, bail};
use reconcile::{
    ABSENT, ActionSpec, ApplyContext, EvaluationStatus, Event, EventStatus, FactContext,
    PropertyKind, PropertyMap, PropertySpec, Provider, ResourceDescriptor, ResourceInstance,
    ResourceType, apply_action,
};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::posix;

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(
        "file",
        PropertySpec::identity("path").with_validator(reconcile::property::absolute_path),
    )
    .property(PropertySpec::state(
        "ensure",
        PropertyKind::Enum(&["present", "absent"]),
    ))
    .property(PropertySpec::state("content", PropertyKind::String))
    .property(PropertySpec::state("mode", PropertyKind::FileMode))
    .property(PropertySpec::state("owner", PropertyKind::String))
    .property(PropertySpec::state("group", PropertyKind::String))
    .property(PropertySpec::parameter("backup", PropertyKind::Boolean))
    .action(ActionSpec::ensure("create", "present"))
    .action(ActionSpec::custom("create_if_missing"))
    .action(ActionSpec::ensure("delete", "absent"))
    .action(ActionSpec::custom("touch"))
}

pub fn resource_type() -> ResourceType {
    ResourceType::new(descriptor()).provider(PosixFile)
}

/// Regular files through `std::fs`; ownership through `chown`/`chgrp`
#[derive(Debug)]
pub struct PosixFile;

impl PosixFile {
    fn path(resource: &ResourceInstance) -> PathBuf {
        PathBuf::from(resource.name())
    }

    fn exists(path: &Path) -> bool {
        path.exists() || path.is_symlink()
    }

    /// Write content, keeping `<path>.bak` first when `backup` is set
    fn write_content(resource: &ResourceInstance, path: &Path, content: &str) -> Result<()> {
        if resource.get_bool("backup") == Some(true) && path.is_file() {
            let backup = PathBuf::from(format!("{}.bak", path.display()));
            fs::copy(path, &backup)
                .with_context(|| format!("Failed to back up to {}", backup.display()))?;
            log::debug!("Backed up {} to {}", path.display(), backup.display());
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn touch(path: &Path) -> Result<u64> {
        let now = SystemTime::now();
        fs::File::options()
            .append(true)
            .open(path)
            .and_then(|f| f.set_modified(now))
            .with_context(|| format!("Failed to touch {}", path.display()))?;

        Ok(now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0))
    }
}

impl Provider for PosixFile {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn supports(&self, facts: &FactContext) -> bool {
        !facts.is_os(&["windows"])
    }

    fn load_current_state(
        &self,
        resource: &ResourceInstance,
        _ctx: &mut ApplyContext,
    ) -> Result<PropertyMap> {
        let path = Self::path(resource);
        let mut map = PropertyMap::new();
        map.insert("path".into(), json!(resource.name()));

        let Some((meta, stat)) = posix::stat(&path)? else {
            map.insert("ensure".into(), json!(ABSENT));
            return Ok(map);
        };

        if !meta.is_file() {
            bail!("{} exists and is not a regular file", path.display());
        }

        map.insert("ensure".into(), json!("present"));
        let content = fs::read_to_string(&path).map_or(Value::Null, Value::from);
        map.insert("content".into(), content);
        posix::report(&mut map, &stat);
        Ok(map)
    }

    fn sync(
        &self,
        resource: &ResourceInstance,
        property: &str,
        desired: &Value,
        ctx: &mut ApplyContext,
    ) -> Result<()> {
        let path = Self::path(resource);

        match (property, desired.as_str()) {
            ("ensure", Some(ABSENT)) => fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display())),
            ("ensure", _) => {
                let content = resource.get_str("content").unwrap_or_default();
                fs::write(&path, content)
                    .with_context(|| format!("Failed to create {}", path.display()))
            }
            ("content", Some(content)) => Self::write_content(resource, &path, content),
            _ => {
                if !posix::sync_attribute(&path, property, desired, ctx)? {
                    bail!("file cannot manage '{property}'");
                }
                Ok(())
            }
        }
    }

    fn run_action(
        &self,
        resource: &mut ResourceInstance,
        action: &str,
        ctx: &mut ApplyContext,
    ) -> Result<EvaluationStatus> {
        let path = Self::path(resource);

        match action {
            "create_if_missing" => {
                if Self::exists(&path) {
                    log::info!("{}: exists, leaving it alone", resource.reference());
                    return Ok(EvaluationStatus::Unchanged);
                }
                resource.set("ensure", json!("present"))?;
                self.evaluate(resource, ctx)
            }
            "touch" => {
                resource.set("ensure", json!("present"))?;
                let status = self.evaluate(resource, ctx)?;
                if status.is_failed() {
                    return Ok(status);
                }

                let mut events = status.events().to_vec();
                let reference = resource.reference();
                let event = if ctx.noop {
                    Event::new("mtime", None, json!("now"), EventStatus::Noop)
                } else {
                    let modified = Self::touch(&path)?;
                    Event::new("mtime", None, json!(modified), EventStatus::Success)
                };
                events.push(ctx.record(&reference, event));
                Ok(EvaluationStatus::from_events(events))
            }
            _ => apply_action(self, resource, action, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::{ScriptedRunner, evaluate, load, run_action};
    use reconcile::{CommandOutput, NoCommands};
    use tempfile::TempDir;

    fn file<'d>(d: &'d ResourceDescriptor, path: &Path) -> ResourceInstance<'d> {
        ResourceInstance::new(d, path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_relative_path_rejected() {
        let d = descriptor();
        assert!(ResourceInstance::new(&d, "relative/x").is_err());
    }

    #[test]
    fn test_load_missing() {
        let tmp = TempDir::new().unwrap();
        let d = descriptor();
        let r = file(&d, &tmp.path().join("x"));

        let state = load(&PosixFile, &r, &NoCommands);
        assert_eq!(state["ensure"], json!("absent"));
        assert!(state.get("content").is_none());
    }

    #[test]
    fn test_create_with_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        let d = descriptor();
        let mut r = file(&d, &path);
        r.set("content", json!("hi")).unwrap();

        let status = evaluate(&PosixFile, &r, &NoCommands);
        assert!(status.is_change());
        assert_eq!(fs::read_to_string(&path).unwrap(), "hi");

        let state = load(&PosixFile, &r, &NoCommands);
        assert_eq!(state["ensure"], json!("present"));
        assert_eq!(state["content"], json!("hi"));
        assert_eq!(
            state.keys().collect::<Vec<_>>(),
            vec!["path", "ensure", "content", "mode", "owner", "group"]
        );
    }

    #[test]
    fn test_second_run_unchanged() {
        let tmp = TempDir::new().unwrap();
        let d = descriptor();
        let mut r = file(&d, &tmp.path().join("x"));
        r.set("ensure", json!("present")).unwrap();
        r.set("content", json!("hi")).unwrap();
        r.set("mode", json!("600")).unwrap();

        assert!(evaluate(&PosixFile, &r, &NoCommands).is_change());
        assert_eq!(
            evaluate(&PosixFile, &r, &NoCommands),
            EvaluationStatus::Unchanged
        );
    }

    #[test]
    fn test_ensure_absent_removes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        fs::write(&path, "old").unwrap();
        let d = descriptor();
        let mut r = file(&d, &path);
        r.set("ensure", json!("absent")).unwrap();
        r.set("content", json!("ignored")).unwrap();

        assert!(evaluate(&PosixFile, &r, &NoCommands).is_change());
        assert!(!path.exists());
    }

    #[test]
    fn test_absent_file_stays_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ghost");
        let d = descriptor();
        let mut r = file(&d, &path);
        r.set("ensure", json!("absent")).unwrap();
        r.set("content", json!("ghost")).unwrap();
        r.set("mode", json!("0600")).unwrap();

        assert_eq!(
            evaluate(&PosixFile, &r, &NoCommands),
            EvaluationStatus::Unchanged
        );
        assert!(!path.exists());
        assert_eq!(
            evaluate(&PosixFile, &r, &NoCommands),
            EvaluationStatus::Unchanged
        );
    }

    #[test]
    fn test_backup_before_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        fs::write(&path, "old").unwrap();
        let d = descriptor();
        let mut r = file(&d, &path);
        r.set("content", json!("new")).unwrap();
        r.set("backup", json!(true)).unwrap();

        evaluate(&PosixFile, &r, &NoCommands);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(tmp.path().join("x.bak")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_owner_goes_through_chown() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        fs::write(&path, "").unwrap();
        let d = descriptor();
        let mut r = file(&d, &path);
        r.set("owner", json!("converge-nobody")).unwrap();

        let runner = ScriptedRunner::new().on("chown", CommandOutput::ok(""));
        let status = evaluate(&PosixFile, &r, &runner);
        assert!(status.is_change());
        assert_eq!(
            runner.calls(),
            vec![format!("chown converge-nobody {}", path.display())]
        );
    }

    #[test]
    fn test_chown_failure_is_failed_event() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        fs::write(&path, "").unwrap();
        let d = descriptor();
        let mut r = file(&d, &path);
        r.set("group", json!("converge-nogroup")).unwrap();
        r.set("content", json!("still written")).unwrap();

        let runner = ScriptedRunner::new().on("chgrp", CommandOutput::failed("invalid group"));
        let status = evaluate(&PosixFile, &r, &runner);
        assert!(status.is_failed());
        assert_eq!(fs::read_to_string(&path).unwrap(), "still written");
    }

    #[test]
    fn test_directory_in_the_way() {
        let tmp = TempDir::new().unwrap();
        let d = descriptor();
        let mut r = file(&d, tmp.path());
        r.set("content", json!("x")).unwrap();

        assert!(evaluate(&PosixFile, &r, &NoCommands).is_failed());
    }

    #[test]
    fn test_create_if_missing_keeps_existing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        fs::write(&path, "keep").unwrap();
        let d = descriptor();
        let mut r = file(&d, &path);
        r.set("content", json!("replace")).unwrap();

        let status = run_action(&PosixFile, &mut r, "create_if_missing", &NoCommands).unwrap();
        assert_eq!(status, EvaluationStatus::Unchanged);
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");
    }

    #[test]
    fn test_create_if_missing_creates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        let d = descriptor();
        let mut r = file(&d, &path);
        r.set("content", json!("fresh")).unwrap();

        let status = run_action(&PosixFile, &mut r, "create_if_missing", &NoCommands).unwrap();
        assert!(status.is_change());
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh");
    }

    #[test]
    fn test_touch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        let d = descriptor();
        let mut r = file(&d, &path);

        let status = run_action(&PosixFile, &mut r, "touch", &NoCommands).unwrap();
        assert!(status.is_change());
        assert!(path.is_file());
        assert_eq!(status.events().last().unwrap().property, "mtime");
    }

    #[test]
    fn test_delete_action() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x");
        fs::write(&path, "").unwrap();
        let d = descriptor();
        let mut r = file(&d, &path);

        run_action(&PosixFile, &mut r, "delete", &NoCommands).unwrap();
        assert!(!path.exists());
    }
}

//! Link resource - symbolic links

use anyhow::{Context, Result, bail};
use reconcile::{
    ABSENT, ActionSpec, ApplyContext, FactContext, PropertyKind, PropertyMap, PropertySpec,
    Provider, ResourceDescriptor, ResourceInstance, ResourceType,
};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(
        "link",
        PropertySpec::identity("path").with_validator(reconcile::property::absolute_path),
    )
    .property(PropertySpec::state(
        "ensure",
        PropertyKind::Enum(&["present", "absent"]),
    ))
    .property(PropertySpec::state("target", PropertyKind::String))
    .action(ActionSpec::ensure("create", "present"))
    .action(ActionSpec::ensure("delete", "absent"))
}

pub fn resource_type() -> ResourceType {
    ResourceType::new(descriptor()).provider(PosixLink)
}

#[derive(Debug)]
pub struct PosixLink;

/// What sits at the link path
#[derive(Debug)]
enum LinkState {
    Missing,
    Link(PathBuf),
    NotALink,
}

impl PosixLink {
    fn check_current(path: &Path) -> Result<LinkState> {
        if !path.exists() && !path.is_symlink() {
            return Ok(LinkState::Missing);
        }

        if path.is_symlink() {
            let target = fs::read_link(path)
                .with_context(|| format!("Failed to read symlink {}", path.display()))?;
            Ok(LinkState::Link(target))
        } else {
            Ok(LinkState::NotALink)
        }
    }

    /// Create (or re-point) the link
    fn create_link(path: &Path, target: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }

        if path.is_symlink() {
            fs::remove_file(path).with_context(|| {
                format!("Failed to remove existing symlink: {}", path.display())
            })?;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(target, path).with_context(|| {
            format!("Failed to create symlink: {} -> {}", path.display(), target)
        })?;

        #[cfg(not(unix))]
        bail!("Symlinks not supported on this platform");

        Ok(())
    }
}

impl Provider for PosixLink {
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
        let path = PathBuf::from(resource.name());
        let mut map = PropertyMap::new();
        map.insert("path".into(), json!(resource.name()));

        match Self::check_current(&path)? {
            LinkState::Missing => {
                map.insert("ensure".into(), json!(ABSENT));
            }
            LinkState::Link(target) => {
                map.insert("ensure".into(), json!("present"));
                map.insert("target".into(), json!(target.to_string_lossy()));
            }
            LinkState::NotALink => {
                bail!("{} exists and is not a symlink", path.display());
            }
        }
        Ok(map)
    }

    fn sync(
        &self,
        resource: &ResourceInstance,
        property: &str,
        desired: &Value,
        _ctx: &mut ApplyContext,
    ) -> Result<()> {
        let path = PathBuf::from(resource.name());

        match (property, desired.as_str()) {
            ("ensure", Some(ABSENT)) => fs::remove_file(&path)
                .with_context(|| format!("Failed to remove symlink: {}", path.display())),
            ("ensure", _) => match resource.get_str("target") {
                Some(target) => Self::create_link(&path, target),
                None => bail!("creating a link needs 'target'"),
            },
            ("target", Some(target)) => Self::create_link(&path, target),
            _ => bail!("link cannot manage '{property}'"),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::resource::testing::{evaluate, load};
    use reconcile::{EvaluationStatus, NoCommands};
    use tempfile::TempDir;

    #[test]
    fn test_create_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source");
        fs::write(&source, "").unwrap();
        let path = tmp.path().join("nested").join("link");

        let d = descriptor();
        let mut r = ResourceInstance::new(&d, path.to_str().unwrap()).unwrap();
        r.set("ensure", json!("present")).unwrap();
        r.set("target", json!(source.to_str().unwrap())).unwrap();

        assert!(evaluate(&PosixLink, &r, &NoCommands).is_change());
        assert!(path.is_symlink());
        assert_eq!(fs::read_link(&path).unwrap(), source);

        let state = load(&PosixLink, &r, &NoCommands);
        assert_eq!(state["target"], json!(source.to_str().unwrap()));
        assert_eq!(
            evaluate(&PosixLink, &r, &NoCommands),
            EvaluationStatus::Unchanged
        );
    }

    #[test]
    fn test_retarget() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("link");
        std::os::unix::fs::symlink("/old/target", &path).unwrap();

        let d = descriptor();
        let mut r = ResourceInstance::new(&d, path.to_str().unwrap()).unwrap();
        r.set("target", json!("/new/target")).unwrap();

        let status = evaluate(&PosixLink, &r, &NoCommands);
        assert_eq!(status.events()[0].previous, json!("/old/target"));
        assert_eq!(fs::read_link(&path).unwrap(), PathBuf::from("/new/target"));
    }

    #[test]
    fn test_create_without_target_fails() {
        let tmp = TempDir::new().unwrap();
        let d = descriptor();
        let mut r = ResourceInstance::new(&d, tmp.path().join("l").to_str().unwrap()).unwrap();
        r.set("ensure", json!("present")).unwrap();

        assert!(evaluate(&PosixLink, &r, &NoCommands).is_failed());
    }

    #[test]
    fn test_regular_file_is_not_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file");
        fs::write(&path, "data").unwrap();

        let d = descriptor();
        let mut r = ResourceInstance::new(&d, path.to_str().unwrap()).unwrap();
        r.set("target", json!("/elsewhere")).unwrap();

        assert!(evaluate(&PosixLink, &r, &NoCommands).is_failed());
        assert_eq!(fs::read_to_string(&path).unwrap(), "data");
    }

    #[test]
    fn test_remove() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("link");
        std::os::unix::fs::symlink("/dangling", &path).unwrap();

        let d = descriptor();
        let mut r = ResourceInstance::new(&d, path.to_str().unwrap()).unwrap();
        r.set("ensure", json!("absent")).unwrap();

        assert!(evaluate(&PosixLink, &r, &NoCommands).is_change());
        assert!(!path.is_symlink());
    }
}

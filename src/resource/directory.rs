//! Directory resource

use anyhow::{Context, Result, bail};
use reconcile::{
    ABSENT, ActionSpec, ApplyContext, FactContext, PropertyKind, PropertyMap, PropertySpec,
    Provider, ResourceDescriptor, ResourceInstance, ResourceType,
};
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;

use super::posix;

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(
        "directory",
        PropertySpec::identity("path").with_validator(reconcile::property::absolute_path),
    )
    .property(PropertySpec::state(
        "ensure",
        PropertyKind::Enum(&["present", "absent"]),
    ))
    .property(PropertySpec::state("mode", PropertyKind::FileMode))
    .property(PropertySpec::state("owner", PropertyKind::String))
    .property(PropertySpec::state("group", PropertyKind::String))
    .property(PropertySpec::parameter("recursive", PropertyKind::Boolean))
    .action(ActionSpec::ensure("create", "present"))
    .action(ActionSpec::ensure("delete", "absent"))
}

pub fn resource_type() -> ResourceType {
    ResourceType::new(descriptor()).provider(PosixDirectory)
}

#[derive(Debug)]
pub struct PosixDirectory;

impl Provider for PosixDirectory {
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

        match posix::stat(&path)? {
            None => {
                map.insert("ensure".into(), json!(ABSENT));
            }
            Some((meta, _)) if !meta.is_dir() => {
                bail!("{} exists and is not a directory", path.display());
            }
            Some((_, stat)) => {
                map.insert("ensure".into(), json!("present"));
                posix::report(&mut map, &stat);
            }
        }
        Ok(map)
    }

    fn sync(
        &self,
        resource: &ResourceInstance,
        property: &str,
        desired: &Value,
        ctx: &mut ApplyContext,
    ) -> Result<()> {
        let path = PathBuf::from(resource.name());
        let recursive = resource.get_bool("recursive") == Some(true);

        match (property, desired.as_str()) {
            ("ensure", Some(ABSENT)) => {
                let removed = if recursive {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_dir(&path)
                };
                removed.with_context(|| format!("Failed to remove {}", path.display()))
            }
            ("ensure", _) => {
                let created = if recursive {
                    fs::create_dir_all(&path)
                } else {
                    fs::create_dir(&path)
                };
                created.with_context(|| format!("Failed to create {}", path.display()))
            }
            _ => {
                if !posix::sync_attribute(&path, property, desired, ctx)? {
                    bail!("directory cannot manage '{property}'");
                }
                Ok(())
            }
        }
    }
}

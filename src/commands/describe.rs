//! List registered resource kinds as JSON

use anyhow::Context as _;
use reconcile::{Registry, ResourceType};
use serde_json::{Value, json};

use super::CommandResult;
use crate::Context;

pub fn run(ctx: &Context, kind: Option<&str>) -> CommandResult<()> {
    let description = describe(&ctx.registry, kind)?;
    let output = serde_json::to_string_pretty(&description)
        .context("Failed to serialize resource descriptions")?;
    println!("{output}");
    Ok(())
}

/// One kind (looked up by name or alias), or every kind in name order
fn describe(registry: &Registry, kind: Option<&str>) -> CommandResult<Value> {
    match kind {
        Some(kind) => {
            let resource_type = registry
                .lookup(kind)
                .ok_or_else(|| reconcile::Error::UnknownType(kind.to_string()))?;
            entry(registry, resource_type)
        }
        None => registry
            .types()
            .map(|t| entry(registry, t))
            .collect::<CommandResult<Vec<_>>>()
            .map(Value::Array),
    }
}

fn entry(registry: &Registry, resource_type: &ResourceType) -> CommandResult<Value> {
    let mut value = serde_json::to_value(&resource_type.descriptor)
        .with_context(|| format!("Failed to describe {}", resource_type.kind()))?;
    value["aliases"] = json!(registry.aliases_of(resource_type.kind()));
    value["providers"] = json!(resource_type.provider_names());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource;

    #[test]
    fn test_describe_all() {
        let all = describe(&resource::registry(), None).unwrap();
        let kinds: Vec<&str> = all
            .as_array()
            .unwrap()
            .iter()
            .map(|k| k["kind"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec!["directory", "file", "link", "package", "service", "user"]
        );
    }

    #[test]
    fn test_describe_alias() {
        let link = describe(&resource::registry(), Some("symlink")).unwrap();
        assert_eq!(link["kind"], json!("link"));
        assert_eq!(link["identity"], json!("path"));
        assert_eq!(link["aliases"], json!(["symlink"]));
        assert_eq!(link["providers"], json!(["posix"]));
    }

    #[test]
    fn test_describe_package_providers_in_priority_order() {
        let package = describe(&resource::registry(), Some("package")).unwrap();
        assert_eq!(
            package["providers"],
            json!(["apt", "dnf", "yum", "pacman", "brew"])
        );
        let actions: Vec<&str> = package["actions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect();
        assert!(actions.contains(&"upgrade"));
    }

    #[test]
    fn test_describe_unknown() {
        let err = describe(&resource::registry(), Some("widget")).unwrap_err();
        assert_eq!(err.exit_code(), 65);
    }
}

//! Built-in resource library
//!
//! Every kind converge understands is registered here, each with its
//! providers in priority order:
//! - `file`, `directory`, `link` (alias `symlink`): POSIX filesystem
//! - `package`: apt, dnf, yum, pacman, brew
//! - `service`: systemd, openrc, launchd
//! - `user`: useradd/usermod/userdel

pub mod directory;
pub mod file;
pub mod link;
pub mod package;
pub mod posix;
pub mod service;
pub mod user;

use reconcile::Registry;

/// Build the registry of built-in resource kinds
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(file::resource_type())
        .register(directory::resource_type())
        .register(link::resource_type())
        .register(package::resource_type())
        .register(service::resource_type())
        .register(user::resource_type())
        .alias("symlink", "link");
    registry
}


#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{FactContext, Resolver};

    #[test]
    fn test_registry_kinds() {
        let registry = registry();
        let kinds: Vec<_> = registry.types().map(|t| t.kind()).collect();
        assert_eq!(
            kinds,
            vec!["directory", "file", "link", "package", "service", "user"]
        );
        assert_eq!(registry.lookup("symlink").map(|t| t.kind()), Some("link"));
    }

    #[test]
    fn test_every_kind_declares_nothing_and_identity_first() {
        for ty in registry().types() {
            let d = &ty.descriptor;
            assert!(d.find_action("nothing").is_some(), "{}", d.kind);
            assert_eq!(d.properties[0].name, d.identity, "{}", d.kind);
            assert!(!ty.providers.is_empty(), "{}", d.kind);
        }
    }

    #[test]
    fn test_windows_is_unsupported_everywhere() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let windows = FactContext {
            os: Some("windows".into()),
            platform: Some("windows".into()),
            platform_family: Some("windows".into()),
            platform_version: None,
        };
        for ty in registry.types() {
            assert!(resolver.resolve(ty.kind(), &windows).is_err(), "{}", ty.kind());
        }
    }
}

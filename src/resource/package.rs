//! Package resource - apt, dnf, yum, pacman and Homebrew

use anyhow::{Context, Result, bail};
use reconcile::{
    ABSENT, ActionSpec, ApplyContext, CommandRunner, FactContext, PropertyKind, PropertyMap,
    PropertySpec, Provider, ResourceDescriptor, ResourceInstance, ResourceType,
};
use serde::Deserialize;
use serde_json::{Value, json};

const LATEST: &str = "latest";

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(
        "package",
        PropertySpec::identity("name").with_validator(reconcile::property::plain_name),
    )
    .property(PropertySpec::state(
        "ensure",
        PropertyKind::Enum(&["present", "absent", LATEST]),
    ))
    .property(PropertySpec::state("version", PropertyKind::String))
    .action(ActionSpec::ensure("install", "present"))
    .action(ActionSpec::ensure("upgrade", LATEST))
    .action(ActionSpec::ensure("remove", ABSENT))
}

/// Providers in priority order: dnf before yum so modern RHEL picks dnf
pub fn resource_type() -> ResourceType {
    ResourceType::new(descriptor())
        .provider(PackageProvider::new(Manager::Apt))
        .provider(PackageProvider::new(Manager::Dnf))
        .provider(PackageProvider::new(Manager::Yum))
        .provider(PackageProvider::new(Manager::Pacman))
        .provider(PackageProvider::new(Manager::Brew))
}

/// Package manager behind a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Brew,
}

#[derive(Deserialize)]
struct BrewInfo {
    formulae: Vec<BrewFormula>,
}

#[derive(Deserialize)]
struct BrewFormula {
    installed: Vec<BrewInstalled>,
    versions: BrewVersions,
}

#[derive(Deserialize)]
struct BrewInstalled {
    version: String,
}

#[derive(Deserialize)]
struct BrewVersions {
    stable: Option<String>,
}

/// A command line: program plus arguments
type Invocation = (&'static str, Vec<String>);

impl Manager {
    pub fn name(self) -> &'static str {
        match self {
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Yum => "yum",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
        }
    }

    fn supports(self, facts: &FactContext) -> bool {
        match self {
            Self::Apt => facts.is_family(&["debian"]),
            Self::Dnf => {
                facts.is_family(&["fedora"])
                    || (facts.is_family(&["rhel"]) && facts.version_at_least(8))
                    || (facts.is_family(&["amazon"]) && facts.version_at_least(2022))
            }
            Self::Yum => facts.is_family(&["rhel", "amazon"]),
            Self::Pacman => facts.is_family(&["arch"]),
            Self::Brew => facts.is_family(&["mac_os_x"]),
        }
    }

    /// Installed version, `None` when not installed
    fn query(self, runner: &dyn CommandRunner, name: &str) -> Result<Option<String>> {
        let installed = match self {
            Self::Apt => {
                let output = runner.run("dpkg-query", &["-W", "-f=${Status} ${Version}", name])?;
                if !output.success {
                    return Ok(None);
                }
                parse_dpkg_status(&output.stdout_str())
            }
            Self::Dnf | Self::Yum => {
                let output = runner.run("rpm", &["-q", "--qf", "%{VERSION}-%{RELEASE}", name])?;
                output
                    .success
                    .then(|| output.stdout_str().trim().to_string())
            }
            Self::Pacman => {
                let output = runner.run("pacman", &["-Q", name])?;
                if !output.success {
                    return Ok(None);
                }
                output
                    .stdout_str()
                    .split_whitespace()
                    .nth(1)
                    .map(String::from)
            }
            Self::Brew => {
                let Some(formula) = brew_info(runner, name)? else {
                    return Ok(None);
                };
                formula.installed.first().map(|i| i.version.clone())
            }
        };
        Ok(installed)
    }

    /// Newest version the manager could install
    fn latest(self, runner: &dyn CommandRunner, name: &str) -> Result<Option<String>> {
        let latest = match self {
            Self::Apt => {
                let policy = runner.run_capture("apt-cache", &["policy", name])?;
                parse_candidate(&policy)
            }
            Self::Dnf => first_line(&runner.run_capture(
                "dnf",
                &[
                    "-q",
                    "repoquery",
                    "--latest-limit",
                    "1",
                    "--qf",
                    "%{version}-%{release}",
                    name,
                ],
            )?),
            Self::Yum => first_line(&runner.run_capture(
                "repoquery",
                &["--qf", "%{version}-%{release}", name],
            )?),
            Self::Pacman => {
                let info = runner.run_capture("pacman", &["-Si", name])?;
                parse_field(&info, "Version")
            }
            Self::Brew => brew_info(runner, name)?.and_then(|f| f.versions.stable),
        };
        Ok(latest)
    }

    fn install(self, name: &str, version: Option<&str>) -> Result<Invocation> {
        let invocation = match (self, version) {
            (Self::Apt, _) => apt(&[
                "install",
                "-y",
                "-q",
                &pinned(name, version, "="),
            ]),
            (Self::Dnf | Self::Yum, _) => (
                self.name(),
                args(&["-y", "install", &pinned(name, version, "-")]),
            ),
            (Self::Pacman, None) => ("pacman", args(&["-S", "--noconfirm", "--needed", name])),
            (Self::Pacman, Some(version)) => {
                bail!("pacman cannot install a specific version ({name} {version})")
            }
            (Self::Brew, _) => (
                "brew",
                args(&["install", "--formula", &pinned(name, version, "@")]),
            ),
        };
        Ok(invocation)
    }

    fn upgrade(self, name: &str) -> Invocation {
        match self {
            Self::Apt => apt(&["install", "-y", "-q", "--only-upgrade", name]),
            Self::Dnf | Self::Yum => (self.name(), args(&["-y", "upgrade", name])),
            Self::Pacman => ("pacman", args(&["-S", "--noconfirm", name])),
            Self::Brew => ("brew", args(&["upgrade", "--formula", name])),
        }
    }

    fn remove(self, name: &str) -> Invocation {
        match self {
            Self::Apt => apt(&["remove", "-y", "-q", name]),
            Self::Dnf | Self::Yum => (self.name(), args(&["-y", "remove", name])),
            Self::Pacman => ("pacman", args(&["-R", "--noconfirm", name])),
            Self::Brew => ("brew", args(&["uninstall", "--formula", name])),
        }
    }
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// apt-get run non-interactively
fn apt(items: &[&str]) -> Invocation {
    let mut all = args(&["DEBIAN_FRONTEND=noninteractive", "apt-get"]);
    all.extend(args(items));
    ("env", all)
}

fn pinned(name: &str, version: Option<&str>, separator: &str) -> String {
    match version {
        Some(version) => format!("{name}{separator}{version}"),
        None => name.to_string(),
    }
}

fn parse_dpkg_status(output: &str) -> Option<String> {
    output
        .trim()
        .strip_prefix("install ok installed")
        .map(|version| version.trim().to_string())
}

fn parse_candidate(policy: &str) -> Option<String> {
    parse_field(policy, "Candidate").filter(|c| c != "(none)")
}

/// Value of a `Key: value` / `Key : value` line
fn parse_field(text: &str, key: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        (k.trim() == key).then(|| v.trim().to_string())
    })
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(String::from)
}

fn brew_info(runner: &dyn CommandRunner, name: &str) -> Result<Option<BrewFormula>> {
    let output = runner.run("brew", &["info", "--json=v2", "--formula", name])?;
    if !output.success {
        return Ok(None);
    }

    let info: BrewInfo =
        serde_json::from_slice(&output.stdout).context("Failed to parse brew info output")?;
    Ok(info.formulae.into_iter().next())
}

/// Package provider for one manager
#[derive(Debug)]
pub struct PackageProvider {
    manager: Manager,
}

impl PackageProvider {
    pub fn new(manager: Manager) -> Self {
        Self { manager }
    }

    fn invoke(&self, ctx: &mut ApplyContext, (cmd, args): Invocation) -> Result<()> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        ctx.runner
            .run_checked(cmd, &args)
            .with_context(|| format!("{} failed", self.manager.name()))
    }
}

impl Provider for PackageProvider {
    fn name(&self) -> &'static str {
        self.manager.name()
    }

    fn supports(&self, facts: &FactContext) -> bool {
        self.manager.supports(facts)
    }

    fn load_current_state(
        &self,
        resource: &ResourceInstance,
        ctx: &mut ApplyContext,
    ) -> Result<PropertyMap> {
        let name = resource.name();
        let mut map = PropertyMap::new();
        map.insert("name".into(), json!(name));

        let Some(version) = self.manager.query(ctx.runner, name)? else {
            map.insert("ensure".into(), json!(ABSENT));
            return Ok(map);
        };

        let wants_latest = resource.get_str("ensure") == Some(LATEST);
        let ensure = if wants_latest
            && self.manager.latest(ctx.runner, name)?.as_deref() == Some(version.as_str())
        {
            LATEST
        } else {
            "present"
        };

        map.insert("ensure".into(), json!(ensure));
        map.insert("version".into(), json!(version));
        Ok(map)
    }

    fn sync(
        &self,
        resource: &ResourceInstance,
        property: &str,
        desired: &Value,
        ctx: &mut ApplyContext,
    ) -> Result<()> {
        let name = resource.name();

        let invocation = match (property, desired.as_str()) {
            ("ensure", Some(ABSENT)) => self.manager.remove(name),
            ("ensure", Some(LATEST)) => {
                if self.manager.query(ctx.runner, name)?.is_some() {
                    self.manager.upgrade(name)
                } else {
                    self.manager.install(name, None)?
                }
            }
            ("ensure", _) => self.manager.install(name, resource.get_str("version"))?,
            ("version", Some(version)) => self.manager.install(name, Some(version))?,
            _ => bail!("package cannot manage '{property}'"),
        };

        self.invoke(ctx, invocation)
    }
}

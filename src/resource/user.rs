//! User resource - local accounts via useradd/usermod/userdel

use anyhow::{Context, Result, bail};
use reconcile::{
    ABSENT, ActionSpec, ApplyContext, CommandRunner, EvaluationStatus, FactContext, PropertyKind,
    PropertyMap, PropertySpec, Provider, ResourceDescriptor, ResourceInstance, ResourceType,
    apply_action,
};
use serde_json::{Value, json};

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(
        "user",
        PropertySpec::identity("name").with_validator(reconcile::property::plain_name),
    )
    .property(PropertySpec::state(
        "ensure",
        PropertyKind::Enum(&["present", "absent"]),
    ))
    .property(PropertySpec::state("uid", PropertyKind::Integer))
    .property(PropertySpec::state("gid", PropertyKind::Integer))
    .property(PropertySpec::state("comment", PropertyKind::String))
    .property(
        PropertySpec::state("home", PropertyKind::String)
            .with_validator(reconcile::property::absolute_path),
    )
    .property(
        PropertySpec::state("shell", PropertyKind::String)
            .with_validator(reconcile::property::absolute_path),
    )
    .property(PropertySpec::parameter("manage_home", PropertyKind::Boolean))
    .action(ActionSpec::ensure("create", "present"))
    .action(ActionSpec::ensure("remove", ABSENT))
    .action(ActionSpec::custom("modify"))
    .action(ActionSpec::custom("manage"))
}

pub fn resource_type() -> ResourceType {
    ResourceType::new(descriptor()).provider(UserAdd)
}

/// A `passwd` database entry
#[derive(Debug, PartialEq, Eq)]
struct Account {
    uid: u64,
    gid: u64,
    comment: String,
    home: String,
    shell: String,
}

impl Account {
    /// Parse one `name:x:uid:gid:gecos:home:shell` line
    fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(':').collect();
        let [_, _, uid, gid, comment, home, shell] = fields.as_slice() else {
            bail!("Unexpected passwd entry: {line}");
        };

        Ok(Self {
            uid: uid.parse().context("Invalid uid in passwd entry")?,
            gid: gid.parse().context("Invalid gid in passwd entry")?,
            comment: (*comment).to_string(),
            home: (*home).to_string(),
            shell: (*shell).to_string(),
        })
    }
}

/// usermod/useradd flag for a state property
fn flag_for(property: &str) -> Option<&'static str> {
    let flag = match property {
        "uid" => "-u",
        "gid" => "-g",
        "comment" => "-c",
        "home" => "-d",
        "shell" => "-s",
        _ => return None,
    };
    Some(flag)
}

/// Render a property value as a command argument
fn argument(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug)]
pub struct UserAdd;

impl UserAdd {
    fn lookup(runner: &dyn CommandRunner, name: &str) -> Result<Option<Account>> {
        let output = runner.run("getent", &["passwd", name])?;
        if !output.success {
            return Ok(None);
        }
        let stdout = output.stdout_str();
        match stdout.lines().next() {
            Some(line) => Account::parse(line).map(Some),
            None => Ok(None),
        }
    }

    fn manage_home(resource: &ResourceInstance) -> bool {
        resource.get_bool("manage_home") == Some(true)
    }

    fn create_args(resource: &ResourceInstance) -> Vec<String> {
        let mut args = Vec::new();
        for spec in resource.descriptor().state_properties() {
            let (Some(flag), Some(value)) = (flag_for(spec.name), resource.get(spec.name)) else {
                continue;
            };
            args.push(flag.to_string());
            args.push(argument(value));
        }
        args.push(if Self::manage_home(resource) { "-m" } else { "-M" }.to_string());
        args.push(resource.name().to_string());
        args
    }
}

impl Provider for UserAdd {
    fn name(&self) -> &'static str {
        "useradd"
    }

    fn supports(&self, facts: &FactContext) -> bool {
        facts.is_os(&["linux"])
    }

    fn load_current_state(
        &self,
        resource: &ResourceInstance,
        ctx: &mut ApplyContext,
    ) -> Result<PropertyMap> {
        let mut map = PropertyMap::new();
        map.insert("name".into(), json!(resource.name()));

        let Some(account) = Self::lookup(ctx.runner, resource.name())? else {
            map.insert("ensure".into(), json!(ABSENT));
            return Ok(map);
        };

        map.insert("ensure".into(), json!("present"));
        map.insert("uid".into(), json!(account.uid));
        map.insert("gid".into(), json!(account.gid));
        map.insert("comment".into(), json!(account.comment));
        map.insert("home".into(), json!(account.home));
        map.insert("shell".into(), json!(account.shell));
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

        let (cmd, args) = match (property, desired.as_str()) {
            ("ensure", Some(ABSENT)) => {
                let mut args = Vec::new();
                if Self::manage_home(resource) {
                    args.push("-r".to_string());
                }
                args.push(name.to_string());
                ("userdel", args)
            }
            ("ensure", _) => ("useradd", Self::create_args(resource)),
            _ => {
                let Some(flag) = flag_for(property) else {
                    bail!("user cannot manage '{property}'");
                };
                let mut args = vec![flag.to_string(), argument(desired)];
                if property == "home" && Self::manage_home(resource) {
                    args.push("-m".to_string());
                }
                args.push(name.to_string());
                ("usermod", args)
            }
        };

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        ctx.runner.run_checked(cmd, &args)
    }

    fn run_action(
        &self,
        resource: &mut ResourceInstance,
        action: &str,
        ctx: &mut ApplyContext,
    ) -> Result<EvaluationStatus> {
        match action {
            "modify" | "manage" => {
                if Self::lookup(ctx.runner, resource.name())?.is_some() {
                    return self.evaluate(resource, ctx);
                }
                if action == "modify" {
                    bail!("user '{}' does not exist", resource.name());
                }
                log::info!("{}: does not exist, nothing to manage", resource.reference());
                Ok(EvaluationStatus::Unchanged)
            }
            _ => apply_action(self, resource, action, ctx),
        }
    }
}

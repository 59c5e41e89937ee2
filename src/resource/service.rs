//! Service resource - systemd, OpenRC and launchd

use anyhow::{Context, Result, bail};
use reconcile::{
    ActionSpec, ApplyContext, CommandRunner, EvaluationStatus, Event, EventStatus, FactContext,
    PropertyKind, PropertyMap, PropertySpec, Provider, ResourceDescriptor, ResourceInstance,
    ResourceType, apply_action,
};
use serde_json::{Value, json};

const RUNNING: &str = "running";
const STOPPED: &str = "stopped";

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new("service", PropertySpec::identity("name"))
        .property(PropertySpec::state(
            "ensure",
            PropertyKind::Enum(&[RUNNING, STOPPED]),
        ))
        .property(PropertySpec::state("enabled", PropertyKind::Boolean))
        .action(ActionSpec::ensure("start", RUNNING))
        .action(ActionSpec::ensure("stop", STOPPED))
        .action(ActionSpec::custom("restart"))
        .action(ActionSpec::custom("reload"))
        .action(ActionSpec::flag("enable", "enabled", true))
        .action(ActionSpec::flag("disable", "enabled", false))
}

pub fn resource_type() -> ResourceType {
    ResourceType::new(descriptor())
        .provider(ServiceProvider::new(Init::Systemd))
        .provider(ServiceProvider::new(Init::OpenRc))
        .provider(ServiceProvider::new(Init::Launchd))
}

/// Init system behind a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Init {
    Systemd,
    OpenRc,
    Launchd,
}

impl Init {
    pub fn name(self) -> &'static str {
        match self {
            Self::Systemd => "systemd",
            Self::OpenRc => "openrc",
            Self::Launchd => "launchd",
        }
    }

    fn supports(self, facts: &FactContext) -> bool {
        let openrc = facts.is_family(&["alpine", "gentoo"]);
        match self {
            Self::Systemd => facts.is_os(&["linux"]) && !openrc,
            Self::OpenRc => openrc,
            Self::Launchd => facts.is_os(&["darwin"]) || facts.is_family(&["mac_os_x"]),
        }
    }

    fn is_running(self, runner: &dyn CommandRunner, name: &str) -> Result<bool> {
        match self {
            Self::Systemd => runner.run_status("systemctl", &["is-active", "--quiet", name]),
            Self::OpenRc => runner.run_status("rc-service", &[name, "status"]),
            Self::Launchd => {
                let output = runner.run("launchctl", &["list", name])?;
                Ok(output.success && output.stdout_str().contains("\"PID\""))
            }
        }
    }

    fn is_enabled(self, runner: &dyn CommandRunner, name: &str) -> Result<bool> {
        match self {
            Self::Systemd => runner.run_status("systemctl", &["is-enabled", "--quiet", name]),
            Self::OpenRc => {
                let runlevel = runner.run_capture("rc-update", &["show", "default"])?;
                Ok(in_runlevel(&runlevel, name))
            }
            Self::Launchd => {
                let disabled = runner.run_capture("launchctl", &["print-disabled", "system"])?;
                Ok(launchd_enabled(&disabled, name))
            }
        }
    }

    /// Run a lifecycle verb: start, stop, restart, reload, enable or disable
    fn control(self, runner: &dyn CommandRunner, name: &str, verb: &str) -> Result<()> {
        let domain = format!("system/{name}");
        let result = match (self, verb) {
            (Self::Systemd, _) => runner.run_checked("systemctl", &[verb, name]),
            (Self::OpenRc, "enable") => runner.run_checked("rc-update", &["add", name, "default"]),
            (Self::OpenRc, "disable") => runner.run_checked("rc-update", &["del", name, "default"]),
            (Self::OpenRc, _) => runner.run_checked("rc-service", &[name, verb]),
            (Self::Launchd, "start" | "stop") => runner.run_checked("launchctl", &[verb, name]),
            (Self::Launchd, "restart") => {
                runner.run_checked("launchctl", &["kickstart", "-k", &domain])
            }
            (Self::Launchd, "enable" | "disable") => {
                runner.run_checked("launchctl", &[verb, &domain])
            }
            (Self::Launchd, _) => bail!("launchd cannot {verb} services"),
        };
        result.with_context(|| format!("Failed to {verb} {name}"))
    }
}

/// Whether `rc-update show` lists the service
fn in_runlevel(output: &str, name: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.split('|').next())
        .any(|service| service.trim() == name)
}

/// Parse `launchctl print-disabled` output; unlisted services are enabled
fn launchd_enabled(output: &str, name: &str) -> bool {
    let label = format!("\"{name}\"");
    output
        .lines()
        .filter_map(|line| line.split_once("=>"))
        .find(|(key, _)| key.trim() == label)
        .is_none_or(|(_, value)| matches!(value.trim(), "enabled" | "false"))
}

/// Service provider for one init system
#[derive(Debug)]
pub struct ServiceProvider {
    init: Init,
}

impl ServiceProvider {
    pub fn new(init: Init) -> Self {
        Self { init }
    }
}

impl Provider for ServiceProvider {
    fn name(&self) -> &'static str {
        self.init.name()
    }

    fn supports(&self, facts: &FactContext) -> bool {
        self.init.supports(facts)
    }

    fn load_current_state(
        &self,
        resource: &ResourceInstance,
        ctx: &mut ApplyContext,
    ) -> Result<PropertyMap> {
        let name = resource.name();
        let running = self.init.is_running(ctx.runner, name)?;
        let enabled = self.init.is_enabled(ctx.runner, name)?;

        let mut map = PropertyMap::new();
        map.insert("name".into(), json!(name));
        map.insert(
            "ensure".into(),
            json!(if running { RUNNING } else { STOPPED }),
        );
        map.insert("enabled".into(), json!(enabled));
        Ok(map)
    }

    fn sync(
        &self,
        resource: &ResourceInstance,
        property: &str,
        desired: &Value,
        ctx: &mut ApplyContext,
    ) -> Result<()> {
        let verb = match (property, desired) {
            ("ensure", Value::String(s)) if s == STOPPED => "stop",
            ("ensure", _) => "start",
            ("enabled", Value::Bool(true)) => "enable",
            ("enabled", _) => "disable",
            _ => bail!("service cannot manage '{property}'"),
        };
        self.init.control(ctx.runner, resource.name(), verb)
    }

    fn run_action(
        &self,
        resource: &mut ResourceInstance,
        action: &str,
        ctx: &mut ApplyContext,
    ) -> Result<EvaluationStatus> {
        if !matches!(action, "restart" | "reload") {
            return apply_action(self, resource, action, ctx);
        }

        let reference = resource.reference();
        let event = if ctx.noop {
            Event::new(action, None, json!(RUNNING), EventStatus::Noop)
        } else {
            match self.init.control(ctx.runner, resource.name(), action) {
                Ok(()) => Event::new(action, None, json!(RUNNING), EventStatus::Success),
                Err(e) => Event::new(action, None, json!(RUNNING), EventStatus::Failure)
                    .with_message(format!("{e:#}")),
            }
        };
        Ok(EvaluationStatus::from_events(vec![
            ctx.record(&reference, event),
        ]))
    }
}

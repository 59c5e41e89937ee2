use anyhow::{Context, Result};
use reconcile::{CommandOutput, CommandRunner};
use std::process::{Command, Stdio};

/// Runs commands on the host
///
/// Output is always captured: stdout belongs to the emitted JSON object, so
/// nothing a child prints may leak into it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        log::debug!("Running: {} {}", cmd, args.join(" "));

        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

        let output = CommandOutput::from(output);
        if !output.success {
            log::debug!("{} exited with failure: {}", cmd, output.stderr_str().trim());
        }
        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let output = SystemRunner.run("echo", &["hello"]).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout_str().trim(), "hello");
    }

    #[test]
    fn test_run_reports_failure() {
        let output = SystemRunner.run("false", &[]).unwrap();
        assert!(!output.success);
        assert!(SystemRunner.run_checked("false", &[]).is_err());
    }

    #[test]
    fn test_missing_command_is_error() {
        assert!(SystemRunner.run("converge-no-such-command", &[]).is_err());
    }
}

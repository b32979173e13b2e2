//! Host actions launched from the dedicated keys

use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::config::ActionCommands;
use crate::output::{ShellRunner, ShellTarget};

pub struct HostActions {
    commands: ActionCommands,
}

impl HostActions {
    pub fn new(commands: ActionCommands) -> Self {
        Self { commands }
    }

    fn command_for(&self, target: ShellTarget) -> &str {
        match target {
            ShellTarget::Calculator => &self.commands.calculator,
            ShellTarget::Documents => &self.commands.documents,
            ShellTarget::Music => &self.commands.music,
            ShellTarget::Pictures => &self.commands.pictures,
        }
    }
}

impl ShellRunner for HostActions {
    fn launch(&mut self, target: ShellTarget) -> Result<()> {
        let cmd = self.command_for(target).trim();
        if cmd.is_empty() {
            log::debug!("No command configured for {:?}", target);
            return Ok(());
        }
        log::debug!("Running command for {:?}: {}", target, cmd);
        Command::new("/bin/sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", cmd))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_is_skipped() {
        let mut actions = HostActions::new(ActionCommands {
            calculator: "  ".into(),
            ..ActionCommands::default()
        });
        assert!(actions.launch(ShellTarget::Calculator).is_ok());
    }

    #[test]
    fn test_command_lookup() {
        let actions = HostActions::new(ActionCommands::default());
        assert_eq!(actions.command_for(ShellTarget::Calculator), "gnome-calculator");
        assert!(actions.command_for(ShellTarget::Music).contains("MUSIC"));
    }
}

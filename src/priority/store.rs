use anyhow::Result;
use tracing::{debug, info};

use crate::audio::Role;
use crate::config::{Config, ConfigLoader, Preferences};
use crate::system::FileSystemInterface;

use super::PriorityList;

/// The user's priority lists and enable flag, backed by the config file.
///
/// Mutators return `Ok(false)` when nothing changed; only effective changes
/// are written back, and they are written back immediately.
pub struct PriorityStore<F: FileSystemInterface> {
    loader: ConfigLoader<F>,
    config: Config,
}

impl<F: FileSystemInterface> PriorityStore<F> {
    pub fn load(loader: ConfigLoader<F>) -> Result<Self> {
        let config = loader.load_config()?;
        Ok(Self { loader, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn preferences(&self) -> &Preferences {
        &self.config.preferences
    }

    pub fn is_enabled(&self) -> bool {
        self.config.preferences.enabled
    }

    pub fn priority_list(&self, role: Role) -> &PriorityList {
        self.config.preferences.priority_list(role)
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<bool> {
        if self.config.preferences.enabled == enabled {
            debug!("Automatic switching already {}", on_off(enabled));
            return Ok(false);
        }

        self.config.preferences.enabled = enabled;
        self.save()?;
        info!("Automatic switching turned {}", on_off(enabled));
        Ok(true)
    }

    pub fn append(&mut self, role: Role, name: &str) -> Result<bool> {
        self.mutate(role, "added", name, |list| list.append(name))
    }

    pub fn remove(&mut self, role: Role, name: &str) -> Result<bool> {
        self.mutate(role, "removed", name, |list| list.remove(name))
    }

    pub fn move_up(&mut self, role: Role, name: &str) -> Result<bool> {
        self.mutate(role, "moved up", name, |list| list.move_up(name))
    }

    pub fn move_down(&mut self, role: Role, name: &str) -> Result<bool> {
        self.mutate(role, "moved down", name, |list| list.move_down(name))
    }

    fn mutate(
        &mut self,
        role: Role,
        verb: &str,
        name: &str,
        change: impl FnOnce(&mut PriorityList) -> bool,
    ) -> Result<bool> {
        let list = self.config.preferences.priority_list_mut(role);
        if !change(list) {
            debug!("Priority {} list unchanged: '{}' not {}", role, name, verb);
            return Ok(false);
        }

        self.save()?;
        info!("Priority {} '{}' {}", role, name, verb);
        Ok(true)
    }

    fn save(&self) -> Result<()> {
        self.loader.save_config(&self.config)
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reacting to settings changes and saved files.
//!
//! The host watches the filesystem and forwards events here; exactly one reaction fires per
//! event.

use crate::{
    adapter::JasmineAdapter, config::LoadedConfig, helpers::lock, settings::AdapterSettings,
};
use camino::Utf8Path;
use tracing::debug;

/// The reaction to a saved file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SaveReaction {
    /// The Jasmine config file was saved: drop the cached configuration and reload.
    ReloadConfig,

    /// A spec file was saved: reload the tree.
    Reload,

    /// Another file in the workspace folder was saved: signal the host to rerun tests.
    Autorun,

    /// The file is outside the workspace folder.
    Ignore,
}

impl SaveReaction {
    /// Classifies a saved file.
    ///
    /// `config_file` is the active Jasmine config file, and `config` the cached configuration, if
    /// any. Spec file patterns are only checked against a cached configuration.
    pub fn classify(
        path: &Utf8Path,
        workspace: &Utf8Path,
        config_file: &Utf8Path,
        config: Option<&LoadedConfig>,
    ) -> Self {
        if path == config_file {
            Self::ReloadConfig
        } else if config.is_some_and(|config| config.spec_files.is_match(path)) {
            Self::Reload
        } else if path.starts_with(workspace) {
            Self::Autorun
        } else {
            Self::Ignore
        }
    }
}

impl JasmineAdapter {
    /// Reacts to a saved file.
    ///
    /// Returns the reaction, after it has completed.
    pub async fn file_saved(&self, path: &Utf8Path) -> SaveReaction {
        let config = self.loaded_config();
        let config_file = match &config {
            Some(config) => config.config_file.clone(),
            None => self.settings().config_file(self.workspace()),
        };
        let reaction =
            SaveReaction::classify(path, self.workspace(), &config_file, config.as_deref());
        debug!(%path, ?reaction, "file saved");

        match reaction {
            SaveReaction::ReloadConfig => {
                self.invalidate_config();
                self.load().await;
            }
            SaveReaction::Reload => self.load().await,
            SaveReaction::Autorun => self.emitters.autorun(),
            SaveReaction::Ignore => {}
        }
        reaction
    }

    /// Replaces the host settings.
    ///
    /// Any change drops the cached configuration. If the change affects test discovery (see
    /// [`AdapterSettings::requires_reload`]) the tree is reloaded; otherwise the configuration is
    /// rebuilt right away.
    pub async fn update_settings(&self, settings: AdapterSettings) {
        let old = std::mem::replace(&mut *lock(&self.settings), settings.clone());
        if old == settings {
            return;
        }

        self.invalidate_config();
        if old.requires_reload(&settings) {
            debug!("settings changed, reloading tests");
            self.load().await;
        } else {
            debug!("settings changed, rebuilding configuration");
            _ = self.resolve_config();
        }
    }
}

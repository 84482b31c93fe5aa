//! Runtime context
//!
//! Resolves settings, environment overrides and global flags into the objects
//! a command needs. Precedence: flags, then environment, then settings file.

use crate::cli::args::GlobalFlags;
use crate::config::{EnvOverrides, Settings};
use crate::distro::DistroPolicy;
use crate::error::{OneconfError, Result};
use crate::hosts::HostIdentity;
use crate::packages;
use crate::remote::http::DEFAULT_TIMEOUT;
use crate::remote::{HttpCatalog, RemoteCatalog, SiloCatalog};
use crate::service::OneConf;
use std::path::PathBuf;

pub struct RuntimeContext {
    pub settings: Settings,
    pub env: EnvOverrides,
    pub cache_root: PathBuf,
}

impl RuntimeContext {
    pub fn load(global: &GlobalFlags) -> Result<Self> {
        let env = EnvOverrides::from_env();
        Self::with_env(global, env)
    }

    pub fn with_env(global: &GlobalFlags, env: EnvOverrides) -> Result<Self> {
        let mut settings = match &global.settings {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };
        settings.apply_env(&env);
        if let Some(dir) = &global.cache_dir {
            settings.cache_dir = Some(dir.clone());
        }
        let cache_root = settings.resolved_cache_dir()?;

        Ok(Self {
            settings,
            env,
            cache_root,
        })
    }

    pub fn identity(&self) -> HostIdentity {
        match &self.env.host {
            Some(identity) => identity.clone(),
            None => HostIdentity::detect(),
        }
    }

    pub fn policy(&self) -> Result<DistroPolicy> {
        match &self.settings.distro {
            Some(key) => DistroPolicy::for_key(key),
            None => DistroPolicy::detect(),
        }
    }

    pub fn open(&self) -> Result<OneConf> {
        let identity = self.identity();
        tracing::debug!(
            "Opening cache {} for host {} ({})",
            self.cache_root.display(),
            identity.hostid,
            identity.hostname
        );
        OneConf::open(
            self.cache_root.clone(),
            &identity,
            self.policy()?,
            packages::create_source(&self.settings.package_source),
        )
    }

    /// The configured catalog; a silo file wins over the web service.
    pub fn catalog(&self) -> Result<Box<dyn RemoteCatalog>> {
        if let Some(path) = &self.settings.silo_path {
            return Ok(Box::new(SiloCatalog::new(path.clone())));
        }
        if let Some(url) = &self.settings.catalog_url {
            let catalog =
                HttpCatalog::new(url, self.settings.catalog_token.clone(), DEFAULT_TIMEOUT)?;
            return Ok(Box::new(catalog));
        }
        Err(OneconfError::ConfigError(
            "No catalog configured. Set 'catalog-url' or 'silo-path' in the settings file"
                .to_string(),
        ))
    }

    /// Initial network state for the scheduler; assumed up unless told otherwise.
    pub fn network_available(&self) -> bool {
        self.env.net_connected.unwrap_or(true)
    }

    /// Initial credential state; a silo catalog needs none.
    pub fn credentials_available(&self) -> bool {
        self.env.sso_credential.unwrap_or_else(|| {
            self.settings.silo_path.is_some() || self.settings.catalog_token.is_some()
        })
    }
}

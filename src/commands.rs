//! `install`, `update` and `list`: glue between the resolver registry, the
//! installer and the state store.

use crate::install::Installer;
use crate::resolver::ResolverRegistry;
use crate::state::State;
use crate::types::{normalize_name, BinaryInfo, LATEST_VERSION};
use anyhow::{anyhow, Result};
use console::style;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("binary {0} already installed, use update command to download newer version")]
    AlreadyInstalled(String),
    #[error("binary {0} is not installed (or not managed by azabox)")]
    NotInstalled(String),
    #[error("unknown resolver {0}")]
    UnknownResolver(String),
    #[error("no asset of {name} {version} matches this platform")]
    NoMatchingAsset { name: String, version: String },
}

/// Install each binary in turn. Every binary gets its own load/save cycle, so a
/// failure leaves the ones before it recorded.
pub async fn install_binaries(
    binary_ids: &[String],
    version: &str,
    registry: &ResolverRegistry,
    installer: &dyn Installer,
    state: &mut dyn State,
) -> Result<()> {
    for binary_id in binary_ids {
        let mut binary = BinaryInfo::parse(binary_id, version).map_err(|e| anyhow!(e))?;
        install_binary(&mut binary, registry, installer, state).await?;
    }
    Ok(())
}

async fn install_binary(
    binary: &mut BinaryInfo,
    registry: &ResolverRegistry,
    installer: &dyn Installer,
    state: &mut dyn State,
) -> Result<()> {
    tracing::debug!(
        "Installing binary {} (owner {}) version {}",
        binary.name,
        binary.owner,
        binary.version
    );
    println!(
        "Installing binary \"{}\" with version \"{}\"",
        style(&binary.full_name).bold(),
        binary.version
    );

    state.load()?;

    if state.has(&binary.full_name) {
        return Err(CommandError::AlreadyInstalled(binary.full_name.clone()).into());
    }

    let url = match resolve_with_registry(registry, binary).await {
        Some(url) => url,
        None => {
            println!(
                "Binary \"{}\" with version \"{}\" {}",
                binary.full_name,
                binary.version,
                style("not found").yellow()
            );
            return state.save();
        }
    };

    installer.install(binary, &url).await?;
    state.update_entry(binary.clone());
    state.save()
}

/// Ask every registered resolver in order; the first URL wins. Resolver errors
/// only mean "try the next one".
async fn resolve_with_registry(
    registry: &ResolverRegistry,
    binary: &mut BinaryInfo,
) -> Option<String> {
    for resolver in registry.list() {
        match resolver.resolve(binary).await {
            Ok(Some(url)) => {
                tracing::debug!("Matched resolver '{}': {}", resolver.name(), url);
                return Some(url);
            }
            Ok(None) => {
                tracing::debug!(
                    "Resolver '{}' has nothing for {}",
                    resolver.name(),
                    binary.full_name
                );
            }
            Err(e) => {
                tracing::info!(
                    "Resolver '{}' failed for {}: {:#}",
                    resolver.name(),
                    binary.full_name,
                    e
                );
            }
        }
    }
    None
}

/// Refresh the named binaries, or every managed binary when `binary_ids` is empty.
pub async fn update_binaries(
    binary_ids: &[String],
    registry: &ResolverRegistry,
    installer: &dyn Installer,
    state: &mut dyn State,
) -> Result<()> {
    state.load()?;

    let targets: Vec<BinaryInfo> = if binary_ids.is_empty() {
        let mut all: Vec<BinaryInfo> = state.entries().values().cloned().collect();
        all.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        all
    } else {
        binary_ids
            .iter()
            .map(|id| {
                state
                    .get(&normalize_name(id))
                    .cloned()
                    .ok_or_else(|| anyhow::Error::from(CommandError::NotInstalled(id.clone())))
            })
            .collect::<Result<_>>()?
    };

    for binary in targets {
        check_update(binary, registry, installer, state).await?;
    }

    state.save()
}

async fn check_update(
    mut binary: BinaryInfo,
    registry: &ResolverRegistry,
    installer: &dyn Installer,
    state: &mut dyn State,
) -> Result<()> {
    let resolver = registry
        .find(&binary.resolver)
        .ok_or_else(|| CommandError::UnknownResolver(binary.resolver.clone()))?;

    let latest = resolver.resolve_latest_version(&binary).await?;
    tracing::debug!(
        "{}: installed {}, latest {}",
        binary.display_name(),
        binary.installed_version,
        latest
    );

    if latest == binary.installed_version {
        println!("Binary {} is up to date", binary.display_name());
        return Ok(());
    }

    println!(
        "Updating {} from {} to {}",
        style(binary.display_name()).bold(),
        binary.installed_version,
        style(&latest).green()
    );

    binary.version = LATEST_VERSION.to_string();
    let url = resolver
        .resolve(&mut binary)
        .await?
        .ok_or_else(|| CommandError::NoMatchingAsset {
            name: binary.full_name.clone(),
            version: latest.clone(),
        })?;

    installer.install(&binary, &url).await?;
    state.update_entry(binary);
    Ok(())
}

/// Load the state and render the managed binaries, sorted by name.
pub fn list_binaries(state: &mut dyn State) -> Result<String> {
    state.load()?;
    Ok(render_list(state.entries().values()))
}

fn render_list<'a>(binaries: impl Iterator<Item = &'a BinaryInfo>) -> String {
    let mut binaries: Vec<&BinaryInfo> = binaries.collect();
    if binaries.is_empty() {
        return "No binary installed\n".to_string();
    }
    binaries.sort_by(|a, b| a.full_name.cmp(&b.full_name));

    let mut out = String::from("Binaries installed:\n");
    for binary in binaries {
        out.push_str(&format!("- {}\n", binary));
    }
    out
}

use crate::download::file_name_from_url;
use crate::types::*;
use std::path::Path;

const ARCHIVE_EXTS: [&str; 3] = [".tar.gz", ".tgz", ".zip"];

/// Host OS and architecture using the tokens release assets are usually named with
/// ("darwin" rather than "macos", "amd64" rather than "x86_64").
pub fn get_system_info() -> PlatformInfo {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };

    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };

    PlatformInfo {
        os: os.to_string(),
        arch: arch.to_string(),
    }
}

/// Alternative spelling of an architecture token, e.g. "x86_64" for "amd64".
pub fn normalize_arch(arch: &str) -> &str {
    match arch {
        "amd64" => "x86_64",
        "arm64" => "aarch64",
        other => other,
    }
}

pub fn is_archive_format(file_name: &str) -> bool {
    let name = file_name.to_lowercase();
    ARCHIVE_EXTS.iter().any(|ext| name.ends_with(ext))
}

/// Whether the installer can handle an artifact with this name: a known archive,
/// an extensionless file, or a Windows executable.
pub fn is_supported_format(file_name: &str) -> bool {
    if is_archive_format(file_name) {
        return true;
    }

    match Path::new(file_name).extension().and_then(|s| s.to_str()) {
        None => true,
        Some(ext) => ext.eq_ignore_ascii_case("exe"),
    }
}

/// First asset whose file name carries the host OS token, the raw or normalized arch
/// token, and a supported extension. `None` means nothing fits this platform.
pub fn find_asset_for_platform<'a>(
    assets: &'a [GitHubAsset],
    platform: &PlatformInfo,
) -> Option<&'a GitHubAsset> {
    let os = platform.os.to_lowercase();
    let arch = platform.arch.to_lowercase();
    let arch_alias = normalize_arch(&arch).to_string();

    tracing::debug!(
        "Looking for assets matching OS: '{}', ARCH: '{}' (alias '{}')",
        os,
        arch,
        arch_alias
    );

    assets.iter().find(|asset| {
        let name = file_name_from_url(&asset.browser_download_url).to_lowercase();
        let os_match = name.contains(&os);
        let arch_match = name.contains(&arch) || name.contains(&arch_alias);
        let supported = is_supported_format(&name);

        tracing::trace!(
            "Asset '{}': os_match={}, arch_match={}, supported={}",
            name,
            os_match,
            arch_match,
            supported
        );

        os_match && arch_match && supported
    })
}

use crate::config::Settings;
use crate::download::{download_file, extract_archive, file_name_from_url};
use crate::platform::is_archive_format;
use crate::types::BinaryInfo;
use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Places a resolved artifact on the user's machine.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Fetch `url`, store the executable as `<name>-<installed_version>` and point
    /// `<name>` at it. Returns the versioned path.
    async fn install(&self, binary: &BinaryInfo, url: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct LocalInstaller {
    tmp_dir: PathBuf,
    install_dir: PathBuf,
    client: reqwest::Client,
}

impl LocalInstaller {
    pub fn new(tmp_dir: impl Into<PathBuf>, install_dir: impl Into<PathBuf>) -> Self {
        LocalInstaller {
            tmp_dir: tmp_dir.into(),
            install_dir: install_dir.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.tmp_dir, &settings.bin_dir)
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn versioned_path(&self, binary: &BinaryInfo) -> PathBuf {
        // tags such as "cli/v1.0.0" must not create sub directories
        let version = binary.installed_version.replace('/', "__");
        self.install_dir
            .join(format!("{}-{}", binary.name, version))
    }

    pub fn link_path(&self, binary: &BinaryInfo) -> PathBuf {
        self.install_dir.join(&binary.name)
    }

    async fn download(&self, binary: &BinaryInfo, url: &str) -> Result<PathBuf> {
        println!(
            "Downloading {} - {}",
            style(&binary.full_name).bold(),
            binary.installed_version
        );

        fs::create_dir_all(&self.tmp_dir)
            .with_context(|| format!("Could not create {}", self.tmp_dir.display()))?;
        let scratch = self
            .tmp_dir
            .join(format!("azabox-{}", file_name_from_url(url)));

        if let Err(e) = download_file(&self.client, url, &scratch).await {
            remove_scratch(&scratch);
            return Err(e);
        }
        Ok(scratch)
    }

    fn materialize(&self, binary: &BinaryInfo, scratch: &Path) -> Result<PathBuf> {
        let scratch_name = scratch
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let extracted = if is_archive_format(&scratch_name) {
            let out = self
                .tmp_dir
                .join(format!("azabox-{}-extracted", binary.name));
            let result = extract_archive(scratch, &binary.name, &out);
            if result.is_err() {
                remove_scratch(&out);
            }
            result?;
            Some(out)
        } else {
            None
        };

        let source = extracted.as_deref().unwrap_or(scratch);
        let result = self.copy_executable(binary, source);
        if let Some(out) = &extracted {
            remove_scratch(out);
        }
        result
    }

    fn copy_executable(&self, binary: &BinaryInfo, source: &Path) -> Result<PathBuf> {
        create_install_dir(&self.install_dir)
            .with_context(|| format!("Could not create {}", self.install_dir.display()))?;

        let target = self.versioned_path(binary);
        fs::copy(source, &target).with_context(|| {
            format!("Could not copy {} to {}", source.display(), target.display())
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(0o755))?;
        }

        tracing::debug!(
            "Installed {} {} at {}",
            binary.name,
            binary.installed_version,
            target.display()
        );
        Ok(target)
    }

    fn activate(&self, binary: &BinaryInfo, target: &Path) -> Result<()> {
        let link = self.link_path(binary);
        tracing::debug!("Creating symlink {} -> {}", link.display(), target.display());

        match fs::remove_file(&link) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Could not remove {}", link.display()))
            }
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(target, &link)?;
        #[cfg(windows)]
        std::os::windows::fs::symlink_file(target, &link)?;

        Ok(())
    }
}

#[async_trait]
impl Installer for LocalInstaller {
    async fn install(&self, binary: &BinaryInfo, url: &str) -> Result<PathBuf> {
        let scratch = self
            .download(binary, url)
            .await
            .context("download failed")?;

        let materialized = self.materialize(binary, &scratch);
        remove_scratch(&scratch);
        let target = materialized.context("install failed")?;

        self.activate(binary, &target)
            .context("symlink creation failed")?;

        println!(
            "Installed to {}",
            style(target.display()).green()
        );
        Ok(target)
    }
}

fn create_install_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o750)
            .create(path)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(path)
    }
}

fn remove_scratch(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::download::ArchiveError;
    use mockito::Server;
    use std::io::Write;
    use tempfile::TempDir;

    fn foo(version: &str) -> BinaryInfo {
        BinaryInfo {
            full_name: "foo/foo".to_string(),
            name: "foo".to_string(),
            owner: "foo".to_string(),
            version: "latest".to_string(),
            installed_version: version.to_string(),
            resolver: "github".to_string(),
        }
    }

    fn installer(dir: &TempDir) -> LocalInstaller {
        LocalInstaller::new(dir.path().join("tmp"), dir.path().join("bin"))
    }

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn scratch_files(dir: &TempDir) -> Vec<String> {
        match fs::read_dir(dir.path().join("tmp")) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_install_raw_binary() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/foo-linux-amd64")
            .with_status(200)
            .with_body("#!/bin/sh\necho foo\n")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let installer = installer(&dir);
        let binary = foo("v1.0.0");
        let url = format!("{}/foo-linux-amd64", server.url());

        let target = installer.install(&binary, &url).await.unwrap();

        assert_eq!(target, dir.path().join("bin/foo-v1.0.0"));
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "#!/bin/sh\necho foo\n"
        );

        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        let link = dir.path().join("bin/foo");
        assert_eq!(fs::read_link(&link).unwrap(), target);
        assert!(scratch_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_install_from_zip() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/foo-linux-amd64.zip")
            .with_status(200)
            .with_body(zip_bytes(&[
                ("foo-linux-amd64/README.md", "docs"),
                ("foo-linux-amd64/foo", "binary"),
            ]))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let installer = installer(&dir);
        let url = format!("{}/foo-linux-amd64.zip", server.url());

        let target = installer.install(&foo("v2.0.0"), &url).await.unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "binary");
        assert!(scratch_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_reinstall_repoints_symlink() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/foo")
            .with_status(200)
            .with_body("new")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let installer = installer(&dir);
        let url = format!("{}/foo", server.url());

        let old = installer.install(&foo("v1.0.0"), &url).await.unwrap();
        let new = installer.install(&foo("v1.1.0"), &url).await.unwrap();

        assert!(old.exists());
        assert_eq!(fs::read_link(installer.link_path(&foo("v1.1.0"))).unwrap(), new);

        // same version twice overwrites in place
        installer.install(&foo("v1.1.0"), &url).await.unwrap();
        assert_eq!(fs::read_to_string(&new).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_versioned_path_sanitizes_slashes() {
        let dir = TempDir::new().unwrap();
        let installer = installer(&dir);
        assert_eq!(
            installer.versioned_path(&foo("cli/v1.0.0")),
            dir.path().join("bin/foo-cli__v1.0.0")
        );
    }

    #[tokio::test]
    async fn test_download_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let installer = installer(&dir);
        let url = format!("{}/missing", server.url());

        let err = installer.install(&foo("v1.0.0"), &url).await.unwrap_err();

        assert_eq!(err.to_string(), "download failed");
        assert!(format!("{:#}", err).contains("404"));
        assert!(!dir.path().join("bin/foo").exists());
        assert!(scratch_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_archive_without_binary() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/bar.zip")
            .with_status(200)
            .with_body(zip_bytes(&[("bar/README.md", "docs")]))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let installer = installer(&dir);
        let url = format!("{}/bar.zip", server.url());

        let err = installer.install(&foo("v1.0.0"), &url).await.unwrap_err();

        assert_eq!(err.to_string(), "install failed");
        assert!(err
            .chain()
            .any(|cause| cause.downcast_ref::<ArchiveError>().is_some()));
        assert!(!dir.path().join("bin/foo-v1.0.0").exists());
        assert!(scratch_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_symlink_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/foo")
            .with_status(200)
            .with_body("binary")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let installer = installer(&dir);
        // a non-empty directory where the link should go cannot be removed as a file
        fs::create_dir_all(dir.path().join("bin/foo/occupied")).unwrap();

        let url = format!("{}/foo", server.url());
        let err = installer.install(&foo("v1.0.0"), &url).await.unwrap_err();

        assert_eq!(err.to_string(), "symlink creation failed");
        assert!(dir.path().join("bin/foo-v1.0.0").exists());
    }
}

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tar::Archive;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("server responded with {status}")]
    Status { status: reqwest::StatusCode },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unsupported archive format: {0}")]
    Unsupported(String),
    #[error("no matching binary found in archive for '{0}'")]
    NoMatchingBinary(String),
}

/// Last path segment of a URL, ignoring any query string.
pub fn file_name_from_url(raw_url: &str) -> String {
    reqwest::Url::parse(raw_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            raw_url
                .split(['?', '#'])
                .next()
                .unwrap_or(raw_url)
                .rsplit('/')
                .next()
                .unwrap_or(raw_url)
                .to_string()
        })
}

pub async fn download_file(client: &reqwest::Client, url: &str, local_path: &Path) -> Result<()> {
    tracing::info!("Downloading {} to {}", url, local_path.display());

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status { status }.into());
    }

    let total_size = response.content_length().unwrap_or(0);
    let filename = local_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::with_template(
            "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {}", filename));

    let mut file = fs::File::create(local_path)
        .with_context(|| format!("Could not create {}", local_path.display()))?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.flush()?;

    pb.finish_and_clear();
    tracing::debug!("Downloaded {} bytes into {}", downloaded, local_path.display());
    Ok(())
}

/// Copy the single entry that best matches `binary_name` out of a zip or tar.gz
/// archive into `out_path`.
pub fn extract_archive(archive_path: &Path, binary_name: &str, out_path: &Path) -> Result<()> {
    let archive_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    tracing::info!("Extracting {} from {}...", binary_name, archive_name);

    if archive_name.ends_with(".zip") {
        extract_zip(archive_path, binary_name, out_path)
    } else if archive_name.ends_with(".tar.gz") || archive_name.ends_with(".tgz") {
        extract_tar_gz(archive_path, binary_name, out_path)
    } else {
        Err(ArchiveError::Unsupported(archive_name).into())
    }
}

fn extract_zip(archive_path: &Path, binary_name: &str, out_path: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut files = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if !entry.is_dir() {
            files.push((i, entry.name().to_string()));
        }
    }

    let index = select_entry(&files, binary_name)
        .ok_or_else(|| ArchiveError::NoMatchingBinary(binary_name.to_string()))?;
    let mut entry = archive.by_index(index)?;
    write_entry(&mut entry, out_path)
}

fn open_tar_gz(archive_path: &Path) -> Result<Archive<GzDecoder<fs::File>>> {
    let file = fs::File::open(archive_path)?;
    Ok(Archive::new(GzDecoder::new(file)))
}

fn extract_tar_gz(archive_path: &Path, binary_name: &str, out_path: &Path) -> Result<()> {
    // tar streams cannot seek back, so list first and reopen to extract
    let mut files = Vec::new();
    let mut archive = open_tar_gz(archive_path)?;
    for (i, entry) in archive.entries()?.enumerate() {
        let entry = entry?;
        if entry.header().entry_type().is_file() {
            files.push((i, entry.path()?.to_string_lossy().into_owned()));
        }
    }

    let index = select_entry(&files, binary_name)
        .ok_or_else(|| ArchiveError::NoMatchingBinary(binary_name.to_string()))?;

    let mut archive = open_tar_gz(archive_path)?;
    let mut entry = archive
        .entries()?
        .nth(index)
        .ok_or_else(|| ArchiveError::NoMatchingBinary(binary_name.to_string()))??;
    write_entry(&mut entry, out_path)
}

fn write_entry<R: Read>(entry: &mut R, out_path: &Path) -> Result<()> {
    let mut outfile = fs::File::create(out_path)
        .with_context(|| format!("Could not create {}", out_path.display()))?;
    io::copy(entry, &mut outfile)?;
    outfile.flush()?;
    Ok(())
}

fn strip_leading_component(path: &str) -> &str {
    path.split_once('/').map_or(path, |(_, rest)| rest)
}

/// Pick the archive entry to install. An entry whose basename is exactly the binary
/// name (or `<name>.exe`) wins; otherwise the first entry whose path, minus one
/// wrapping directory, contains the name. Substring matching is ambiguous when
/// several entries mention the name (e.g. `tool` and `tool.sha256`), hence the
/// exact pass first.
fn select_entry(files: &[(usize, String)], binary_name: &str) -> Option<usize> {
    let exe_name = format!("{}.exe", binary_name);

    let exact = files.iter().find(|(_, path)| {
        let base = path.rsplit('/').next().unwrap_or(path);
        base == binary_name || base == exe_name
    });

    let selected = exact.or_else(|| {
        files
            .iter()
            .find(|(_, path)| strip_leading_component(path).contains(binary_name))
    });

    if let Some((_, path)) = selected {
        tracing::debug!("Selected archive entry: {}", path);
    }
    selected.map(|(index, _)| *index)
}

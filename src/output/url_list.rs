//! Discovered URL list files
//!
//! Each job writes its deduplicated listing URLs to
//! `{urls-dir}/{city-slug}_property_urls.txt`, one per line, before the
//! detail phase starts. `--resume` reads the file back instead of
//! rediscovering.

use crate::search::CrawlJob;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Location of a job's URL list inside `urls_dir`
pub fn url_list_path(urls_dir: &Path, job: &CrawlJob) -> PathBuf {
    urls_dir.join(format!("{}_property_urls.txt", job.slug()))
}

/// Writes `urls` to `path`, replacing any previous list
///
/// The list is written to a sibling temp file and renamed into place, so a
/// crash never leaves a truncated list behind.
pub fn save_url_list(path: &Path, urls: &BTreeSet<String>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("txt.tmp");
    {
        let mut file = io::BufWriter::new(fs::File::create(&tmp)?);
        for url in urls {
            writeln!(file, "{}", url)?;
        }
        file.flush()?;
    }
    fs::rename(&tmp, path)?;

    tracing::debug!("Wrote {} URLs to {}", urls.len(), path.display());
    Ok(())
}

/// Reads a URL list, ignoring blank lines
///
/// # Returns
///
/// * `Ok(Some(urls))` - The list exists
/// * `Ok(None)` - No list at `path`
/// * `Err(io::Error)` - The list exists but cannot be read
pub fn load_url_list(path: &Path) -> io::Result<Option<BTreeSet<String>>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    Ok(Some(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}

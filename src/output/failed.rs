//! Export of URLs whose crawl did not yield usable evidence

use crate::output::stats::is_failed;
use crate::output::OutputResult;
use crate::storage::CacheEntry;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Lists the failed URLs among `urls`, in submission order, without duplicates
///
/// URLs that have no entry at all are included.
pub fn failed_urls<'a, I>(urls: I, entries: &HashMap<String, CacheEntry>) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(*url))
        .filter(|url| entries.get(*url).map_or(true, is_failed))
        .map(str::to_string)
        .collect()
}

/// Writes failed URLs to `path`, one per line
///
/// # Returns
///
/// * `Ok(usize)` - Number of URLs written
/// * `Err(OutputError)` - The file could not be written
pub fn write_failed_urls<'a, I>(
    urls: I,
    entries: &HashMap<String, CacheEntry>,
    path: &Path,
) -> OutputResult<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let failed = failed_urls(urls, entries);

    let mut writer = BufWriter::new(File::create(path)?);
    for url in &failed {
        writeln!(writer, "{}", url)?;
    }
    writer.flush()?;

    tracing::info!("Wrote {} failed URLs to {}", failed.len(), path.display());
    Ok(failed.len())
}

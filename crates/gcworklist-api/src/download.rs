// Streaming file download with percentage progress.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::Error;

/// Reduce a server-supplied name to a single path component.
///
/// Names containing separators keep only their last segment; names that are
/// empty or resolve to `.`/`..` are rejected.
pub fn sanitize_file_name(name: &str) -> Option<&str> {
    let last = name
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())?
        .trim();
    match last {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Stream `response` into `dir/file_name`, reporting progress as a percentage.
///
/// `progress` sees each new integer percentage at most once and always ends
/// at 100 on success. Without a `Content-Length` only the final 100 is
/// reported. The directory is created if missing.
pub async fn download_to_file(
    mut response: reqwest::Response,
    dir: &Path,
    file_name: &str,
    progress: &(dyn Fn(u8) + Send + Sync),
) -> Result<PathBuf, Error> {
    if !response.status().is_success() {
        return Err(Error::Status {
            status: response.status().as_u16(),
            url: response.url().to_string(),
        });
    }
    let name = sanitize_file_name(file_name)
        .ok_or_else(|| Error::parse(format!("unusable file name {file_name:?}")))?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    let mut file = File::create(&path).await?;

    let total = response.content_length().filter(|&len| len > 0);
    let mut received: u64 = 0;
    let mut reported: Option<u8> = None;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        received = received.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
        if let Some(total) = total {
            let percent = percent(received, total);
            if reported != Some(percent) && percent < 100 {
                progress(percent);
                reported = Some(percent);
            }
        }
    }
    file.flush().await?;

    progress(100);
    debug!(path = %path.display(), bytes = received, "download complete");
    Ok(path)
}

fn percent(received: u64, total: u64) -> u8 {
    u8::try_from((received.saturating_mul(100) / total).min(100)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_keep_only_the_last_segment() {
        assert_eq!(sanitize_file_name("slide.tif"), Some("slide.tif"));
        assert_eq!(
            sanitize_file_name("https://gc.example/media/images/a/slide.mha"),
            Some("slide.mha")
        );
        assert_eq!(sanitize_file_name("..\\..\\evil.dll"), Some("evil.dll"));
        assert_eq!(sanitize_file_name("dir/"), Some("dir"));
        assert_eq!(sanitize_file_name("../.."), None);
        assert_eq!(sanitize_file_name(""), None);
    }

    #[test]
    fn percentages_are_clamped() {
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(5, 10), 50);
        assert_eq!(percent(12, 10), 100);
    }
}

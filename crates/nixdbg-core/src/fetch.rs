//! Single-stream HTTP GET of a release tarball.
//!
//! One request, no Range, no retries. The body is written sequentially to
//! the destination file; any failure leaves a partial file the caller must
//! discard.

use crate::config::FetchConfig;
use crate::error::BootstrapError;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// libcurl knobs for the download.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// Abort when slower than this many bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for FetchOptions {
    fn from(cfg: &FetchConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            timeout: Duration::from_secs(cfg.timeout_secs),
            low_speed_limit: cfg.low_speed_limit,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
            user_agent: format!("nixdbg/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Downloads `url` into `dest` (created or truncated). Returns bytes written.
pub fn download_to_file(url: &str, dest: &Path, opts: &FetchOptions) -> Result<u64> {
    let mut file =
        File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    let mut written: u64 = 0;
    let mut write_err: Option<std::io::Error> = None;

    let curl_err = |source| BootstrapError::Download {
        url: url.to_string(),
        source,
    };

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.max_redirections(10).map_err(curl_err)?;
    easy.useragent(&opts.user_agent).map_err(curl_err)?;
    easy.connect_timeout(opts.connect_timeout).map_err(curl_err)?;
    easy.low_speed_limit(opts.low_speed_limit).map_err(curl_err)?;
    easy.low_speed_time(opts.low_speed_time).map_err(curl_err)?;
    easy.timeout(opts.timeout).map_err(curl_err)?;

    tracing::info!(url, dest = %dest.display(), "downloading");
    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match file.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    write_err = Some(e);
                    Ok(0) // abort transfer
                }
            })
            .map_err(curl_err)?;
        transfer.perform()
    };

    if let Some(e) = write_err {
        return Err(e).with_context(|| format!("failed writing {}", dest.display()));
    }
    performed.map_err(curl_err)?;

    let code = easy.response_code().map_err(curl_err)?;
    if !(200..300).contains(&code) {
        return Err(BootstrapError::Http {
            url: url.to_string(),
            code,
        }
        .into());
    }

    file.flush()
        .with_context(|| format!("failed flushing {}", dest.display()))?;
    tracing::info!(bytes = written, "download complete");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let cfg = FetchConfig {
            connect_timeout_secs: 3,
            timeout_secs: 40,
            low_speed_limit: 10,
            low_speed_time_secs: 5,
        };
        let opts = FetchOptions::from(&cfg);
        assert_eq!(opts.connect_timeout, Duration::from_secs(3));
        assert_eq!(opts.timeout, Duration::from_secs(40));
        assert_eq!(opts.low_speed_limit, 10);
        assert!(opts.user_agent.starts_with("nixdbg/"));
    }

    #[test]
    fn unreachable_host_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        // Port 9 on loopback: nothing listens, connection is refused.
        let err = download_to_file(
            "http://127.0.0.1:9/nix.tar.xz",
            &dir.path().join("out"),
            &FetchOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BootstrapError>(),
            Some(BootstrapError::Download { .. })
        ));
    }
}

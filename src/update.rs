use crate::{state::keys, store::Store};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const RELEASES_URL: &str = "https://api.github.com/repos/arcadesmith/arcadesmith/releases/latest";
const USER_AGENT: &str = "arcadesmith";
const CHECK_INTERVAL_SECS: i64 = 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Idle,
    UpToDate,
    Available(String),
    Failed(String),
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    prerelease: bool,
}

/// Check at most once per day, recording the attempt timestamp through the
/// store so restarts do not re-poll.
pub fn maybe_check(store: &Store, current_version: &str) -> UpdateStatus {
    let last: i64 = store.get(keys::LAST_UPDATE_CHECK, 0);
    let now = epoch_seconds();
    if now - last < CHECK_INTERVAL_SECS {
        return UpdateStatus::Idle;
    }
    if let Err(err) = store.set(keys::LAST_UPDATE_CHECK, &now) {
        tracing::warn!(%err, "failed to record update check time");
    }
    match check(current_version) {
        Ok(Some(version)) => UpdateStatus::Available(version),
        Ok(None) => UpdateStatus::UpToDate,
        Err(err) => {
            tracing::debug!(%err, "update check failed");
            UpdateStatus::Failed(err.to_string())
        }
    }
}

fn check(current_version: &str) -> Result<Option<String>> {
    let release = fetch_latest_release()?;
    if release.prerelease {
        return Ok(None);
    }
    let latest = normalize_version(&release.tag_name);
    if is_newer_version(&latest, current_version) {
        Ok(Some(latest))
    } else {
        Ok(None)
    }
}

fn fetch_latest_release() -> Result<Release> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(10))
        .timeout_write(Duration::from_secs(10))
        .build();
    let response = agent
        .get(RELEASES_URL)
        .set("User-Agent", USER_AGENT)
        .call()
        .context("fetch latest release")?;
    let release: Release = response.into_json().context("decode release")?;
    Ok(release)
}

fn normalize_version(tag: &str) -> String {
    tag.trim_start_matches('v').to_string()
}

fn is_newer_version(latest: &str, current: &str) -> bool {
    match (parse_version(latest), parse_version(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => false,
    }
}

fn parse_version(raw: &str) -> Option<(u64, u64, u64)> {
    let raw = raw
        .trim_start_matches('v')
        .split('-')
        .next()?
        .split('+')
        .next()?;
    let mut parts = raw.split('.').map(|part| part.parse::<u64>().ok());
    let major = parts.next().flatten()?;
    let minor = parts.next().flatten()?;
    let patch = parts.next().flatten()?;
    Some((major, minor, patch))
}

fn epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

//! Target list files.
//!
//! One host or URL per line. Lines can optionally be expanded to both
//! schemes and to a list of extra ports before capture.

use crate::{Error, Result, Target};
use std::collections::HashSet;
use std::path::Path;

/// Expansion applied to each input line.
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    /// Strip any `http://`/`https://` prefix and emit both schemes.
    pub prepend_schemes: bool,
    /// Extra ports; each candidate is also emitted as `host:port` for every entry.
    pub ports: Vec<String>,
}

/// Expand a single input line into candidate URLs, in emission order.
pub fn expand_line(line: &str, opts: &ExpandOptions) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let mut hosts = if opts.prepend_schemes {
        let bare = line
            .strip_prefix("http://")
            .or_else(|| line.strip_prefix("https://"))
            .unwrap_or(line);
        vec![format!("http://{}", bare), format!("https://{}", bare)]
    } else {
        vec![line.to_string()]
    };

    if !opts.ports.is_empty() {
        let originals = hosts.clone();
        for host in &originals {
            let (prefix, rest) = match host.find("://") {
                Some(i) => host.split_at(i + 3),
                None => ("", host.as_str()),
            };
            let authority = rest.split('/').next().unwrap_or(rest);
            let bare_host = strip_port(authority);
            for port in &opts.ports {
                hosts.push(format!("{}{}:{}", prefix, bare_host, port));
            }
        }
    }

    hosts
}

// Bracketed IPv6 literals keep their colons.
fn strip_port(authority: &str) -> &str {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    authority.split(':').next().unwrap_or(authority)
}

/// Parse a whole target list, dropping duplicates but keeping first-seen order.
pub fn parse_target_list(text: &str, opts: &ExpandOptions) -> Vec<Target> {
    dedup(text.lines().flat_map(|line| expand_line(line, opts)).map(Target::from))
}

/// Drop repeated targets, keeping the first occurrence of each.
pub fn dedup(targets: impl IntoIterator<Item = Target>) -> Vec<Target> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|target| seen.insert(target.clone()))
        .collect()
}

/// Read and parse a target list file.
pub fn read_target_file(path: &Path, opts: &ExpandOptions) -> Result<Vec<Target>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::artifact_io(path, e))?;
    Ok(parse_target_list(&text, opts))
}

/// Read a port list: one port per line, trimmed, duplicates dropped.
pub fn read_port_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::artifact_io(path, e))?;
    let mut seen = HashSet::new();
    let mut ports = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.parse::<u16>().is_err() {
            return Err(Error::ConfigError(format!("invalid port '{}' in {}", line, path.display())));
        }
        if seen.insert(line.to_string()) {
            ports.push(line.to_string());
        }
    }
    Ok(ports)
}

/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core::record
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Canonical package record type plus the normalizer that
    turns raw index metadata (project info, release version,
    distribution descriptor) into one immutable record.

  Security / Safety Notes:
    Pure data handling; no I/O performed in this module.

  Dependencies:
    serde for upstream document shapes.

  Operational Scope:
    Records are built transiently during one sync cycle and
    consumed by the differ and the pending-unit builder.

  Revision History:
    2025-11-12 COD  Introduced record model and normalizer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaulting rules per field, no dynamic maps
    - Per-record failures stay per-record
    - Upstream ordering carried through untouched
============================================================*/

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Result, SynpyxError};

/// Metadata schema version stamped on every normalized record. Upstream
/// schema versioning is inconsistent across sources, so it is never copied.
pub const METADATA_VERSION: &str = "3.0";

/// Digest algorithm used as the artifact addressing key.
const DIGEST_KEY: &str = "sha256";

/// Canonical description of one distributable package file.
///
/// `filename` is globally unique within a sync target; two records sharing a
/// filename describe the same content unit. Records are never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub filename: String,
    pub packagetype: String,
    pub name: String,
    pub version: String,
    pub metadata_version: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub home_page: Option<String>,
    pub download_url: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub license: Option<String>,
    pub requires_python: Option<String>,
    pub project_url: Option<String>,
    pub platform: Option<String>,
    pub supported_platform: Option<String>,
    pub requires_dist: Vec<String>,
    pub provides_dist: Vec<String>,
    pub obsoletes_dist: Vec<String>,
    pub requires_external: Vec<String>,
    /// Download location of the distribution file.
    pub url: String,
    /// Upstream sha256 digest; absent when the index supplies none, in which
    /// case downstream integrity verification is skipped for this unit.
    pub sha256: Option<String>,
}

impl PackageRecord {
    /// Build a filename-only stub describing a unit scheduled for removal.
    /// Removers re-derive anything richer from their own storage.
    pub fn removal_stub(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            packagetype: String::new(),
            name: String::new(),
            version: String::new(),
            metadata_version: METADATA_VERSION.to_string(),
            summary: None,
            description: None,
            keywords: None,
            home_page: None,
            download_url: None,
            author: None,
            author_email: None,
            maintainer: None,
            maintainer_email: None,
            license: None,
            requires_python: None,
            project_url: None,
            platform: None,
            supported_platform: None,
            requires_dist: Vec::new(),
            provides_dist: Vec::new(),
            obsoletes_dist: Vec::new(),
            requires_external: Vec::new(),
            url: String::new(),
            sha256: None,
        }
    }
}

/// Full index response for one project: an `info` block plus a mapping of
/// version string to distribution descriptors. Release insertion order is
/// preserved so record ordering follows the upstream document.
#[derive(Debug, Deserialize)]
pub struct ProjectDocument {
    pub info: ProjectInfo,
    #[serde(default)]
    pub releases: serde_json::Map<String, serde_json::Value>,
}

/// Project-level metadata block. Every field except `name` is optional and
/// maps to an unset record field when absent.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectInfo {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub home_page: Option<String>,
    pub download_url: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub license: Option<String>,
    pub requires_python: Option<String>,
    pub project_url: Option<String>,
    pub platform: Option<String>,
    pub supported_platform: Option<String>,
    #[serde(default)]
    pub requires_dist: Option<Vec<String>>,
    #[serde(default)]
    pub provides_dist: Option<Vec<String>>,
    #[serde(default)]
    pub obsoletes_dist: Option<Vec<String>>,
    #[serde(default)]
    pub requires_external: Option<Vec<String>>,
}

/// One distribution descriptor within a release.
#[derive(Debug, Default, Deserialize)]
pub struct DistributionEntry {
    pub filename: Option<String>,
    pub packagetype: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub digests: HashMap<String, String>,
}

/// Normalize one (project, version, distribution) triple into a record.
///
/// Missing optional fields become unset values; missing dependency lists
/// become empty sequences. A missing `filename`, `packagetype`, project
/// `name`, or `url` rejects the record with a per-record error the caller
/// may skip or escalate.
pub fn normalize(
    project: &ProjectInfo,
    version: &str,
    distribution: &DistributionEntry,
) -> Result<PackageRecord> {
    let name = project
        .name
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| malformed("name", "<unnamed project>", version))?;
    let filename = distribution
        .filename
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| malformed("filename", name, version))?;
    let packagetype = distribution
        .packagetype
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| malformed("packagetype", name, version))?;
    let url = distribution
        .url
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| malformed("url", name, version))?;

    Ok(PackageRecord {
        filename: filename.to_string(),
        packagetype: packagetype.to_string(),
        name: name.to_string(),
        version: version.to_string(),
        metadata_version: METADATA_VERSION.to_string(),
        summary: project.summary.clone(),
        description: project.description.clone(),
        keywords: project.keywords.clone(),
        home_page: project.home_page.clone(),
        download_url: project.download_url.clone(),
        author: project.author.clone(),
        author_email: project.author_email.clone(),
        maintainer: project.maintainer.clone(),
        maintainer_email: project.maintainer_email.clone(),
        license: project.license.clone(),
        requires_python: project.requires_python.clone(),
        project_url: project.project_url.clone(),
        platform: project.platform.clone(),
        supported_platform: project.supported_platform.clone(),
        requires_dist: project.requires_dist.clone().unwrap_or_default(),
        provides_dist: project.provides_dist.clone().unwrap_or_default(),
        obsoletes_dist: project.obsoletes_dist.clone().unwrap_or_default(),
        requires_external: project.requires_external.clone().unwrap_or_default(),
        url: url.to_string(),
        sha256: distribution.digests.get(DIGEST_KEY).cloned(),
    })
}

fn malformed(field: &str, project: &str, version: &str) -> SynpyxError {
    SynpyxError::MalformedRecord {
        field: field.to_string(),
        context: format!("project `{project}` version {version}"),
    }
}

//! Release API client for GitHub, GitLab and Gitea

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;

use super::{Asset, FetchedPackage, RegistryClient, RemoteSpec, select_asset};
use crate::context::Context;
use crate::error::registry::authentication;
use crate::error::resolve::{fetch_failed, package_not_found};
use crate::error::runtime::operation;
use crate::error::{NccError, Result};
use crate::hash::{HASH_PREFIX, SHA256_PREFIX};
use crate::registry::{RepositoryEntry, RepositoryRegistry, RepositoryType};
use crate::vault::Vault;
use crate::version::Version;

#[derive(Debug, Deserialize)]
struct HubRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<HubAsset>,
}

#[derive(Debug, Deserialize)]
struct HubAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabRelease {
    tag_name: String,
    #[serde(default)]
    assets: LabAssets,
}

#[derive(Debug, Default, Deserialize)]
struct LabAssets {
    #[serde(default)]
    links: Vec<LabLink>,
}

#[derive(Debug, Deserialize)]
struct LabLink {
    name: String,
    url: String,
    #[serde(default)]
    direct_asset_url: Option<String>,
}

struct Release {
    version: Version,
    assets: Vec<Asset>,
}

pub struct HttpRegistryClient {
    client: Client,
    registry: RepositoryRegistry,
    vault: Vault,
}

impl HttpRegistryClient {
    pub fn new(context: &Context) -> Result<Self> {
        let client = Client::builder()
            .timeout(context.http_timeout)
            .user_agent(context.user_agent.clone())
            .build()
            .map_err(|e| operation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            registry: RepositoryRegistry::new(context),
            vault: Vault::new(context),
        })
    }

    fn releases(&self, remote: &RemoteSpec) -> Result<(RepositoryEntry, Vec<Release>)> {
        let entry = self.registry.get(&remote.registry)?;
        let url = releases_url(&entry, remote);
        let response = self.get(&entry, remote, &url)?;

        let releases = match entry.repo_type {
            RepositoryType::Github | RepositoryType::Gitea => response
                .json::<Vec<HubRelease>>()
                .map_err(|e| fetch_failed(remote.to_string(), 1, e.to_string()))?
                .into_iter()
                .filter_map(|r| {
                    let version = parse_tag(&r.tag_name)?;
                    let assets = r
                        .assets
                        .into_iter()
                        .map(|a| Asset {
                            name: a.name,
                            url: a.browser_download_url,
                            digest: a.digest,
                        })
                        .collect();
                    Some(Release { version, assets })
                })
                .collect(),
            RepositoryType::Gitlab => response
                .json::<Vec<LabRelease>>()
                .map_err(|e| fetch_failed(remote.to_string(), 1, e.to_string()))?
                .into_iter()
                .filter_map(|r| {
                    let version = parse_tag(&r.tag_name)?;
                    let assets = r
                        .assets
                        .links
                        .into_iter()
                        .map(|l| Asset {
                            name: l.name,
                            url: l.direct_asset_url.unwrap_or(l.url),
                            digest: None,
                        })
                        .collect();
                    Some(Release { version, assets })
                })
                .collect(),
        };
        Ok((entry, releases))
    }

    /// GET with the registry's credential attached, if one is stored
    fn get(&self, entry: &RepositoryEntry, remote: &RemoteSpec, url: &str) -> Result<Response> {
        let mut request = self.client.get(url).header(ACCEPT, "application/json, */*");
        if let Some(credential) = self.vault.try_retrieve(&entry.name)? {
            request = request.header(AUTHORIZATION, credential.authentication_material().expose().as_str());
        }
        tracing::debug!(url, registry = %entry.name, "GET");

        let response = request
            .send()
            .map_err(|e| fetch_failed(remote.to_string(), 1, e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(authentication(
                &entry.name,
                format!("HTTP {} from {url}", response.status()),
            )),
            StatusCode::NOT_FOUND => Err(package_not_found(remote.to_string())),
            status => Err(fetch_failed(
                remote.to_string(),
                1,
                format!("HTTP {status} from {url}"),
            )),
        }
    }

    fn download(&self, entry: &RepositoryEntry, remote: &RemoteSpec, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .get(entry, remote, url)?
            .bytes()
            .map_err(|e| fetch_failed(remote.to_string(), 1, e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Hash advertised for `asset`: its digest field, else a `.sha256`/`.blake3` sidecar
    fn advertised_hash(
        &self,
        entry: &RepositoryEntry,
        remote: &RemoteSpec,
        asset: &Asset,
        assets: &[Asset],
    ) -> Result<Option<String>> {
        if let Some(digest) = &asset.digest {
            return Ok(Some(digest.clone()));
        }
        for (suffix, prefix) in [(".sha256", SHA256_PREFIX), (".blake3", HASH_PREFIX)] {
            let sidecar = format!("{}{suffix}", asset.name);
            if let Some(found) = assets.iter().find(|a| a.name == sidecar) {
                let text = String::from_utf8_lossy(&self.download(entry, remote, &found.url)?).into_owned();
                if let Some(hex) = text.split_whitespace().next() {
                    return Ok(Some(format!("{prefix}{}", hex.to_ascii_lowercase())));
                }
            }
        }
        Ok(None)
    }
}

impl RegistryClient for HttpRegistryClient {
    fn versions(&self, remote: &RemoteSpec) -> Result<Vec<Version>> {
        let (_, releases) = self.releases(remote)?;
        Ok(releases.into_iter().map(|r| r.version).collect())
    }

    fn fetch(&self, remote: &RemoteSpec, version: &Version, prefer_static: bool) -> Result<FetchedPackage> {
        let (entry, releases) = self.releases(remote)?;
        let release = releases
            .iter()
            .find(|r| &r.version == version)
            .ok_or_else(|| package_not_found(format!("{remote}={version}")))?;
        let asset = select_asset(&release.assets, prefer_static).ok_or_else(|| {
            NccError::NotFound {
                what: "Package asset in release".to_string(),
                name: format!("{remote}={version}"),
            }
        })?;

        let advertised_hash = self.advertised_hash(&entry, remote, asset, &release.assets)?;
        let bytes = self.download(&entry, remote, &asset.url)?;
        tracing::info!(package = %remote, version = %version, asset = %asset.name, size = bytes.len(), "Downloaded");
        Ok(FetchedPackage {
            bytes,
            advertised_hash,
            url: asset.url.clone(),
        })
    }
}

fn parse_tag(tag: &str) -> Option<Version> {
    tag.trim_start_matches(['v', 'V']).parse().ok()
}

fn api_base(entry: &RepositoryEntry) -> String {
    match entry.repo_type {
        RepositoryType::Github if entry.host.eq_ignore_ascii_case("github.com") => {
            "https://api.github.com".to_string()
        }
        RepositoryType::Github => format!("{}/api/v3", entry.base_url()),
        RepositoryType::Gitea => format!("{}/api/v1", entry.base_url()),
        RepositoryType::Gitlab => format!("{}/api/v4", entry.base_url()),
    }
}

fn releases_url(entry: &RepositoryEntry, remote: &RemoteSpec) -> String {
    let base = api_base(entry);
    match entry.repo_type {
        RepositoryType::Github | RepositoryType::Gitea => {
            format!("{base}/repos/{}/{}/releases", remote.owner, remote.project)
        }
        RepositoryType::Gitlab => {
            format!("{base}/projects/{}/releases", remote.path().replace('/', "%2F"))
        }
    }
}

//! HTTP registry gateway.
//!
//! Talks to the fleet v1 API (over TCP or a unix domain socket) and the
//! etcd v2 keys API. Every request runs under a fixed timeout; when the
//! timeout fires the request future is dropped and its connection task
//! aborted, so nothing outlives the call.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, StatusCode, Uri, header};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::gateway::{BoxFuture, RegistryGateway};
use crate::types::{Machine, Unit, UnitOption, UnitState, UnitStatus};

/// Host header sent over unix sockets, where there is no authority.
const UNIX_HOST: &str = "domain-sock";

/// Where a registry listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `http://host[:port][/base]`
    Tcp { authority: String, base_path: String },
    /// `unix:///path/to.sock` (or `file://`)
    Unix { socket: PathBuf },
}

impl Endpoint {
    pub fn parse(url: &str) -> RegistryResult<Self> {
        let url = url.trim();
        let invalid = || RegistryError::InvalidEndpoint(url.to_string());

        if let Some(path) = url
            .strip_prefix("unix://")
            .or_else(|| url.strip_prefix("file://"))
        {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(Endpoint::Unix {
                socket: PathBuf::from(path),
            });
        }

        let uri: Uri = url.parse().map_err(|_| invalid())?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid());
        }
        let authority = uri.authority().ok_or_else(invalid)?;
        let port = authority.port_u16().unwrap_or(80);

        Ok(Endpoint::Tcp {
            authority: format!("{}:{}", authority.host(), port),
            base_path: uri.path().trim_end_matches('/').to_string(),
        })
    }

    /// Parse a comma-separated list of endpoints, skipping blanks.
    pub fn parse_list(urls: &str) -> RegistryResult<Vec<Self>> {
        urls.split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(Endpoint::parse)
            .collect()
    }

    fn base_path(&self) -> &str {
        match self {
            Endpoint::Tcp { base_path, .. } => base_path,
            Endpoint::Unix { .. } => "",
        }
    }

    fn describe(&self) -> String {
        match self {
            Endpoint::Tcp { authority, .. } => authority.clone(),
            Endpoint::Unix { socket } => format!("unix:{}", socket.display()),
        }
    }
}

/// Registry gateway backed by the live fleet and etcd HTTP APIs.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    fleet: Endpoint,
    /// Tried in order until one answers.
    etcd: Vec<Endpoint>,
    timeout: Duration,
}

impl HttpRegistry {
    pub fn new(fleet: Endpoint, etcd: Vec<Endpoint>, timeout: Duration) -> Self {
        Self {
            fleet,
            etcd,
            timeout,
        }
    }

    /// Build from a fleet URL and a comma-separated list of etcd URLs.
    pub fn from_urls(fleet_url: &str, etcd_urls: &str, timeout: Duration) -> RegistryResult<Self> {
        let fleet = Endpoint::parse(fleet_url)?;
        let etcd = Endpoint::parse_list(etcd_urls)?;
        if etcd.is_empty() {
            return Err(RegistryError::InvalidEndpoint(etcd_urls.to_string()));
        }
        Ok(Self::new(fleet, etcd, timeout))
    }

    async fn fetch(&self, endpoint: &Endpoint, path: &str) -> RegistryResult<(StatusCode, Bytes)> {
        let full_path = format!("{}{}", endpoint.base_path(), path);
        match tokio::time::timeout(self.timeout, send_request(endpoint, &full_path)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(endpoint = %endpoint.describe(), path = %full_path, "registry request timed out");
                Err(RegistryError::Timeout {
                    path: full_path,
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn fleet_get<T: DeserializeOwned>(&self, path: &str) -> RegistryResult<T> {
        let (status, body) = self.fetch(&self.fleet, path).await?;
        if !status.is_success() {
            return Err(RegistryError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        decode(path, &body)
    }

    /// Follow `nextPageToken` until the collection is exhausted.
    async fn fleet_collect<P: Page>(&self, resource: &str) -> RegistryResult<Vec<P::Item>> {
        let mut items = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let path = match &token {
                Some(t) => format!("/fleet/v1/{resource}?{}", page_query(t)?),
                None => format!("/fleet/v1/{resource}"),
            };
            let page: P = self.fleet_get(&path).await?;
            let (batch, next) = page.into_parts();
            items.extend(batch);

            match next {
                Some(t) if !t.is_empty() => token = Some(t),
                _ => break,
            }
        }

        debug!(%resource, count = items.len(), "fleet collection fetched");
        Ok(items)
    }

    async fn etcd_node(&self, key: &str) -> RegistryResult<EtcdNode> {
        let key = if key.starts_with('/') {
            key.to_string()
        } else {
            format!("/{key}")
        };
        let path = format!("/v2/keys{key}");
        let mut last_err = RegistryError::Unavailable("no etcd endpoint configured".to_string());

        for endpoint in &self.etcd {
            match self.fetch(endpoint, &path).await {
                Ok((StatusCode::NOT_FOUND, _)) => return Err(RegistryError::NotFound(key)),
                Ok((status, body)) if status.is_success() => {
                    let response: EtcdResponse = decode(&path, &body)?;
                    return Ok(response.node);
                }
                Ok((status, _)) => {
                    warn!(endpoint = %endpoint.describe(), status = status.as_u16(), "etcd endpoint answered with an error");
                    last_err = RegistryError::Status {
                        path: path.clone(),
                        status: status.as_u16(),
                    };
                }
                Err(e) => {
                    warn!(endpoint = %endpoint.describe(), error = %e, "etcd endpoint unreachable");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}

impl RegistryGateway for HttpRegistry {
    fn list_machines(&self) -> BoxFuture<'_, RegistryResult<Vec<Machine>>> {
        Box::pin(async move {
            let wire = self.fleet_collect::<MachinePage>("machines").await?;
            Ok(wire
                .into_iter()
                .map(|m| Machine::new(m.id, m.primary_ip, m.metadata.unwrap_or_default()))
                .collect())
        })
    }

    fn list_units(&self) -> BoxFuture<'_, RegistryResult<Vec<Unit>>> {
        Box::pin(async move {
            let wire = self.fleet_collect::<UnitPage>("units").await?;
            Ok(wire
                .into_iter()
                .map(|u| Unit {
                    name: u.name,
                    machine_id: u.machine_id,
                    desired_state: u.desired_state,
                    current_state: u.current_state,
                    options: u.options,
                })
                .collect())
        })
    }

    fn list_unit_states(&self) -> BoxFuture<'_, RegistryResult<Vec<UnitState>>> {
        Box::pin(async move {
            let wire = self.fleet_collect::<StatePage>("state").await?;
            Ok(wire
                .into_iter()
                .map(|s| UnitState {
                    name: s.name,
                    machine_id: s.machine_id,
                    systemd_load_state: s.systemd_load_state,
                    systemd_active_state: s.systemd_active_state,
                    systemd_sub_state: s.systemd_sub_state,
                })
                .collect())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, RegistryResult<String>> {
        Box::pin(async move {
            let node = self.etcd_node(key).await?;
            node.value.ok_or_else(|| RegistryError::Decode {
                path: node.key,
                reason: "key is a directory".to_string(),
            })
        })
    }

    fn list_keys<'a>(&'a self, dir: &'a str) -> BoxFuture<'a, RegistryResult<Vec<String>>> {
        Box::pin(async move {
            let node = self.etcd_node(dir).await?;
            Ok(node.nodes.into_iter().map(|n| n.key).collect())
        })
    }
}

// ── Transport ─────────────────────────────────────────────────────

/// Aborts the spawned connection driver when the request is dropped.
struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn send_request(endpoint: &Endpoint, path: &str) -> RegistryResult<(StatusCode, Bytes)> {
    let connect_err = |e: std::io::Error| RegistryError::Connect {
        endpoint: endpoint.describe(),
        reason: e.to_string(),
    };

    match endpoint {
        Endpoint::Tcp { authority, .. } => {
            let stream = tokio::net::TcpStream::connect(authority.as_str())
                .await
                .map_err(connect_err)?;
            exchange(stream, authority, path).await
        }
        #[cfg(unix)]
        Endpoint::Unix { socket } => {
            let stream = tokio::net::UnixStream::connect(socket)
                .await
                .map_err(connect_err)?;
            exchange(stream, UNIX_HOST, path).await
        }
        #[cfg(not(unix))]
        Endpoint::Unix { .. } => Err(RegistryError::InvalidEndpoint(endpoint.describe())),
    }
}

async fn exchange<S>(stream: S, host: &str, path: &str) -> RegistryResult<(StatusCode, Bytes)>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let http_err = |e: hyper::Error| RegistryError::Http(e.to_string());

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(http_err)?;

    let _guard = ConnectionGuard(tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "registry connection closed with error");
        }
    }));

    let req = Request::builder()
        .method("GET")
        .uri(path)
        .header(header::HOST, host)
        .header(header::ACCEPT, "application/json")
        .header(header::USER_AGENT, "fleetcheck/0.1")
        .body(Empty::<Bytes>::new())
        .map_err(|e| RegistryError::Http(e.to_string()))?;

    let resp = sender.send_request(req).await.map_err(http_err)?;
    let status = resp.status();
    let body = resp.into_body().collect().await.map_err(http_err)?.to_bytes();
    Ok((status, body))
}

/// Query string carrying an opaque page token.
fn page_query(token: &str) -> RegistryResult<String> {
    serde_urlencoded::to_string([("nextPageToken", token)])
        .map_err(|e| RegistryError::Http(format!("cannot encode page token: {e}")))
}

fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> RegistryResult<T> {
    serde_json::from_slice(body).map_err(|e| RegistryError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

// ── Wire formats ──────────────────────────────────────────────────

trait Page: DeserializeOwned {
    type Item;
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MachinePage {
    #[serde(default)]
    machines: Vec<WireMachine>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct WireMachine {
    id: String,
    #[serde(rename = "primaryIP", default)]
    primary_ip: String,
    metadata: Option<BTreeMap<String, String>>,
}

impl Page for MachinePage {
    type Item = WireMachine;
    fn into_parts(self) -> (Vec<WireMachine>, Option<String>) {
        (self.machines, self.next_page_token)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitPage {
    #[serde(default)]
    units: Vec<WireUnit>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUnit {
    name: String,
    #[serde(default)]
    options: Vec<UnitOption>,
    #[serde(default)]
    desired_state: UnitStatus,
    #[serde(default)]
    current_state: UnitStatus,
    #[serde(rename = "machineID", default)]
    machine_id: String,
}

impl Page for UnitPage {
    type Item = WireUnit;
    fn into_parts(self) -> (Vec<WireUnit>, Option<String>) {
        (self.units, self.next_page_token)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatePage {
    #[serde(default)]
    states: Vec<WireUnitState>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUnitState {
    name: String,
    #[serde(rename = "machineID", default)]
    machine_id: String,
    #[serde(default)]
    systemd_load_state: String,
    #[serde(default)]
    systemd_active_state: String,
    #[serde(default)]
    systemd_sub_state: String,
}

impl Page for StatePage {
    type Item = WireUnitState;
    fn into_parts(self) -> (Vec<WireUnitState>, Option<String>) {
        (self.states, self.next_page_token)
    }
}

#[derive(Deserialize)]
struct EtcdResponse {
    node: EtcdNode,
}

#[derive(Deserialize)]
struct EtcdNode {
    key: String,
    value: Option<String>,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
}

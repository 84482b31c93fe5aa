//! Web catalog client.
//!
//! Layout under the base URL:
//!
//! | call                  | route                         |
//! |-----------------------|-------------------------------|
//! | `list_machines`       | `GET machines/`               |
//! | `get_machine_logo`    | `GET machines/<id>/logo`      |
//! | `update_machine`      | `PUT machines/<id>/`          |
//! | `update_machine_logo` | `PUT machines/<id>/logo`      |
//! | `delete_machine`      | `DELETE machines/<id>/`       |
//! | `list_packages`       | `GET packages/<id>/`          |
//! | `update_packages`     | `PUT packages/<id>/`          |

use super::{RemoteCatalog, RemoteError, RemoteMachine, RemoteResult};
use crate::core::types::PackageList;
use crate::project_identity;
use crate::state::types::PackagesUpload;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const LOGO_CHECKSUM_HEADER: &str = "X-Logo-Checksum";

#[derive(Serialize)]
struct MachineUpdate<'a> {
    hostname: &'a str,
    logo_checksum: Option<&'a str>,
}

pub struct HttpCatalog {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCatalog {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }

    fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let request = request.header(
            "User-Agent",
            format!("{}-sync", project_identity::BINARY_NAME),
        );
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let message = response.text().unwrap_or_default();
        Err(status_error(status, &url, message))
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_connect() || e.is_timeout() {
        RemoteError::Offline(e.to_string())
    } else if e.is_decode() {
        RemoteError::Decode(e.to_string())
    } else {
        RemoteError::Transport(e.to_string())
    }
}

pub(crate) fn status_error(status: StatusCode, url: &str, message: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized,
        StatusCode::NOT_FOUND => RemoteError::NotFound(url.to_string()),
        _ => RemoteError::Http {
            status: status.as_u16(),
            message: message.trim().to_string(),
        },
    }
}

impl RemoteCatalog for HttpCatalog {
    fn name(&self) -> &str {
        "http"
    }

    fn list_machines(&self) -> RemoteResult<Vec<RemoteMachine>> {
        self.send(self.client.get(self.url("machines/")))?
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn get_machine_logo(&self, machine_id: &str) -> RemoteResult<Option<Vec<u8>>> {
        let route = format!("machines/{}/logo", machine_id);
        match self.send(self.client.get(self.url(&route))) {
            Ok(response) => response
                .bytes()
                .map(|bytes| Some(bytes.to_vec()))
                .map_err(transport_error),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn update_machine(
        &self,
        machine_id: &str,
        hostname: &str,
        logo_checksum: Option<&str>,
    ) -> RemoteResult<()> {
        let route = format!("machines/{}/", machine_id);
        let body = MachineUpdate {
            hostname,
            logo_checksum,
        };
        self.send(self.client.put(self.url(&route)).json(&body))?;
        Ok(())
    }

    fn update_machine_logo(
        &self,
        machine_id: &str,
        logo_checksum: &str,
        logo: &[u8],
    ) -> RemoteResult<()> {
        let route = format!("machines/{}/logo", machine_id);
        let request = self
            .client
            .put(self.url(&route))
            .header(LOGO_CHECKSUM_HEADER, logo_checksum)
            .header("Content-Type", "image/png")
            .body(logo.to_vec());
        self.send(request)?;
        Ok(())
    }

    fn delete_machine(&self, machine_id: &str) -> RemoteResult<()> {
        let route = format!("machines/{}/", machine_id);
        self.send(self.client.delete(self.url(&route)))?;
        Ok(())
    }

    fn list_packages(&self, machine_id: &str) -> RemoteResult<PackageList> {
        let route = format!("packages/{}/", machine_id);
        self.send(self.client.get(self.url(&route)))?
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn update_packages(
        &self,
        machine_id: &str,
        packages_checksum: &str,
        packages: &PackageList,
    ) -> RemoteResult<()> {
        let route = format!("packages/{}/", machine_id);
        let body = PackagesUpload {
            package_checksum: packages_checksum.to_string(),
            package_list: packages.clone(),
        };
        self.send(self.client.put(self.url(&route)).json(&body))?;
        Ok(())
    }
}

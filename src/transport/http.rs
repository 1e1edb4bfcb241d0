use crate::error::{Error, Result};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use reqwest::Proxy;
use std::env;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

const DEFAULT_USER_AGENT: &str = concat!("tooldeploy/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub(super) struct HttpClient {
    http: Client,
    user_agent: String,
}

impl HttpClient {
    pub(super) fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(proxy) = proxy.filter(|value| !value.trim().is_empty()) {
            let proxy = Proxy::all(proxy).map_err(|err| Error::fetch(proxy, err))?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|err| Error::fetch("<http client>", err))?;
        let user_agent = env::var("TOOLDEPLOY_USER_AGENT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Ok(Self { http, user_agent })
    }

    /// Stream `url` into `dest` through a `.download` sibling, renamed on success.
    pub(super) fn download(&self, url: &str, dest: &Path) -> Result<()> {
        debug!(url, dest = %dest.display(), "downloading");

        let mut response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|err| Error::fetch(url, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<unavailable>".to_string());
            return Err(Error::fetch(url, format!("server returned {status}: {body}")));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| Error::io("create download directory", parent, err))?;
        }

        let temp_path = dest.with_extension("download");
        let mut file = File::create(&temp_path)
            .map_err(|err| Error::io("create download file", &temp_path, err))?;

        let mut buffer = [0u8; 8192];
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|err| Error::fetch(url, err))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .map_err(|err| Error::io("write download", &temp_path, err))?;
        }

        file.flush()
            .map_err(|err| Error::io("flush download", &temp_path, err))?;

        fs::rename(&temp_path, dest).map_err(|err| Error::io("move download", dest, err))?;
        Ok(())
    }
}

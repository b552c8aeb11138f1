//! UAPI Unix socket client

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

use super::write_uapi;
use crate::device::DeviceConfig;
use crate::error::{Error, Result};
use crate::obfuscation::Overrides;

/// Connection to a running endpoint's configuration socket
#[derive(Debug, Clone)]
pub struct UapiSocket {
    path: PathBuf,
    timeout: Duration,
}

impl UapiSocket {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reconcile the endpoint from `previous` to `desired`.
    ///
    /// Returns the number of directive bytes sent; nothing is sent when the
    /// two snapshots need no changes.
    pub async fn reconcile(
        &self,
        previous: &DeviceConfig,
        desired: &DeviceConfig,
        overrides: &Overrides,
    ) -> Result<usize> {
        let mut directives = Vec::new();
        write_uapi(previous, desired, overrides, &mut directives)?;
        if directives.is_empty() {
            tracing::debug!("Device already up to date");
            return Ok(0);
        }
        self.set(&directives).await?;
        Ok(directives.len())
    }

    /// Send one `set=1` transaction and check the endpoint's errno
    pub async fn set(&self, directives: &[u8]) -> Result<()> {
        match timeout(self.timeout, self.set_inner(directives)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Uapi(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no reply from {}", self.path.display()),
            ))),
        }
    }

    async fn set_inner(&self, directives: &[u8]) -> Result<()> {
        let stream = UnixStream::connect(&self.path).await.map_err(Error::Uapi)?;
        let (reader, mut writer) = stream.into_split();

        let mut request = Vec::with_capacity(directives.len() + 8);
        request.extend_from_slice(b"set=1\n");
        request.extend_from_slice(directives);
        request.push(b'\n');
        writer.write_all(&request).await.map_err(Error::Uapi)?;
        writer.flush().await.map_err(Error::Uapi)?;

        let mut lines = BufReader::new(reader).lines();
        let mut errno = None;
        while let Some(line) = lines.next_line().await.map_err(Error::Uapi)? {
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.strip_prefix("errno=") {
                errno = value.trim().parse::<i64>().ok();
            }
        }

        match errno {
            Some(0) => {
                tracing::debug!("Applied {} bytes of device configuration", directives.len());
                Ok(())
            }
            Some(code) => Err(Error::UapiRejected(code)),
            None => Err(Error::Uapi(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "reply without errno",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::NodePrivate;
    use crate::obfuscation::ObfuscationParams;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    /// Fake endpoint: reads one transaction, replies with `errno`, returns the request
    async fn fake_endpoint(listener: UnixListener, errno: i64) -> String {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.ends_with(b"\n\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        stream.write_all(format!("errno={}\n\n", errno).as_bytes()).await.unwrap();
        String::from_utf8(request).unwrap()
    }

    fn desired() -> DeviceConfig {
        DeviceConfig::new(
            NodePrivate::from_bytes([1; 32]),
            vec![],
            ObfuscationParams { jc: 4, ..Default::default() },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_reconcile_sends_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wm0.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(fake_endpoint(listener, 0));

        let socket = UapiSocket::new(&path);
        let sent = socket
            .reconcile(&DeviceConfig::default(), &desired(), &Overrides::default())
            .await
            .unwrap();
        assert!(sent > 0);

        let request = server.await.unwrap();
        assert!(request.starts_with("set=1\nprivate_key="));
        assert!(request.contains("\njc=4\n"));
        assert!(request.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn test_rejected_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wm0.sock");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(fake_endpoint(listener, -22));

        let result = UapiSocket::new(&path)
            .reconcile(&DeviceConfig::default(), &desired(), &Overrides::default())
            .await;
        assert!(matches!(result, Err(Error::UapiRejected(-22))));
    }

    #[tokio::test]
    async fn test_no_changes_skips_socket() {
        let socket = UapiSocket::new("/nonexistent/wm0.sock");
        let cfg = desired();
        let sent = socket.reconcile(&cfg, &cfg, &Overrides::default()).await.unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_missing_socket() {
        let socket = UapiSocket::new("/nonexistent/wm0.sock");
        let result = socket.set(b"jc=4\n").await;
        assert!(matches!(result, Err(Error::Uapi(_))));
    }
}

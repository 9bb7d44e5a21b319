//! Plain HTTP(S) transport for the built-in `http` mount.
//!
//! The path is the URL. Reads and downloads are GETs, `exists` is a HEAD,
//! and everything that would change the remote side is unsupported.

use async_trait::async_trait;

use crate::constants::WEB_TRANSPORT;
use crate::error::{VfsError, VfsResult};
use crate::file::{FileData, FileRef};
use crate::transport::{Options, Transport};

#[derive(Debug, Clone, Default)]
pub struct WebTransport {
    client: reqwest::Client,
}

impl WebTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn unsupported(op: &'static str) -> VfsError {
        VfsError::unsupported(op, WEB_TRANSPORT)
    }
}

#[async_trait]
impl Transport for WebTransport {
    fn name(&self) -> &str {
        WEB_TRANSPORT
    }

    async fn read(&self, file: &FileRef, _options: &Options) -> VfsResult<Vec<u8>> {
        tracing::debug!(url = %file.path, "GET");
        let response = self.client.get(&file.path).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn exists(&self, file: &FileRef) -> VfsResult<bool> {
        tracing::debug!(url = %file.path, "HEAD");
        let response = self.client.head(&file.path).send().await?;
        Ok(response.status().is_success())
    }

    async fn scandir(&self, _dir: &FileRef, _options: &Options) -> VfsResult<Vec<FileData>> {
        Err(Self::unsupported("scandir"))
    }

    async fn url(&self, file: &FileRef) -> VfsResult<String> {
        Ok(file.path.clone())
    }

    async fn write(&self, _file: &FileRef, _data: &[u8], _options: &Options) -> VfsResult<()> {
        Err(Self::unsupported("write"))
    }

    async fn copy(&self, _src: &FileRef, _dest: &FileRef, _options: &Options) -> VfsResult<()> {
        Err(Self::unsupported("copy"))
    }

    async fn rename(&self, _src: &FileRef, _dest: &FileRef, _options: &Options) -> VfsResult<()> {
        Err(Self::unsupported("move"))
    }

    async fn unlink(&self, _file: &FileRef, _options: &Options) -> VfsResult<()> {
        Err(Self::unsupported("unlink"))
    }

    async fn mkdir(&self, _dir: &FileRef, _options: &Options) -> VfsResult<()> {
        Err(Self::unsupported("mkdir"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::MimeTable;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer each incoming connection with the next canned response.
    async fn serve(responses: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let mut seen = Vec::new();
                while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    seen.extend_from_slice(&buf[..n]);
                }
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_read_and_exists() {
        let base = serve(vec![
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ])
        .await;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap();
        let web = WebTransport::with_client(client);
        let file = FileRef::new(format!("{base}/hello.txt"), &MimeTable::new()).unwrap();

        assert_eq!(web.read(&file, &Options::new()).await.unwrap(), b"hello");
        assert!(web.exists(&file).await.unwrap());
        assert!(!web.exists(&file).await.unwrap());
        assert!(matches!(
            web.read(&file, &Options::new()).await,
            Err(VfsError::Http(_))
        ));
    }

    #[tokio::test]
    async fn test_mutations_unsupported() {
        let web = WebTransport::new();
        let file = FileRef::new("https://example.com/x.png", &MimeTable::new()).unwrap();
        assert_eq!(web.url(&file).await.unwrap(), "https://example.com/x.png");

        let err = web.write(&file, b"x", &Options::new()).await.unwrap_err();
        assert!(matches!(err, VfsError::Unsupported { op: "write", .. }));
        assert!(web.trash(&file).await.is_err());
        assert!(web.scandir(&file, &Options::new()).await.is_err());
    }
}

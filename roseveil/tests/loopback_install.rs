//! Integration tests for the install pipeline over real HTTP.
//!
//! These tests run the reqwest transport against a small loopback server:
//! - manifest → download → checksum → extract → commit
//! - verify/repair after a file is deleted
//! - resumption after a dropped connection and from a leftover `.part` file
//!
//! Run with: `cargo test --test loopback_install`

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use zip::write::SimpleFileOptions;

use roseveil::config::ConfigStore;
use roseveil::manager::{
    ExecutableResolver, ExecutableValidator, HttpTransport, ManagerConfig, PatchInstaller,
    PipelineEvent, ResumableDownloader, ReqwestTransport,
};
use roseveil::package::InstallRecord;

// ============================================================================
// Loopback HTTP server
// ============================================================================

#[derive(Clone)]
struct Route {
    body: Vec<u8>,
    /// Send only this many body bytes on the next request, then hang up.
    cut_once: Option<usize>,
}

/// One received request: path and `Range` header.
type Hit = (String, Option<String>);

#[derive(Clone, Default)]
struct Server {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl Server {
    async fn start() -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Self::default();

        let handle = server.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handle = handle.clone();
                tokio::spawn(async move { handle.serve(stream).await });
            }
        });
        (server, addr)
    }

    fn route(&self, path: &str, body: Vec<u8>) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                body,
                cut_once: None,
            },
        );
    }

    fn cut_next(&self, path: &str, after: usize) {
        if let Some(route) = self.routes.lock().unwrap().get_mut(path) {
            route.cut_once = Some(after);
        }
    }

    fn hits_for(&self, path: &str) -> Vec<Option<String>> {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, range)| range.clone())
            .collect()
    }

    async fn serve(&self, mut stream: TcpStream) {
        let Some((path, range)) = read_request(&mut stream).await else {
            return;
        };
        self.hits.lock().unwrap().push((path.clone(), range.clone()));

        let route = {
            let mut routes = self.routes.lock().unwrap();
            routes.get_mut(&path).map(|route| {
                let snapshot = route.clone();
                route.cut_once = None;
                snapshot
            })
        };
        let Some(route) = route else {
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
            return;
        };

        let total = route.body.len();
        let start = range
            .as_deref()
            .and_then(|r| r.strip_prefix("bytes="))
            .and_then(|r| r.trim_end_matches('-').parse::<usize>().ok());

        let (head, body) = match start {
            Some(start) if start >= total => (
                format!(
                    "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{total}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                ),
                &route.body[..0],
            ),
            Some(start) => (
                format!(
                    "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {start}-{}/{total}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    total - 1,
                    total - start
                ),
                &route.body[start..],
            ),
            None => (
                format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\nConnection: close\r\n\r\n"),
                &route.body[..],
            ),
        };

        let body = match route.cut_once {
            Some(after) => &body[..after.min(body.len())],
            None => body,
        };
        let _ = stream.write_all(head.as_bytes()).await;
        let _ = stream.write_all(body).await;
        let _ = stream.flush().await;
        let _ = stream.shutdown().await;
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<(String, Option<String>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.lines();
    let path = lines.next()?.split_whitespace().nth(1)?.to_string();
    let range = lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.eq_ignore_ascii_case("range")
            .then(|| value.trim().to_string())
    });
    Some((path, range))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn sha(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Seeded random bytes, so the archive does not compress away.
fn noise(len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(len as u64);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn transport() -> Arc<dyn HttpTransport> {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    Arc::new(ReqwestTransport::from_client(client, Duration::from_secs(5)))
}

struct Game {
    temp: TempDir,
    exe: PathBuf,
}

impl Game {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("game").join("MyGame.exe");
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, b"binary").unwrap();
        Self { temp, exe }
    }

    fn install_root(&self) -> PathBuf {
        self.exe.parent().unwrap().join("DLC").join("nsfw")
    }

    async fn installer(&self, manifest_url: String) -> PatchInstaller {
        let store = Arc::new(ConfigStore::new(self.temp.path().join("config.json")));
        let resolver =
            ExecutableResolver::new(store, ExecutableValidator::new("MyGame.exe", Vec::new()));
        resolver.select(&self.exe).await.unwrap();

        let config = ManagerConfig::new(manifest_url)
            .with_staging_dir(self.temp.path().join("staging"))
            .with_retry(2, Duration::from_millis(10));
        PatchInstaller::new(config, transport(), resolver)
    }
}

fn serve_patch(server: &Server, addr: SocketAddr, archive: &[u8], files: &[(&str, &[u8])]) {
    let files: Vec<_> = files
        .iter()
        .map(|(path, data)| serde_json::json!({"path": path, "sha256": sha(data)}))
        .collect();
    let manifest = serde_json::json!({
        "version": "1.0.1",
        "url": format!("http://{addr}/patch.zip"),
        "sha256": sha(archive),
        "files": files,
    });
    // BOM and trailing noise, as some CDNs serve it.
    let body = format!("\u{feff}{manifest}\n<!-- cached -->\n");
    server.route("/manifest.json", body.into_bytes());
    server.route("/patch.zip", archive.to_vec());
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Full install over HTTP, then repair after a file goes missing.
#[tokio::test]
async fn test_install_then_repair_over_http() {
    let (server, addr) = Server::start().await;
    let texture = noise(8 * 1024);
    let entries: [(&str, &[u8]); 2] = [("textures/skin.dds", &texture), ("readme.txt", b"notes")];
    let archive = build_zip(&entries);
    serve_patch(&server, addr, &archive, &entries);

    let game = Game::new();
    let installer = game.installer(format!("http://{addr}/manifest.json")).await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&events);
    let sink = move |event: &PipelineEvent| recorded.lock().unwrap().push(event.clone());

    let report = installer.install(&sink).await.unwrap();
    assert_eq!(report.version, "1.0.1");
    assert_eq!(report.files_extracted, 2);

    let record = InstallRecord::read(&game.install_root()).await.unwrap().unwrap();
    assert_eq!(record.version, "1.0.1");
    assert!(matches!(
        events.lock().unwrap().last(),
        Some(PipelineEvent::Done { ok: true, .. })
    ));

    let damaged = game.install_root().join("textures/skin.dds");
    std::fs::remove_file(&damaged).unwrap();

    let repair = installer.verify_and_repair(&sink).await.unwrap();
    assert!(repair.ok);
    assert!(repair.repaired);
    assert_eq!(std::fs::read(&damaged).unwrap(), texture);
    assert_eq!(server.hits_for("/patch.zip").len(), 2);
}

/// A connection dropped mid-body is continued with a ranged request.
#[tokio::test]
async fn test_dropped_connection_resumes() {
    let (server, addr) = Server::start().await;
    let payload = noise(64 * 1024);
    let entries: [(&str, &[u8]); 1] = [("data/big.bin", &payload)];
    let archive = build_zip(&entries);
    serve_patch(&server, addr, &archive, &entries);
    server.cut_next("/patch.zip", 20_000);

    let game = Game::new();
    let installer = game.installer(format!("http://{addr}/manifest.json")).await;

    installer.install(&|_: &PipelineEvent| {}).await.unwrap();

    let hits = server.hits_for("/patch.zip");
    assert_eq!(hits.len(), 2, "{hits:?}");
    assert_eq!(hits[0], None);
    assert!(hits[1].as_deref().is_some_and(|r| r.starts_with("bytes=")));
    assert_eq!(
        std::fs::read(game.install_root().join("data/big.bin")).unwrap(),
        payload
    );
}

/// A `.part` file from an earlier call is continued, not restarted.
#[tokio::test]
async fn test_downloader_continues_partial_file() {
    let (server, addr) = Server::start().await;
    let body = noise(10_000);
    server.route("/blob.bin", body.clone());

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("blob.bin");
    std::fs::write(partial_part(&dest), &body[..4_000]).unwrap();

    let outcome = ResumableDownloader::new(transport())
        .download(&format!("http://{addr}/blob.bin"), &dest, None)
        .await
        .unwrap();

    assert_eq!(outcome.sha256, sha(&body));
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(
        server.hits_for("/blob.bin"),
        vec![Some("bytes=4000-".to_string())]
    );
}

/// A manifest that is not JSON fails the install without a download.
#[tokio::test]
async fn test_unparseable_manifest_fails_fast() {
    let (server, addr) = Server::start().await;
    server.route("/manifest.json", b"<html>maintenance</html>".to_vec());

    let game = Game::new();
    let installer = game.installer(format!("http://{addr}/manifest.json")).await;

    let result = installer.install(&|_: &PipelineEvent| {}).await;
    assert!(result.is_err());
    assert_eq!(server.hits_for("/manifest.json").len(), 1);
    assert!(server.hits_for("/patch.zip").is_empty());
    assert!(!game.install_root().join("installed.json").exists());
}

fn partial_part(dest: &Path) -> PathBuf {
    roseveil::manager::download::partial_path(dest)
}

//! Shared helpers for tests that would otherwise hit the network or a real
//! `yt-dlp` install.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::Result;

/// Writes a stand-in `yt-dlp` script that answers `--dump-single-json` with
/// a fixed payload, and makes it executable.
pub(crate) fn install_ytdlp_stub(dir: &Path) -> Result<PathBuf> {
    let script = r#"#!/usr/bin/env bash
# Test stand-in for yt-dlp.
echo "WARNING: Remote components are disabled" >&2
cat <<'JSON'
{
  "id": "dQw4w9WgXcQ",
  "title": "Stub Title",
  "description": "Stub description",
  "uploader": "Stub Uploader",
  "channel": "Stub Channel",
  "view_count": 12345,
  "duration": 120
}
JSON
"#;
    write_executable(dir.join("yt-dlp"), script)
}

/// Writes a stand-in `yt-dlp` script that always fails.
pub(crate) fn install_failing_ytdlp_stub(dir: &Path) -> Result<PathBuf> {
    let script = r#"#!/usr/bin/env bash
echo "ERROR: [youtube] dQw4w9WgXcQ: Video unavailable" >&2
exit 1
"#;
    write_executable(dir.join("yt-dlp"), script)
}

fn write_executable(path: PathBuf, contents: &str) -> Result<PathBuf> {
    fs::write(&path, contents)?;
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)?;
    Ok(path)
}

/// Serves `body` as a single HTTP 200 response on an ephemeral local port
/// and returns the base URL. The listener thread exits after one request.
pub(crate) fn serve_html_once(body: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let body = body.to_owned();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}")
}

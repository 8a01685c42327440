//! Shared test utilities for integration tests
//!
//! Fake capture helpers are small POSIX shell scripts run through `/bin/sh`,
//! so no executable bit or platform helper binary is needed.

#![allow(dead_code)]

use std::{path::PathBuf, time::Duration};

use imagehost_mcp::config::ProxyConfig;
use tempfile::TempDir;

/// Extracts the request id of the line in `$line` into `$id`
const EXTRACT_ID: &str = r#"id=$(printf '%s\n' "$line" | sed -n 's/.*"id":"\([0-9]*\)".*/\1/p')"#;

/// A fake helper script living in a temporary directory
pub struct FakeHelper {
    _dir: TempDir,
    script: PathBuf,
}

impl FakeHelper {
    /// Writes a script whose body runs after the handshake has been answered
    pub fn after_handshake(body: &str) -> Self {
        let script = format!(
            "read -r line\n{EXTRACT_ID}\nprintf '{{\"id\":\"%s\",\"result\":{{\"tools\":[]}}}}\\n' \"$id\"\n{body}\n"
        );
        Self::from_script(&script)
    }

    /// Writes an arbitrary script
    pub fn from_script(script: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("fake-helper.sh");
        std::fs::write(&path, script).expect("write fake helper");
        Self {
            _dir: dir,
            script: path,
        }
    }

    /// Proxy configuration that runs this script as the helper
    pub fn config(&self) -> ProxyConfig {
        ProxyConfig {
            helper_path_override: Some(PathBuf::from("/bin/sh")),
            helper_args: vec![self.script.display().to_string()],
            handshake_timeout: Duration::from_secs(5),
            ..ProxyConfig::default()
        }
    }
}

/// Answers every request line: window listings echo the requested limit,
/// window captures are rejected, anything else returns an upload URL split
/// across two writes.
pub fn echo_loop() -> String {
    format!(
        r#"while IFS= read -r line; do
{EXTRACT_ID}
case "$line" in
  *'"list_capturable_windows"'*)
    limit=$(printf '%s\n' "$line" | sed -n 's/.*"limit":\([0-9]*\).*/\1/p')
    printf '{{"id":"%s","result":{{"limit":%s}}}}\n' "$id" "$limit" ;;
  *'"capture_and_upload_window"'*)
    printf '{{"id":"%s","error":{{"code":-32602,"message":"unknown window"}}}}\n' "$id" ;;
  *)
    printf '{{"id":"%s",' "$id"
    sleep 0.1
    printf '"result":{{"url":"https://img.example/abc.png"}}}}\n' ;;
esac
done"#
    )
}

/// Reads three window-listing requests, then answers them in reverse order,
/// echoing each request's limit
pub fn reverse_three() -> String {
    format!(
        r#"read -r l1
read -r l2
read -r l3
for line in "$l3" "$l2" "$l1"; do
  {EXTRACT_ID}
  limit=$(printf '%s\n' "$line" | sed -n 's/.*"limit":\([0-9]*\).*/\1/p')
  printf '{{"id":"%s","result":{{"limit":%s}}}}\n' "$id" "$limit"
done
cat > /dev/null"#
    )
}

/// Writes bytes that are not UTF-8 to stderr, then answers every request
/// after logging another stderr line
pub fn stderr_noise_loop() -> String {
    format!(
        r#"printf '\377\376 bad\n' >&2
while IFS= read -r line; do
{EXTRACT_ID}
printf 'handling %s\n' "$id" >&2
printf '{{"id":"%s","result":{{"ok":true}}}}\n' "$id"
done"#
    )
}

/// Answers the first request with a 64 KiB result, then answers every
/// further request normally
pub fn oversized_then_echo() -> String {
    format!(
        r#"read -r line
{EXTRACT_ID}
big=$(head -c 65536 /dev/zero | tr '\0' x)
printf '{{"id":"%s","result":"%s"}}\n' "$id" "$big"
while IFS= read -r line; do
{EXTRACT_ID}
printf '{{"id":"%s","result":{{"ok":true}}}}\n' "$id"
done"#
    )
}

/// Polls `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

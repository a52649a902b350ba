//! `qmake -query QT_HOST_BINS`: where the host tools of an installation live.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::QtError;

pub const HOST_BINS_QUERY: &str = "QT_HOST_BINS";

/// Runs `<qmake> -query QT_HOST_BINS` and returns the first line it prints.
///
/// Settles on whichever comes first: a line on stdout (success), a line on
/// stderr (failure), or the process closing without output. A clean close is
/// an empty string; a close with a failing exit status is an error.
pub async fn query_host_bins(qmake: &Path, timeout: Option<Duration>) -> Result<String, QtError> {
    let query = run_query(qmake);
    match timeout {
        Some(limit) => tokio::time::timeout(limit, query)
            .await
            .map_err(|_| QtError::HostQueryTimeout(limit.as_millis() as u64))?,
        None => query.await,
    }
}

async fn run_query(qmake: &Path) -> Result<String, QtError> {
    tracing::debug!("querying {} -query {HOST_BINS_QUERY}", qmake.display());

    let mut child = Command::new(qmake)
        .arg("-query")
        .arg(HOST_BINS_QUERY)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| QtError::HostQuery(format!("{}: {err}", qmake.display())))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| QtError::HostQuery("stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| QtError::HostQuery("stderr not captured".to_string()))?;

    let stdout_line = first_line(stdout);
    let stderr_line = first_line(stderr);
    tokio::pin!(stdout_line, stderr_line);
    let mut stderr_open = true;

    loop {
        tokio::select! {
            biased;

            line = &mut stdout_line => {
                return match line? {
                    Some(line) => Ok(line),
                    None => {
                        let status = child.wait().await?;
                        if status.success() {
                            Ok(String::new())
                        } else {
                            Err(QtError::HostQuery(format!(
                                "{} exited with {status}",
                                qmake.display()
                            )))
                        }
                    }
                };
            }
            line = &mut stderr_line, if stderr_open => match line? {
                Some(line) => return Err(QtError::HostQuery(line)),
                // stderr closed quietly; stdout decides
                None => stderr_open = false,
            },
        }
    }
}

/// First non-empty trimmed line, or `None` at end of stream.
async fn first_line<R: AsyncRead + Unpin>(reader: R) -> Result<Option<String>, QtError> {
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            return Ok(Some(line.to_string()));
        }
    }
    Ok(None)
}

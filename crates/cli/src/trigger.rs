//! Waits for the operator to end the run.

use std::fmt;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    /// A line was entered on the input.
    Enter,
    /// The process received Ctrl+C.
    Interrupt,
}

impl fmt::Display for StopTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => f.write_str("enter"),
            Self::Interrupt => f.write_str("ctrl-c"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineEvent {
    Line,
    Closed,
}

pub(crate) async fn next_line<R>(input: R) -> LineEvent
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(input);
    let mut buf = String::new();
    match reader.read_line(&mut buf).await {
        Ok(0) => LineEvent::Closed,
        Ok(_) => LineEvent::Line,
        Err(e) => {
            warn!(error = %e, "Failed to read from standard input");
            LineEvent::Closed
        }
    }
}

/// Resolve on the first line of `input` or on Ctrl+C.
///
/// A closed input (EOF, e.g. when detached from a terminal) leaves only
/// Ctrl+C as a way out, so the workload keeps running.
pub async fn wait_for_stop<R>(input: R) -> StopTrigger
where
    R: AsyncRead + Unpin,
{
    let line = async {
        match next_line(input).await {
            LineEvent::Line => StopTrigger::Enter,
            LineEvent::Closed => {
                info!("Standard input closed, press Ctrl+C to stop");
                std::future::pending().await
            }
        }
    };

    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => StopTrigger::Interrupt,
            Err(e) => {
                warn!(error = %e, "Unable to listen for Ctrl+C");
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        trigger = line => trigger,
        trigger = interrupt => trigger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn line_reports_enter() {
        assert_eq!(next_line(&b"\n"[..]).await, LineEvent::Line);
        assert_eq!(next_line(&b"quit\n"[..]).await, LineEvent::Line);
    }

    #[tokio::test]
    async fn empty_input_reports_closed() {
        assert_eq!(next_line(&b""[..]).await, LineEvent::Closed);
    }

    #[tokio::test]
    async fn enter_stops_the_run() {
        assert_eq!(wait_for_stop(&b"\n"[..]).await, StopTrigger::Enter);
    }

    #[tokio::test]
    async fn closed_input_keeps_waiting() {
        let waited = tokio::time::timeout(Duration::from_millis(50), wait_for_stop(&b""[..])).await;
        assert!(waited.is_err());
    }
}

//! Stdio transport: JSON-RPC lines in on stdin, responses out on stdout.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::ProtocolHandler;
use crate::types::{JsonRpcError, RequestId, ServerError, ServerResult};

use super::framing;

pub struct StdioTransport {
    handler: ProtocolHandler,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self { handler }
    }

    /// Serve stdin/stdout until EOF or `shutdown`.
    pub async fn run(&self) -> ServerResult<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        self.serve(reader, writer).await
    }

    /// Serve any line-oriented reader/writer pair.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> ServerResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        tracing::info!("Stdio transport started");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await.map_err(ServerError::Io)?;

            if bytes_read == 0 {
                tracing::info!("EOF on stdin, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = match framing::parse_message(trimmed) {
                Ok(msg) => self.handler.handle_message(msg).await,
                Err(e) => {
                    tracing::warn!("Parse error: {e}");
                    let error = JsonRpcError::new(RequestId::Null, e.code(), e.to_string());
                    Some(
                        serde_json::to_value(error)
                            .map_err(|e| ServerError::InternalError(e.to_string()))?,
                    )
                }
            };

            if let Some(response) = response {
                let framed = framing::frame_message(&response)?;
                writer
                    .write_all(framed.as_bytes())
                    .await
                    .map_err(ServerError::Io)?;
                writer.flush().await.map_err(ServerError::Io)?;
            }

            if self.handler.shutdown_requested() {
                tracing::info!("Shutdown complete");
                break;
            }
        }

        Ok(())
    }
}

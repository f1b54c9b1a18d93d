//! Newline-delimited JSON-RPC over stdin/stdout
//!
//! Strictly single-session: one process, one client, one server instance.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::protocol::{JsonRpcError, JsonRpcMessage, ParseError, ServerInfo};
use crate::server::McpServer;
use crate::tools::ToolRegistry;

/// Single-client transport over the process's standard streams
pub struct StdioTransport {
    server: McpServer,
}

impl StdioTransport {
    pub fn new(server_info: ServerInfo, tools: Arc<ToolRegistry>) -> Self {
        Self {
            server: McpServer::new(server_info, tools),
        }
    }

    pub fn server(&self) -> &McpServer {
        &self.server
    }

    /// Run the server on stdin/stdout until stdin closes
    pub async fn run(self) -> Result<(), TransportError> {
        info!("Serving MCP on stdio");
        self.run_with(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Run the server over any line reader and writer
    pub async fn run_with<R, W>(mut self, reader: R, mut writer: W) -> Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(reply) = self.handle_line(trimmed)? {
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        debug!("stdin closed");
        Ok(())
    }

    /// Handle one line of input, returning the serialized reply if any
    pub fn handle_line(&mut self, line: &str) -> Result<Option<String>, TransportError> {
        let reply = match JsonRpcMessage::parse(line) {
            Ok(message) => self.server.handle(message),
            Err(ParseError::Json(e)) => Some(JsonRpcError::parse_error(e.to_string()).into()),
            Err(ParseError::Invalid(e)) => {
                Some(JsonRpcError::invalid_request(None, e.to_string()).into())
            }
        };
        Ok(match reply {
            Some(message) => Some(message.to_json()?),
            None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PARSE_ERROR, INVALID_REQUEST};
    use crate::server::ServerState;
    use crate::tools::register_builtin_tools;
    use serde_json::Value;

    fn transport() -> StdioTransport {
        let mut tools = ToolRegistry::new();
        register_builtin_tools(&mut tools);
        StdioTransport::new(ServerInfo::default(), Arc::new(tools))
    }

    #[test]
    fn test_parse_error_reply() {
        let mut stdio = transport();
        let reply = stdio.handle_line("{oops").unwrap().unwrap();
        let value: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["error"]["code"], PARSE_ERROR);
        assert_eq!(value["id"], Value::Null);
    }

    #[test]
    fn test_invalid_message_reply() {
        let mut stdio = transport();
        let reply = stdio.handle_line(r#"{"id": 1}"#).unwrap().unwrap();
        let value: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["error"]["code"], INVALID_REQUEST);
    }

    #[test]
    fn test_notification_has_no_reply() {
        let mut stdio = transport();
        let reply = stdio
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_run_with_session_flow() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"[{"jsonrpc":"2.0","id":"a","method":"ping"},{"jsonrpc":"2.0","id":2,"method":"tools/list"}]"#,
            "\n",
        );
        let mut output = Vec::new();

        transport()
            .run_with(input.as_bytes(), &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(lines[1][0]["id"], "a");
        assert_eq!(lines[1][1]["result"]["tools"][0]["name"], "get_current_time");
    }

    #[test]
    fn test_starts_uninitialized() {
        assert_eq!(transport().server().state(), ServerState::Uninitialized);
    }
}

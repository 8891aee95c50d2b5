//! High-level DBGp client.

use std::net::SocketAddr;

use tokio::net::ToSocketAddrs;
use tracing::{debug, info, warn};

use crate::breakpoint::{line_number, BreakpointStore};
use crate::command::Command;
use crate::error::DbgpError;
use crate::path::{IdentityMapper, PathMapper};
use crate::property::{extract_properties, find_variable, ExtractOptions, Property, PropertyMap};
use crate::protocol;
use crate::render::{render_breakpoint_summary, render_stack, render_tree_text};
use crate::response::{check_response, InitPacket, StatusInfo};
use crate::session::{DbgpSession, ListenHandle};
use crate::xml::Element;

/// A debug run: one session plus everything derived from it.
///
/// The cached context lives and dies with the connection.
#[derive(Debug)]
pub struct DbgpClient {
    session: DbgpSession,
    options: ExtractOptions,
    mapper: Box<dyn PathMapper>,
    init: Option<InitPacket>,
    context: Option<PropertyMap>,
}

impl DbgpClient {
    /// Create a client around an idle session.
    pub fn new(session: DbgpSession, options: ExtractOptions) -> Self {
        Self {
            session,
            options,
            mapper: Box::new(IdentityMapper),
            init: None,
            context: None,
        }
    }

    /// Use `mapper` to translate between engine URIs and local paths.
    pub fn with_mapper(mut self, mapper: impl PathMapper + 'static) -> Self {
        self.mapper = Box::new(mapper);
        self
    }

    pub fn session(&self) -> &DbgpSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DbgpSession {
        &mut self.session
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn mapper(&self) -> &dyn PathMapper {
        self.mapper.as_ref()
    }

    pub fn listen_handle(&self) -> ListenHandle {
        self.session.listen_handle()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// The init packet of the current connection.
    pub fn init(&self) -> Option<&InitPacket> {
        self.init.as_ref()
    }

    /// Variables fetched by the last [`context_values`](Self::context_values).
    pub fn context(&self) -> Option<&PropertyMap> {
        self.context.as_ref()
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Wait for an engine on the session's port.
    pub async fn listen(&mut self) -> Result<Option<SocketAddr>, DbgpError> {
        self.session.listen().await
    }

    /// Connect to an engine that listens itself.
    pub async fn connect(&mut self, addr: impl ToSocketAddrs) -> Result<(), DbgpError> {
        self.session.connect(addr).await
    }

    /// Read the init packet the engine sends first.
    pub async fn accept_init(&mut self) -> Result<InitPacket, DbgpError> {
        let root = self.session.read().await?;
        let init = InitPacket::from_element(&root)?;
        info!(
            "engine session started: language={} idekey={} fileuri={}",
            init.language.as_deref().unwrap_or("?"),
            init.idekey.as_deref().unwrap_or("?"),
            init.fileuri.as_deref().unwrap_or("?"),
        );
        self.init = Some(init.clone());
        Ok(init)
    }

    /// Close the connection and forget everything derived from it.
    pub fn disconnect(&mut self) {
        self.session.clear();
        self.init = None;
        self.context = None;
    }

    /// Reset the client after a connection-family error.
    ///
    /// Returns `true` if the session was torn down; other errors are left to
    /// the caller.
    pub fn handle_error(&mut self, err: &DbgpError) -> bool {
        if !err.is_connection() {
            return false;
        }
        info!("debugger session disconnected");
        debug!("disconnect cause: {err}");
        self.disconnect();
        true
    }

    // -----------------------------------------------------------------------
    // Execution control
    // -----------------------------------------------------------------------

    pub async fn status(&mut self) -> Result<StatusInfo, DbgpError> {
        let root = self.request(&Command::new(protocol::STATUS)).await?;
        Ok(self.status_info(&root))
    }

    pub async fn run(&mut self) -> Result<StatusInfo, DbgpError> {
        self.continuation(protocol::RUN).await
    }

    pub async fn step_into(&mut self) -> Result<StatusInfo, DbgpError> {
        self.continuation(protocol::STEP_INTO).await
    }

    pub async fn step_over(&mut self) -> Result<StatusInfo, DbgpError> {
        self.continuation(protocol::STEP_OVER).await
    }

    pub async fn step_out(&mut self) -> Result<StatusInfo, DbgpError> {
        self.continuation(protocol::STEP_OUT).await
    }

    pub async fn stop(&mut self) -> Result<StatusInfo, DbgpError> {
        self.continuation(protocol::STOP).await
    }

    pub async fn detach(&mut self) -> Result<StatusInfo, DbgpError> {
        self.continuation(protocol::DETACH).await
    }

    /// Commands that resume execution invalidate the cached context.
    async fn continuation(&mut self, name: &str) -> Result<StatusInfo, DbgpError> {
        self.context = None;
        let root = self.request(&Command::new(name)).await?;
        let info = self.status_info(&root);
        if let Some(status) = &info.status {
            if status.is_finished() {
                info!("engine finished ({status:?}) after {name}");
            }
        }
        Ok(info)
    }

    fn status_info(&self, root: &Element) -> StatusInfo {
        let mut info = StatusInfo::from_element(root);
        if let Some(message) = info.break_message.as_mut() {
            message.filename = message
                .filename
                .as_deref()
                .map(|uri| self.mapper.to_local(uri));
        }
        info
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Fetch the local variables, cache them and return the rendered tree.
    pub async fn context_values(&mut self) -> Result<String, DbgpError> {
        // Top level only; deeper levels come through lazy expansion.
        let cap = Command::new(protocol::FEATURE_SET)
            .flag("n", protocol::FEATURE_MAX_CHILDREN)
            .flag("v", 0);
        self.request(&cap).await?;

        let root = self.request(&Command::new(protocol::CONTEXT_GET)).await?;
        let context = extract_properties(&root, 0, &self.options, &mut self.session).await?;
        let text = render_tree_text(&context);
        self.context = Some(context);
        Ok(text)
    }

    /// Fetch and render the call stack.
    pub async fn stack_values(&mut self) -> Result<String, DbgpError> {
        let root = self.request(&Command::new(protocol::STACK_GET)).await?;
        Ok(render_stack(&root))
    }

    /// Look up a variable in the cached context.
    pub fn variable(&self, name: &str) -> Option<&Property> {
        find_variable(self.context.as_ref()?, name)
    }

    /// Render a single cached variable with its children.
    pub fn variable_values(&self, name: &str) -> Option<String> {
        let property = self.variable(name)?;
        let mut tree = PropertyMap::new();
        tree.insert(property.fullname.clone(), property.clone());
        Some(render_tree_text(&tree))
    }

    // -----------------------------------------------------------------------
    // Breakpoints
    // -----------------------------------------------------------------------

    /// Send every enabled line breakpoint in `store` to the engine.
    ///
    /// Returns the ids the engine assigned. Keys that are not line numbers
    /// are skipped.
    pub async fn set_breakpoints(&mut self, store: &BreakpointStore) -> Result<Vec<String>, DbgpError> {
        let mut commands = Vec::new();
        for (filename, entries) in store.files() {
            let uri = self.mapper.to_server(filename);
            for (key, entry) in entries {
                if !entry.enabled {
                    continue;
                }
                let Some(line) = line_number(key).and_then(|l| u32::try_from(l).ok()) else {
                    debug!("skipping non-line breakpoint {filename}:{key}");
                    continue;
                };
                let command = match entry.expression.as_deref().filter(|e| !e.is_empty()) {
                    Some(expression) => Command::new(protocol::BREAKPOINT_SET)
                        .flag("t", protocol::BREAKPOINT_TYPE_CONDITIONAL)
                        .flag("f", &uri)
                        .flag("n", line)
                        .expression(expression),
                    None => Command::new(protocol::BREAKPOINT_SET)
                        .flag("t", protocol::BREAKPOINT_TYPE_LINE)
                        .flag("f", &uri)
                        .flag("n", line),
                };
                commands.push(command);
            }
        }

        let mut ids = Vec::with_capacity(commands.len());
        for command in &commands {
            let root = self.request(command).await?;
            match root.attr(protocol::BREAKPOINT_ID) {
                Some(id) => ids.push(id.to_string()),
                None => warn!("engine did not return a breakpoint id"),
            }
        }
        Ok(ids)
    }

    /// Summary of every breakpoint in `store`.
    pub fn breakpoint_values(&self, store: &BreakpointStore) -> String {
        render_breakpoint_summary(store)
    }

    /// Send a command and fail on an engine `<error>` response.
    async fn request(&mut self, command: &Command) -> Result<Element, DbgpError> {
        let root = self.session.request(command).await?;
        check_response(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DEFAULT_PORT;

    fn client() -> DbgpClient {
        DbgpClient::new(DbgpSession::new(DEFAULT_PORT), ExtractOptions::default())
    }

    #[test]
    fn new_client_is_disconnected() {
        let client = client();
        assert!(!client.is_connected());
        assert!(client.init().is_none());
        assert!(client.context().is_none());
        assert!(client.variable("$a").is_none());
    }

    #[test]
    fn handle_error_resets_on_connection_errors() {
        let mut client = client();
        client.context = Some(PropertyMap::new());
        assert!(client.handle_error(&DbgpError::ConnectionClosed));
        assert!(client.context().is_none());
        assert_eq!(
            client.session().state(),
            crate::session::SessionState::Closed
        );
    }

    #[test]
    fn handle_error_leaves_protocol_errors_alone() {
        let mut client = client();
        client.context = Some(PropertyMap::new());
        assert!(!client.handle_error(&DbgpError::Protocol("bad length".into())));
        assert!(client.context().is_some());
    }

    #[tokio::test]
    async fn commands_without_connection_fail() {
        let mut client = client();
        let err = client.status().await.unwrap_err();
        assert!(matches!(err, DbgpError::NotConnected));
        let err = client.context_values().await.unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn breakpoint_values_uses_summary() {
        let mut store = BreakpointStore::new();
        store.set("/a.php", 3, crate::breakpoint::BreakpointEntry::new());
        assert_eq!(client().breakpoint_values(&store), "=> /a.php\n\t|+| 3\n");
    }
}

//! Typed views over DBGp response documents.

use crate::error::DbgpError;
use crate::protocol::{self, EngineReason, EngineStatus};
use crate::xml::Element;

/// The `<init>` packet an engine sends right after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitPacket {
    pub appid: Option<String>,
    pub idekey: Option<String>,
    pub session: Option<String>,
    pub thread: Option<String>,
    pub parent: Option<String>,
    pub language: Option<String>,
    pub protocol_version: Option<String>,
    pub fileuri: Option<String>,
}

impl InitPacket {
    /// Read the init attributes. Fails when the root is not `<init>`.
    pub fn from_element(root: &Element) -> Result<Self, DbgpError> {
        if root.local_name() != protocol::ELEMENT_INIT {
            return Err(DbgpError::Protocol(format!(
                "expected <init> packet, got <{}>",
                root.name
            )));
        }
        let get = |key: &str| root.attr(key).map(str::to_string);
        Ok(Self {
            appid: get(protocol::INIT_APPID),
            idekey: get(protocol::INIT_IDEKEY),
            session: get(protocol::INIT_SESSION),
            thread: get(protocol::INIT_THREAD),
            parent: get(protocol::INIT_PARENT),
            language: get(protocol::INIT_LANGUAGE),
            protocol_version: get(protocol::INIT_PROTOCOL_VERSION),
            fileuri: get(protocol::INIT_FILEURI),
        })
    }
}

/// Status attributes carried by a command response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInfo {
    pub command: Option<String>,
    pub transaction_id: Option<u64>,
    pub status: Option<EngineStatus>,
    pub reason: Option<EngineReason>,
    /// Where execution stopped, for continuation commands that hit a break.
    pub break_message: Option<BreakMessage>,
}

impl StatusInfo {
    pub fn from_element(root: &Element) -> Self {
        Self {
            command: root.attr(protocol::ATTRIBUTE_COMMAND).map(str::to_string),
            transaction_id: root
                .attr(protocol::ATTRIBUTE_TRANSACTION_ID)
                .and_then(|id| id.trim().parse().ok()),
            status: root.attr(protocol::ATTRIBUTE_STATUS).map(EngineStatus::parse),
            reason: root.attr(protocol::ATTRIBUTE_REASON).map(EngineReason::parse),
            break_message: BreakMessage::from_response(root),
        }
    }
}

/// Break location reported in an `xdebug:message` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakMessage {
    pub filename: Option<String>,
    pub lineno: Option<u32>,
    pub exception: Option<String>,
    pub text: Option<String>,
}

impl BreakMessage {
    /// Find the break message among the response's children.
    pub fn from_response(root: &Element) -> Option<Self> {
        let message = root.child(protocol::ELEMENT_BREAKPOINT)?;
        Some(Self {
            filename: message
                .attr(protocol::BREAKPOINT_FILENAME)
                .map(str::to_string),
            lineno: message
                .attr(protocol::BREAKPOINT_LINENO)
                .and_then(|l| l.trim().parse().ok()),
            exception: message
                .attr(protocol::BREAKPOINT_EXCEPTION)
                .map(str::to_string),
            text: message.text.clone(),
        })
    }
}

/// Return the engine error carried by a response, if any.
pub fn engine_error(root: &Element) -> Option<DbgpError> {
    let error = root.children_named(protocol::ELEMENT_ERROR).next()?;
    let code = error
        .attr(protocol::ATTRIBUTE_CODE)
        .and_then(|c| c.trim().parse().ok())
        .unwrap_or(0);
    let message = error
        .children_named(protocol::ELEMENT_MESSAGE)
        .next()
        .and_then(|m| m.text.clone())
        .unwrap_or_default();
    Some(DbgpError::Engine { code, message })
}

/// Fail with the engine's error when the response carries one.
pub fn check_response(root: Element) -> Result<Element, DbgpError> {
    match engine_error(&root) {
        Some(err) => Err(err),
        None => Ok(root),
    }
}

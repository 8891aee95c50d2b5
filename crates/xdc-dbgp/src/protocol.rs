//! DBGp protocol vocabulary.
//!
//! Command names, feature names, element and attribute names used on the
//! wire, plus the engine status/reason codes.

use std::fmt;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Query the engine status.
pub const STATUS: &str = "status";
/// Read an engine feature.
pub const FEATURE_GET: &str = "feature_get";
/// Change an engine feature.
pub const FEATURE_SET: &str = "feature_set";

/// Continue until the next breakpoint or the end of the script.
pub const RUN: &str = "run";
/// Step into the next statement.
pub const STEP_INTO: &str = "step_into";
/// Step over the next statement.
pub const STEP_OVER: &str = "step_over";
/// Step out of the current scope.
pub const STEP_OUT: &str = "step_out";
/// Stop the script.
pub const STOP: &str = "stop";
/// Detach from the script and let it run to completion.
pub const DETACH: &str = "detach";

/// Create a breakpoint.
pub const BREAKPOINT_SET: &str = "breakpoint_set";
/// Read a single breakpoint.
pub const BREAKPOINT_GET: &str = "breakpoint_get";
/// Update a breakpoint.
pub const BREAKPOINT_UPDATE: &str = "breakpoint_update";
/// Remove a breakpoint.
pub const BREAKPOINT_REMOVE: &str = "breakpoint_remove";
/// List all breakpoints.
pub const BREAKPOINT_LIST: &str = "breakpoint_list";

/// List the available variable contexts.
pub const CONTEXT_NAMES: &str = "context_names";
/// Read the variables of a context.
pub const CONTEXT_GET: &str = "context_get";
/// Read the depth of the call stack.
pub const STACK_DEPTH: &str = "stack_depth";
/// Read the call stack.
pub const STACK_GET: &str = "stack_get";
/// Read a single property and its children.
pub const PROPERTY_GET: &str = "property_get";
/// Read the full value of a property.
pub const PROPERTY_VALUE: &str = "property_value";

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// Feature limiting the number of children the engine reports per property.
pub const FEATURE_MAX_CHILDREN: &str = "max_children";
/// Feature limiting how deep the engine nests properties in one response.
pub const FEATURE_MAX_DEPTH: &str = "max_depth";

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// Root element of the first packet the engine sends.
pub const ELEMENT_INIT: &str = "init";
/// Root element of every command response.
pub const ELEMENT_RESPONSE: &str = "response";
/// Break information attached to continuation responses.
pub const ELEMENT_BREAKPOINT: &str = "xdebug:message";
/// Variable/property record.
pub const ELEMENT_PROPERTY: &str = "property";
/// Stack frame record.
pub const ELEMENT_STACK: &str = "stack";
/// Error record inside a response.
pub const ELEMENT_ERROR: &str = "error";
/// Message text inside an error record.
pub const ELEMENT_MESSAGE: &str = "message";

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Engine status attribute on responses.
pub const ATTRIBUTE_STATUS: &str = "status";
/// Engine reason attribute on responses.
pub const ATTRIBUTE_REASON: &str = "reason";
/// Command echoed back on responses.
pub const ATTRIBUTE_COMMAND: &str = "command";
/// Transaction id echoed back on responses.
pub const ATTRIBUTE_TRANSACTION_ID: &str = "transaction_id";
/// Engine-defined error code.
pub const ATTRIBUTE_CODE: &str = "code";

/// Application id of the debugged process.
pub const INIT_APPID: &str = "appid";
/// IDE key the engine was started with.
pub const INIT_IDEKEY: &str = "idekey";
/// Session cookie.
pub const INIT_SESSION: &str = "session";
/// Thread id of the debugged process.
pub const INIT_THREAD: &str = "thread";
/// Parent application id.
pub const INIT_PARENT: &str = "parent";
/// Language of the debugged script.
pub const INIT_LANGUAGE: &str = "language";
/// DBGp protocol version spoken by the engine.
pub const INIT_PROTOCOL_VERSION: &str = "protocol_version";
/// URI of the script being debugged.
pub const INIT_FILEURI: &str = "fileuri";

/// Breakpoint filename.
pub const BREAKPOINT_FILENAME: &str = "filename";
/// Breakpoint line number.
pub const BREAKPOINT_LINENO: &str = "lineno";
/// Exception name reported on exception breaks.
pub const BREAKPOINT_EXCEPTION: &str = "exception";
/// Engine-assigned id in a `breakpoint_set` response.
pub const BREAKPOINT_ID: &str = "id";

/// Breakpoint type for a plain line breakpoint.
pub const BREAKPOINT_TYPE_LINE: &str = "line";
/// Breakpoint type for a line breakpoint with a condition.
pub const BREAKPOINT_TYPE_CONDITIONAL: &str = "conditional";

/// Short property name.
pub const PROPERTY_NAME: &str = "name";
/// Fully-qualified property name.
pub const PROPERTY_FULLNAME: &str = "fullname";
/// Class name of object properties.
pub const PROPERTY_CLASSNAME: &str = "classname";
/// Declared property type.
pub const PROPERTY_TYPE: &str = "type";
/// Whether the property has children.
pub const PROPERTY_CHILDREN: &str = "children";
/// Declared number of children.
pub const PROPERTY_NUMCHILDREN: &str = "numchildren";
/// Encoding of the property value.
pub const PROPERTY_ENCODING: &str = "encoding";

/// Stack level, 0 being the innermost frame.
pub const STACK_LEVEL: &str = "level";
/// Frame type (`file` or `eval`).
pub const STACK_TYPE: &str = "type";
/// Frame file URI.
pub const STACK_FILENAME: &str = "filename";
/// Frame line number.
pub const STACK_LINENO: &str = "lineno";
/// Symbolic location of the frame.
pub const STACK_WHERE: &str = "where";

// ---------------------------------------------------------------------------
// Status and reason codes
// ---------------------------------------------------------------------------

/// Engine execution status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// Before the first command; the engine has sent its init packet.
    Starting,
    /// After the script finished, before the engine shuts down.
    Stopping,
    /// The engine is no longer accepting commands.
    Stopped,
    /// The script is running.
    Running,
    /// The script is paused at a breakpoint or after a step.
    Break,
    /// A status this client does not know about.
    Unknown(String),
}

impl EngineStatus {
    /// Parse a wire status value.
    pub fn parse(value: &str) -> Self {
        match value {
            "starting" => Self::Starting,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "running" => Self::Running,
            "break" => Self::Break,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns `true` once the engine will not accept further commands.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }

    /// The wire value.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Break => "break",
            Self::Unknown(other) => other,
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason accompanying a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReason {
    /// Normal transition.
    Ok,
    /// The script hit an error.
    Error,
    /// The script was aborted.
    Aborted,
    /// The script raised an exception.
    Exception,
    /// A reason this client does not know about.
    Unknown(String),
}

impl EngineReason {
    /// Parse a wire reason value.
    pub fn parse(value: &str) -> Self {
        match value {
            "ok" => Self::Ok,
            "error" => Self::Error,
            "aborted" => Self::Aborted,
            "exception" => Self::Exception,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The wire value.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Aborted => "aborted",
            Self::Exception => "exception",
            Self::Unknown(other) => other,
        }
    }
}

impl fmt::Display for EngineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

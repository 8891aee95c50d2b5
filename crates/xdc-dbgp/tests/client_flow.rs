//! End-to-end client flows against a scripted engine on a loopback socket.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use xdc_dbgp::transport::encode_frame;
use xdc_dbgp::{
    BreakpointEntry, BreakpointStore, DbgpClient, DbgpError, DbgpSession, EngineStatus,
    ExtractOptions, MappingTable,
};

const INIT: &str = r#"<?xml version="1.0" encoding="iso-8859-1"?>
<init xmlns="urn:debugger_protocol_v1" xmlns:xdebug="http://xdebug.org/dbgp/xdebug" fileuri="file:///var/www/index.php" language="PHP" protocol_version="1.0" appid="4242" idekey="sublime.xdebug"><engine version="3.3.1"><![CDATA[Xdebug]]></engine></init>"#;

/// A parsed client command as the engine sees it.
struct Received {
    line: String,
    name: String,
    id: String,
}

impl Received {
    fn parse(line: String) -> Self {
        let mut tokens = line.split(' ');
        let name = tokens.next().unwrap_or_default().to_string();
        let id = tokens.nth(1).unwrap_or("0").to_string();
        Self { line, name, id }
    }
}

/// Spawn an engine that sends `INIT`, then answers each command with the
/// body returned by `reply`. Returning `None` closes the connection after
/// the last answer. Every command line is forwarded to the returned channel.
async fn spawn_engine<F>(reply: F) -> (SocketAddr, mpsc::UnboundedReceiver<String>)
where
    F: Fn(&Received) -> (String, bool) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(&encode_frame(INIT.as_bytes())).await.unwrap();
        serve(&mut stream, reply, tx).await;
    });
    (addr, rx)
}

async fn serve<F>(stream: &mut TcpStream, reply: F, tx: mpsc::UnboundedSender<String>)
where
    F: Fn(&Received) -> (String, bool),
{
    let mut pending = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&chunk[..n]);
        while let Some(pos) = pending.iter().position(|&b| b == 0) {
            let raw: Vec<u8> = pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            let received = Received::parse(line);
            let (body, keep_open) = reply(&received);
            let _ = tx.send(received.line.clone());
            if stream.write_all(&encode_frame(body.as_bytes())).await.is_err() {
                return;
            }
            if !keep_open {
                return;
            }
        }
    }
}

fn php_engine(cmd: &Received) -> (String, bool) {
    let id = &cmd.id;
    let body = match cmd.name.as_str() {
        "breakpoint_set" => {
            let bp = if cmd.line.contains("-n 10") { "100" } else { "101" };
            format!(r#"<response command="breakpoint_set" transaction_id="{id}" id="{bp}"/>"#)
        }
        "run" => format!(
            r#"<response xmlns:xdebug="http://xdebug.org/dbgp/xdebug" command="run" transaction_id="{id}" status="break" reason="ok"><xdebug:message filename="file:///var/www/index.php" lineno="10"></xdebug:message></response>"#
        ),
        "feature_set" => format!(
            r#"<response command="feature_set" transaction_id="{id}" feature="max_children" success="1"/>"#
        ),
        "context_get" => format!(
            r#"<response command="context_get" transaction_id="{id}" context="0">
<property name="$a" fullname="$a" type="int"><![CDATA[42]]></property>
<property name="$arr" fullname="$arr" type="array" children="1" numchildren="3"></property>
<property name="$password" fullname="$password" type="string" size="6" encoding="base64"><![CDATA[c2VjcmV0]]></property>
</response>"#
        ),
        "property_get" => format!(
            r#"<response command="property_get" transaction_id="{id}"><property name="$arr" fullname="$arr" type="array" children="1" numchildren="3" page="0" pagesize="3"><property name="0" fullname="$arr[0]" type="int"><![CDATA[1]]></property><property name="1" fullname="$arr[1]" type="string" encoding="base64"><![CDATA[dHdv]]></property><property name="2" fullname="$arr[2]" type="int"><![CDATA[3]]></property></property></response>"#
        ),
        "stack_get" => format!(
            r#"<response command="stack_get" transaction_id="{id}"><stack where="{{main}}" level="0" type="file" filename="file:///var/www/index.php" lineno="10"></stack></response>"#
        ),
        "stop" => {
            let body = format!(
                r#"<response command="stop" transaction_id="{id}" status="stopped" reason="ok"/>"#
            );
            return (body, false);
        }
        other => format!(
            r#"<response command="{other}" transaction_id="{id}"><error code="4"><message><![CDATA[unimplemented command]]></message></error></response>"#
        ),
    };
    (body, true)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}

#[tokio::test]
async fn full_debug_run() {
    let (addr, mut seen) = spawn_engine(php_engine).await;

    let mut client = DbgpClient::new(DbgpSession::new(0), ExtractOptions::default())
        .with_mapper(MappingTable::new([("/var/www", "/home/dev/site")]));
    client.connect(addr).await.unwrap();
    assert!(client.is_connected());

    let init = client.accept_init().await.unwrap();
    assert_eq!(init.language.as_deref(), Some("PHP"));
    assert_eq!(init.idekey.as_deref(), Some("sublime.xdebug"));
    assert_eq!(client.init(), Some(&init));

    // Breakpoints: two enabled line entries, one disabled, two non-line keys.
    let mut store = BreakpointStore::new();
    store.set("/home/dev/site/index.php", 10, BreakpointEntry::new());
    store.set(
        "/home/dev/site/index.php",
        14,
        BreakpointEntry::new().with_expression("$i > 3"),
    );
    store.set("/home/dev/site/index.php", 20, BreakpointEntry::new().enabled(false));
    store.set("/home/dev/site/index.php", "exception", BreakpointEntry::new());
    store.set("/home/dev/site/index.php", "+5", BreakpointEntry::new());
    let ids = client.set_breakpoints(&store).await.unwrap();
    assert_eq!(ids, ["100", "101"]);

    // Run to the first breakpoint.
    let info = client.run().await.unwrap();
    assert_eq!(info.status, Some(EngineStatus::Break));
    let message = info.break_message.unwrap();
    assert_eq!(message.filename.as_deref(), Some("/home/dev/site/index.php"));
    assert_eq!(message.lineno, Some(10));

    // Variables with one lazy expansion.
    let context = client.context_values().await.unwrap();
    assert_eq!(
        context,
        "$a = (int) 42\n\
         $arr = array[3]\n\
         \t$arr[0] = (int) 1\n\
         \t$arr[1] = (string) two\n\
         \t$arr[2] = (int) 3\n\
         $password = (string) ******\n"
    );
    assert_eq!(
        client.variable("$arr[1]").and_then(|p| p.value.as_deref()),
        Some("two")
    );
    assert_eq!(
        client.variable_values("$a").as_deref(),
        Some("$a = (int) 42\n")
    );

    let stack = client.stack_values().await.unwrap();
    assert_eq!(stack, "[0] file:///var/www/index.php.{main}:10\n");

    let info = client.stop().await.unwrap();
    assert_eq!(info.status, Some(EngineStatus::Stopped));
    assert!(client.context().is_none());

    assert_eq!(
        drain(&mut seen),
        [
            "breakpoint_set -i 1 -t line -f file:///var/www/index.php -n 10",
            "breakpoint_set -i 2 -t conditional -f file:///var/www/index.php -n 14 -- JGkgPiAz",
            "run -i 3",
            "feature_set -i 4 -n max_children -v 0",
            "context_get -i 5",
            "feature_set -i 6 -n max_children -v 3",
            "property_get -i 7 -n $arr",
            "stack_get -i 8",
            "stop -i 9",
        ]
    );

    // The engine hung up after `stop`.
    let err = client.status().await.unwrap_err();
    assert!(err.is_connection(), "got: {err}");
    assert!(client.handle_error(&err));
    assert!(!client.is_connected());
    assert!(client.init().is_none());
}

#[tokio::test]
async fn engine_errors_do_not_drop_the_session() {
    let (addr, mut seen) = spawn_engine(php_engine).await;

    let mut client = DbgpClient::new(DbgpSession::new(0), ExtractOptions::default());
    client.connect(addr).await.unwrap();
    client.accept_init().await.unwrap();

    let err = client.status().await.unwrap_err();
    match &err {
        DbgpError::Engine { code, message } => {
            assert_eq!(*code, 4);
            assert_eq!(message, "unimplemented command");
        }
        other => panic!("expected engine error, got {other:?}"),
    }
    assert!(!client.handle_error(&err));
    assert!(client.is_connected());

    // The next exchange continues with the following transaction id.
    let stack = client.stack_values().await.unwrap();
    assert!(stack.starts_with("[0] "));
    assert_eq!(drain(&mut seen), ["status -i 1", "stack_get -i 2"]);
}

#[tokio::test]
async fn malformed_frame_is_a_protocol_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"999\0<init/>\0").await.unwrap();
        let mut buf = [0u8; 64];
        let _ = stream.read(&mut buf).await;
    });

    let mut client = DbgpClient::new(DbgpSession::new(0), ExtractOptions::default());
    client.connect(addr).await.unwrap();
    let err = client.accept_init().await.unwrap_err();
    assert!(err.is_protocol(), "got: {err}");
    assert!(!client.handle_error(&err));
    assert!(client.is_connected());
}

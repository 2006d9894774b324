//! Socket.IO v4 / Engine.IO v4 text framing
//!
//! Engine.IO packet types: 0 open, 1 close, 2 ping, 3 pong, 4 message.
//! A message carries a Socket.IO packet: 0 connect, 1 disconnect,
//! 2 event, 4 connect_error. Only the default namespace is used.

use serde_json::{json, Value};

/// Engine.IO pong reply to a server ping.
pub const PONG: &str = "3";

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake; the client must now join the namespace.
    Open,
    Close,
    Ping,
    Pong,
    /// Namespace joined, auth accepted.
    Connected,
    /// Namespace join refused (bad token, server-side error).
    ConnectError(String),
    /// Server left the namespace.
    Disconnect,
    Event { name: String, payload: Value },
    /// Anything else (binary placeholders, acks, upgrades).
    Other(String),
}

/// Namespace join carrying the admin auth payload.
pub fn connect_packet(token: &str) -> String {
    format!("40{}", json!({ "role": "admin", "token": token }))
}

/// Decode one text frame.
pub fn decode(frame: &str) -> Packet {
    let mut chars = frame.chars();
    match chars.next() {
        Some('0') => Packet::Open,
        Some('1') => Packet::Close,
        Some('2') => Packet::Ping,
        Some('3') => Packet::Pong,
        Some('4') => decode_message(chars.as_str()),
        _ => Packet::Other(frame.to_string()),
    }
}

fn decode_message(body: &str) -> Packet {
    let mut chars = body.chars();
    let kind = chars.next();
    let rest = chars.as_str();
    match kind {
        Some('0') => Packet::Connected,
        Some('1') => Packet::Disconnect,
        Some('2') => decode_event(rest).unwrap_or_else(|| Packet::Other(format!("4{}", body))),
        Some('4') => Packet::ConnectError(connect_error_message(rest)),
        _ => Packet::Other(format!("4{}", body)),
    }
}

/// `["name", payload]`, optionally preceded by an ack id.
fn decode_event(rest: &str) -> Option<Packet> {
    let json_start = rest.find('[')?;
    let ack = &rest[..json_start];
    if !ack.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: Value = serde_json::from_str(&rest[json_start..]).ok()?;
    let mut items = match value {
        Value::Array(items) => items.into_iter(),
        _ => return None,
    };
    let name = items.next()?.as_str()?.to_string();
    let payload = items.next().unwrap_or(Value::Null);
    Some(Packet::Event { name, payload })
}

fn connect_error_message(rest: &str) -> String {
    serde_json::from_str::<Value>(rest)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| rest.to_string())
}

/// `ws(s)://` endpoint for an `http(s)://` API origin.
pub fn socket_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/socket.io/?EIO=4&transport=websocket", base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_engine_packets() {
        assert_eq!(decode(r#"0{"sid":"x","pingInterval":25000}"#), Packet::Open);
        assert_eq!(decode("2"), Packet::Ping);
        assert_eq!(decode("3"), Packet::Pong);
        assert_eq!(decode("1"), Packet::Close);
        assert_eq!(decode(r#"40{"sid":"abc"}"#), Packet::Connected);
        assert_eq!(decode("41"), Packet::Disconnect);
    }

    #[test]
    fn test_decode_event_with_and_without_ack() {
        let expected = Packet::Event {
            name: "presence:update".to_string(),
            payload: json!({ "user_key": "id:1", "is_online": true }),
        };
        assert_eq!(
            decode(r#"42["presence:update",{"user_key":"id:1","is_online":true}]"#),
            expected
        );
        assert_eq!(
            decode(r#"4217["presence:update",{"user_key":"id:1","is_online":true}]"#),
            expected
        );
    }

    #[test]
    fn test_connect_error_message() {
        assert_eq!(
            decode(r#"44{"message":"invalid token"}"#),
            Packet::ConnectError("invalid token".to_string())
        );
    }

    #[test]
    fn test_malformed_event_is_other() {
        assert!(matches!(decode("42{not json"), Packet::Other(_)));
        assert!(matches!(decode(""), Packet::Other(_)));
    }

    #[test]
    fn test_connect_packet_carries_admin_role() {
        let packet = connect_packet("tok");
        let body: Value = serde_json::from_str(packet.strip_prefix("40").unwrap()).unwrap();
        assert_eq!(body, json!({ "role": "admin", "token": "tok" }));
    }

    #[test]
    fn test_socket_url() {
        assert_eq!(
            socket_url("https://api.example.com/"),
            "wss://api.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_url("http://localhost:5050"),
            "ws://localhost:5050/socket.io/?EIO=4&transport=websocket"
        );
    }
}

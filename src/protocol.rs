use serde::{Deserialize, Serialize};

use crate::game::types::{Player, Segment};

// Every frame on the socket is a named event: {"event": ..., "data": ...}.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Join,
    Start,
    Input(u8),
    Redraw,
    Heartbeat,
    Disconnect,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Session(String),
    GameSettings(GameSettings),
    ModifyPlayer(PlayerInfo),
    GameState(GameStatePayload),
    Starting,
    RoundOver,
    Remove(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSettings {
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: f64,
    #[serde(rename = "lineWidth")]
    pub line_width: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    pub color: [f64; 3],
    pub score: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameStatePayload {
    pub players: Vec<PlayerSegments>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSegments {
    pub id: String,
    #[serde(rename = "missingSegments")]
    pub missing_segments: Vec<WireSegment>,
}

pub type WireSegment = [[f64; 2]; 2];

pub fn decode_client_message(text: &str) -> Option<ClientMessage> {
    serde_json::from_str(text).ok()
}

pub fn encode_segment(segment: &Segment) -> WireSegment {
    [
        [segment.start.x, segment.start.y],
        [segment.end.x, segment.end.y],
    ]
}

pub fn player_info(player: &Player) -> PlayerInfo {
    PlayerInfo {
        id: player.id.clone(),
        name: player.name.clone(),
        color: player.color,
        score: player.score,
    }
}

// Handshake colors arrive as "r,g,b" floats; anything else falls back to the
// server-side pool.
pub fn parse_color(value: &str) -> Option<[f64; 3]> {
    let mut channels = [0.0f64; 3];
    let mut parts = value.split(',');
    for channel in &mut channels {
        let part = parts.next()?.trim();
        let parsed = part.parse::<f64>().ok()?;
        if !parsed.is_finite() {
            return None;
        }
        *channel = parsed.clamp(0.0, 1.0);
    }
    if parts.next().is_some() {
        return None;
    }
    Some(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::Point;

    #[test]
    fn decodes_payload_free_events() {
        assert!(matches!(
            decode_client_message(r#"{"event":"join"}"#),
            Some(ClientMessage::Join)
        ));
        assert!(matches!(
            decode_client_message(r#"{"event":"start"}"#),
            Some(ClientMessage::Start)
        ));
        assert!(matches!(
            decode_client_message(r#"{"event":"redraw"}"#),
            Some(ClientMessage::Redraw)
        ));
        assert!(matches!(
            decode_client_message(r#"{"event":"heartbeat"}"#),
            Some(ClientMessage::Heartbeat)
        ));
        assert!(matches!(
            decode_client_message(r#"{"event":"disconnect"}"#),
            Some(ClientMessage::Disconnect)
        ));
    }

    #[test]
    fn decodes_input_direction_payload() {
        match decode_client_message(r#"{"event":"input","data":2}"#) {
            Some(ClientMessage::Input(value)) => assert_eq!(value, 2),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn malformed_events_decode_to_none() {
        assert!(decode_client_message("not json").is_none());
        assert!(decode_client_message(r#"{"event":"warp"}"#).is_none());
        assert!(decode_client_message(r#"{"event":"input","data":"up"}"#).is_none());
    }

    #[test]
    fn server_events_serialize_as_named_events() {
        let session = ServerMessage::Session("abc".to_string());
        assert_eq!(
            serde_json::to_string(&session).unwrap(),
            r#"{"event":"session","data":"abc"}"#
        );

        let starting = ServerMessage::Starting;
        assert_eq!(
            serde_json::to_string(&starting).unwrap(),
            r#"{"event":"starting"}"#
        );

        let settings = ServerMessage::GameSettings(GameSettings {
            aspect_ratio: 1.5,
            line_width: 0.002,
        });
        assert_eq!(
            serde_json::to_string(&settings).unwrap(),
            r#"{"event":"game_settings","data":{"aspectRatio":1.5,"lineWidth":0.002}}"#
        );
    }

    #[test]
    fn game_state_uses_nested_point_arrays() {
        let segment = Segment {
            start: Point { x: 0.5, y: -0.25 },
            end: Point { x: 0.75, y: -0.25 },
        };
        let message = ServerMessage::GameState(GameStatePayload {
            players: vec![PlayerSegments {
                id: "p1".to_string(),
                missing_segments: vec![encode_segment(&segment)],
            }],
        });
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"event":"game_state","data":{"players":[{"id":"p1","missingSegments":[[[0.5,-0.25],[0.75,-0.25]]]}]}}"#
        );
    }

    #[test]
    fn parses_and_clamps_handshake_colors() {
        assert_eq!(parse_color("0.25,0.5,1"), Some([0.25, 0.5, 1.0]));
        assert_eq!(parse_color(" 0 , 1 , 0 "), Some([0.0, 1.0, 0.0]));
        assert_eq!(parse_color("2,-1,0.5"), Some([1.0, 0.0, 0.5]));
        assert_eq!(parse_color("0.1,0.2"), None);
        assert_eq!(parse_color("0.1,0.2,0.3,0.4"), None);
        assert_eq!(parse_color("red,green,blue"), None);
        assert_eq!(parse_color("NaN,0,0"), None);
    }
}

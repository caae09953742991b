use medai_client::channel::{ClientMessage, ServerMessage};

#[test]
fn test_audio_chunk_serialization() {
    let msg = ClientMessage::AudioChunk {
        data: "UklGRg==".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"audio_chunk\""));
    assert!(json.contains("\"data\":\"UklGRg==\""));

    let deserialized: ClientMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, msg);
}

#[test]
fn test_control_message_serialization() {
    let json = serde_json::to_string(&ClientMessage::AudioEnd).unwrap();
    assert_eq!(json, r#"{"type":"audio_end"}"#);

    let json = serde_json::to_string(&ClientMessage::ClearTranscript).unwrap();
    assert_eq!(json, r#"{"type":"clear_transcript"}"#);
}

#[test]
fn test_transcript_deserialization() {
    let json = r#"{
        "type": "transcript",
        "text": "Patient reports",
        "session_id": "abc-123",
        "timestamp": "2026-08-05T14:30:00Z"
    }"#;

    let msg: ServerMessage = serde_json::from_str(json).unwrap();
    match msg {
        ServerMessage::Transcript {
            text,
            is_historical,
            session_id,
            timestamp,
        } => {
            assert_eq!(text, "Patient reports");
            assert!(!is_historical, "is_historical should default to false");
            assert_eq!(session_id.as_deref(), Some("abc-123"));
            assert_eq!(timestamp.as_deref(), Some("2026-08-05T14:30:00Z"));
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_transcript_historical_flag() {
    let json = r#"{"type": "transcript", "text": "full transcript", "is_historical": true}"#;

    let msg: ServerMessage = serde_json::from_str(json).unwrap();
    match msg {
        ServerMessage::Transcript { is_historical, .. } => assert!(is_historical),
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_error_deserialization() {
    let json = r#"{"type": "error", "message": "Transcription failed", "details": "model timeout"}"#;

    let msg: ServerMessage = serde_json::from_str(json).unwrap();
    match msg {
        ServerMessage::Error { message, details } => {
            assert_eq!(message, "Transcription failed");
            assert_eq!(details.as_deref(), Some("model timeout"));
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_ack_messages() {
    let msg: ServerMessage = serde_json::from_str(r#"{"type": "transcript_cleared"}"#).unwrap();
    assert_eq!(msg, ServerMessage::TranscriptCleared);

    let msg: ServerMessage =
        serde_json::from_str(r#"{"type": "warning", "message": "No audio data received"}"#)
            .unwrap();
    assert_eq!(
        msg,
        ServerMessage::Warning {
            message: "No audio data received".to_string()
        }
    );

    let msg: ServerMessage =
        serde_json::from_str(r#"{"type": "pong", "timestamp": "2026-08-05T14:30:00Z"}"#).unwrap();
    match msg {
        ServerMessage::Pong { timestamp } => {
            assert_eq!(timestamp.as_deref(), Some("2026-08-05T14:30:00Z"))
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_unknown_message_is_rejected() {
    let result = serde_json::from_str::<ServerMessage>(r#"{"type": "patient_info_updated"}"#);
    assert!(result.is_err());

    let result = serde_json::from_str::<ServerMessage>("not json at all");
    assert!(result.is_err());
}

use serde::Deserialize;

/// Inbound command on the interview socket. Raw Binary frames are audio
/// chunks and bypass this enum.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    StartInterview {
        interview_id: String,
        response_id: String,
    },

    /// Base64-encoded audio, for clients that cannot send binary frames
    SendAudioChunk { chunk_data: String },

    /// `chunk` is base64, optionally data-URI-prefixed
    SaveVideoChunk { response_id: String, chunk: String },

    EndInterview,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_interview() {
        let cmd: ClientCommand = serde_json::from_str(
            r#"{"type":"start_interview","interview_id":"i1","response_id":"r1"}"#,
        )
        .unwrap();
        assert!(matches!(
            cmd,
            ClientCommand::StartInterview { interview_id, response_id }
                if interview_id == "i1" && response_id == "r1"
        ));
    }

    #[test]
    fn parses_end_interview_without_payload() {
        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"end_interview"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::EndInterview));
    }
}

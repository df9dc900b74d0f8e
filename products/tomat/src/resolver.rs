use {
    crate::{ChatTurn, CommandDispatcher, DispatchEvent, Resource, ResourceCache, RobotCommand},
    base::log,
    inference::{ChatMessage, ChatModel, ChatRequest, InferError},
    serde::Deserialize,
    serde_json::{Value, json},
    std::sync::Arc,
};

/// Persona and resolution rules handed to the language backend.
pub const SYSTEM_PROMPT: &str = r#"You are 'Tomat', a friendly robot arm assistant that picks tomatoes.

How to answer:
1. Decide whether the user wants a tomato picked.
   - A "ripe", "red" or "good" tomato: command is "Pick the ripe tomato and put it on the bag".
   - An "unripe", "green" or "bad" tomato: command is "Pick the unripe tomato and put it on the bag".
   - Just "pick the tomato" without saying which: treat it as ripe.
   - Greetings, questions and anything else: command is null.
2. Reply with a JSON object:
   - "chat_reply": a short friendly confirmation or answer, such as "You got it! Going for the red one.". Never put the command text here.
   - "command": one of the two exact command strings above, or null.
"#;

pub const FALLBACK_REPLY: &str = "I'm having trouble connecting to my brain. Is Ollama running?";
pub const UNAVAILABLE_REPLY: &str =
    "My language backend is not available right now, so I can't take requests. Please check the server logs.";
pub const PERMISSION_DENIED_REPLY: &str =
    "My language backend refused my credentials. Please check the configured API key.";

fn model_not_found_reply(model: &str) -> String {
    format!("My language backend doesn't have the model '{model}'. Please pull it or configure another one.")
}

/// JSON schema the backend's reply must follow.
pub fn response_schema() -> Value {
    let commands: Vec<&str> = RobotCommand::ALL.iter().map(RobotCommand::as_str).collect();
    json!({
        "type": "object",
        "properties": {
            "chat_reply": {
                "type": "string",
                "description": "A friendly, conversational response to the user without technical commands."
            },
            "command": {
                "anyOf": [
                    { "type": "string", "enum": commands },
                    { "type": "null" }
                ],
                "default": null,
                "description": "Exact robot arm command, only when the user asks to pick a tomato."
            }
        },
        "required": ["chat_reply"]
    })
}

#[derive(Deserialize)]
struct RawTurn {
    chat_reply: String,
    #[serde(default)]
    command: Option<String>,
}

/// Strictly parse the backend's reply. `None` when it is not a JSON object
/// with a non-empty `chat_reply` and a known (or null) `command`.
pub fn parse_turn(text: &str) -> Option<ChatTurn> {
    let raw: RawTurn = serde_json::from_str(text).ok()?;
    if raw.chat_reply.trim().is_empty() {
        return None;
    }
    let command = match raw.command {
        None => None,
        Some(command) => Some(RobotCommand::parse(&command)?),
    };
    Some(ChatTurn {
        reply: raw.chat_reply,
        command,
    })
}

/// User-facing reply for a failed backend call. Never leaks raw error text.
pub fn diagnose(error: &InferError, model: &str) -> String {
    match error {
        InferError::Unauthorized(_) => PERMISSION_DENIED_REPLY.to_string(),
        InferError::ModelNotFound(_) => model_not_found_reply(model),
        _ => FALLBACK_REPLY.to_string(),
    }
}

/// Turns free-form utterances into replies and, when asked, robot commands.
pub struct IntentResolver<M> {
    oracle: Arc<ResourceCache<M>>,
    dispatcher: CommandDispatcher,
}

impl<M: ChatModel + Send + Sync + 'static> IntentResolver<M> {
    pub fn new(oracle: Arc<ResourceCache<M>>, dispatcher: CommandDispatcher) -> Self {
        Self { oracle, dispatcher }
    }

    /// Never fails; every problem turns into a reply without a command.
    pub async fn resolve(&self, utterance: &str) -> ChatTurn {
        log::info!("user says: {utterance:?}");
        let oracle = match self.oracle.get_or_init().await {
            Resource::Ready(oracle) => oracle,
            Resource::Unavailable => return ChatTurn::reply_only(UNAVAILABLE_REPLY),
        };

        let request = ChatRequest {
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(utterance)],
            format: Some(response_schema()),
            temperature: 0.0,
        };

        let text = match oracle.chat(&request).await {
            Ok(text) => text,
            Err(error) => {
                log::error!("{} failed: {error}", oracle.model());
                return ChatTurn::reply_only(diagnose(&error, oracle.model()));
            }
        };

        let Some(turn) = parse_turn(&text) else {
            log::warn!("unusable reply from {}: {text:?}", oracle.model());
            return ChatTurn::reply_only(FALLBACK_REPLY);
        };

        log::info!("reply: {:?}", turn.reply);
        if let Some(command) = turn.command {
            log::info!("sending command to arm: {command}");
            self.dispatcher.dispatch(DispatchEvent {
                command,
                utterance: utterance.to_string(),
            });
        }
        turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_turn_with_command() {
        let turn = parse_turn(
            r#"{"chat_reply":"On it!","command":"Pick the ripe tomato and put it on the bag"}"#,
        )
        .unwrap();
        assert_eq!(turn.reply, "On it!");
        assert_eq!(turn.command, Some(RobotCommand::PickRipe));
    }

    #[test]
    fn test_parse_turn_null_or_missing_command() {
        assert_eq!(
            parse_turn(r#"{"chat_reply":"Hi!","command":null}"#).unwrap().command,
            None
        );
        assert_eq!(parse_turn(r#"{"chat_reply":"Hi!"}"#).unwrap().command, None);
    }

    #[test]
    fn test_parse_turn_rejects_malformed() {
        let cases = [
            "",
            "not json",
            "[]",
            r#"{"command":null}"#,
            r#"{"chat_reply":"   ","command":null}"#,
            r#"{"chat_reply":42}"#,
            r#"{"chat_reply":"ok","command":"Pick every tomato"}"#,
            r#"{"chat_reply":"ok","command":7}"#,
        ];
        for case in cases {
            assert!(parse_turn(case).is_none(), "{case:?}");
        }
    }

    #[test]
    fn test_schema_lists_both_commands() {
        let schema = response_schema();
        let choices = &schema["properties"]["command"]["anyOf"][0]["enum"];
        assert_eq!(choices[0], RobotCommand::PickRipe.as_str());
        assert_eq!(choices[1], RobotCommand::PickUnripe.as_str());
    }

    #[test]
    fn test_diagnose() {
        assert_eq!(
            diagnose(&InferError::Unauthorized("401".to_string()), "m"),
            PERMISSION_DENIED_REPLY
        );
        assert!(diagnose(&InferError::ModelNotFound("m".to_string()), "qwen").contains("'qwen'"));
        assert_eq!(
            diagnose(&InferError::Transport("refused".to_string()), "m"),
            FALLBACK_REPLY
        );
        assert_eq!(
            diagnose(
                &InferError::Backend {
                    status: 500,
                    message: "boom".to_string()
                },
                "m"
            ),
            FALLBACK_REPLY
        );
    }
}

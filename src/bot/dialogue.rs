//! Per-chat conversation state
//!
//! Pure: no I/O happens here. The polling loop feeds each incoming text to
//! [`respond`] together with the chat's current session and acts on the
//! returned [`Turn`].

pub const NAME_PROMPT: &str = "Hi! Please send your full name:";
pub const COLLEGE_ID_PROMPT: &str = "Got it! Now, please send your college ID:";
pub const CANCELED: &str = "Conversation canceled. Send /start to begin again.";
pub const HINT: &str = "Send /start for a cover page or /report for a health report.";
const EMPTY_NAME: &str = "The name can't be empty. Please send your full name:";
const EMPTY_COLLEGE_ID: &str = "The college ID can't be empty. Please send your college ID:";

/// Which document a conversation collects input for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Cover,
    Report,
}

/// A conversation in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialogue {
    flow: Flow,
    name: Option<String>,
}

impl Dialogue {
    pub fn new(flow: Flow) -> Self {
        Self { flow, name: None }
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }
}

/// A completed conversation, ready to be generated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Cover { name: String, college_id: String },
    Report { name: String },
}

/// What to do after one incoming message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Turn {
    /// Text to send back, if any
    pub reply: Option<String>,
    /// Session to keep for the chat; `None` ends it
    pub next: Option<Dialogue>,
    pub request: Option<Request>,
}

impl Turn {
    fn reply(text: &str, next: Option<Dialogue>) -> Self {
        Self {
            reply: Some(text.to_string()),
            next,
            request: None,
        }
    }

    fn keep(session: Dialogue) -> Self {
        Self {
            next: Some(session),
            ..Self::default()
        }
    }
}

/// `/start@MyBot arg` → `start`
fn command(text: &str) -> Option<&str> {
    let word = text.strip_prefix('/')?.split_whitespace().next().unwrap_or("");
    Some(word.split('@').next().unwrap_or(word))
}

/// Advance a chat's conversation by one message.
pub fn respond(session: Option<Dialogue>, text: &str) -> Turn {
    let text = text.trim();

    if let Some(cmd) = command(text) {
        if cmd == "cancel" {
            return Turn::reply(CANCELED, None);
        }
        return match session {
            // Inside a flow only /cancel is honoured
            Some(session) => Turn::keep(session),
            None => match cmd {
                "start" | "cover" => Turn::reply(NAME_PROMPT, Some(Dialogue::new(Flow::Cover))),
                "report" => Turn::reply(NAME_PROMPT, Some(Dialogue::new(Flow::Report))),
                _ => Turn::reply(HINT, None),
            },
        };
    }

    let Some(mut session) = session else {
        return Turn::reply(HINT, None);
    };

    match (session.flow, session.name.take()) {
        (_, None) if text.is_empty() => Turn::reply(EMPTY_NAME, Some(session)),
        (Flow::Report, None) => Turn {
            request: Some(Request::Report { name: text.to_string() }),
            ..Turn::default()
        },
        (Flow::Cover, None) => {
            session.name = Some(text.to_string());
            Turn::reply(COLLEGE_ID_PROMPT, Some(session))
        }
        (_, Some(name)) if text.is_empty() => {
            session.name = Some(name);
            Turn::reply(EMPTY_COLLEGE_ID, Some(session))
        }
        (_, Some(name)) => Turn {
            request: Some(Request::Cover {
                name,
                college_id: text.to_string(),
            }),
            ..Turn::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed messages through one chat, returning the final turn
    fn converse(messages: &[&str]) -> (Option<Dialogue>, Vec<Turn>) {
        let mut session = None;
        let mut turns = Vec::new();
        for message in messages {
            let turn = respond(session.take(), message);
            session = turn.next.clone();
            turns.push(turn);
        }
        (session, turns)
    }

    #[test]
    fn test_cover_flow() {
        let (session, turns) = converse(&["/start", " Jane Doe ", "23/v/kpc-cst/36"]);

        assert_eq!(turns[0].reply.as_deref(), Some(NAME_PROMPT));
        assert_eq!(turns[1].reply.as_deref(), Some(COLLEGE_ID_PROMPT));
        assert_eq!(turns[2].reply, None);
        assert_eq!(
            turns[2].request,
            Some(Request::Cover {
                name: "Jane Doe".to_string(),
                college_id: "23/v/kpc-cst/36".to_string(),
            })
        );
        assert_eq!(session, None);
    }

    #[test]
    fn test_report_flow() {
        let (session, turns) = converse(&["/report", "John Doe"]);
        assert_eq!(turns[0].next.as_ref().map(Dialogue::flow), Some(Flow::Report));
        assert_eq!(
            turns[1].request,
            Some(Request::Report {
                name: "John Doe".to_string()
            })
        );
        assert_eq!(session, None);
    }

    #[test]
    fn test_cancel_ends_flow() {
        let (session, turns) = converse(&["/start", "Jane", "/cancel"]);
        assert_eq!(turns[2].reply.as_deref(), Some(CANCELED));
        assert_eq!(turns[2].request, None);
        assert_eq!(session, None);
    }

    #[test]
    fn test_commands_ignored_inside_flow() {
        let (session, turns) = converse(&["/start", "Jane", "/report", "/start@NameplateBot", "ID-1"]);
        assert_eq!(turns[2], Turn::keep(Dialogue { flow: Flow::Cover, name: Some("Jane".to_string()) }));
        assert_eq!(turns[3].reply, None);
        assert!(matches!(turns[4].request, Some(Request::Cover { .. })));
        assert_eq!(session, None);
    }

    #[test]
    fn test_empty_answers_reprompt() {
        let (session, turns) = converse(&["/cover", "   ", "Jane", ""]);
        assert_eq!(turns[1].reply.as_deref(), Some(EMPTY_NAME));
        assert_eq!(turns[3].reply.as_deref(), Some(EMPTY_COLLEGE_ID));
        assert_eq!(
            session,
            Some(Dialogue {
                flow: Flow::Cover,
                name: Some("Jane".to_string())
            })
        );
    }

    #[test]
    fn test_outside_flow_gets_hint() {
        assert_eq!(respond(None, "hello").reply.as_deref(), Some(HINT));
        assert_eq!(respond(None, "/help").reply.as_deref(), Some(HINT));
        assert_eq!(respond(None, "/cancel").reply.as_deref(), Some(CANCELED));
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(command("/start"), Some("start"));
        assert_eq!(command("/start@NameplateBot now"), Some("start"));
        assert_eq!(command("start"), None);
    }
}

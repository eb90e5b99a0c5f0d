//! Line-oriented terminal front end for a session

use crate::conversation::{Turn, TurnId, TurnRole};
use crate::render;
use crate::runtime::{SessionClosed, SessionEvent, SessionHandle};
use crate::topic::{Topic, ALL_TOPICS};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Answer(String),
    Mic,
    Mute,
    Send,
    /// Replace the draft; empty text clears it
    Draft(String),
    /// 1-based index into the interviewer's turns; `None` is the latest
    Replay(Option<usize>),
    Topic(Topic),
    Topics,
    Restart,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Answer(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match (name.to_ascii_lowercase().as_str(), arg) {
            ("mic", "") => Command::Mic,
            ("mute", "") => Command::Mute,
            ("send", "") => Command::Send,
            ("draft", text) => Command::Draft(text.to_string()),
            ("replay", "") => Command::Replay(None),
            ("replay", n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => Command::Replay(Some(n)),
                _ => Command::Unknown(line.to_string()),
            },
            ("topic" | "topics", "") => Command::Topics,
            ("topic", slug) => match parse_topic(slug) {
                Some(topic) => Command::Topic(topic),
                None => Command::Unknown(line.to_string()),
            },
            ("restart", "") => Command::Restart,
            ("help", "") => Command::Help,
            ("quit" | "exit", "") => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// Known topics only; unknown slugs are refused rather than mapped to general
fn parse_topic(slug: &str) -> Option<Topic> {
    let topic = Topic::from_slug(slug);
    if topic != Topic::General || slug.eq_ignore_ascii_case("general") {
        Some(topic)
    } else {
        None
    }
}

/// What the front end remembers about the session it shows
struct View {
    topic: Topic,
    interviewer_turns: Vec<TurnId>,
}

impl View {
    fn record(&mut self, turn: &Turn) {
        if turn.role == TurnRole::Assistant {
            self.interviewer_turns.push(turn.id);
        }
    }

    fn replay_target(&self, index: Option<usize>) -> Option<TurnId> {
        match index {
            None => self.interviewer_turns.last().copied(),
            Some(n) => self.interviewer_turns.get(n - 1).copied(),
        }
    }
}

/// Drive `handle` from stdin until the user quits or input ends
pub async fn run(
    handle: SessionHandle,
    mut events: broadcast::Receiver<SessionEvent>,
    topic: Topic,
) -> Result<(), SessionClosed> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut view = View {
        topic,
        interviewer_turns: Vec::new(),
    };

    println!("{}\n", render::render_help());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                };
                if !dispatch(&handle, &view, Command::parse(&line)).await? {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Closed) | Err(broadcast::error::RecvError::Closed) => break,
                Ok(event) => show(&mut view, event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Renderer fell behind session events");
                }
            },
        }
    }

    handle.dispose().await;
    Ok(())
}

/// Forward one command; `false` means leave
async fn dispatch(handle: &SessionHandle, view: &View, command: Command) -> Result<bool, SessionClosed> {
    match command {
        Command::Answer(text) => handle.submit(text).await?,
        Command::Mic => handle.toggle_capture().await?,
        Command::Mute => handle.toggle_mute().await?,
        Command::Send => handle.submit_draft().await?,
        Command::Draft(text) => handle.edit_draft(text).await?,
        Command::Replay(index) => match view.replay_target(index) {
            Some(turn_id) => handle.replay(turn_id).await?,
            None => println!("No such interviewer turn."),
        },
        Command::Topic(topic) => handle.reset(topic).await?,
        Command::Topics => print!("{}", render::render_topics(view.topic)),
        Command::Restart => handle.restart().await?,
        Command::Help => println!("{}", render::render_help()),
        Command::Quit => return Ok(false),
        Command::Empty => {}
        Command::Unknown(line) => {
            println!("Unknown command: {line} (try /help; topics: {})", topic_slugs());
        }
    }
    Ok(true)
}

fn show(view: &mut View, event: SessionEvent) {
    match event {
        SessionEvent::TurnAppended { turn } => {
            view.record(&turn);
            println!("{}", render::render_turn(&turn));
        }
        SessionEvent::StateChanged { state } => {
            view.topic = state.topic;
            println!("{}", render::render_state(&state));
        }
        SessionEvent::Reset { topic, turns } => {
            view.topic = topic;
            view.interviewer_turns.clear();
            println!("\n── {} interview ──\n", topic.title());
            for turn in &turns {
                view.record(turn);
                println!("{}", render::render_turn(turn));
            }
        }
        SessionEvent::Rejected { message } => println!("! {message}"),
        SessionEvent::Closed => {}
    }
}

fn topic_slugs() -> String {
    ALL_TOPICS
        .iter()
        .map(|t| t.slug())
        .collect::<Vec<_>>()
        .join(", ")
}

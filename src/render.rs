//! Terminal rendering of session events
//!
//! Everything here returns strings; the REPL decides where they go.

use crate::conversation::{Turn, TurnRole};
use crate::runtime::StateView;
use crate::state_machine::Phase;
use crate::topic::{Topic, ALL_TOPICS};
use chrono::Local;
use crossterm::style::Stylize;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::fmt::Write;

const CODE_INDENT: &str = "    ";

fn role_label(role: TurnRole) -> String {
    match role {
        TurnRole::User => "You".bold().green().to_string(),
        TurnRole::Assistant => "Interviewer".bold().cyan().to_string(),
        TurnRole::SystemError => "System".bold().red().to_string(),
    }
}

/// Header line plus body for one turn
pub fn render_turn(turn: &Turn) -> String {
    let time = turn.created_at.with_timezone(&Local).format("%H:%M");
    let header = format!(
        "{} {} {}",
        format!("[{time}]").dark_grey(),
        role_label(turn.role),
        format!("#{}", turn.id).dark_grey()
    );

    let body = match turn.role {
        TurnRole::Assistant => render_markdown(&turn.content),
        TurnRole::User => turn.content.clone(),
        TurnRole::SystemError => turn.content.clone().red().to_string(),
    };

    format!("{header}\n{body}\n")
}

/// Style markdown for a terminal: bold headings and strong text, italic
/// emphasis, yellow inline code, indented code blocks and bulleted lists.
pub fn render_markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;

    let mut out = String::with_capacity(text.len());
    let mut bold = 0usize;
    let mut italic = 0usize;
    let mut in_code_block = false;
    let mut list_depth = 0usize;
    // Ordered list counters, one per nesting level; None for bullets
    let mut list_numbers: Vec<Option<u64>> = Vec::new();
    let mut link_targets: Vec<String> = Vec::new();
    // Cells already written on the current table row
    let mut row_cells = 0usize;

    for event in Parser::new_ext(text, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                bold += 1;
                if level == HeadingLevel::H1 {
                    italic += 1;
                }
            }
            Event::End(TagEnd::Heading(level)) => {
                bold = bold.saturating_sub(1);
                if level == HeadingLevel::H1 {
                    italic = italic.saturating_sub(1);
                }
                out.push_str("\n\n");
            }
            Event::Start(Tag::Strong) => bold += 1,
            Event::End(TagEnd::Strong) => bold = bold.saturating_sub(1),
            Event::Start(Tag::Emphasis) => italic += 1,
            Event::End(TagEnd::Emphasis) => italic = italic.saturating_sub(1),
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => {
                in_code_block = true;
                if !lang.is_empty() {
                    let _ = writeln!(out, "{CODE_INDENT}{}", lang.to_string().dark_grey());
                }
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Indented)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                out.push('\n');
            }
            Event::Start(Tag::List(start)) => {
                if list_depth > 0 && !out.ends_with('\n') {
                    out.push('\n');
                }
                list_depth += 1;
                list_numbers.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
                list_numbers.pop();
                if list_depth == 0 {
                    out.push('\n');
                }
            }
            Event::Start(Tag::Item) => {
                let indent = "  ".repeat(list_depth.saturating_sub(1));
                let marker = match list_numbers.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}.");
                        *n += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                let _ = write!(out, "{indent}{marker} ");
            }
            Event::End(TagEnd::Item) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::End(TagEnd::Paragraph) => {
                out.push('\n');
                if list_depth == 0 {
                    out.push('\n');
                }
            }
            Event::Start(Tag::TableHead | Tag::TableRow) => row_cells = 0,
            Event::Start(Tag::TableCell) => {
                if row_cells > 0 {
                    let _ = write!(out, "{}", " | ".dark_grey());
                }
                row_cells += 1;
            }
            Event::Start(Tag::Link { dest_url, .. }) => link_targets.push(dest_url.to_string()),
            Event::End(TagEnd::Link) => {
                if let Some(url) = link_targets.pop() {
                    let _ = write!(out, " ({})", url.as_str().dark_grey());
                }
            }
            Event::Text(t) => {
                if in_code_block {
                    for line in t.lines() {
                        let _ = writeln!(out, "{CODE_INDENT}{}", line.cyan());
                    }
                } else {
                    out.push_str(&styled(&t, bold > 0, italic > 0));
                }
            }
            Event::Code(t) => out.push_str(&t.to_string().yellow().to_string()),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak
            | Event::End(TagEnd::TableHead | TagEnd::TableRow | TagEnd::Table) => out.push('\n'),
            Event::Rule => out.push_str("────────\n\n"),
            _ => {}
        }
    }

    out.trim_end().to_string()
}

fn styled(text: &str, bold: bool, italic: bool) -> String {
    match (bold, italic) {
        (false, false) => text.to_string(),
        (true, false) => text.bold().to_string(),
        (false, true) => text.italic().to_string(),
        (true, true) => text.bold().italic().to_string(),
    }
}

/// One-line status: topic, phase and input flags
pub fn render_state(state: &StateView) -> String {
    let phase = match state.phase {
        Phase::Idle => "ready".green(),
        Phase::AwaitingGeneration { .. } => "thinking…".yellow(),
        Phase::Speaking { .. } => "speaking".cyan(),
    };
    let mic = if state.input.is_capturing() {
        "mic on".red()
    } else if state.input.capture_available {
        "mic off".dark_grey()
    } else {
        "no mic".dark_grey()
    };
    let sound = if state.input.muted {
        "muted".dark_grey()
    } else {
        "sound on".dark_grey()
    };

    let mut line = format!("[{}] {phase} · {mic} · {sound}", state.topic.title());
    if state.input.is_capturing() && !state.input.transcript.is_empty() {
        let _ = write!(line, " · heard: {}", state.input.transcript.as_str().italic());
    } else if !state.input.draft.is_empty() {
        let _ = write!(line, " · draft: {}", state.input.draft);
    }
    line
}

/// Topic menu with the current topic marked
pub fn render_topics(current: Topic) -> String {
    let mut out = String::new();
    for topic in ALL_TOPICS {
        let marker = if topic == current { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {:<16} {} {}",
            topic.slug(),
            topic.title().bold(),
            format!("- {}", topic.description()).dark_grey()
        );
    }
    out
}

pub fn render_help() -> String {
    [
        "Type an answer and press Enter to send it.",
        "  /mic          start or stop voice capture",
        "  /send         send the captured draft",
        "  /draft <text> replace the draft before sending",
        "  /mute         toggle spoken replies",
        "  /replay [n]   hear the last (or n-th) interviewer turn again",
        "  /topic <slug> start over with another topic",
        "  /topics       list topics",
        "  /restart      start over with the current topic",
        "  /quit         leave",
    ]
    .join("\n")
}

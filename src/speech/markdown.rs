//! Markdown to speakable text

use pulldown_cmark::{Event, Options, Parser, TagEnd};

/// Strip markdown syntax so a speech engine reads only the words.
///
/// Code fences, inline code ticks, link targets, heading markers and
/// emphasis markers are dropped; their text content is kept. Block
/// boundaries become line breaks and runs of whitespace collapse to one
/// space.
pub fn strip_markdown(text: &str) -> String {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;

    let mut plain = String::with_capacity(text.len());

    for event in Parser::new_ext(text, options) {
        match event {
            Event::Text(t) | Event::Code(t) => plain.push_str(&t),
            Event::SoftBreak | Event::HardBreak | Event::End(TagEnd::TableCell) => plain.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::BlockQuote(_)
                | TagEnd::TableRow
                | TagEnd::TableHead,
            )
            | Event::Rule => plain.push('\n'),
            _ => {}
        }
    }

    plain
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

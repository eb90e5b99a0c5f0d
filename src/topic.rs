//! Interview topics
//!
//! Topics form a closed set. Unknown slugs resolve to [`Topic::General`]
//! instead of failing, so a stale or hand-typed topic never breaks a session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A practice topic selecting the greeting, question bank and system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    #[default]
    JavaScript,
    React,
    NodeJs,
    Database,
    SystemDesign,
    DataStructures,
    /// Fallback for anything not in the catalogue
    General,
}

/// Every selectable topic, in menu order
pub const ALL_TOPICS: [Topic; 6] = [
    Topic::JavaScript,
    Topic::React,
    Topic::NodeJs,
    Topic::Database,
    Topic::SystemDesign,
    Topic::DataStructures,
];

const GENERAL_QUESTIONS: &[&str] = &[
    "That's interesting. Can you elaborate on your approach?",
    "How would you handle edge cases in this scenario?",
    "What alternative solutions did you consider?",
];

impl Topic {
    /// Resolve a free-form slug. Case, spaces, dots and underscores are ignored.
    pub fn from_slug(slug: &str) -> Self {
        let normalized: String = slug
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_' | '.'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "javascript" | "js" => Topic::JavaScript,
            "react" | "reactjs" => Topic::React,
            "nodejs" | "node" => Topic::NodeJs,
            "database" | "databases" | "sql" => Topic::Database,
            "systemdesign" => Topic::SystemDesign,
            "datastructures" | "algorithms" | "dsa" => Topic::DataStructures,
            _ => Topic::General,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Topic::JavaScript => "javascript",
            Topic::React => "react",
            Topic::NodeJs => "nodejs",
            Topic::Database => "database",
            Topic::SystemDesign => "system-design",
            Topic::DataStructures => "data-structures",
            Topic::General => "general",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Topic::JavaScript => "JavaScript",
            Topic::React => "React",
            Topic::NodeJs => "Node.js",
            Topic::Database => "Database",
            Topic::SystemDesign => "System Design",
            Topic::DataStructures => "Data Structures",
            Topic::General => "General",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Topic::JavaScript => {
                "Practice core JavaScript concepts, closures, async programming, and ES6+ features."
            }
            Topic::React => {
                "Master React hooks, component lifecycle, state management, and performance optimization techniques."
            }
            Topic::NodeJs => {
                "Learn backend development with Node.js, Express, REST APIs, and authentication flows."
            }
            Topic::Database => {
                "Practice SQL queries, database design, and ORM concepts for modern web applications."
            }
            Topic::SystemDesign => {
                "Prepare for system design interviews with distributed systems, scaling, and architecture patterns."
            }
            Topic::DataStructures => {
                "Master algorithms and data structures for technical interviews at top tech companies."
            }
            Topic::General => "Open-ended technical interview practice.",
        }
    }

    /// Sample questions the interviewer draws from
    pub fn questions(self) -> &'static [&'static str] {
        match self {
            Topic::JavaScript => &[
                "Explain the event loop in JavaScript and how it handles asynchronous operations.",
                "How would you implement a debounce function from scratch?",
                "What are the key differences between ES6 classes and prototype-based inheritance?",
            ],
            Topic::React => &[
                "Walk me through the React component lifecycle in modern functional components.",
                "How would you optimize performance in a large React application?",
                "Explain the difference between React context and Redux - when would you use each?",
            ],
            Topic::NodeJs => &[
                "How does Node.js handle concurrency with a single-threaded event loop?",
                "How would you structure authentication for a REST API built with Express?",
                "What are streams in Node.js and when would you use them?",
            ],
            Topic::Database => &[
                "When would you denormalize a relational schema?",
                "Explain how an index speeds up a query and what it costs.",
                "What are the trade-offs of using an ORM over hand-written SQL?",
            ],
            Topic::SystemDesign => &[
                "How would you design a URL shortener that handles millions of requests per day?",
                "Explain how you would shard a database that has outgrown a single machine.",
                "What caching strategies would you use for a read-heavy service?",
            ],
            Topic::DataStructures => &[
                "How would you detect a cycle in a linked list?",
                "Compare a hash map and a balanced binary search tree.",
                "Explain how you would find the k most frequent elements in an array.",
            ],
            Topic::General => GENERAL_QUESTIONS,
        }
    }

    /// First assistant turn of every session
    pub fn greeting(self) -> String {
        format!(
            "Welcome to your {} interview practice! I'm your AI interviewer. \
             Let's start with a fundamental question.",
            self.title()
        )
    }

    /// System instruction sent with every generation request
    pub fn system_prompt(self) -> String {
        let questions = self
            .questions()
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are an experienced technical interviewer running a {title} interview \
             practice session. {description}\n\n\
             Ask one question at a time. After the candidate answers, give brief, \
             specific feedback on what was correct and what was missing, then ask a \
             follow-up or a new question. Keep answers concise enough to be read aloud. \
             Use markdown only for short code snippets.\n\n\
             Questions you may draw from:\n{questions}",
            title = self.title(),
            description = self.description(),
        )
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

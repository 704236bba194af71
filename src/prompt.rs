//! System prompt composition.
//!
//! The assistant tailors its answers to the FinBox screen the advisor is on.
//! The current route is mapped to a context label, which is combined with
//! the configured response style and citation preference.

use crate::config::{ChatConfig, ResponseStyle};

/// Label used when the route matches no known screen.
pub const DEFAULT_CONTEXT: &str = "FinBox";

const CONTEXTS: &[(&str, &str)] = &[
    ("/dashboard", "Dashboard"),
    ("/customers", "Customer management"),
    ("/contracts", "Contracts and policies"),
    ("/claims", "Claims handling"),
    ("/calendar", "Appointments and calendar"),
    ("/tasks", "Tasks and follow-ups"),
    ("/commissions", "Commissions"),
    ("/documents", "Document library"),
    ("/leaderboard", "Goals and achievements"),
    ("/settings", "Settings"),
    ("/onboarding", "Onboarding"),
];

/// Maps a route such as `/customers/42?tab=notes` to its context label.
pub fn context_label(path: &str) -> &'static str {
    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches('/')
        .to_ascii_lowercase();

    if path.is_empty() {
        return "Dashboard";
    }

    CONTEXTS
        .iter()
        .find(|(prefix, _)| {
            path == *prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
        .map_or(DEFAULT_CONTEXT, |(_, label)| label)
}

fn style_instruction(style: ResponseStyle) -> &'static str {
    match style {
        ResponseStyle::Concise => "Answer briefly and to the point, in no more than a few sentences.",
        ResponseStyle::Detailed => "Answer thoroughly and explain the relevant background.",
        ResponseStyle::StepByStep => "Answer as a numbered list of concrete steps the advisor can follow.",
    }
}

/// Builds the system prompt for a chat sent from `path`.
pub fn system_prompt(path: &str, style: ResponseStyle, citations: bool) -> String {
    let citation_instruction = if citations {
        "Cite the documents you relied on as sources at the end of the answer."
    } else {
        "Do not include source citations."
    };

    format!(
        "You are the FinBox assistant for insurance advisors. \
         The advisor is currently working in: {}. {} {}",
        context_label(path),
        style_instruction(style),
        citation_instruction
    )
}

/// Builds the message body sent to the backend: system prompt, then the
/// advisor's question.
pub fn compose_message(config: &ChatConfig, path: &str, message: &str) -> String {
    format!(
        "{}\n\nQuestion: {}",
        system_prompt(path, config.response_style, config.citations),
        message.trim()
    )
}

/// Suggested prompts the chat panel offers for a context.
pub fn suggestions(path: &str) -> &'static [&'static str] {
    match context_label(path) {
        "Customer management" => &[
            "Which customers are due for a policy review?",
            "Summarise this customer's open contracts.",
            "Draft a follow-up email after a consultation.",
        ],
        "Contracts and policies" => &[
            "Explain the cancellation terms of this policy.",
            "Compare liability insurance tariffs.",
            "Which documents are required for a contract change?",
        ],
        "Claims handling" => &[
            "What are the steps to report a claim?",
            "Which deadlines apply to water damage claims?",
        ],
        "Commissions" => &[
            "How is the acquisition commission calculated?",
            "When are cancellation reserves released?",
        ],
        _ => &[
            "What should I focus on today?",
            "Explain the difference between term and whole life insurance.",
            "Help me prepare for a customer meeting.",
        ],
    }
}

use super::Role;

/// Literal delimiter that introduces an itemised block in bot replies.
pub const PROCESSING_DETAILS_MARKER: &str = "**Processing Details:**";
const PROCESSING_DETAILS_HEADING: &str = "Processing Details:";

/// Terminal-ready shape of a message: free text plus optional itemised block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageLayout {
    pub lead: Vec<String>,
    pub details: Option<Vec<String>>,
}

pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Markup for a message body. The raw text is escaped before the marker is
/// looked for, so nothing in it is ever read as structure.
pub fn render_body(role: Role, text: &str) -> String {
    let escaped = escape_markup(text);
    let (lead, details) = split_details(role, &escaped);
    let mut body = line_breaks(lead);
    if let Some(items) = details {
        body.push_str("<div class=\"processing-details\"><strong>");
        body.push_str(PROCESSING_DETAILS_HEADING);
        body.push_str("</strong><ul class=\"processing-list\">");
        for item in items {
            body.push_str("<li class=\"processing-item\">");
            body.push_str(item);
            body.push_str("</li>");
        }
        body.push_str("</ul></div>");
    }
    body
}

/// Full transcript element for one message.
pub fn render_entry(role: Role, text: &str) -> String {
    let content_class = match role {
        Role::System => "message-content system-content",
        Role::User | Role::Bot => "message-content",
    };
    format!(
        "<div class=\"message {}\"><div class=\"{content_class}\">{}</div></div>",
        role.css_class(),
        render_body(role, text)
    )
}

pub fn layout_message(role: Role, text: &str) -> MessageLayout {
    let clean = sanitize_terminal(text);
    let (lead, details) = split_details(role, &clean);
    let mut lead: Vec<String> = lead.lines().map(str::to_string).collect();
    while lead.last().is_some_and(|line| line.trim().is_empty()) {
        lead.pop();
    }
    MessageLayout {
        lead,
        details: details.map(|items| items.into_iter().map(str::to_string).collect()),
    }
}

fn split_details(role: Role, text: &str) -> (&str, Option<Vec<&str>>) {
    if role != Role::Bot {
        return (text, None);
    }
    match text.split_once(PROCESSING_DETAILS_MARKER) {
        Some((lead, rest)) => {
            let items = rest
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect();
            (lead, Some(items))
        }
        None => (text, None),
    }
}

fn line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "<br>")
}

/// Replace control characters so backend text cannot drive the terminal.
fn sanitize_terminal(text: &str) -> String {
    text.chars()
        .filter_map(|ch| match ch {
            '\n' => Some('\n'),
            '\r' => None,
            '\t' => Some(' '),
            ch if ch.is_control() => Some('\u{FFFD}'),
            ch => Some(ch),
        })
        .collect()
}

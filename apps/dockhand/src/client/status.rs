use dockhand_sdk::ConnectionStatus;
use ratatui::style::{Color, Modifier, Style};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub fn connection_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Reconnecting => "reconnecting",
    }
}

pub fn connection_style(status: ConnectionStatus) -> Style {
    match status {
        ConnectionStatus::Connected => Style::default().fg(Color::Green),
        ConnectionStatus::Connecting => Style::default().fg(Color::Yellow),
        ConnectionStatus::Reconnecting => Style::default()
            .fg(Color::Red)
            .add_modifier(Modifier::BOLD),
    }
}

/// Glyph for the busy indicator at the given frame tick.
pub fn spinner_frame(tick: usize) -> char {
    SPINNER[tick % SPINNER.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_track_status() {
        assert_eq!(connection_label(ConnectionStatus::Connected), "connected");
        assert_eq!(connection_label(ConnectionStatus::Reconnecting), "reconnecting");
        assert_ne!(
            connection_style(ConnectionStatus::Connected),
            connection_style(ConnectionStatus::Reconnecting)
        );
    }

    #[test]
    fn spinner_wraps() {
        assert_eq!(spinner_frame(0), spinner_frame(SPINNER.len()));
    }
}

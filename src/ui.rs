use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use busguardian::{ChatRole, NoticeLevel, Provider, SensorField};
use crate::app::{App, FocusPane, InputMode, Screen};

const GAUGE_WIDTH: usize = 20;

/// Parse a line of text and convert **bold** markdown and `#` headings to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let heading = text.trim_start_matches('#');
    if heading.len() < text.len() && heading.starts_with(' ') {
        return Line::from(Span::styled(
            heading.trim().to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("**") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("**") else {
            break;
        };
        if close == 0 {
            // "****" has nothing to embolden
            break;
        }
        if open > 0 {
            spans.push(Span::raw(rest[..open].to_string()));
        }
        spans.push(Span::styled(
            after_open[..close].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after_open[close + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn gauge_bar(ratio: f64) -> String {
    let filled = ((ratio * GAUGE_WIDTH as f64).round() as usize).min(GAUGE_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(GAUGE_WIDTH - filled))
}

fn border_color(focused: bool) -> Color {
    if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let notice_height = if app.visible_notice().is_some() { 1 } else { 0 };
    let [header_area, body_area, notice_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(notice_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Dashboard => render_dashboard(app, frame, body_area),
        Screen::Info => render_info(app, frame, body_area),
    }

    if notice_height > 0 {
        render_notice(app, frame, notice_area);
    }
    render_footer(app, frame, footer_area);

    if app.show_provider_picker {
        render_provider_picker(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" BusGuardian AI ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            "An AI-Based Bus Heat Energy Monitoring System ",
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("[{}: {}] ", app.current_provider.as_str(), app.selected_model),
            Style::default().fg(Color::Black),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Black),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let Some(notice) = app.visible_notice() else {
        return;
    };
    let style = match notice.level {
        NoticeLevel::Error => Style::default().bg(Color::Red).fg(Color::White),
        NoticeLevel::Info => Style::default().bg(Color::Blue).fg(Color::White),
    };
    let line = Line::from(vec![
        Span::styled(format!(" {} ", notice.title), style.add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {} ", notice.description), style),
    ]);
    frame.render_widget(Paragraph::new(line).style(style), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match (app.screen, app.input_mode) {
        (Screen::Info, _) => " INFO ",
        (Screen::Dashboard, InputMode::Editing) => " CHAT ",
        (Screen::Dashboard, InputMode::Normal) => " DASHBOARD ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let mut hints: Vec<Span> = Vec::new();
    match (app.screen, app.input_mode) {
        (Screen::Info, _) => {
            hints.extend(hint("j/k", "scroll"));
            hints.extend(hint("Esc", "dashboard"));
        }
        (Screen::Dashboard, InputMode::Editing) => {
            hints.extend(hint("Enter", "send"));
            hints.extend(hint("Esc", "stop typing"));
        }
        (Screen::Dashboard, InputMode::Normal) => {
            match app.focus {
                FocusPane::Sensors => {
                    hints.extend(hint("j/k", "sensor"));
                    hints.extend(hint("h/l", "adjust"));
                    hints.extend(hint("H/L", "x10"));
                }
                FocusPane::Chat | FocusPane::Input => {
                    hints.extend(hint("j/k", "scroll"));
                    hints.extend(hint("g/G", "top/bottom"));
                }
            }
            hints.extend(hint("a", "analyze"));
            hints.extend(hint("i", "ask"));
            hints.extend(hint("Tab", "focus"));
            hints.extend(hint("P", "provider"));
            hints.extend(hint("M", "model"));
            hints.extend(hint("?", "physics"));
            hints.extend(hint("q", "quit"));
        }
    }

    let footer_content = Line::from(
        vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)]
            .into_iter()
            .chain(hints)
            .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_dashboard(app: &mut App, frame: &mut Frame, area: Rect) {
    let [sensor_area, chat_column] = Layout::horizontal([
        Constraint::Percentage(40),
        Constraint::Percentage(60),
    ])
    .areas(area);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(chat_column);

    // Store areas for mouse hit-testing
    app.sensor_area = Some(sensor_area);
    app.chat_area = Some(chat_area);

    // Inner size minus borders, for scroll calculations
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    render_sensor_panel(app, frame, sensor_area);
    render_chat(app, frame, chat_area);
    render_chat_input(app, frame, input_area);
}

fn render_sensor_panel(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sensors;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(focused)))
        .title(" Simulation Panel ");

    let sensors = app.session.sensors();
    let disabled = app.is_analyzing();
    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            "Adjust the values to simulate sensor data from the bus.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
    ];

    for field in SensorField::all() {
        let selected = focused && field == app.selected_field;
        let marker = if selected { "> " } else { "  " };
        let label_style = if selected {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if disabled {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        lines.push(Line::from(vec![
            Span::styled(marker, label_style),
            Span::styled(format!("{}: ", field.label()), label_style),
            Span::styled(sensors.display_value(field), label_style.add_modifier(Modifier::BOLD)),
        ]));

        if let Some(ratio) = sensors.gauge_ratio(field) {
            let color = match field {
                SensorField::CoolantLevel if ratio < 0.3 => Color::Red,
                SensorField::CoolantLevel => Color::Blue,
                _ if ratio > 0.7 => Color::Red,
                _ if ratio > 0.45 => Color::Yellow,
                _ => Color::Green,
            };
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(gauge_bar(ratio), Style::default().fg(color)),
            ]));
        } else if matches!(field, SensorField::Ventilation | SensorField::Camera) && selected {
            lines.push(Line::from(Span::styled(
                "  h/l to cycle",
                Style::default().fg(Color::DarkGray),
            )));
        }
        lines.push(Line::default());
    }

    let button = if disabled {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Span::styled(
            format!("  Analyzing{}  ", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )
    } else {
        Span::styled(
            "  [a] Analyze Heat Status  ",
            Style::default().bg(Color::Magenta).fg(Color::White).add_modifier(Modifier::BOLD),
        )
    };
    lines.push(Line::from(button));

    let panel = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(panel, area);
}

fn render_chat(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(focused)))
        .title(format!(" AI Assistant ({}) ", app.current_provider.display_name()));

    let mut lines: Vec<Line> = Vec::new();
    for msg in app.session.history().messages() {
        let (label, color) = match msg.role {
            ChatRole::User => ("You:", Color::Cyan),
            ChatRole::Assistant => ("AI:", Color::Yellow),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        for line in msg.content.lines() {
            lines.push(parse_markdown_line(line));
        }
        lines.push(Line::default());
    }

    if app.is_answering() || app.is_analyzing() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn render_chat_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Ask a follow-up question ");

    let content = if app.is_answering() {
        Span::styled("Waiting for the assistant...", Style::default().fg(Color::DarkGray))
    } else if app.chat_input.is_empty() && !editing {
        Span::styled("Press i to ask a question", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(app.chat_input.clone())
    };

    let (offset, column) = input_window(app.chat_cursor, area.width.saturating_sub(2));
    let input = Paragraph::new(Line::from(content))
        .block(block)
        .scroll((0, offset));
    frame.render_widget(input, area);

    if editing && !app.is_answering() {
        let cursor_x = area.x.saturating_add(1).saturating_add(column);
        frame.set_cursor_position((cursor_x, area.y.saturating_add(1)));
    }
}

/// Horizontal scroll offset and cursor column for a single-line input of
/// inner `width`. The cursor always stays inside the box.
fn input_window(cursor: usize, width: u16) -> (u16, u16) {
    let width = usize::from(width);
    if width == 0 {
        return (0, 0);
    }
    let offset = cursor.saturating_sub(width - 1);
    let to_u16 = |n: usize| u16::try_from(n).unwrap_or(u16::MAX);
    (to_u16(offset), to_u16(cursor - offset))
}

const PHYSICS: [(&str, Color, &str); 3] = [
    (
        "Conduction",
        Color::Red,
        "Conduction is heat transfer through direct contact. In a bus, the hot engine block directly heats the metal frame and other attached components. This heat can then travel through the bus's structure, eventually warming up the floor and seats near the engine compartment.",
    ),
    (
        "Convection",
        Color::Blue,
        "Convection is heat transfer through the movement of fluids (like air). Hot air from the engine and exhaust systems rises and circulates. If the ventilation system is poor, this hot air gets trapped inside the cabin, significantly increasing the temperature for passengers and causing discomfort.",
    ),
    (
        "Radiation",
        Color::Yellow,
        "Radiation is heat transfer through electromagnetic waves. Hot surfaces, like the engine and the dark-colored bus roof exposed to the sun, radiate heat. This infrared radiation travels through the air and is absorbed by passengers, seats, and interior surfaces, making them feel warm even without direct contact.",
    ),
];

const IMPACT: [(&str, Color, &str); 3] = [
    (
        "Improves Safety",
        Color::Green,
        "By providing early warnings for overheating, the system allows drivers to take preventive action, reducing the risk of engine fires or breakdowns on the road.",
    ),
    (
        "Enhances Passenger Comfort",
        Color::Blue,
        "The AI monitors cabin temperature and ventilation, ensuring a comfortable environment for passengers, which is especially critical for long journeys and school routes.",
    ),
    (
        "Increases Fuel Efficiency",
        Color::LightRed,
        "An engine running at its optimal temperature is more fuel-efficient. By preventing overheating, our system helps reduce fuel consumption and operational costs.",
    ),
];

fn section(lines: &mut Vec<Line<'static>>, title: &'static str, subtitle: &'static str) {
    lines.push(Line::from(Span::styled(
        title,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(subtitle, Style::default().fg(Color::DarkGray))));
    lines.push(Line::default());
}

fn entries(lines: &mut Vec<Line<'static>>, items: &[(&'static str, Color, &'static str)]) {
    for (title, color, body) in items {
        lines.push(Line::from(Span::styled(
            format!("● {}", title),
            Style::default().fg(*color).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(*body));
        lines.push(Line::default());
    }
}

fn render_info(app: &App, frame: &mut Frame, area: Rect) {
    let mut lines: Vec<Line<'static>> = Vec::new();

    section(
        &mut lines,
        "The Physics of Bus Overheating",
        "Understanding the three modes of heat transfer is key to monitoring bus heat energy.",
    );
    entries(&mut lines, &PHYSICS);

    section(
        &mut lines,
        "Project Summary & Impact",
        "This system demonstrates how combining physics and AI leads to tangible real-world benefits.",
    );
    lines.push(Line::from(Span::styled(
        "\"Our AI-Based Bus Heat Energy Monitoring System isn't just a technical exercise; it's a solution that directly improves safety, comfort, and efficiency.\"",
        Style::default().add_modifier(Modifier::ITALIC),
    )));
    lines.push(Line::default());
    entries(&mut lines, &IMPACT);
    entries(
        &mut lines,
        &[(
            "A Synthesis of Disciplines",
            Color::Cyan,
            "This project successfully combines the principles of heat energy physics with modern Artificial Intelligence to solve a practical problem, showcasing the power of interdisciplinary innovation.",
        )],
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Physics & Impact ");

    let info = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.info_scroll, 0));
    frame.render_widget(info, area);
}

fn centered_popup(area: Rect, width: u16, rows: usize) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = (rows as u16 + 2).min(area.height.saturating_sub(4));
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn picker_list<'a>(items: Vec<ListItem<'a>>, title: &'a str) -> List<'a> {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ")
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 44, app.available_models.len());
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == &app.selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = picker_list(items, " Select Model (Enter to select, Esc to cancel) ");
    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

fn render_provider_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let providers = Provider::all();
    let popup_area = centered_popup(area, 48, providers.len());
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = providers
        .iter()
        .map(|provider| {
            let source = match app.config.key_source(*provider) {
                Some(source) => format!("({})", source),
                None => "(no key)".to_string(),
            };
            let style = if *provider == app.current_provider {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if app.config.key_source(*provider).is_none() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} {} ", provider.display_name(), source)).style(style)
        })
        .collect();

    let list = picker_list(items, " Select Provider ");
    frame.render_stateful_widget(list, popup_area, &mut app.provider_picker_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use busguardian::{CompletionClient, CompletionFailure, CompletionRequest, Config};
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::Value;
    use std::sync::Arc;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn markdown_bold_and_headings() {
        let line = parse_markdown_line("**Analysis:** hot engine");
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].content, "Analysis:");
        assert!(line.spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[1].content, " hot engine");

        let heading = parse_markdown_line("### Heat Status Analysis");
        assert_eq!(heading.spans[0].content, "Heat Status Analysis");

        let unclosed = parse_markdown_line("a **b");
        assert_eq!(unclosed.spans.len(), 1);
        assert_eq!(unclosed.spans[0].content, "a **b");
    }

    #[test]
    fn input_window_scrolls_to_keep_cursor_visible() {
        assert_eq!(input_window(3, 10), (0, 3));
        assert_eq!(input_window(9, 10), (0, 9));
        assert_eq!(input_window(10, 10), (1, 9));
        assert_eq!(input_window(25, 10), (16, 9));
        assert_eq!(input_window(5, 0), (0, 0));
        assert_eq!(input_window(200_000, 40), (u16::MAX, 39));
    }

    #[test]
    fn long_input_shows_its_tail() {
        let mut app = App::new(Config::new(), Provider::Ollama, "llama3.2:latest".to_string());
        app.input_mode = InputMode::Editing;
        app.chat_input = format!("{}END", "x".repeat(200));
        app.chat_cursor = app.chat_input.chars().count();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(buffer_text(&terminal).contains("xEND"));
    }

    struct Unanswered;

    #[async_trait]
    impl CompletionClient for Unanswered {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Value, CompletionFailure> {
            Err(CompletionFailure::new("no reply"))
        }

        fn model_id(&self) -> &str {
            "unanswered"
        }
    }

    #[tokio::test]
    async fn user_messages_render_markdown() {
        let mut app = App::with_client(
            Config::new(),
            Provider::Ollama,
            "unanswered".to_string(),
            Arc::new(Unanswered),
        );
        app.chat_input = "Is **120°C** too hot?".to_string();
        app.send_question();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Is 120°C too hot?"));
        assert!(!text.contains("**120"));
    }

    #[test]
    fn gauge_bar_has_fixed_width() {
        assert_eq!(gauge_bar(0.0).chars().count(), GAUGE_WIDTH);
        assert_eq!(gauge_bar(1.0), "█".repeat(GAUGE_WIDTH));
        assert_eq!(gauge_bar(0.5).chars().filter(|c| *c == '█').count(), 10);
    }

    #[test]
    fn dashboard_renders_sensors_and_welcome() {
        let mut app = App::new(Config::new(), Provider::Ollama, "llama3.2:latest".to_string());
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Simulation Panel"));
        assert!(text.contains("Engine Temperature: 90°C"));
        assert!(text.contains("Coolant Level: 80%"));
        assert!(text.contains("Welcome to the"));
        assert!(app.chat_area.is_some());
    }

    #[test]
    fn info_screen_renders_physics() {
        let mut app = App::new(Config::new(), Provider::Ollama, "llama3.2:latest".to_string());
        app.screen = Screen::Info;
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("The Physics of Bus Overheating"));
        assert!(text.contains("Convection"));
    }
}

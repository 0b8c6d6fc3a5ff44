use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use crate::app::{App, Modal, SubView};
use crate::input::Mode;
use crate::logs::LogsPanel;
use crate::model::{NODE_AVAILABILITIES, ResourceKind};
use crate::shell_session::ShellSession;
use crate::view::{DetailPanel, Panel};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const LEGEND_ROWS: usize = 4;

pub fn render(frame: &mut Frame, app: &App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(LEGEND_ROWS as u16),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_legends(frame, root[1], app);
    render_body(frame, root[2], app);
    render_footer(frame, root[3], app);

    for modal in app.modals() {
        render_modal(frame, modal, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let left_line = build_left_header_line(app);
    let right_line = build_right_header_line(app);
    let right_width = spans_width(&right_line.spans) as u16;
    if area.width < 42 || right_width == 0 || right_width >= area.width {
        frame.render_widget(
            Paragraph::new(left_line).style(Style::default().bg(BG).fg(Color::White)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(left_line).style(Style::default().bg(BG).fg(Color::White)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(right_line)
            .style(Style::default().bg(BG))
            .alignment(Alignment::Right),
        chunks[1],
    );
}

fn build_left_header_line(app: &App) -> Line<'static> {
    let title = app
        .registry()
        .current()
        .map(|descriptor| descriptor.title.clone())
        .unwrap_or_else(|| "skiff".to_string());

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " 󰡨 skiff ", Color::White, PL_A, PL_B);
    push_powerline_segment(
        &mut spans,
        format!(" {} ", compact_text(app.engine_summary(), 64)),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut spans,
        format!(" {} {title} ", kind_icon(app.current_kind())),
        Color::White,
        PL_C,
        BG,
    );
    Line::from(spans)
}

fn build_right_header_line(app: &App) -> Line<'static> {
    let mut spans = Vec::new();
    if let Some(at) = app.current_panel().and_then(|panel| panel.last_refreshed()) {
        spans.push(Span::styled(
            format!("↻ {} ", at.format("%H:%M:%S")),
            Style::default().fg(MUTED),
        ));
    }
    let current = app.registry().current_name();
    for descriptor in app.registry().descriptors() {
        let active = current == Some(descriptor.name.as_str());
        let style = if active {
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        spans.push(Span::styled(
            format!(" {}:{} ", descriptor.shortcut, descriptor.name),
            style,
        ));
    }
    Line::from(spans)
}

/// Action and navigation legends, folded into columns of `LEGEND_ROWS` entries.
fn render_legends(frame: &mut Frame, area: Rect, app: &App) {
    let mut columns = legend_columns(app.actions_legend(), LEGEND_ROWS);
    let action_columns = columns.len();
    columns.extend(legend_columns(app.navigation_legend(), LEGEND_ROWS));
    if columns.is_empty() {
        frame.render_widget(Paragraph::new("").style(Style::default().bg(BG)), area);
        return;
    }

    let widths = columns
        .iter()
        .map(|column| {
            let width = column.iter().map(|line| line.chars().count()).max().unwrap_or(0);
            Constraint::Length(width as u16 + 3)
        })
        .chain(std::iter::once(Constraint::Min(0)))
        .collect::<Vec<_>>();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(widths)
        .split(area);

    frame.render_widget(Paragraph::new("").style(Style::default().bg(BG)), area);
    for (index, column) in columns.into_iter().enumerate() {
        let color = if index < action_columns { ACCENT } else { MUTED };
        let lines = column
            .into_iter()
            .map(|entry| legend_line(&entry, color))
            .collect::<Vec<_>>();
        frame.render_widget(
            Paragraph::new(lines).style(Style::default().bg(BG)),
            chunks[index],
        );
    }
}

fn legend_line(entry: &str, key_color: Color) -> Line<'static> {
    match entry.split_once(' ') {
        Some((key, label)) if key.starts_with('<') || key.ends_with(':') => Line::from(vec![
            Span::styled(
                format!(" {key}"),
                Style::default().fg(key_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" {label}"), Style::default().fg(Color::White)),
        ]),
        _ => Line::from(Span::styled(
            format!(" {entry}"),
            Style::default().fg(Color::White),
        )),
    }
}

fn legend_columns(legend: &str, rows: usize) -> Vec<Vec<String>> {
    let entries = legend
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    entries
        .chunks(rows.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

fn render_body(frame: &mut Frame, area: Rect, app: &App) {
    match app.subview() {
        Some(SubView::Details(detail)) => render_detail(frame, area, detail),
        Some(SubView::Logs(logs)) => render_logs(frame, area, logs),
        Some(SubView::Shell(session)) => render_shell(frame, area, session),
        None => match app.current_panel() {
            Some(panel) => render_table(frame, area, panel),
            None => frame.render_widget(
                Paragraph::new("No view selected").block(panel_block("skiff".to_string(), MUTED)),
                area,
            ),
        },
    }
}

fn render_table(frame: &mut Frame, area: Rect, panel: &dyn Panel) {
    let headers = panel.headers();
    let header_row = Row::new(headers.iter().map(|header| {
        Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = panel.rows().into_iter().map(|row| {
        Row::new(
            row.into_iter()
                .map(|column| Cell::from(column).style(Style::default().fg(Color::White))),
        )
    });

    let mut title = format!("{} ({})", panel.kind().title(), panel.item_count());
    if !panel.search_term().is_empty() {
        title.push_str(&format!(" /{}", panel.search_term()));
    }

    let table = Table::new(rows, column_constraints(headers.len()))
        .header(header_row)
        .block(panel_block(title, ACCENT))
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(24, 36, 58))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select(table_selection(panel.selected_row(), panel.item_count()));
    frame.render_stateful_widget(table, area, &mut state);
}

/// Row 0 is the header in the controller's numbering.
fn table_selection(selected_row: usize, item_count: usize) -> Option<usize> {
    if item_count == 0 || selected_row == 0 {
        return None;
    }
    Some((selected_row - 1).min(item_count - 1))
}

fn render_detail(frame: &mut Frame, area: Rect, detail: &DetailPanel) {
    let (text, border, fg) = if detail.failed {
        (Text::from(detail.body.clone()), ERROR, ERROR)
    } else {
        (highlight_json_text(&detail.body), ACCENT, Color::White)
    };
    let paragraph = Paragraph::new(text)
        .block(panel_block(detail.title.clone(), border))
        .style(Style::default().fg(fg))
        .wrap(Wrap { trim: false })
        .scroll((detail.scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_logs(frame: &mut Frame, area: Rect, logs: &LogsPanel) {
    let border = if logs.follow() { WARN } else { ACCENT };
    let mut paragraph = Paragraph::new(Text::from(logs.text().to_string()))
        .block(panel_block(logs.title(), border))
        .style(Style::default().fg(Color::White))
        .scroll((logs.scroll(), 0));
    if logs.wrap() {
        paragraph = paragraph.wrap(Wrap { trim: false });
    }
    frame.render_widget(paragraph, area);
}

fn render_shell(frame: &mut Frame, area: Rect, session: &ShellSession) {
    let mut lines = session
        .output()
        .iter()
        .map(|line| Line::from(Span::styled(line.clone(), shell_line_style(line))))
        .collect::<Vec<_>>();
    let prompt = if session.running() {
        Line::from(Span::styled("running…", Style::default().fg(MUTED)))
    } else {
        Line::from(vec![
            Span::styled(
                session.prompt(),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::styled(session.input().to_string(), Style::default().fg(Color::White)),
            Span::styled("█", Style::default().fg(ACCENT)),
        ])
    };
    lines.push(prompt);

    let visible = area.height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible).min(u16::MAX as usize) as u16;
    let paragraph = Paragraph::new(lines)
        .block(panel_block(session.title(), ACCENT))
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn shell_line_style(line: &str) -> Style {
    if line.starts_with("$ ") || line.starts_with("> ") {
        Style::default().fg(ACCENT)
    } else if line.starts_with("Error") || line.starts_with("Warning") {
        Style::default().fg(WARN)
    } else {
        Style::default().fg(Color::White)
    }
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    match app.mode() {
        Mode::Normal | Mode::ShellActive => {
            let (label, bg) = if app.mode() == Mode::ShellActive {
                (" 󰆍 sh ", WARN)
            } else if app.refreshing() {
                (" 󰑓 ref ", PL_C)
            } else {
                (" 󰘳 nrm ", PL_A)
            };
            let fg = if bg == WARN { Color::Black } else { Color::White };
            push_powerline_segment(&mut spans, label, fg, bg, PL_B);
            let width_hint = area.width.saturating_sub(16).max(24) as usize;
            push_powerline_segment(
                &mut spans,
                format!(
                    " {} {} ",
                    footer_status_icon(app.status()),
                    compact_text(app.status(), width_hint)
                ),
                Color::White,
                PL_B,
                BG,
            );
        }
        Mode::CommandEntry => {
            push_powerline_segment(&mut spans, " 󰘳 cmd ", Color::Black, ACCENT, PL_B);
            push_powerline_segment(
                &mut spans,
                format!(" :{} ", app.command_input()),
                Color::White,
                PL_B,
                BG,
            );
            if let Some(error) = app.command_error() {
                spans.push(Span::styled(
                    format!(" {error}"),
                    Style::default().fg(ERROR).add_modifier(Modifier::BOLD),
                ));
            }
        }
        Mode::SearchEntry => {
            push_powerline_segment(&mut spans, " 󰈲 flt ", Color::Black, WARN, PL_B);
            push_powerline_segment(
                &mut spans,
                format!(" /{} ", app.search_input()),
                Color::White,
                PL_B,
                BG,
            );
        }
        Mode::ExecInput => {
            push_powerline_segment(
                &mut spans,
                " Exec Command: ",
                Color::Black,
                Color::Rgb(125, 211, 252),
                PL_B,
            );
            push_powerline_segment(
                &mut spans,
                format!(" {} ", app.exec_input()),
                Color::White,
                PL_B,
                BG,
            );
        }
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_modal(frame: &mut Frame, modal: &Modal, app: &App) {
    let (width, height, popup, fg) = match modal {
        Modal::Help { scroll } => {
            let lines = help_lines(app).into_iter().map(Line::from).collect::<Vec<_>>();
            let popup = Paragraph::new(lines)
                .scroll((*scroll, 0))
                .block(panel_block("Help".to_string(), ACCENT));
            (70, 70, popup, Color::White)
        }
        Modal::Error { title, message } => {
            let mut lines = message
                .lines()
                .map(|line| Line::from(line.to_string()))
                .collect::<Vec<_>>();
            lines.push(Line::from(""));
            lines.push(hint_line("<esc>/<enter> Close"));
            let popup = Paragraph::new(lines)
                .block(panel_block(title.clone(), ERROR));
            (60, 40, popup, ERROR)
        }
        Modal::Confirm { prompt, .. } => {
            let lines = vec![
                Line::from(prompt.clone()),
                Line::from(""),
                hint_line("<y> Yes   <n> No"),
            ];
            let popup = Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(panel_block("Confirm".to_string(), WARN));
            (50, 20, popup, Color::White)
        }
        Modal::ExecOutput {
            title,
            output,
            scroll,
        } => {
            let popup = Paragraph::new(Text::from(output.clone()))
                .scroll((*scroll, 0))
                .block(panel_block(title.clone(), ACCENT));
            (80, 70, popup, Color::White)
        }
        Modal::Scale { item, input, error } => {
            let mut lines = vec![
                Line::from(format!("Replicas for {}:", item.name)),
                Line::from(Span::styled(
                    format!("> {input}█"),
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
                )),
            ];
            if let Some(error) = error {
                lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(ERROR))));
            }
            lines.push(hint_line("<enter> Scale   <esc> Cancel"));
            let popup = Paragraph::new(lines).block(panel_block("Scale Service".to_string(), ACCENT));
            (50, 25, popup, Color::White)
        }
        Modal::Availability { item, selected } => {
            let mut lines = vec![Line::from(format!("Availability for {}:", item.name))];
            lines.extend(NODE_AVAILABILITIES.iter().enumerate().map(|(index, choice)| {
                let style = if index == *selected {
                    Style::default().fg(Color::Black).bg(ACCENT).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(format!("  {choice}  "), style))
            }));
            lines.push(hint_line("<enter> Apply   <esc> Cancel"));
            let popup =
                Paragraph::new(lines).block(panel_block("Node Availability".to_string(), ACCENT));
            (40, 30, popup, Color::White)
        }
    };

    let area = centered_rect(width, height, frame.area());
    frame.render_widget(Clear, area);
    frame.render_widget(
        popup
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(fg)),
        area,
    );
}

fn hint_line(text: &'static str) -> Line<'static> {
    Line::from(Span::styled(text, Style::default().fg(MUTED)))
}

fn help_lines(app: &App) -> Vec<String> {
    let mut lines = vec![
        format!("skiff help  mode:{}", help_mode_label(app.mode())),
        String::new(),
        "Global: q quit  : command  / filter  <backspace> back".to_string(),
        "Commands: :<view>  :reload  :help  :quit".to_string(),
        "Filter: type to narrow rows  <enter> keep  <esc> clear".to_string(),
        String::new(),
        "Views:".to_string(),
    ];
    for descriptor in app.registry().descriptors() {
        lines.push(format!(
            "  :{}  {:<14} {}",
            descriptor.shortcut, descriptor.name, descriptor.title
        ));
    }
    lines.push(String::new());
    lines.push("Actions in this view:".to_string());
    lines.extend(
        app.actions_legend()
            .lines()
            .map(|line| format!("  {line}")),
    );
    lines
}

fn help_mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Normal => "normal",
        Mode::CommandEntry => "command",
        Mode::SearchEntry => "filter",
        Mode::ExecInput => "exec",
        Mode::ShellActive => "shell",
    }
}

fn panel_block(title: String, border: Color) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(PANEL))
}

fn kind_icon(kind: Option<ResourceKind>) -> &'static str {
    match kind {
        Some(ResourceKind::Containers) => "󰡨",
        Some(ResourceKind::Images) => "󰋩",
        Some(ResourceKind::Volumes) => "󰋊",
        Some(ResourceKind::Networks) => "󰛳",
        Some(ResourceKind::Services) => "󰒓",
        Some(ResourceKind::Nodes) => "󰣇",
        None => "󰀄",
    }
}

fn footer_status_icon(status_text: &str) -> &'static str {
    let status = status_text.to_ascii_lowercase();
    let has_failure = [
        "failed",
        "error",
        "timed out",
        "unreachable",
        "refused",
        "denied",
        "unknown view",
    ]
    .iter()
    .any(|needle| status.contains(needle));
    if has_failure { "󰅚" } else { "󰄬" }
}

const JSON_KEY: Color = Color::Rgb(103, 232, 249);
const JSON_STRING: Color = Color::Rgb(125, 211, 252);
const JSON_NUMBER: Color = Color::Rgb(251, 146, 60);

/// Colors pretty-printed JSON one line at a time. Each line is
/// `<indent>["key": ]<value>[,]`.
fn highlight_json_text(input: &str) -> Text<'static> {
    Text::from(input.lines().map(highlight_json_line).collect::<Vec<_>>())
}

fn highlight_json_line(line: &str) -> Line<'static> {
    let body = line.trim_start();
    let mut spans = vec![Span::raw(line[..line.len() - body.len()].to_string())];

    let mut rest = body;
    if let Some(key_len) = json_key_len(rest) {
        spans.push(Span::styled(rest[..key_len].to_string(), Style::default().fg(JSON_KEY)));
        spans.push(Span::styled(": ", Style::default().fg(MUTED)));
        rest = &rest[key_len + 2..];
    }

    let (value, comma) = match rest.strip_suffix(',') {
        Some(value) => (value, true),
        None => (rest, false),
    };
    if !value.is_empty() {
        spans.push(Span::styled(value.to_string(), Style::default().fg(json_value_color(value))));
    }
    if comma {
        spans.push(Span::styled(",", Style::default().fg(MUTED)));
    }
    Line::from(spans)
}

/// Length of a leading `"key"` that is followed by `": "`.
fn json_key_len(text: &str) -> Option<usize> {
    let inner = text.strip_prefix('"')?;
    let mut escaped = false;
    for (offset, ch) in inner.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => {
                let len = offset + 2;
                return text[len..].starts_with(": ").then_some(len);
            }
            _ => {}
        }
    }
    None
}

fn json_value_color(value: &str) -> Color {
    match value.chars().next() {
        Some('"') => JSON_STRING,
        Some('{' | '}' | '[' | ']') => MUTED,
        Some(c) if c.is_ascii_digit() || c == '-' => JSON_NUMBER,
        _ if matches!(value, "true" | "false" | "null") => WARN,
        _ => Color::White,
    }
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [band] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(band);
    popup
}

fn column_constraints(columns: usize) -> Vec<Constraint> {
    if columns == 0 {
        return vec![Constraint::Percentage(100)];
    }

    let width = (100 / columns as u16).max(1);
    (0..columns)
        .map(|_| Constraint::Percentage(width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        compact_text, footer_status_icon, highlight_json_text, legend_columns, render,
        table_selection,
    };
    use crate::app::{App, LoopEvent};
    use crate::docker::{DockerCli, ServiceSet};
    use crate::model::{Container, Listing, ResourceKind};
    use crate::panels::build_registry;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use tokio::sync::mpsc;

    #[test]
    fn legends_fold_into_fixed_height_columns() {
        let columns = legend_columns(&ResourceKind::Containers.actions().legend(), 4);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0][0], "<s> Start");
        assert_eq!(columns[1][3], "<e> Exec");
        assert!(legend_columns("", 4).is_empty());
    }

    #[test]
    fn table_selection_skips_header_row() {
        assert_eq!(table_selection(1, 3), Some(0));
        assert_eq!(table_selection(3, 3), Some(2));
        assert_eq!(table_selection(9, 3), Some(2));
        assert_eq!(table_selection(0, 0), None);
    }

    #[test]
    fn compact_text_truncates_with_ellipsis() {
        assert_eq!(compact_text("abcdef", 4), "abc…");
        assert_eq!(compact_text("abc", 4), "abc");
    }

    #[test]
    fn failure_statuses_get_failure_icon() {
        assert_eq!(footer_status_icon("Failed to refresh Containers"), "󰅚");
        assert_eq!(footer_status_icon("Containers: 3 items"), "󰄬");
    }

    #[test]
    fn json_lines_split_key_value_and_comma() {
        let text = highlight_json_text("{\n  \"Id\": \"abc\",\n  \"Running\": true\n}");
        assert_eq!(text.lines.len(), 4);

        let id_line = &text.lines[1];
        let contents = id_line
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect::<Vec<_>>();
        assert_eq!(contents, ["  ", "\"Id\"", ": ", "\"abc\"", ","]);
        assert_eq!(text.lines[2].spans[3].style.fg, Some(super::WARN));
    }

    #[test]
    fn quoted_colon_inside_key_is_not_a_separator() {
        let line = super::highlight_json_line("\"a\\\": b\": 1");
        assert_eq!(line.spans[1].content, "\"a\\\": b\"");
    }

    #[test]
    fn renders_table_with_items() {
        let (tx, _rx) = mpsc::channel(1);
        let registry = build_registry(&ServiceSet::docker(DockerCli::new(None)));
        let mut app = App::new(tx, registry, 200);
        app.start("containers");
        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Containers,
            result: Ok(Listing::Containers(vec![Container {
                id: "0123456789abcdef".to_string(),
                names: "web".to_string(),
                ..Container::default()
            }])),
        });

        let mut terminal = Terminal::new(TestBackend::new(120, 24)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let content = buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>();
        assert!(content.contains("Containers (1)"));
        assert!(content.contains("web"));
        assert!(content.contains("<s>"));
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 24)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn footer_marks_pending_listing() {
        let (tx, _rx) = mpsc::channel(1);
        let registry = build_registry(&ServiceSet::docker(DockerCli::new(None)));
        let mut app = App::new(tx, registry, 200);
        app.start("containers");
        assert!(screen(&app).contains(" ref "));

        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Containers,
            result: Ok(Listing::Containers(Vec::new())),
        });
        let content = screen(&app);
        assert!(!content.contains(" ref "));
        assert!(content.contains(" nrm "));
    }
}

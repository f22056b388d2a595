use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use sampledex_search::SimilarityBand;

use super::App;
use crate::commands::search::band_color;

const BAR_WIDTH: usize = 10;

/// Render the search view.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Query
            Constraint::Length(3), // Filters
            Constraint::Min(5),    // Results
            Constraint::Length(3), // Status bar
        ])
        .split(area);

    render_input(frame, "Search", &app.query, !app.editing_filters, chunks[0]);
    render_input(
        frame,
        "Filters (include=, exclude=, sim=, bpm=, dur=, key=, format=)",
        &app.filter_text,
        app.editing_filters,
        chunks[1],
    );
    render_table(frame, app, chunks[2]);
    render_status(frame, app, chunks[3]);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn render_input(frame: &mut Frame, title: &str, text: &str, focused: bool, area: Rect) {
    let cursor = if focused { "█" } else { "" };
    let input = Paragraph::new(format!("{text}{cursor}")).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(focused))
            .title(title.to_string()),
    );
    frame.render_widget(input, area);
}

/// The band palette shared with the plain `search` output.
fn band_fg(band: SimilarityBand) -> Color {
    Color::from(band_color(band))
}

/// `███████░░░ 72%`
pub fn similarity_bar(similarity: f64) -> String {
    let filled = ((similarity / 100.0) * BAR_WIDTH as f64).round().clamp(0.0, BAR_WIDTH as f64) as usize;
    format!(
        "{}{} {:>3.0}%",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled),
        similarity
    )
}

fn render_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let header = Row::new(vec![
        Cell::from("#").style(Style::default().fg(Color::DarkGray)),
        Cell::from("Name").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("Similarity"),
        Cell::from("BPM"),
        Cell::from("Key"),
        Cell::from("Engine"),
    ])
    .height(1);

    // area.height - 2 for borders - 1 for header
    let viewport_height = area.height.saturating_sub(3) as usize;
    app.scroll_into_view(viewport_height);
    let visible_start = app.offset;
    let visible_end = (visible_start + viewport_height).min(app.hits.len());

    let rows: Vec<Row> = app
        .hits
        .iter()
        .enumerate()
        .skip(visible_start)
        .take(viewport_height)
        .map(|(i, hit)| {
            let metadata = &hit.record.metadata;
            let style = if i == app.selected {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            let name = if app.playing.as_deref() == Some(hit.record.path.as_path()) {
                format!("▶ {}", hit.record.filename)
            } else {
                hit.record.filename.clone()
            };
            let band = SimilarityBand::from_percent(hit.similarity);

            Row::new(vec![
                Cell::from(format!("{}", i + 1)),
                Cell::from(name),
                Cell::from(similarity_bar(hit.similarity))
                    .style(Style::default().fg(band_fg(band))),
                Cell::from(
                    metadata
                        .bpm
                        .map(|bpm| format!("{bpm:.0}"))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(
                    metadata
                        .key
                        .map(|key| key.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(metadata.analysis_engine.to_string()),
            ])
            .style(style)
        })
        .collect();

    let title = if app.hits.len() > viewport_height {
        format!(
            "Results [{}-{} of {}]",
            visible_start + 1,
            visible_end,
            app.hits.len()
        )
    } else {
        "Results".to_string()
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Percentage(40),
            Constraint::Length(16),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(title),
    );

    frame.render_widget(table, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let help = "Enter search  \u{2191}/\u{2193} select  Tab filters  ^P play/stop  ^Y URL  Esc quit";
    let status = Paragraph::new(format!("{}    {}", app.status, help))
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, area);
}

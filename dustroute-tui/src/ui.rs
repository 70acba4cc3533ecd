use std::iter;

use chrono::Local;
use dustroute_core::service::RefreshReport;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, TableState, Wrap},
};

use crate::app::{App, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new(format!(
        "dustroute – overloaded bins and collection route · source: {} · every {}s",
        app.source_name,
        app.refresh_interval.as_secs()
    ))
    .block(Block::default().borders(Borders::ALL).title("Dustroute"));
    frame.render_widget(header, *header_area);

    match (&app.report, app.screen) {
        (None, _) => {
            let paragraph = Paragraph::new("Waiting for the first refresh…")
                .block(Block::default().borders(Borders::ALL))
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, *content_area);
        }
        (Some(report), Screen::Bins) => draw_bins(frame, app, report, *content_area),
        (Some(report), Screen::Route) => draw_route(frame, report, *content_area),
    }

    let nav_hint = "r/F5 refresh · Tab switch view · ↑/↓ move · q/Ctrl-C quit";

    let mut segments = Vec::new();
    if app.is_loading {
        segments.push("Refreshing…".to_owned());
    }
    if let Some(msg) = &app.error_message {
        segments.push(msg.clone());
    }
    if let Some(notice) = &app.notice {
        segments.push(notice.clone());
    }
    if let Some(report) = &app.report {
        let age = (Local::now() - report.generated_at).num_seconds().max(0);
        segments.push(format!(
            "updated {} ({age}s ago)",
            report.generated_at.format("%H:%M:%S")
        ));
    }
    if let Some(path) = &app.written_path {
        segments.push(format!("map: {}", path.display()));
    }
    segments.push(nav_hint.to_owned());

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(segments.join(" · "))
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_bins(frame: &mut Frame<'_>, app: &App, report: &RefreshReport, area: Rect) {
    let threshold = report.settings.threshold;
    let mut stop = 1;

    let rows = report.bins.iter().map(|bin| {
        let overloaded = bin.is_overloaded(threshold);
        let (status, label) = if overloaded {
            stop += 1;
            ("OVERLOADED", stop.to_string())
        } else {
            ("ok", String::new())
        };

        let style = if overloaded {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Green)
        };

        Row::new(vec![
            Cell::from(label),
            Cell::from(bin.name.clone()),
            Cell::from(bin.fill.to_string()),
            Cell::from(status),
            Cell::from(bin.location.to_string()),
        ])
        .style(style)
    });

    let column_widths = [
        Constraint::Length(5),
        Constraint::Min(20),
        Constraint::Length(6),
        Constraint::Length(11),
        Constraint::Length(22),
    ];

    let title = format!(
        "Bins ({} total, threshold {threshold}, {} overloaded)",
        report.bins.len(),
        report.overloaded().count()
    );

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Stop", "Site", "Fill", "Status", "Location"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .column_spacing(1);

    let mut state = TableState::default();
    if !report.bins.is_empty() {
        state.select(Some(app.bin_list_index));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_route(frame: &mut Frame<'_>, report: &RefreshReport, area: Rect) {
    let Some(path) = report.path() else {
        let paragraph = Paragraph::new(format!(
            "All clear: no bin at or above {}. Only the base station is shown on the map.",
            report.settings.threshold
        ))
        .style(Style::default().fg(Color::Green))
        .block(Block::default().borders(Borders::ALL).title("Route"))
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    };

    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // summary
            Constraint::Min(0),    // stops
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [summary_area, stops_area] = chunks else {
        return;
    };

    let summary_style = if path.fallback_legs() > 0 {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let summary = Paragraph::new(format!(
        "{} points · {:.2} km · {} straight-line leg(s)",
        path.len(),
        path.length_km(),
        path.fallback_legs()
    ))
    .style(summary_style)
    .block(Block::default().borders(Borders::ALL).title("Path"));
    frame.render_widget(summary, *summary_area);

    let base = ListItem::new(format!("1. Base station {}", report.settings.base));
    let items = iter::once(base)
        .chain(report.overloaded().enumerate().map(|(idx, bin)| {
            ListItem::new(format!(
                "{}. {} ({}) {}",
                idx + 2,
                bin.name,
                bin.fill,
                bin.location
            ))
        }))
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Stops in visiting order"),
    );
    frame.render_widget(list, *stops_area);
}

//! TUI rendering for charity-map.
//!
//! The list pane and the map pane draw from the same snapshot: the list reads
//! [`ListView`](crate::app::ListView), the map reads the reconciled markers of
//! [`MapAdapter`](crate::map::MapAdapter). Both are updated by the view model
//! subscription, never re-derived here.

use crate::app::{App, Focus, InputMode, LocationState, StatusLevel};
use crate::map::MarkerClass;
use ratatui::{
    prelude::*,
    widgets::{canvas::*, *}, // Imports Map, MapResolution, Canvas, etc.
};

use ratatui::text::Line;

/// Renders one frame based on current application state.
///
/// Layout: event list (45%) on the left; map canvas and detail popup stacked
/// on the right; a one-line status bar at the bottom. Search input and
/// address candidates are drawn as a centered overlay.
pub fn render(f: &mut Frame, app: &App) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(f.size());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(outer[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(9)])
        .split(chunks[1]);

    render_event_list(f, app, chunks[0]);
    render_map(f, app, right[0]);
    render_details(f, app, right[1]);
    render_status_bar(f, app, outer[1]);

    match &app.input_mode {
        InputMode::Normal => {}
        InputMode::Search { query } => render_search_prompt(f, query),
        InputMode::Candidates => render_candidates(f, app),
    }
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border)
}

/// Event table. In ranked mode the first column is the distance; without a
/// location the header says so and the column shows a dash.
fn render_event_list(f: &mut Frame, app: &App, area: Rect) {
    let list = app.list.borrow();
    let snapshot = list.snapshot();

    let title = if snapshot.is_ranked() {
        format!(
            " Events within {:.0} mi ({}) ",
            app.view_model.radius_miles(),
            snapshot.len()
        )
    } else {
        format!(" All events, unsorted: no location ({}) ", snapshot.len())
    };

    let rows: Vec<Row> = snapshot
        .rows()
        .map(|r| {
            let distance = r
                .distance_miles
                .map(|d| format!("{d:>5.1} mi"))
                .unwrap_or_else(|| "    --  ".to_string());
            let name_style = if r.event.coordinate.is_some() {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Row::new(vec![
                Cell::from(distance).style(Style::default().fg(Color::Yellow)),
                Cell::from(r.event.name.clone()).style(name_style),
                Cell::from(r.event.date.format("%b %d").to_string()),
                Cell::from(r.event.host.clone()).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(9),
        Constraint::Percentage(45),
        Constraint::Length(7),
        Constraint::Percentage(30),
    ];
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["DIST", "EVENT", "DATE", "HOST"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(pane_block(title, app.focus == Focus::List))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .bg(Color::Rgb(30, 30, 60))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = TableState::default().with_selected(list.selected_index());
    f.render_stateful_widget(table, area, &mut state);
}

/// Map canvas: world outline, one marker per mappable row, the user crosshair.
fn render_map(f: &mut Frame, app: &App, area: Rect) {
    let map = app.map.borrow();
    let viewport = map.viewport();
    let (x_bounds, y_bounds) = viewport.bounds();
    let selected = app.list.borrow().selected_id();

    let labels: Vec<(f64, f64, Line<'static>)> = map
        .markers()
        .map(|(id, marker)| {
            let (lng, lat) = (marker.position.lng(), marker.position.lat());
            if Some(id) == selected {
                let name = marker
                    .popup
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                (
                    lng,
                    lat,
                    Line::from(vec![
                        Span::styled(
                            "◆",
                            Style::default()
                                .fg(Color::Yellow)
                                .add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(
                            format!(" {name} "),
                            Style::default().fg(Color::Black).bg(Color::Yellow),
                        ),
                    ]),
                )
            } else {
                let style = match marker.class {
                    MarkerClass::Event => Style::default().fg(Color::Magenta),
                    MarkerClass::User => Style::default().fg(Color::Cyan),
                };
                (lng, lat, Line::from(Span::styled("●", style)))
            }
        })
        .collect();
    let user = map.user_marker().map(|m| (m.position.lng(), m.position.lat()));

    let title = format!(" Map · zoom {} · {} markers ", viewport.zoom, map.len());
    let canvas = Canvas::default()
        .block(pane_block(title, app.focus == Focus::Map))
        .marker(symbols::Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(move |ctx| {
            ctx.draw(&Map {
                color: Color::Rgb(50, 50, 50),
                resolution: MapResolution::High,
            });
            ctx.layer();

            for (x, y, label) in &labels {
                ctx.print(*x, *y, label.clone());
            }

            if let Some((x, y)) = user {
                ctx.print(
                    x,
                    y,
                    Line::from(Span::styled(
                        "⌖",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )),
                );
            }
        });

    f.render_widget(canvas, area);
}

/// Popup payload of the selected event plus its description and contact.
fn render_details(f: &mut Frame, app: &App, area: Rect) {
    let list = app.list.borrow();
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let content = match list.selected_row() {
        Some(row) => {
            let ev = row.event;
            let distance = match (row.distance_miles, ev.coordinate) {
                (Some(d), _) => format!("{d:.1} mi away"),
                (None, Some(_)) => "distance unknown (no location)".to_string(),
                (None, None) => "address not resolved".to_string(),
            };
            vec![
                Line::from(Span::styled(
                    ev.name.clone(),
                    bold.fg(Color::Cyan),
                )),
                Line::from(vec![
                    Span::styled("Host:     ", bold),
                    Span::raw(ev.host.clone()),
                ]),
                Line::from(vec![
                    Span::styled("When:     ", bold),
                    Span::raw(ev.date.format("%A, %B %-d %Y").to_string()),
                ]),
                Line::from(vec![
                    Span::styled("Where:    ", bold),
                    Span::raw(ev.location_label.clone()),
                    Span::styled(format!("  ({distance})"), Style::default().fg(Color::Yellow)),
                ]),
                Line::from(vec![
                    Span::styled("Contact:  ", bold),
                    Span::raw(ev.contact_info.clone().unwrap_or_else(|| "N/A".to_string())),
                ]),
                Line::from(Span::styled(
                    ev.description.clone(),
                    Style::default().fg(Color::DarkGray),
                )),
            ]
        }
        None => vec![Line::from(Span::styled(
            "No events to show",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let p = Paragraph::new(content)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(" Event ")
                .borders(Borders::ALL)
                .padding(Padding::horizontal(1)),
        );
    f.render_widget(p, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let location = match &app.location {
        LocationState::Resolving => Span::styled("locating…", Style::default().fg(Color::DarkGray)),
        LocationState::Known(at) => Span::styled(at.to_string(), Style::default().fg(Color::Magenta)),
        LocationState::Unavailable(_) => {
            Span::styled("location unavailable", Style::default().fg(Color::Red))
        }
    };

    let freshness = match app.last_update {
        Some(at) => {
            let secs = at.elapsed().as_secs();
            let color = if app.last_update_success { Color::Green } else { Color::Red };
            Span::styled(format!("updated {secs}s ago"), Style::default().fg(color))
        }
        None => Span::styled("loading events…", Style::default().fg(Color::DarkGray)),
    };

    let mut spans = vec![Span::raw(" "), location, Span::raw(" │ "), freshness, Span::raw(" │ ")];
    match &app.status {
        Some(status) => {
            let color = match status.level {
                StatusLevel::Info => Color::Yellow,
                StatusLevel::Error => Color::Red,
            };
            spans.push(Span::styled(status.text.clone(), Style::default().fg(color)));
        }
        None => spans.push(Span::styled(
            "q quit  j/k select/zoom  Tab list/map  +/- zoom  [/] radius  r refresh  l locate  / search address",
            Style::default().fg(Color::DarkGray),
        )),
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_search_prompt(f: &mut Frame, query: &str) {
    let area = centered_rect(60, 3, f.size());
    f.render_widget(Clear, area);
    let input = Paragraph::new(format!("{query}▏")).block(
        Block::default()
            .title(" Search address (Enter to search, Esc to cancel) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(input, area);
}

fn render_candidates(f: &mut Frame, app: &App) {
    let height = (app.candidates.len() as u16).saturating_add(2).min(12);
    let area = centered_rect(70, height, f.size());
    f.render_widget(Clear, area);

    let items: Vec<ListItem> = app
        .candidates
        .iter()
        .map(|c| ListItem::new(format!("{}  {}", c.display_name, c.coordinate)))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(" Use as my location (Enter) ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Yellow))
        .highlight_symbol(">> ");

    let mut state = ListState::default().with_selected(Some(app.candidate_index));
    f.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let width = (u32::from(r.width) * u32::from(percent_x) / 100) as u16;
    Rect {
        x: r.x + (r.width.saturating_sub(width)) / 2,
        y: r.y + (r.height.saturating_sub(height)) / 2,
        width,
        height: height.min(r.height),
    }
}

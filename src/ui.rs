use crate::core::SiteCore;
use crate::model::{Pinpoint, Tile, View};
use crate::playback::{PlayerState, SourceState};
use ratatui::prelude::*;
use ratatui::widgets::canvas::Canvas;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE: &str = "O2Paris  ";
pub const GALLERY_COLUMNS: usize = 4;
const CARD_HEIGHT: u16 = 5;

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    water: Color,
    selected_bg: Color,
    popup_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(8, 16, 26),
    panel_bg: Color::Rgb(16, 30, 46),
    panel_alt_bg: Color::Rgb(22, 40, 60),
    border: Color::Rgb(64, 132, 190),
    text: Color::Rgb(220, 232, 248),
    muted: Color::Rgb(146, 170, 200),
    accent: Color::Rgb(96, 206, 214),
    alert: Color::Rgb(249, 174, 88),
    water: Color::Rgb(120, 180, 255),
    selected_bg: Color::Rgb(34, 58, 86),
    popup_bg: Color::Rgb(20, 34, 52),
};

fn root_layout(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(area)
}

/// The area holding the gallery grid or the map; mouse scrolling only counts
/// inside it.
pub fn content_rect(area: Rect) -> Rect {
    root_layout(area)[1]
}

pub fn draw(frame: &mut Frame, core: &SiteCore, command: Option<&str>) {
    let colors = PALETTE;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = root_layout(frame.area());
    draw_header(frame, core, vertical[0], &colors);

    match core.view {
        View::Gallery => draw_gallery(frame, core, vertical[1], &colors),
        View::Map => draw_map(frame, core, vertical[1], &colors),
    }

    let footer_line = match command {
        Some(buffer) => Line::from(vec![
            Span::styled(":", Style::default().fg(colors.accent)),
            Span::styled(buffer, Style::default().fg(colors.text)),
        ]),
        None => Line::from(vec![
            Span::styled(keys_hint(core), Style::default().fg(colors.muted)),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(core.status.as_str(), Style::default().fg(colors.text)),
        ]),
    };
    let footer = Paragraph::new(footer_line).block(panel_block(
        if command.is_some() { "Command" } else { "Message" },
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, vertical[2]);

    if core.view == View::Gallery
        && let Some(tile) = core.gallery.modal_tile()
    {
        draw_tile_modal(frame, core, tile, &colors);
    }
}

fn keys_hint(core: &SiteCore) -> &'static str {
    match core.view {
        View::Gallery if core.gallery.modal_tile().is_some() => {
            "Keys: Left/Right browse, Space sound, Esc close, Ctrl+C quit"
        }
        View::Gallery => "Keys: arrows move, Enter open, r reshuffle, Tab map, : command, Ctrl+C quit",
        View::Map => {
            "Keys: Up/Down select, Enter popup, Space play, o solo, x close, t tour, n skip, Tab gallery"
        }
    }
}

fn draw_header(frame: &mut Frame, core: &SiteCore, area: Rect, colors: &Palette) {
    frame.render_widget(
        panel_block("O2Paris", colors.panel_bg, colors.text, colors.border),
        area,
    );
    let inner = area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(inner);

    let mut tabs = vec![Span::styled(
        APP_TITLE,
        Style::default()
            .fg(colors.accent)
            .add_modifier(Modifier::BOLD),
    )];
    for (idx, view) in [View::Gallery, View::Map].into_iter().enumerate() {
        if idx > 0 {
            tabs.push(Span::styled(" -- ", Style::default().fg(colors.muted)));
        }
        let mut style = Style::default().fg(colors.text);
        if view == core.view {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        tabs.push(Span::styled(view.label(), style));
    }
    tabs.push(Span::styled(
        format!(
            "   Tiles {}  |  Points {}/{}",
            core.tiles().len(),
            core.visible_points.len(),
            core.pinpoints.len()
        ),
        Style::default().fg(colors.muted),
    ));
    frame.render_widget(Paragraph::new(Line::from(tabs)), halves[0]);

    let tour = match core.tour().current_index() {
        Some(index) => format!("Tour {}/{}", index + 1, core.tour().len()),
        None => String::from("Tour off"),
    };
    let playing = core.registry().len();
    let right = Line::from(vec![
        Span::styled(tour, Style::default().fg(colors.alert)),
        Span::styled(
            format!("  |  Playing {playing}  |  Vol {} ", progress_bar(core.settings.volume / 2.5, 10)),
            Style::default().fg(colors.muted),
        ),
        Span::styled(
            format!("{:>3}%", (core.settings.volume * 100.0).round() as u16),
            Style::default().fg(colors.text),
        ),
    ]);
    frame.render_widget(Paragraph::new(right).alignment(Alignment::Right), halves[1]);
}

fn draw_gallery(frame: &mut Frame, core: &SiteCore, area: Rect, colors: &Palette) {
    let block = panel_block(
        "Gallery",
        colors.panel_bg,
        colors.text,
        colors.border,
    );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let displayed = core.gallery.displayed();
    if displayed.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled(
                "No tiles yet. Add some to the catalog or start with --scan <dir>.",
                Style::default().fg(colors.muted),
            )),
            inner,
        );
        return;
    }

    let visible_rows = usize::from((inner.height / CARD_HEIGHT).max(1));
    let highlighted_row = core.gallery.highlighted() / GALLERY_COLUMNS;
    let first_row = highlighted_row.saturating_sub(visible_rows.saturating_sub(1));

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(CARD_HEIGHT); visible_rows])
        .split(inner);
    for (row_offset, row_area) in rows.iter().enumerate() {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, GALLERY_COLUMNS as u32); GALLERY_COLUMNS])
            .split(*row_area);
        for (column, card_area) in columns.iter().enumerate() {
            let position = (first_row + row_offset) * GALLERY_COLUMNS + column;
            let Some(tile) = displayed.get(position) else {
                continue;
            };
            let highlighted = position == core.gallery.highlighted();
            draw_card(frame, tile, *card_area, highlighted, colors);
        }
    }
}

fn draw_card(frame: &mut Frame, tile: &Tile, area: Rect, highlighted: bool, colors: &Palette) {
    let bg = if highlighted {
        colors.selected_bg
    } else {
        colors.panel_alt_bg
    };
    let border = if highlighted { colors.accent } else { colors.border };
    let sound = if tile.sound_url.trim().is_empty() { "" } else { "  ~" };
    let lines = vec![
        Line::from(Span::styled(
            format!("{}{sound}", tile.title),
            Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            media_name(&tile.image_url),
            Style::default().fg(colors.muted),
        )),
    ];
    let card = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .style(Style::default().bg(bg)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(card, area);
}

fn draw_tile_modal(frame: &mut Frame, core: &SiteCore, tile: &Tile, colors: &Palette) {
    let popup = centered_rect(frame.area(), 60, 50);
    frame.render_widget(Clear, popup);

    let mut lines = vec![
        Line::from(Span::styled(
            tile.title.as_str(),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            tile.description.as_str(),
            Style::default().fg(colors.text),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Image  {}", tile.image_url),
            Style::default().fg(colors.muted),
        )),
    ];
    if let Some(font) = tile.font() {
        lines.push(Line::from(Span::styled(
            format!("Font   {font}"),
            Style::default().fg(colors.muted),
        )));
    }
    let sound_line = if tile.sound_url.trim().is_empty() {
        String::from("Sound  none")
    } else {
        format!(
            "Sound  {}  [{}]",
            media_name(&tile.sound_url),
            player_label(core, tile.sound_point_id())
        )
    };
    lines.push(Line::from(Span::styled(
        sound_line,
        Style::default().fg(colors.water),
    )));

    let modal = Paragraph::new(lines)
        .block(panel_block(
            "Tile",
            colors.popup_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(modal, popup);
}

fn draw_map(frame: &mut Frame, core: &SiteCore, area: Rect, colors: &Palette) {
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
        .split(area);

    let items: Vec<ListItem> = core
        .visible_points
        .iter()
        .filter_map(|index| core.pinpoints.get(*index))
        .map(|point| {
            let marker = match core.player_state(point.id) {
                Some(PlayerState::Playing) => "  > ",
                Some(PlayerState::Errored) => "  ! ",
                Some(_) => "  o ",
                None => "    ",
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.accent)),
                Span::styled(point.title.as_str(), Style::default().fg(colors.text)),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!core.visible_points.is_empty()).then_some(core.selected_point));

    let title = if core.search.is_empty() {
        String::from("Points")
    } else {
        format!("Points / \"{}\"", core.search)
    };
    let list = List::new(items)
        .block(panel_block(&title, colors.panel_bg, colors.text, colors.border))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, body[0], &mut state);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(8)])
        .split(body[1]);
    draw_canvas(frame, core, right[0], colors);
    draw_popup(frame, core, right[1], colors);
}

/// Flat lat/lng plot centred on the selected point, scaled by the configured
/// zoom level like a slippy map.
fn draw_canvas(frame: &mut Frame, core: &SiteCore, area: Rect, colors: &Palette) {
    let (center_lat, center_lng) = core
        .selected_pinpoint()
        .map(|point| (point.latitude, point.longitude))
        .unwrap_or((core.map_config.center_lat, core.map_config.center_lng));
    let span = 360.0 / 2_f64.powi(i32::from(core.map_config.zoom_level));
    let selected_id = core.selected_pinpoint().map(|point| point.id);

    let visible: Vec<&Pinpoint> = core
        .visible_points
        .iter()
        .filter_map(|index| core.pinpoints.get(*index))
        .collect();

    let title = format!("Map  zoom {}", core.map_config.zoom_level);
    let canvas = Canvas::default()
        .block(panel_block(
            &title,
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .background_color(colors.panel_alt_bg)
        .x_bounds([center_lng - span, center_lng + span])
        .y_bounds([center_lat - span / 2.0, center_lat + span / 2.0])
        .paint(|ctx| {
            for point in &visible {
                let (glyph, color) = if Some(point.id) == selected_id {
                    ("@", colors.alert)
                } else if core.registry().is_registered(point.id) {
                    ("*", colors.accent)
                } else {
                    ("o", colors.water)
                };
                ctx.print(
                    point.longitude,
                    point.latitude,
                    Span::styled(glyph, Style::default().fg(color)),
                );
            }
        });
    frame.render_widget(canvas, area);
}

fn draw_popup(frame: &mut Frame, core: &SiteCore, area: Rect, colors: &Palette) {
    let Some(point) = core.selected_pinpoint() else {
        frame.render_widget(
            Paragraph::new(Span::styled("No point selected", Style::default().fg(colors.muted)))
                .block(panel_block("Popup", colors.popup_bg, colors.text, colors.border)),
            area,
        );
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(
            point.title.as_str(),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            point.description.as_str(),
            Style::default().fg(colors.text),
        )),
        Line::from(Span::styled(
            format!("{:.5}, {:.5}", point.latitude, point.longitude),
            Style::default().fg(colors.muted),
        )),
    ];

    if core.is_popup_open(point.id) {
        lines.push(Line::from(Span::styled(
            format!("Audio  [{}]", player_label(core, point.id)),
            Style::default().fg(colors.water),
        )));
        if core.others_playing(point.id) {
            lines.push(Line::from(Span::styled(
                "Other sounds are playing, press o to solo",
                Style::default().fg(colors.alert),
            )));
        }
    } else {
        lines.push(Line::from(Span::styled(
            "Popup closed, press Enter to open",
            Style::default().fg(colors.muted),
        )));
    }

    let popup = Paragraph::new(lines)
        .block(panel_block("Popup", colors.popup_bg, colors.text, colors.border))
        .wrap(Wrap { trim: true });
    frame.render_widget(popup, area);
}

fn player_label(core: &SiteCore, point_id: i64) -> String {
    let Some(player) = core.player(point_id) else {
        return String::from("closed");
    };
    if let Some(message) = player.error() {
        return message.to_string();
    }
    let state = match player.state() {
        PlayerState::Idle => "paused",
        PlayerState::Loading => "loading",
        PlayerState::Playing => "playing",
        PlayerState::Errored => "error",
    };
    match player.source_state() {
        SourceState::Primary => state.to_string(),
        SourceState::Fallback | SourceState::Failed => format!("{state}, fallback tone"),
    }
}

fn media_name(media_ref: &str) -> String {
    if media_ref.starts_with("data:") {
        return String::from("embedded");
    }
    media_ref
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(media_ref)
        .to_string()
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn progress_bar(ratio: f32, width: usize) -> String {
    let clamped = ratio.clamp(0.0, 1.0);
    let filled = (clamped * width as f32).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

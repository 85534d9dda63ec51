use crate::audio::{AudioBackend, NullBackend, RodioBackend};
use crate::catalog;
use crate::config;
use crate::core::SiteCore;
use crate::logging;
use crate::model::{Catalog, Settings, View};
use crate::shuffle::Shuffler;
use crate::ui::GALLERY_COLUMNS;
use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const VOLUME_STEP: f32 = 0.05;
const INPUT_POLL: Duration = Duration::from_millis(33);

/// What `main` parsed from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchOptions {
    pub catalog: Option<PathBuf>,
    pub scan: Option<PathBuf>,
    pub mute: bool,
    pub view: Option<View>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    EnterCommand(&'static str),
    Quit,
}

pub fn run(options: LaunchOptions) -> Result<()> {
    config::ensure_config_dir()?;
    logging::init_logging(&config::log_path()?)?;

    let settings = config::load_settings()?;
    let (catalog, media_dir) = load_site(&options, &settings)?;
    let backend = open_backend(options.mute, settings.volume);
    let mut core = SiteCore::new(catalog, settings, backend, media_dir, Shuffler::new());
    if let Some(view) = options.view {
        core.set_view(view);
    }

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut command_mode = false;
    let mut command_buffer = String::new();
    let mut last_draw = Instant::now();
    let mut content_rect = ratatui::prelude::Rect::default();

    let result: Result<()> = loop {
        core.tick(Instant::now());

        if core.dirty || last_draw.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| {
                content_rect = crate::ui::content_rect(frame.area());
                let command = command_mode.then_some(command_buffer.as_str());
                crate::ui::draw(frame, &core, command)
            })?;
            core.dirty = false;
            last_draw = Instant::now();
        }

        if !event::poll(poll_timeout(&core, Instant::now()))? {
            continue;
        }

        let event = event::read()?;
        if let Event::Mouse(mouse) = event {
            handle_mouse(&mut core, mouse, content_rect);
            continue;
        }

        let Event::Key(key) = event else {
            continue;
        };

        if key.kind != KeyEventKind::Press {
            continue;
        }

        if command_mode {
            match key.code {
                KeyCode::Esc => {
                    command_mode = false;
                    command_buffer.clear();
                    core.dirty = true;
                }
                KeyCode::Enter => {
                    run_command(&mut core, &command_buffer, Instant::now());
                    command_mode = false;
                    command_buffer.clear();
                }
                KeyCode::Backspace => {
                    command_buffer.pop();
                    core.dirty = true;
                }
                KeyCode::Char(ch) => {
                    command_buffer.push(ch);
                    core.dirty = true;
                }
                _ => {}
            }
            continue;
        }

        match handle_key(&mut core, key, Instant::now()) {
            KeyOutcome::Continue => {}
            KeyOutcome::EnterCommand(prefill) => {
                command_mode = true;
                command_buffer = prefill.to_string();
                core.dirty = true;
            }
            KeyOutcome::Quit => break Ok(()),
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    core.close_all_popups();
    core.close_tile_modal();
    let save_result = core.save();
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "terminal loop failed");
    }
    tracing::info!("shutting down");
    result?;
    save_result?;
    Ok(())
}

/// Catalog plus the directory relative media references resolve against.
/// A scanned folder supplies the tiles and becomes the media directory;
/// pinpoints still come from the catalog file.
fn load_site(options: &LaunchOptions, settings: &Settings) -> Result<(Catalog, Option<PathBuf>)> {
    let catalog_path = config::resolve_catalog_path(options.catalog.as_deref(), settings)?;
    let mut site = catalog::load_catalog(&catalog_path)?;

    if let Some(dir) = &options.scan {
        let dir = config::normalize_path(dir);
        if !dir.is_dir() {
            anyhow::bail!("{} is not a directory", dir.display());
        }
        site.tiles = catalog::scan_media_dir(&dir);
        return Ok((site, Some(dir)));
    }

    let media_dir = settings
        .media_dir
        .clone()
        .or_else(|| catalog_path.parent().map(PathBuf::from));
    Ok((site, media_dir))
}

fn open_backend(mute: bool, volume: f32) -> Box<dyn AudioBackend> {
    if mute {
        tracing::info!("audio muted from the command line");
        return Box::new(NullBackend::new());
    }
    match RodioBackend::new(volume).context("audio output unavailable") {
        Ok(backend) => Box::new(backend),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "continuing without sound");
            Box::new(NullBackend::new())
        }
    }
}

/// Input wait, cut short when a tour follow-up comes due sooner.
fn poll_timeout(core: &SiteCore, now: Instant) -> Duration {
    core.tour()
        .next_due()
        .map_or(INPUT_POLL, |due| due.saturating_duration_since(now).min(INPUT_POLL))
}

fn handle_key(core: &mut SiteCore, key: KeyEvent, now: Instant) -> KeyOutcome {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return KeyOutcome::Quit;
        }
        KeyCode::Char(':') => return KeyOutcome::EnterCommand(""),
        KeyCode::Char('/') => return KeyOutcome::EnterCommand("search "),
        KeyCode::Tab => {
            core.toggle_view();
            return KeyOutcome::Continue;
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            core.set_volume(core.settings.volume + VOLUME_STEP);
            return KeyOutcome::Continue;
        }
        KeyCode::Char('-') => {
            core.set_volume(core.settings.volume - VOLUME_STEP);
            return KeyOutcome::Continue;
        }
        KeyCode::Char('s') => {
            save_or_report(core);
            return KeyOutcome::Continue;
        }
        KeyCode::Char('t') => {
            if core.tour().is_active() {
                core.stop_tour();
            } else {
                core.start_tour(now);
            }
            return KeyOutcome::Continue;
        }
        KeyCode::Char('n') => {
            core.skip_tour(now);
            return KeyOutcome::Continue;
        }
        _ => {}
    }

    match core.view {
        View::Gallery if core.gallery.modal_tile().is_some() => match key.code {
            KeyCode::Right => core.tile_modal_next(),
            KeyCode::Left => core.tile_modal_prev(),
            KeyCode::Char(' ') => {
                core.toggle_tile_sound();
            }
            KeyCode::Esc | KeyCode::Enter => core.close_tile_modal(),
            _ => {}
        },
        View::Gallery => match key.code {
            KeyCode::Right => core.gallery_move(1),
            KeyCode::Left => core.gallery_move(-1),
            KeyCode::Down => core.gallery_move(GALLERY_COLUMNS as isize),
            KeyCode::Up => core.gallery_move(-(GALLERY_COLUMNS as isize)),
            KeyCode::Enter => {
                core.open_tile_modal();
            }
            KeyCode::Char('r') => core.reshuffle(),
            KeyCode::Char('q') => return KeyOutcome::Quit,
            _ => {}
        },
        View::Map => {
            let selected = core.selected_pinpoint().map(|point| point.id);
            match key.code {
                KeyCode::Down => core.select_next_point(),
                KeyCode::Up => core.select_prev_point(),
                KeyCode::Enter => {
                    core.open_selected_popup();
                }
                KeyCode::Char(' ') => {
                    core.toggle_selected_audio();
                }
                KeyCode::Char('o') => {
                    if let Some(point_id) = selected {
                        core.solo(point_id);
                    }
                }
                KeyCode::Char('x') | KeyCode::Esc => {
                    if let Some(point_id) = selected {
                        core.close_popup(point_id);
                    }
                }
                KeyCode::Char('q') => return KeyOutcome::Quit,
                _ => {}
            }
        }
    }
    KeyOutcome::Continue
}

fn handle_mouse(core: &mut SiteCore, mouse: MouseEvent, content_rect: ratatui::prelude::Rect) {
    if !point_in_rect(mouse.column, mouse.row, content_rect) {
        return;
    }
    match (core.view, mouse.kind) {
        (View::Gallery, MouseEventKind::ScrollDown) => core.gallery_move(GALLERY_COLUMNS as isize),
        (View::Gallery, MouseEventKind::ScrollUp) => {
            core.gallery_move(-(GALLERY_COLUMNS as isize))
        }
        (View::Map, MouseEventKind::ScrollDown) => core.select_next_point(),
        (View::Map, MouseEventKind::ScrollUp) => core.select_prev_point(),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: ratatui::prelude::Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

fn save_or_report(core: &mut SiteCore) {
    if let Err(err) = core.save() {
        core.status = format!("save error: {err:#}");
        core.dirty = true;
    }
}

fn run_command(core: &mut SiteCore, raw: &str, now: Instant) {
    let input = raw.trim();
    if input.is_empty() {
        core.status = String::from("No command");
        core.dirty = true;
        return;
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim();

    match command {
        "help" => {
            core.status = String::from(
                "Commands: search [text] | tour <start|stop|skip> | view <gallery|map> | open <id> | close [id|all] | solo [id] | volume <0-250> | reshuffle | save",
            );
            core.dirty = true;
        }
        "search" => core.set_search(rest),
        "tour" => match rest {
            "start" => core.start_tour(now),
            "stop" => core.stop_tour(),
            "skip" | "next" => core.skip_tour(now),
            _ => {
                core.status = String::from("Usage: tour <start|stop|skip>");
                core.dirty = true;
            }
        },
        "view" => match View::parse(rest) {
            Some(view) => core.set_view(view),
            None => {
                core.status = String::from("Usage: view <gallery|map>");
                core.dirty = true;
            }
        },
        "open" => match rest.parse::<i64>() {
            Ok(point_id) => {
                core.set_view(View::Map);
                core.open_popup(point_id);
            }
            Err(_) => {
                core.status = String::from("Usage: open <id>");
                core.dirty = true;
            }
        },
        "close" => match rest {
            "all" => core.close_all_popups(),
            "" => {
                if let Some(point_id) = core.selected_pinpoint().map(|point| point.id) {
                    core.close_popup(point_id);
                }
            }
            id => match id.parse::<i64>() {
                Ok(point_id) => core.close_popup(point_id),
                Err(_) => {
                    core.status = String::from("Usage: close [id|all]");
                    core.dirty = true;
                }
            },
        },
        "solo" => {
            let target = if rest.is_empty() {
                core.selected_pinpoint().map(|point| point.id)
            } else {
                rest.parse::<i64>().ok()
            };
            match target {
                Some(point_id) => {
                    core.solo(point_id);
                }
                None => {
                    core.status = String::from("Usage: solo [id]");
                    core.dirty = true;
                }
            }
        }
        "volume" => match rest.trim_end_matches('%').parse::<f32>() {
            Ok(percent) if (0.0..=250.0).contains(&percent) => core.set_volume(percent / 100.0),
            _ => {
                core.status = String::from("Usage: volume <0-250>");
                core.dirty = true;
            }
        },
        "reshuffle" => core.reshuffle(),
        "save" => save_or_report(core),
        _ => {
            core.status = String::from("Unknown command. Use :help");
            core.dirty = true;
        }
    }
}

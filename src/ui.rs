use crate::catalog::{self, Filter, Sort};
use crate::favorites::{FavoriteSet, FavoritesStore};
use crate::fetch::FetchState;
use crate::models::{ElementType, EnrichedEntry, EntryCounts, PokemonRecord};
use crate::sprites::{sprite_path, SpriteCache};
use crate::utils::{evolution_line, format_name, size_line, stat_label, text_to_lines};
use crossterm::event::KeyCode;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Span, Spans};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::warn;

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Quit,
    Refresh,
}

pub struct App {
    pub entries: Vec<EnrichedEntry>,
    /// Filtered and sorted indices into `entries`.
    pub visible: Vec<usize>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
    /// Index within the current page.
    pub selected: usize,
    pub search_mode: bool,
    pub filter: Filter,
    pub sort: Sort,
    pub favorites: FavoriteSet,
    pub fetch_state: Option<Arc<Mutex<FetchState>>>,
    pub show_sprites: bool,
    pub show_help: bool,
    pub status: Option<String>,
    pub sprite_cache: SpriteCache,
    sprite_dir: PathBuf,
    store: Arc<dyn FavoritesStore>,
    favorites_rx: watch::Receiver<FavoriteSet>,
    type_cursor: Option<usize>,
    weakness_cursor: Option<usize>,
}

impl App {
    pub fn new(
        entries: Vec<EnrichedEntry>,
        store: Arc<dyn FavoritesStore>,
        sprite_dir: PathBuf,
        page_size: usize,
    ) -> Self {
        let mut favorites_rx = store.subscribe();
        let (favorites, status) = match store.get() {
            Ok(set) => (set, None),
            Err(e) => {
                warn!(error = %e, "favorites unavailable");
                (favorites_rx.borrow_and_update().clone(), Some(format!("favorites: {}", e)))
            }
        };
        let mut app = Self {
            entries,
            visible: Vec::new(),
            page: 1,
            page_size: page_size.max(1),
            selected: 0,
            search_mode: false,
            filter: Filter::default(),
            sort: Sort::default(),
            favorites,
            fetch_state: None,
            show_sprites: true,
            show_help: false,
            status,
            sprite_cache: SpriteCache::new(),
            sprite_dir,
            store,
            favorites_rx,
            type_cursor: None,
            weakness_cursor: None,
        };
        app.apply_filter();
        app
    }

    /// Swap in a freshly fetched entry list.
    pub fn set_entries(&mut self, entries: Vec<EnrichedEntry>) {
        self.entries = entries;
        self.apply_filter();
        self.preload_sprites();
    }

    /// Decode thumbnails for every entry on a background thread so the first
    /// view of a Pokémon does not wait on disk.
    pub fn preload_sprites(&self) {
        let items = self
            .entries
            .iter()
            .filter_map(EnrichedEntry::record)
            .filter_map(|r| sprite_path(&self.sprite_dir, r).map(|p| (r.id, p)))
            .collect();
        self.sprite_cache.preload(items);
    }

    pub fn apply_filter(&mut self) {
        self.visible = catalog::view(&self.entries, &self.filter, self.sort, &self.favorites);
        let pages = self.page_count();
        if self.page > pages {
            self.page = pages;
        }
        let on_page = self.page_items().len();
        if on_page == 0 {
            self.selected = 0;
        } else if self.selected >= on_page {
            self.selected = on_page - 1;
        }
    }

    pub fn page_count(&self) -> usize {
        catalog::page_count(self.visible.len(), self.page_size).unwrap_or(1)
    }

    pub fn page_items(&self) -> &[usize] {
        catalog::page(&self.visible, self.page, self.page_size).unwrap_or(&[])
    }

    pub fn selected_entry(&self) -> Option<&EnrichedEntry> {
        self.page_items()
            .get(self.selected)
            .and_then(|&i| self.entries.get(i))
    }

    pub fn next(&mut self) {
        let n = self.page_items().len();
        if n > 0 {
            self.selected = (self.selected + 1) % n;
        }
    }

    pub fn previous(&mut self) {
        let n = self.page_items().len();
        if n > 0 {
            if self.selected == 0 {
                self.selected = n - 1;
            } else {
                self.selected -= 1;
            }
        }
    }

    pub fn next_page(&mut self) {
        if self.page < self.page_count() {
            self.page += 1;
            self.selected = 0;
        }
    }

    pub fn previous_page(&mut self) {
        if self.page > 1 {
            self.page -= 1;
            self.selected = 0;
        }
    }

    pub fn counts(&self) -> EntryCounts {
        EntryCounts::tally(&self.entries)
    }

    pub fn is_favorite(&self, id: u32) -> bool {
        self.favorites.contains(&id)
    }

    pub fn toggle_favorite(&mut self) {
        let Some(record) = self.selected_entry().and_then(EnrichedEntry::record) else {
            self.status = Some("cannot favorite an entry that failed to load".to_string());
            return;
        };
        let (id, name) = (record.id, format_name(&record.name));
        match self.store.toggle(id) {
            Ok(now) => {
                self.status = Some(if now {
                    format!("★ {} added to favorites", name)
                } else {
                    format!("{} removed from favorites", name)
                });
                self.sync_favorites();
            }
            Err(e) => {
                warn!(id, error = %e, "favorite toggle failed");
                self.status = Some(format!("favorites: {}", e));
            }
        }
    }

    /// Pick up favorites changes published by the store.
    pub fn sync_favorites(&mut self) {
        if self.favorites_rx.has_changed().unwrap_or(false) {
            self.favorites = self.favorites_rx.borrow_and_update().clone();
            if self.filter.favorites_only {
                self.apply_filter();
            }
        }
    }

    pub fn toggle_favorites_view(&mut self) {
        self.filter.favorites_only = !self.filter.favorites_only;
        self.page = 1;
        self.apply_filter();
    }

    /// Step the type filter through the eighteen types and back to "any".
    pub fn cycle_type_filter(&mut self) {
        self.type_cursor = step(self.type_cursor);
        self.filter.types = self.type_cursor.map(|i| vec![ElementType::ALL[i]]).unwrap_or_default();
        self.page = 1;
        self.apply_filter();
    }

    pub fn cycle_weakness_filter(&mut self) {
        self.weakness_cursor = step(self.weakness_cursor);
        self.filter.weaknesses = self
            .weakness_cursor
            .map(|i| vec![ElementType::ALL[i]])
            .unwrap_or_default();
        self.page = 1;
        self.apply_filter();
    }

    pub fn cycle_sort(&mut self) {
        self.sort = self.sort.next();
        self.apply_filter();
    }

    pub fn on_key(&mut self, code: KeyCode) -> KeyAction {
        if self.search_mode {
            match code {
                KeyCode::Enter | KeyCode::Esc => {
                    self.search_mode = false;
                }
                KeyCode::Backspace => {
                    self.filter.query.pop();
                    self.page = 1;
                    self.apply_filter();
                }
                KeyCode::Char(c) => {
                    self.filter.query.push(c);
                    self.page = 1;
                    self.apply_filter();
                }
                _ => {}
            }
            return KeyAction::None;
        }

        match code {
            KeyCode::Char('q') => return KeyAction::Quit,
            KeyCode::Char('r') => return KeyAction::Refresh,
            KeyCode::F(1) | KeyCode::Char('h') => {
                self.show_help = !self.show_help;
            }
            KeyCode::Char('/') => {
                self.search_mode = true;
                self.filter.query.clear();
                self.page = 1;
                self.apply_filter();
            }
            KeyCode::Down => self.next(),
            KeyCode::Up => self.previous(),
            KeyCode::PageDown | KeyCode::Char(']') => self.next_page(),
            KeyCode::PageUp | KeyCode::Char('[') => self.previous_page(),
            KeyCode::Char('f') => self.toggle_favorite(),
            KeyCode::Char('v') => self.toggle_favorites_view(),
            KeyCode::Char('t') => self.cycle_type_filter(),
            KeyCode::Char('w') => self.cycle_weakness_filter(),
            KeyCode::Char('s') => self.cycle_sort(),
            KeyCode::Char('p') => {
                self.show_sprites = !self.show_sprites;
            }
            _ => {}
        }
        KeyAction::None
    }

    fn sprite_rows(&self, record: &PokemonRecord, w: u32, h: u32) -> Option<Vec<Vec<(u8, u8, u8)>>> {
        let path = sprite_path(&self.sprite_dir, record)?;
        self.sprite_cache.pixels(record.id, &path, w, h)
    }
}

fn step(cursor: Option<usize>) -> Option<usize> {
    match cursor {
        None => Some(0),
        Some(i) if i + 1 < ElementType::ALL.len() => Some(i + 1),
        Some(_) => None,
    }
}

pub fn draw_ui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    terminal
        .draw(|f| {
            let app: &App = app;
            let outer = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(1)])
                .split(f.size());
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
                .split(outer[0]);
            let left_chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(3)])
                .split(chunks[0]);

            draw_list(f, app, left_chunks[0]);
            draw_search_or_progress(f, app, left_chunks[1]);
            match app.selected_entry() {
                Some(EnrichedEntry::Failed { stub, reason, retryable }) => {
                    draw_failure(f, &stub.name, reason, *retryable, chunks[1])
                }
                Some(EnrichedEntry::Complete(record)) => draw_detail(f, app, record, &[], chunks[1]),
                Some(EnrichedEntry::Partial {
                    record,
                    missing_relations,
                }) => draw_detail(f, app, record, missing_relations, chunks[1]),
                None => {
                    let p = Paragraph::new("No Pokémon match the filter")
                        .block(Block::default().borders(Borders::ALL).title("Details"));
                    f.render_widget(p, chunks[1]);
                }
            }
            draw_status(f, app, outer[1]);

            if app.show_help {
                draw_help(f);
            }
        })
        .map(|_| ())
}

fn draw_list<B: Backend>(f: &mut Frame<B>, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .page_items()
        .iter()
        .filter_map(|&i| app.entries.get(i))
        .map(|entry| {
            let line = match entry {
                EnrichedEntry::Failed { stub, .. } => Spans::from(Span::styled(
                    format!("x {}", format_name(&stub.name)),
                    Style::default().fg(Color::Red),
                )),
                EnrichedEntry::Complete(r) | EnrichedEntry::Partial { record: r, .. } => {
                    let star = if app.is_favorite(r.id) { "★" } else { " " };
                    let mark = if entry.is_partial() { "!" } else { " " };
                    Spans::from(vec![
                        Span::styled(star, Style::default().fg(Color::Yellow)),
                        Span::styled(mark, Style::default().fg(Color::LightRed)),
                        Span::raw(format!("#{} {}", r.id, format_name(&r.name))),
                    ])
                }
            };
            ListItem::new(vec![line])
        })
        .collect();

    let title = format!("Pokémon ({}/{}) page {}/{}", app.visible.len(), app.entries.len(), app.page, app.page_count());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !app.page_items().is_empty() {
        state.select(Some(app.selected));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_search_or_progress<B: Backend>(f: &mut Frame<B>, app: &App, area: Rect) {
    let progress = app
        .fetch_state
        .as_ref()
        .and_then(|s| s.lock().ok().map(|st| st.clone()))
        .filter(|st| st.in_progress);
    if let Some(st) = progress {
        let gauge = Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Fetching Pokémon"),
            )
            .gauge_style(Style::default().fg(Color::Green))
            .label(format!("{}/{}", st.fetched, st.total))
            .ratio(st.ratio());
        f.render_widget(gauge, area);
        return;
    }

    let text = if app.search_mode {
        format!("/{}", app.filter.query)
    } else if !app.filter.query.is_empty() {
        format!("/{}  (press / to search again)", app.filter.query)
    } else {
        "Press '/' to search. Type to filter by name or type.".to_string()
    };
    let para = Paragraph::new(vec![Spans::from(Span::raw(text))])
        .block(Block::default().borders(Borders::ALL).title("Search"));
    f.render_widget(para, area);
}

fn type_badges<'a>(label: &'a str, types: &[String]) -> Spans<'a> {
    let mut spans: Vec<Span> = vec![Span::raw(label)];
    if types.is_empty() {
        spans.push(Span::styled("none known", Style::default().fg(Color::DarkGray)));
    }
    for (i, t) in types.iter().enumerate() {
        let (r, g, b) = t
            .parse::<ElementType>()
            .map(ElementType::rgb)
            .unwrap_or((200, 200, 200));
        // choose contrasting foreground (black or white)
        let lum = 0.2126 * (r as f32) + 0.7152 * (g as f32) + 0.0722 * (b as f32);
        let fg = if lum > 160.0 { Color::Black } else { Color::White };
        spans.push(Span::styled(
            format!(" {} ", format_name(t)),
            Style::default().fg(fg).bg(Color::Rgb(r, g, b)),
        ));
        if i + 1 < types.len() {
            spans.push(Span::raw(" "));
        }
    }
    Spans::from(spans)
}

fn draw_detail<B: Backend>(
    f: &mut Frame<B>,
    app: &App,
    p: &PokemonRecord,
    missing: &[String],
    area: Rect,
) {
    let detail_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(12), Constraint::Min(6)])
        .split(area);
    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(24), Constraint::Min(10)])
        .split(detail_chunks[0]);

    let sprite_block = Block::default().borders(Borders::ALL).title("Sprite");
    let sprite_para = if !app.show_sprites {
        Paragraph::new("(sprites off)").block(sprite_block)
    } else {
        let rect = top_chunks[0];
        let sprite_w = u32::from(rect.width.saturating_sub(2).max(1)).min(64);
        let sprite_h = u32::from(rect.height.saturating_sub(2).max(1)).min(64);
        match app.sprite_rows(p, sprite_w, sprite_h) {
            Some(rows) => {
                let text: Vec<Spans> = rows
                    .iter()
                    .map(|row| {
                        Spans::from(
                            row.iter()
                                .map(|&(r, g, b)| Span::styled(" ", Style::default().bg(Color::Rgb(r, g, b))))
                                .collect::<Vec<_>>(),
                        )
                    })
                    .collect();
                Paragraph::new(text).block(sprite_block)
            }
            None => Paragraph::new("(no sprite)").block(sprite_block),
        }
    };
    f.render_widget(sprite_para, top_chunks[0]);

    let star = if app.is_favorite(p.id) { " ★" } else { "" };
    let mut info_lines: Vec<Spans> = vec![
        Spans::from(Span::styled(
            format!("{} (#{}){}", format_name(&p.name), p.id, star),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        type_badges("Types: ", &p.types),
        type_badges("Weak to: ", &p.weaknesses),
        type_badges("Strong vs: ", &p.strengths),
    ];
    if !missing.is_empty() {
        info_lines.push(Spans::from(Span::styled(
            format!("Incomplete: no relation data for {} (r to retry)", missing.join(", ")),
            Style::default().fg(Color::LightRed),
        )));
    }
    if !p.abilities.is_empty() {
        info_lines.push(Spans::from(Span::raw(format!(
            "Abilities: {}",
            p.abilities.join(", ")
        ))));
    }
    info_lines.push(Spans::from(Span::raw(size_line(p))));
    if let Some(line) = evolution_line(&p.evolutions) {
        info_lines.push(Spans::from(Span::raw(format!("Evolutions: {}", line))));
    }
    let info_para = Paragraph::new(info_lines)
        .block(Block::default().borders(Borders::ALL).title("Info"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_para, top_chunks[1]);

    let bottom_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(10)])
        .split(detail_chunks[1]);

    // NAME | VALUE | bar, scaled against the largest stat in the list so bars
    // compare across entries
    let stats_rect = bottom_chunks[0];
    let inner_w = stats_rect.width.saturating_sub(2).max(1) as usize;
    let name_w = 10usize;
    let val_w = 4usize;
    let bar_max_w = inner_w.saturating_sub(name_w + val_w + 2);
    let global_max = app
        .entries
        .iter()
        .filter_map(EnrichedEntry::record)
        .flat_map(|pp| pp.stats.iter().map(|s| s.base))
        .max()
        .unwrap_or(1) as f32;
    let scale_max = global_max.clamp(1.0, 255.0);

    let stat_lines: Vec<Spans> = p
        .stats
        .iter()
        .map(|st| {
            let bar_len = (((st.base as f32) / scale_max) * (bar_max_w as f32)).round() as usize;
            let bar = "█".repeat(bar_len.min(bar_max_w));
            Spans::from(Span::raw(format!(
                "{:<name_w$} {:>val_w$} {}",
                stat_label(&st.name),
                st.base,
                bar,
                name_w = name_w,
                val_w = val_w
            )))
        })
        .collect();
    let stats_para = Paragraph::new(stat_lines)
        .block(Block::default().borders(Borders::ALL).title("Stats"));
    f.render_widget(stats_para, stats_rect);

    let mut right_text: Vec<Spans> = vec![Spans::from(Span::styled(
        "Description:",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for line in text_to_lines(&p.description, 60) {
        right_text.push(Spans::from(Span::raw(line)));
    }
    let right_para = Paragraph::new(right_text)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: true });
    f.render_widget(right_para, bottom_chunks[1]);
}

fn draw_failure<B: Backend>(f: &mut Frame<B>, name: &str, reason: &str, retryable: bool, area: Rect) {
    let mut lines = vec![
        Spans::from(Span::styled(
            format_name(name),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Spans::from(Span::raw("")),
        Spans::from(Span::styled(
            format!("Could not load details: {}", reason),
            Style::default().fg(Color::Red),
        )),
    ];
    if retryable {
        lines.push(Spans::from(Span::raw("Press 'r' to refresh and try again.")));
    }
    let para = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: true });
    f.render_widget(para, area);
}

fn draw_status<B: Backend>(f: &mut Frame<B>, app: &App, area: Rect) {
    let c = app.counts();
    let mut line = format!(" {} ok  {} partial  {} failed", c.complete, c.partial, c.failed);
    if !app.filter.is_empty() {
        line.push_str(&format!(" | filter: {}", app.filter.describe()));
    }
    line.push_str(&format!(" | sort: {}", app.sort.label()));
    let mut spans = vec![Span::raw(line)];
    if let Some(msg) = &app.status {
        spans.push(Span::styled(format!(" | {}", msg), Style::default().fg(Color::Cyan)));
    }
    f.render_widget(Paragraph::new(Spans::from(spans)), area);
}

fn draw_help<B: Backend>(f: &mut Frame<B>) {
    let popup = centered_rect(60, 60, f.size());
    let rows = [
        ("q", "Quit"),
        ("/", "Search by name or type"),
        ("Enter/Esc", "Finish search"),
        ("Up/Down", "Navigate list"),
        ("PgUp/PgDn [ ]", "Previous / next page"),
        ("f", "Toggle favorite"),
        ("v", "Favorites only"),
        ("t", "Cycle type filter"),
        ("w", "Cycle weakness filter"),
        ("s", "Cycle sort order"),
        ("p", "Toggle sprites"),
        ("r", "Refresh from PokeAPI (background)"),
        ("h/F1", "Toggle this help"),
    ];
    let mut help_lines: Vec<Spans> = vec![
        Spans::from(Span::styled(
            "Keybindings",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Spans::from(Span::raw("")),
    ];
    for (key, what) in rows {
        help_lines.push(Spans::from(Span::raw(format!("{:<15} {}", key, what))));
    }
    let help_para = Paragraph::new(help_lines)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: true });
    f.render_widget(ratatui::widgets::Clear, popup);
    f.render_widget(help_para, popup);
}

/// Rect of `percent_x` x `percent_y` centred in `r`.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_w = r.width.saturating_mul(percent_x) / 100;
    let popup_h = r.height.saturating_mul(percent_y) / 100;
    let popup_x = r.x + (r.width.saturating_sub(popup_w) / 2);
    let popup_y = r.y + (r.height.saturating_sub(popup_h) / 2);
    Rect::new(popup_x, popup_y, popup_w, popup_h)
}

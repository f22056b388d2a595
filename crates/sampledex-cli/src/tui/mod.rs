use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use sampledex_core::model::{AudioFormat, MusicalKey};
use sampledex_core::paths::to_file_url;
use sampledex_core::schema::SampleStore;
use sampledex_etl::{Config, HttpEmbedder};
use sampledex_search::{SearchFilters, SearchHit, Searcher};

use crate::commands::search::check_model;
use crate::player::Player;

pub mod results;

/// Number of results requested per query.
const TOP_K: usize = 25;

/// Work the event loop has to do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Search,
    TogglePlay(PathBuf),
}

/// Application state for the search TUI.
#[derive(Debug)]
pub struct App {
    pub query: String,
    /// Typing goes to the filter line instead of the query.
    pub editing_filters: bool,
    pub filter_text: String,
    pub filters: SearchFilters,
    pub hits: Vec<SearchHit>,
    pub selected: usize,
    pub offset: usize,
    pub status: String,
    pub playing: Option<PathBuf>,
    pub should_quit: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            query: String::new(),
            editing_filters: false,
            filter_text: String::new(),
            filters: SearchFilters::default(),
            hits: Vec::new(),
            selected: 0,
            offset: 0,
            status: "Type a description and press Enter".to_string(),
            playing: None,
            should_quit: false,
        }
    }

    pub fn selected_hit(&self) -> Option<&SearchHit> {
        self.hits.get(self.selected)
    }

    /// Replace the result list after a search.
    pub fn set_hits(&mut self, hits: Vec<SearchHit>) {
        self.status = match hits.len() {
            0 => "No matching samples".to_string(),
            n => format!("{n} results"),
        };
        self.hits = hits;
        self.selected = 0;
        self.offset = 0;
    }

    /// Keep the selection inside a table showing `height` rows.
    pub fn scroll_into_view(&mut self, height: usize) {
        let height = height.max(1);
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + height {
            self.offset = self.selected + 1 - height;
        }
    }

    fn input_mut(&mut self) -> &mut String {
        if self.editing_filters {
            &mut self.filter_text
        } else {
            &mut self.query
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.should_quit = true,
                KeyCode::Char('p') => {
                    return self
                        .selected_hit()
                        .map(|hit| Action::TogglePlay(hit.record.path.clone()));
                }
                KeyCode::Char('y') => {
                    if let Some(hit) = self.selected_hit() {
                        self.status = to_file_url(&hit.record.path.display().to_string());
                    }
                }
                _ => {}
            }
            return None;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => self.editing_filters = !self.editing_filters,
            KeyCode::Down => {
                if self.selected + 1 < self.hits.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Char(c) => self.input_mut().push(c),
            KeyCode::Backspace => {
                self.input_mut().pop();
            }
            KeyCode::Enter => return self.search_action(),
            _ => {}
        }
        None
    }

    /// Apply the filter line and ask for a search. A bad filter line keeps
    /// the previous filters.
    fn search_action(&mut self) -> Option<Action> {
        match parse_filter_line(&self.filter_text) {
            Ok(filters) => self.filters = filters,
            Err(e) => {
                self.status = format!("Filter error: {e}");
                return None;
            }
        }
        if self.query.trim().is_empty() {
            self.status = "Enter a description to search".to_string();
            return None;
        }
        self.status = "Searching...".to_string();
        Some(Action::Search)
    }
}

fn parse_range(value: &str, default: (f64, f64)) -> Result<(f64, f64), String> {
    let (low, high) = value
        .split_once('-')
        .ok_or_else(|| format!("expected a range like 10-20, got {value:?}"))?;
    let bound = |text: &str, fallback: f64| -> Result<f64, String> {
        let text = text.trim();
        if text.is_empty() {
            Ok(fallback)
        } else {
            text.parse().map_err(|_| format!("not a number: {text:?}"))
        }
    };
    let range = (bound(low, default.0)?, bound(high, default.1)?);
    if range.0 > range.1 {
        return Err(format!("empty range: {value}"));
    }
    Ok(range)
}

/// Whether a comma-separated piece begins a new `name=value` entry.
fn starts_entry(piece: &str) -> bool {
    piece.split_once('=').is_some_and(|(name, _)| {
        let name = name.trim();
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
    })
}

/// Split the filter line into entries. A piece that does not begin a new
/// entry belongs to the previous value, so regexes such as `\d{1,3}` keep
/// their commas.
fn filter_entries(line: &str) -> Vec<String> {
    let mut entries: Vec<String> = Vec::new();
    for piece in line.split(',') {
        match entries.last_mut() {
            Some(last) if !starts_entry(piece) => {
                last.push(',');
                last.push_str(piece);
            }
            _ => entries.push(piece.to_string()),
        }
    }
    entries
}

/// Parse the filter input line, e.g.
/// `include=kick, exclude=808, sim=50-100, bpm=120-130, dur=0-2, key=A min, format=wav`.
///
/// Range ends may be left out (`bpm=120-`).
pub fn parse_filter_line(line: &str) -> Result<SearchFilters, String> {
    let defaults = SearchFilters::default();
    let mut filters = SearchFilters::default();

    let entries = filter_entries(line);
    for part in entries.iter().map(|e| e.trim()).filter(|p| !p.is_empty()) {
        let (name, value) = part
            .split_once('=')
            .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim()))
            .ok_or_else(|| format!("expected name=value, got {part:?}"))?;

        match name.as_str() {
            "include" => filters.include = Some(value.to_string()),
            "exclude" => filters.exclude = Some(value.to_string()),
            "sim" | "similarity" => {
                let range =
                    parse_range(value, (defaults.min_similarity, defaults.max_similarity))?;
                if range.0 < defaults.min_similarity || range.1 > defaults.max_similarity {
                    return Err(format!("similarity must lie within 0-100, got {value}"));
                }
                (filters.min_similarity, filters.max_similarity) = range;
            }
            "bpm" => {
                (filters.min_bpm, filters.max_bpm) =
                    parse_range(value, (defaults.min_bpm, defaults.max_bpm))?;
            }
            "dur" | "duration" => {
                (filters.min_duration, filters.max_duration) =
                    parse_range(value, (defaults.min_duration, defaults.max_duration))?;
            }
            "key" => {
                filters.key = Some(value.parse::<MusicalKey>().map_err(|e| e.to_string())?);
            }
            "format" => {
                filters.format = Some(value.parse::<AudioFormat>().map_err(|e| e.to_string())?);
            }
            other => return Err(format!("unknown filter {other:?}")),
        }
    }

    Ok(filters)
}

/// Run the search TUI against the database in `db_path`.
///
/// Sets up the terminal, runs the main event loop, and restores the terminal
/// on exit (including on error).
pub async fn run_tui(db_path: &Path, config: &Config) -> Result<()> {
    let store = SampleStore::open_existing(db_path)?;
    check_model(&store, config)?;
    if store.count()? == 0 {
        println!("The database at {} is empty.", db_path.display());
        println!("Run 'sampledex index <folder>' first.");
        return Ok(());
    }
    let embedder = HttpEmbedder::new(&config.embedding)?;
    let searcher = Searcher::new(&store, &embedder);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the event loop, capturing any error so we can restore the terminal
    let result = run_event_loop(&mut terminal, &searcher).await;

    // Restore terminal regardless of success or failure
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    searcher: &Searcher<'_>,
) -> Result<()> {
    let mut app = App::new();
    let mut player = Player::new();

    loop {
        app.playing = player.playing().map(Path::to_path_buf);
        terminal.draw(|frame| results::render(frame, &mut app))?;

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key) {
            Some(Action::Search) => {
                terminal.draw(|frame| results::render(frame, &mut app))?;
                let outcome = searcher.search(&app.query, TOP_K, &app.filters).await;
                match outcome {
                    Ok(hits) => app.set_hits(hits),
                    Err(e) => app.status = format!("Search failed: {e}"),
                }
            }
            Some(Action::TogglePlay(path)) => match player.toggle(&path) {
                Ok(true) => app.status = format!("Playing {}", path.display()),
                Ok(false) => app.status = "Stopped".to_string(),
                Err(e) => app.status = format!("Playback failed: {e:#}"),
            },
            None => {}
        }

        if app.should_quit {
            player.stop();
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sampledex_core::model::{AnalysisEngine, SampleRecord};

    fn press(app: &mut App, code: KeyCode) -> Option<Action> {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn hit(name: &str) -> SearchHit {
        SearchHit {
            record: SampleRecord::new(
                PathBuf::from(format!("/samples/{name}")),
                vec![1.0],
                AnalysisEngine::Builtin,
            ),
            distance: 0.5,
            similarity: 75.0,
        }
    }

    fn ctrl(app: &mut App, c: char) -> Option<Action> {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    #[test]
    fn test_query_enter_searches() {
        let mut app = App::new();
        assert_eq!(press(&mut app, KeyCode::Enter), None);

        type_text(&mut app, "warm padx");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.query, "warm pad");
        assert_eq!(press(&mut app, KeyCode::Enter), Some(Action::Search));
    }

    #[test]
    fn test_tab_toggles_filter_editor() {
        let mut app = App::new();
        type_text(&mut app, "kick");
        press(&mut app, KeyCode::Tab);
        assert!(app.editing_filters);

        type_text(&mut app, "bpm=120-130");
        assert_eq!(app.query, "kick");
        assert_eq!(press(&mut app, KeyCode::Enter), Some(Action::Search));
        assert!((app.filters.min_bpm - 120.0).abs() < f64::EPSILON);

        app.filter_text = "tempo=fast".to_string();
        assert_eq!(press(&mut app, KeyCode::Enter), None);
        assert!(app.status.starts_with("Filter error"));
        // The last good filters stay active.
        assert!((app.filters.min_bpm - 120.0).abs() < f64::EPSILON);

        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "s");
        assert_eq!(app.query, "kicks");
    }

    #[test]
    fn test_results_navigation_play_and_url() {
        let mut app = App::new();
        assert_eq!(ctrl(&mut app, 'p'), None);

        type_text(&mut app, "jk");
        app.set_hits(vec![hit("a.wav"), hit("b.wav")]);
        assert_eq!(app.query, "jk");

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected, 1);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.selected, 0);

        assert_eq!(
            ctrl(&mut app, 'p'),
            Some(Action::TogglePlay(PathBuf::from("/samples/a.wav")))
        );

        ctrl(&mut app, 'y');
        assert_eq!(app.status, "file:///samples/a.wav");
        assert_eq!(app.query, "jk");
    }

    #[test]
    fn test_quit_keys() {
        let mut app = App::new();
        type_text(&mut app, "q");
        assert!(!app.should_quit);

        ctrl(&mut app, 'c');
        assert!(app.should_quit);

        let mut app = App::new();
        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit);
    }

    #[test]
    fn test_scroll_into_view() {
        let mut app = App::new();
        app.set_hits((0..10).map(|i| hit(&format!("{i}.wav"))).collect());
        app.selected = 7;
        app.scroll_into_view(5);
        assert_eq!(app.offset, 3);
        app.selected = 1;
        app.scroll_into_view(5);
        assert_eq!(app.offset, 1);
    }

    #[test]
    fn test_parse_filter_line() {
        let filters = parse_filter_line(
            "include=kick, exclude=808, sim=50-100, bpm=120-, dur=-2, key=A min, format=wav",
        )
        .unwrap();
        assert_eq!(filters.include.as_deref(), Some("kick"));
        assert_eq!(filters.exclude.as_deref(), Some("808"));
        assert!((filters.min_similarity - 50.0).abs() < f64::EPSILON);
        assert!((filters.min_bpm - 120.0).abs() < f64::EPSILON);
        assert!((filters.max_bpm - 300.0).abs() < f64::EPSILON);
        assert!((filters.min_duration - 0.0).abs() < f64::EPSILON);
        assert!((filters.max_duration - 2.0).abs() < f64::EPSILON);
        assert_eq!(filters.key.map(|k| k.to_string()).as_deref(), Some("A min"));
        assert_eq!(filters.format, Some(AudioFormat::Wav));
    }

    #[test]
    fn test_parse_filter_line_keeps_commas_in_patterns() {
        let filters =
            parse_filter_line(r"include=kick_\d{1,3}, exclude=(hat|ride){2,}, bpm=120-130").unwrap();
        assert_eq!(filters.include.as_deref(), Some(r"kick_\d{1,3}"));
        assert_eq!(filters.exclude.as_deref(), Some("(hat|ride){2,}"));
        assert!((filters.max_bpm - 130.0).abs() < f64::EPSILON);

        let filters = parse_filter_line("include=a{2,}").unwrap();
        assert_eq!(filters.include.as_deref(), Some("a{2,}"));
    }

    #[test]
    fn test_parse_filter_line_errors() {
        assert_eq!(parse_filter_line("").unwrap(), SearchFilters::default());
        assert!(parse_filter_line("bpm=fast").is_err());
        assert!(parse_filter_line("bpm=130-120").is_err());
        assert!(parse_filter_line("kick").is_err());
        assert!(parse_filter_line("key=H maj").is_err());
        assert!(parse_filter_line("color=red").is_err());
        assert!(parse_filter_line("sim=50-150").is_err());
    }
}

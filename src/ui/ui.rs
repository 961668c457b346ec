use image::DynamicImage;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
};
use ratatui_image::{Resize, StatefulImage, picker::Picker, protocol::StatefulProtocol};
use std::collections::{HashMap, HashSet};

use crate::backend::catalog::ImageRecord;
use crate::gallery::query::{CATEGORIES, QueryParams};
use crate::gallery::{CatalogState, Gallery};

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Browse,
    Search,
}

/// Thumbnails on their way and the ones that could not be fetched.
#[derive(Debug, Default)]
pub struct ThumbnailLoads {
    pending: HashSet<String>,
    failed: HashSet<String>,
}

impl ThumbnailLoads {
    /// Claims `id` for loading. False while it is pending or after it failed.
    pub fn start(&mut self, id: &str) -> bool {
        if self.failed.contains(id) {
            return false;
        }
        self.pending.insert(id.to_string())
    }

    pub fn finished(&mut self, id: &str) {
        self.pending.remove(id);
    }

    pub fn failed(&mut self, id: &str) {
        self.pending.remove(id);
        self.failed.insert(id.to_string());
    }

    pub fn has_failed(&self, id: &str) -> bool {
        self.failed.contains(id)
    }

    /// Forgets failures so the next draw asks for them again.
    pub fn retry_failed(&mut self) {
        self.failed.clear();
    }
}

/// Terminal-side state around the [`Gallery`]: grid cursor, search input,
/// and the rendered image protocols.
pub struct App {
    pub gallery: Gallery,
    pub input_mode: InputMode,
    pub search_input: String,
    pub selected: usize,
    pub scroll_row: usize,
    pub columns: usize,
    pub visible_rows: usize,
    pub picker: Option<Picker>,
    pub thumbnails: HashMap<String, StatefulProtocol>,
    pub thumbnail_loads: ThumbnailLoads,
    pub viewer_image: Option<StatefulProtocol>,
    pub viewer_failed: bool,
    pub status: Option<String>,
}

impl App {
    pub fn new(gallery: Gallery) -> Self {
        let picker = Picker::from_query_stdio().ok();
        let search_input = gallery.query().search.clone().unwrap_or_default();

        Self {
            gallery,
            input_mode: InputMode::Browse,
            search_input,
            selected: 0,
            scroll_row: 0,
            columns: 1,
            visible_rows: 1,
            picker,
            thumbnails: HashMap::new(),
            thumbnail_loads: ThumbnailLoads::default(),
            viewer_image: None,
            viewer_failed: false,
            status: None,
        }
    }

    pub fn selected_record(&self) -> Option<&ImageRecord> {
        self.gallery.view().get(self.selected)
    }

    pub fn move_selection(&mut self, dx: isize, dy: isize) {
        let len = self.gallery.view().len();
        if len == 0 {
            return;
        }
        let delta = dx + dy * self.columns as isize;
        let target = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = target as usize;
        self.keep_selection_visible();
    }

    fn keep_selection_visible(&mut self) {
        let row = self.selected / self.columns.max(1);
        if row < self.scroll_row {
            self.scroll_row = row;
        } else if row >= self.scroll_row + self.visible_rows.max(1) {
            self.scroll_row = row + 1 - self.visible_rows.max(1);
        }
    }

    /// Applies a new query and puts the grid cursor back at the top.
    pub fn apply_query(&mut self, query: QueryParams) {
        self.search_input = query.search.clone().unwrap_or_default();
        self.gallery.set_query(query);
        self.selected = 0;
        self.scroll_row = 0;
        if !self.gallery.viewer().is_open() {
            self.clear_viewer_image();
        }
    }

    pub fn cycle_category(&mut self, forward: bool) {
        let current = self.gallery.query().category_index().unwrap_or(0);
        let len = CATEGORIES.len();
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        let query = self.gallery.query().with_category(CATEGORIES[next].id);
        self.apply_query(query);
    }

    pub fn submit_search(&mut self) {
        self.input_mode = InputMode::Browse;
        let query = self.gallery.query().with_search(&self.search_input);
        self.apply_query(query);
    }

    pub fn cancel_search(&mut self) {
        self.input_mode = InputMode::Browse;
        self.search_input = self.gallery.query().search.clone().unwrap_or_default();
    }

    /// Ids of the cards that fit on screen plus one row below.
    pub fn visible_ids(&self) -> Vec<String> {
        let start = self.scroll_row * self.columns;
        let count = (self.visible_rows + 1) * self.columns;
        self.gallery
            .view()
            .iter()
            .skip(start)
            .take(count)
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn add_thumbnail(&mut self, id: &str, image: DynamicImage) {
        if let Some(ref picker) = self.picker {
            let protocol = picker.new_resize_protocol(image);
            self.thumbnails.insert(id.to_string(), protocol);
        }
    }

    pub fn set_viewer_image(&mut self, image: Option<DynamicImage>) {
        self.viewer_failed = image.is_none();
        self.viewer_image = match (image, &self.picker) {
            (Some(image), Some(picker)) => Some(picker.new_resize_protocol(image)),
            _ => None,
        };
    }

    pub fn clear_viewer_image(&mut self) {
        self.viewer_image = None;
        self.viewer_failed = false;
    }
}

const CARD_WIDTH: u16 = 28;
const CARD_HEIGHT: u16 = 14;

pub fn ui(f: &mut Frame, app: &mut App) {
    match app.gallery.catalog() {
        CatalogState::Loading => draw_loading_screen(f),
        CatalogState::Failed(message) => draw_error_screen(f, message),
        CatalogState::Ready(_) => draw_main_ui(f, app),
    }

    if app.gallery.viewer().is_open() {
        draw_viewer(f, app);
    }
}

fn outer_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan))
}

fn spinner() -> &'static str {
    const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    FRAMES[(millis / 100) as usize % FRAMES.len()]
}

fn centered_lines(f: &mut Frame, area: Rect, lines: Vec<Line<'_>>) {
    let height = lines.len() as u16;
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        layout[1],
    );
}

fn draw_loading_screen(f: &mut Frame) {
    let area = f.area();
    let block = outer_block("Gallery");
    let inner = block.inner(area);
    f.render_widget(block, area);

    centered_lines(
        f,
        inner,
        vec![
            Line::from(vec![
                Span::styled(
                    format!(" {} ", spinner()),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    "Loading...",
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(Span::styled(
                "Fetching the image catalog",
                Style::default().fg(Color::DarkGray),
            )),
        ],
    );
}

fn draw_error_screen(f: &mut Frame, message: &str) {
    let area = f.area();
    let block = outer_block("Gallery");
    let inner = block.inner(area);
    f.render_widget(block, area);

    centered_lines(
        f,
        inner,
        vec![
            Line::from(Span::styled(
                "Error loading images",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                message.to_string(),
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("r", Style::default().fg(Color::Yellow)),
                Span::raw(": try again  "),
                Span::styled("q", Style::default().fg(Color::Yellow)),
                Span::raw(": quit"),
            ]),
        ],
    );
}

fn draw_main_ui(f: &mut Frame, app: &mut App) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // categories
            Constraint::Length(3), // search
            Constraint::Min(CARD_HEIGHT),
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_categories(f, root[0], app.gallery.query());
    draw_search(f, root[1], app);

    if app.gallery.view().is_empty() {
        draw_empty_state(f, root[2], app.gallery.query());
    } else {
        draw_grid(f, root[2], app);
    }

    draw_footer(f, root[3], app.status.as_deref());
}

fn draw_categories(f: &mut Frame, area: Rect, query: &QueryParams) {
    let titles: Vec<&str> = CATEGORIES.iter().map(|c| c.label).collect();

    let mut tabs = Tabs::new(titles)
        .block(outer_block("Gallery"))
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    if let Some(selected) = query.category_index() {
        tabs = tabs.select(selected);
    }

    f.render_widget(tabs, area);
}

fn draw_search(f: &mut Frame, area: Rect, app: &App) {
    let editing = app.input_mode == InputMode::Search;
    let border = if editing {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let text = if editing {
        Line::from(vec![
            Span::raw(app.search_input.as_str()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ])
    } else if app.search_input.is_empty() {
        Line::from(Span::styled(
            "Search by tag...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(Span::raw(app.search_input.as_str()))
    };

    let paragraph = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search (/)")
            .border_style(border),
    );
    f.render_widget(paragraph, area);
}

fn draw_empty_state(f: &mut Frame, area: Rect, query: &QueryParams) {
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let dim = Style::default().fg(Color::DarkGray);
    centered_lines(
        f,
        inner,
        vec![
            Line::from(Span::styled(
                "No images found matching your criteria.",
                Style::default().fg(Color::White),
            )),
            Line::from(Span::styled("Try a different category or search term.", dim)),
            Line::from(""),
            Line::from(Span::styled(
                format!("Category: {}", query.active_category().unwrap_or("all")),
                dim,
            )),
            Line::from(Span::styled(
                format!("Search: {}", query.active_search().unwrap_or("none")),
                dim,
            )),
        ],
    );
}

fn draw_grid(f: &mut Frame, area: Rect, app: &mut App) {
    let total = app.gallery.view().len();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{} images", total));
    let inner = block.inner(area);
    f.render_widget(block, area);

    app.columns = ((inner.width / CARD_WIDTH) as usize).max(1);
    app.visible_rows = ((inner.height / CARD_HEIGHT) as usize).max(1);
    app.keep_selection_visible();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(CARD_HEIGHT); app.visible_rows])
        .split(inner);

    let show_tags = app.gallery.show_tags;
    for (row_idx, row_area) in rows.iter().enumerate() {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Length(CARD_WIDTH); app.columns])
            .split(*row_area);

        for (col_idx, cell) in cells.iter().enumerate() {
            let index = (app.scroll_row + row_idx) * app.columns + col_idx;
            let Some(record) = app.gallery.view().get(index) else {
                return;
            };
            let record = record.clone();
            let failed = app.thumbnail_loads.has_failed(&record.id);
            draw_card(
                f,
                *cell,
                &record,
                index == app.selected,
                show_tags,
                app.thumbnails.get_mut(&record.id),
                failed,
            );
        }
    }
}

fn draw_card(
    f: &mut Frame,
    area: Rect,
    record: &ImageRecord,
    selected: bool,
    show_tags: bool,
    thumbnail: Option<&mut StatefulProtocol>,
    failed: bool,
) {
    let border_style = if selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height < 4 || inner.width < 5 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(4),    // thumbnail
            Constraint::Length(1), // id
            Constraint::Length(if show_tags { 2 } else { 0 }),
        ])
        .split(inner);

    if let Some(state) = thumbnail {
        let image_widget = StatefulImage::new().resize(Resize::Scale(None));
        f.render_stateful_widget(image_widget, layout[0], state);
    } else {
        let placeholder = if failed { "No preview" } else { "Loading..." };
        centered_lines(
            f,
            layout[0],
            vec![Line::from(Span::styled(
                placeholder,
                Style::default().fg(Color::DarkGray),
            ))],
        );
    }

    let width = inner.width as usize;
    f.render_widget(
        Paragraph::new(truncate_text(&record.id, width)).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        layout[1],
    );

    if show_tags {
        f.render_widget(
            Paragraph::new(tag_line(&record.tags, width * 2))
                .wrap(Wrap { trim: true }),
            layout[2],
        );
    }
}

fn tag_line(tags: &[String], max_len: usize) -> Line<'static> {
    if tags.is_empty() {
        return Line::from(Span::styled(
            "No tags",
            Style::default().fg(Color::DarkGray),
        ));
    }
    let joined = tags
        .iter()
        .map(|t| format!("#{t}"))
        .collect::<Vec<_>>()
        .join(" ");
    Line::from(Span::styled(
        truncate_text(&joined, max_len),
        Style::default().fg(Color::Magenta),
    ))
}

fn draw_viewer(f: &mut Frame, app: &mut App) {
    let area = f.area();
    f.render_widget(Clear, area);

    let Some(record) = app.gallery.current().cloned() else {
        return;
    };
    let position = app.gallery.viewer().index().unwrap_or(0) + 1;
    let total = app.gallery.view().len();
    let loading = app.gallery.viewer().is_loading();
    let show_tags = app.gallery.show_tags;

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} of {} · {} ", position, total, record.id))
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let info_height = if show_tags { 3 } else { 0 };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(info_height),
            Constraint::Length(1),
        ])
        .split(inner);

    if loading {
        centered_lines(
            f,
            layout[0],
            vec![Line::from(vec![
                Span::styled(
                    format!("{} ", spinner()),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::raw("Loading image..."),
            ])],
        );
    } else if let Some(state) = app.viewer_image.as_mut() {
        let image_widget = StatefulImage::new().resize(Resize::Scale(None));
        f.render_stateful_widget(image_widget, layout[0], state);
    } else {
        let message = if app.viewer_failed {
            "Image could not be loaded"
        } else {
            "No image preview available in this terminal"
        };
        centered_lines(
            f,
            layout[0],
            vec![Line::from(Span::styled(
                message,
                Style::default().fg(Color::DarkGray),
            ))],
        );
    }

    if show_tags {
        let width = layout[1].width as usize;
        let mut lines = vec![tag_line(&record.tags, width)];
        if let Some(alt) = &record.alt {
            lines.push(Line::from(Span::styled(
                truncate_text(alt, width),
                Style::default().fg(Color::Gray),
            )));
        }
        f.render_widget(Paragraph::new(lines), layout[1]);
    }

    let hint = Style::default().fg(Color::Yellow);
    let mut footer = vec![
        Span::styled("←/→", hint),
        Span::raw(": navigate  "),
        Span::styled("Esc", hint),
        Span::raw(": close  "),
        Span::styled("d", hint),
        Span::raw(": download  "),
        Span::styled("o", hint),
        Span::raw(": open in browser"),
    ];
    if let Some(status) = &app.status {
        footer.push(Span::styled(
            format!("  {}", status),
            Style::default().fg(Color::DarkGray),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(footer)), layout[2]);
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}

fn draw_footer(f: &mut Frame, area: Rect, status: Option<&str>) {
    let hint = Style::default().fg(Color::Yellow);
    let mut spans = vec![
        Span::styled("Tab", hint),
        Span::raw(": category  "),
        Span::styled("/", hint),
        Span::raw(": search  "),
        Span::styled("Enter", hint),
        Span::raw(": view  "),
        Span::styled("t", hint),
        Span::raw(": tags  "),
        Span::styled("q", hint),
        Span::raw(": quit"),
    ];
    if let Some(status) = status {
        spans.push(Span::styled(
            format!("  {}", status),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let p = Paragraph::new(Line::from(spans))
        .block(outer_block(""))
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a very long id", 8), "a ver...");
        assert_eq!(truncate_text("čćžšđ", 5), "čćžšđ");
    }

    #[test]
    fn test_failed_thumbnail_is_not_requested_until_retry() {
        let mut loads = ThumbnailLoads::default();
        assert!(loads.start("001_a"));
        assert!(!loads.start("001_a"));

        loads.failed("001_a");
        assert!(loads.has_failed("001_a"));
        assert!(!loads.start("001_a"));

        loads.retry_failed();
        assert!(!loads.has_failed("001_a"));
        assert!(loads.start("001_a"));

        loads.finished("001_a");
        assert!(loads.start("001_a"));
    }

    #[test]
    fn test_tag_line_joins_with_hashes() {
        let line = tag_line(&["veo".to_string(), "prsten".to_string()], 40);
        assert_eq!(line.to_string(), "#veo #prsten");
        assert_eq!(tag_line(&[], 40).to_string(), "No tags");
    }
}

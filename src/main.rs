mod backend;
mod config;
mod gallery;
mod server;
mod ui;

use backend::CatalogBackend;
use backend::catalog::{ImageRecord, fetch_all};
use backend::cloudinary::{CloudinaryClient, build_client};
use backend::images::{download_image, fetch_image};
use backend::proxy_client::ProxyClient;
use backend::urls::DeliveryUrls;
use config::Config;
use gallery::query::QueryParams;
use gallery::viewer::Direction;
use gallery::{CatalogState, Gallery, ViewerStep};
use image::DynamicImage;
use ui::ui::{App, InputMode, ui};

use clap::{Parser, Subcommand};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    error::Error,
    fs::OpenOptions,
    io,
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "gallery-tui")]
#[command(version, about = "Browse a Cloudinary image gallery from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Initial filters as a query string, e.g. `category=crkva&search=veo`
    #[arg(long, default_value = "")]
    query: String,

    /// Read the catalog from a running listing proxy instead of Cloudinary
    #[arg(long)]
    proxy: Option<String>,

    /// Show tags on cards and in the viewer
    #[arg(long)]
    show_tags: bool,

    /// Give up on catalog and image requests after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the filtered catalog over HTTP (`GET /images`, `GET /images/{id}`)
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
}

enum BackgroundTask {
    CatalogLoaded { result: Result<Vec<ImageRecord>, String> },
    ThumbnailLoaded { id: String, image: Option<DynamicImage> },
    ViewerImageLoaded { url: String, image: Option<DynamicImage> },
    PreloadFinished { url: String, image: Option<DynamicImage> },
    DownloadFinished { id: String, result: Result<PathBuf, String> },
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(secs) = cli.timeout_secs {
        config.fetch_timeout = Some(Duration::from_secs(secs));
    }

    match &cli.command {
        Some(Command::Serve { addr }) => {
            init_logging(false);
            server::serve(config, *addr).await
        }
        None => {
            init_logging(true);
            run_browser(&cli, &config).await
        }
    }
}

/// The terminal owns stdout, so the browser logs into the cache directory.
fn init_logging(to_file: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if to_file {
        let log_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gallery-tui");
        let file = std::fs::create_dir_all(&log_dir).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join("gallery.log"))
        });
        match file {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }

    builder.init();
}

async fn run_browser(cli: &Cli, config: &Config) -> Result<(), Box<dyn Error>> {
    let urls = DeliveryUrls::from_config(config)?;
    let http = build_client(config)?;
    let source = match &cli.proxy {
        Some(base) => CatalogBackend::Proxy(ProxyClient::new(http.clone(), base)),
        None => CatalogBackend::Cloudinary(CloudinaryClient::new(http.clone(), config)?),
    };

    let mut gallery = Gallery::new(urls, QueryParams::parse(&cli.query));
    gallery.show_tags = cli.show_tags;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(gallery);

    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();
    let loaders = Loaders {
        http,
        source,
        tx: task_tx,
    };

    loaders.catalog();
    let res = run_app(&mut terminal, &mut app, &mut task_rx, &loaders).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err}");
    }
    Ok(())
}

/// Spawns the background loads; every result comes back over `tx`.
struct Loaders {
    http: reqwest::Client,
    source: CatalogBackend,
    tx: mpsc::UnboundedSender<BackgroundTask>,
}

impl Loaders {
    fn catalog(&self) {
        let source = self.source.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = fetch_all(&source).await.map_err(|e| {
                log::error!("catalog fetch failed: {}", e);
                e.to_string()
            });
            let _ = tx.send(BackgroundTask::CatalogLoaded { result });
        });
    }

    fn thumbnail(&self, id: String, url: String) {
        let http = self.http.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let image = fetch_image(&http, &url)
                .await
                .inspect_err(|e| log::debug!("thumbnail {} failed: {}", id, e))
                .ok();
            let _ = tx.send(BackgroundTask::ThumbnailLoaded { id, image });
        });
    }

    fn viewer_image(&self, url: String) {
        let http = self.http.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let image = fetch_image(&http, &url)
                .await
                .inspect_err(|e| log::warn!("image {} failed: {}", url, e))
                .ok();
            let _ = tx.send(BackgroundTask::ViewerImageLoaded { url, image });
        });
    }

    fn preload(&self, url: String) {
        let http = self.http.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let image = fetch_image(&http, &url)
                .await
                .inspect_err(|e| log::debug!("preload {} failed: {}", url, e))
                .ok();
            let _ = tx.send(BackgroundTask::PreloadFinished { url, image });
        });
    }

    fn download(&self, id: String, url: String) {
        let http = self.http.clone();
        let tx = self.tx.clone();
        let dir = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        tokio::spawn(async move {
            let result = download_image(&http, &url, &dir, &id).await;
            let _ = tx.send(BackgroundTask::DownloadFinished { id, result });
        });
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    task_rx: &mut mpsc::UnboundedReceiver<BackgroundTask>,
    loaders: &Loaders,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();

    loop {
        terminal.draw(|f| ui(f, app))?;
        load_visible_thumbnails(app, loaders);

        tokio::select! {
            // Keeps spinners moving
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}

            Some(Ok(event)) = event_stream.next() => {
                if let Event::Key(key) = event {
                    if key.kind == KeyEventKind::Press {
                        let flow = if app.gallery.viewer().is_open() {
                            handle_viewer_input(app, key.code, loaders)
                        } else {
                            match app.input_mode {
                                InputMode::Search => handle_search_input(app, key.code),
                                InputMode::Browse => handle_browse_input(app, key.code, loaders),
                            }
                        };
                        if flow == Flow::Quit {
                            return Ok(());
                        }
                    }
                }
            }

            Some(task) = task_rx.recv() => {
                handle_task(app, task);
            }
        }
    }
}

fn handle_task(app: &mut App, task: BackgroundTask) {
    match task {
        BackgroundTask::CatalogLoaded { result } => {
            app.gallery.set_catalog(result);
            app.selected = 0;
            app.scroll_row = 0;
        }
        BackgroundTask::ThumbnailLoaded { id, image } => match image {
            Some(image) => {
                app.add_thumbnail(&id, image);
                app.thumbnail_loads.finished(&id);
            }
            None => app.thumbnail_loads.failed(&id),
        },
        BackgroundTask::ViewerImageLoaded { url, image } => {
            if app.gallery.viewer_image_finished(&url, image) {
                let image = app.gallery.cached_image(&url).cloned();
                app.set_viewer_image(image);
            }
        }
        BackgroundTask::PreloadFinished { url, image } => {
            app.gallery.preload_finished(&url, image);
        }
        BackgroundTask::DownloadFinished { id, result } => {
            app.status = Some(match result {
                Ok(path) => {
                    log::info!("downloaded {} to {}", id, path.display());
                    format!("Saved {}", path.display())
                }
                Err(e) => {
                    log::warn!("download of {} failed: {}", id, e);
                    format!("Download failed: {}", e)
                }
            });
        }
    }
}

fn handle_browse_input(app: &mut App, key: KeyCode, loaders: &Loaders) -> Flow {
    match key {
        KeyCode::Char('q') => return Flow::Quit,
        KeyCode::Char('r') => match app.gallery.catalog() {
            CatalogState::Failed(_) => {
                app.gallery.begin_fetch();
                loaders.catalog();
            }
            CatalogState::Ready(_) => app.thumbnail_loads.retry_failed(),
            CatalogState::Loading => {}
        },
        KeyCode::Left => app.move_selection(-1, 0),
        KeyCode::Right => app.move_selection(1, 0),
        KeyCode::Up => app.move_selection(0, -1),
        KeyCode::Down => app.move_selection(0, 1),
        KeyCode::Tab => app.cycle_category(true),
        KeyCode::BackTab => app.cycle_category(false),
        KeyCode::Char('/') => app.input_mode = InputMode::Search,
        KeyCode::Char('t') => app.gallery.show_tags = !app.gallery.show_tags,
        KeyCode::Esc => {
            if app.gallery.query().active_search().is_some() {
                let query = app.gallery.query().with_search("");
                app.apply_query(query);
            }
        }
        KeyCode::Enter => {
            if let Some(id) = app.selected_record().map(|r| r.id.clone()) {
                if let Some(step) = app.gallery.open(&id) {
                    start_viewer_step(app, step, loaders);
                }
            }
        }
        _ => {}
    }
    Flow::Continue
}

fn handle_search_input(app: &mut App, key: KeyCode) -> Flow {
    match key {
        KeyCode::Char(c) => app.search_input.push(c),
        KeyCode::Backspace => {
            app.search_input.pop();
        }
        KeyCode::Enter => app.submit_search(),
        KeyCode::Esc => app.cancel_search(),
        _ => {}
    }
    Flow::Continue
}

fn handle_viewer_input(app: &mut App, key: KeyCode, loaders: &Loaders) -> Flow {
    match key {
        KeyCode::Char('q') => return Flow::Quit,
        KeyCode::Esc => {
            app.gallery.close();
            app.clear_viewer_image();
        }
        KeyCode::Left => {
            if let Some(step) = app.gallery.navigate(Direction::Prev) {
                start_viewer_step(app, step, loaders);
            }
        }
        KeyCode::Right => {
            if let Some(step) = app.gallery.navigate(Direction::Next) {
                start_viewer_step(app, step, loaders);
            }
        }
        KeyCode::Char('d') => {
            if !app.gallery.viewer().is_loading() {
                if let Some(record) = app.gallery.current() {
                    let url = app.gallery.urls().download(&record.id);
                    let id = record.id.clone();
                    app.status = Some(format!("Downloading {}...", id));
                    loaders.download(id, url);
                }
            }
        }
        KeyCode::Char('o') => {
            if let Some(url) = app.gallery.current_url() {
                app.status = Some(match webbrowser::open(&url) {
                    Ok(()) => "Opened in browser".to_string(),
                    Err(e) => format!("Could not open browser: {}", e),
                });
            }
        }
        _ => {}
    }
    Flow::Continue
}

/// Shows the new viewer image, straight from the preload cache when it is
/// already there, and starts the preloads for the surrounding window.
fn start_viewer_step(app: &mut App, step: ViewerStep, loaders: &Loaders) {
    app.clear_viewer_image();
    app.status = None;

    if let Some(image) = app.gallery.cached_image(&step.url).cloned() {
        app.gallery.image_loaded(&step.url);
        app.set_viewer_image(Some(image));
    } else {
        loaders.viewer_image(step.url);
    }

    for url in step.preload {
        loaders.preload(url);
    }
}

fn load_visible_thumbnails(app: &mut App, loaders: &Loaders) {
    if app.picker.is_none() {
        return;
    }
    for id in app.visible_ids() {
        if !app.thumbnails.contains_key(&id) && app.thumbnail_loads.start(&id) {
            let url = app.gallery.urls().thumbnail(&id);
            loaders.thumbnail(id, url);
        }
    }
}

pub mod filter;
pub mod preload;
pub mod query;
pub mod viewer;

use image::DynamicImage;

use crate::backend::catalog::ImageRecord;
use crate::backend::urls::DeliveryUrls;
use preload::PreloadCache;
use query::QueryParams;
use viewer::{Direction, Viewer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogState {
    Loading,
    Failed(String),
    Ready(Vec<ImageRecord>),
}

/// What the event loop has to do after the viewer moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerStep {
    pub index: usize,
    /// Full-size URL for the image now on screen.
    pub url: String,
    /// Preload loads to start, already marked in flight.
    pub preload: Vec<String>,
}

/// Gallery state shared by the terminal UI: the catalog, the active query,
/// the view derived from both, the viewer and its preload cache.
pub struct Gallery {
    catalog: CatalogState,
    query: QueryParams,
    view: Vec<ImageRecord>,
    viewer: Viewer,
    preload: PreloadCache,
    urls: DeliveryUrls,
    pub show_tags: bool,
}

impl Gallery {
    pub fn new(urls: DeliveryUrls, query: QueryParams) -> Self {
        Self {
            catalog: CatalogState::Loading,
            query,
            view: Vec::new(),
            viewer: Viewer::default(),
            preload: PreloadCache::new(),
            urls,
            show_tags: false,
        }
    }

    pub fn catalog(&self) -> &CatalogState {
        &self.catalog
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn view(&self) -> &[ImageRecord] {
        &self.view
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn urls(&self) -> &DeliveryUrls {
        &self.urls
    }

    #[cfg(test)]
    pub fn preload(&self) -> &PreloadCache {
        &self.preload
    }

    /// Start of a (re)fetch; nothing is shown until the whole sweep lands.
    pub fn begin_fetch(&mut self) {
        self.catalog = CatalogState::Loading;
        self.view.clear();
        self.viewer.close();
    }

    /// Installs a finished sweep, replacing any previous catalog wholesale.
    pub fn set_catalog(&mut self, result: Result<Vec<ImageRecord>, String>) {
        self.catalog = match result {
            Ok(records) => CatalogState::Ready(filter::order(records)),
            Err(message) => CatalogState::Failed(message),
        };
        self.refilter();
    }

    pub fn set_query(&mut self, query: QueryParams) {
        if query == self.query {
            return;
        }
        self.query = query;
        self.refilter();
    }

    fn refilter(&mut self) {
        self.view = match &self.catalog {
            CatalogState::Ready(records) => filter::filter(records, &self.query),
            _ => Vec::new(),
        };
        if self.viewer.reconcile(&self.view) {
            log::debug!("viewer closed: open image left the filtered view");
        }
    }

    pub fn current(&self) -> Option<&ImageRecord> {
        self.viewer.index().and_then(|i| self.view.get(i))
    }

    pub fn current_url(&self) -> Option<String> {
        self.current().map(|r| self.urls.full_size(&r.id))
    }

    pub fn open(&mut self, id: &str) -> Option<ViewerStep> {
        let index = self.viewer.open(&self.view, id)?;
        Some(self.step(index))
    }

    pub fn navigate(&mut self, direction: Direction) -> Option<ViewerStep> {
        let index = self.viewer.navigate(&self.view, direction)?;
        Some(self.step(index))
    }

    fn step(&mut self, index: usize) -> ViewerStep {
        let url = self.urls.full_size(&self.view[index].id);
        let mut preload = self.preload.request(index, &self.view, &self.urls);
        // The viewer loads the center itself and hands the result to
        // `viewer_image_finished`, which clears its in-flight mark.
        preload.retain(|u| *u != url);
        ViewerStep {
            index,
            url,
            preload,
        }
    }

    /// The displayed image settled. Completions for an image that is no
    /// longer on screen are ignored.
    pub fn image_loaded(&mut self, url: &str) -> bool {
        if self.current_url().as_deref() != Some(url) {
            return false;
        }
        self.viewer.image_loaded();
        true
    }

    /// The viewer's own load settled. A decoded image also lands in the
    /// preload cache. Returns whether it is still the image on screen.
    pub fn viewer_image_finished(&mut self, url: &str, image: Option<DynamicImage>) -> bool {
        self.preload.complete(url, image);
        self.image_loaded(url)
    }

    pub fn close(&mut self) {
        self.viewer.close();
    }

    pub fn preload_finished(&mut self, url: &str, image: Option<DynamicImage>) {
        self.preload.complete(url, image);
    }

    pub fn cached_image(&self, url: &str) -> Option<&DynamicImage> {
        self.preload.get(url)
    }
}

//! Resource handles and the loader seam used for images, fonts and embedded documents.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use svgpaint_canvas::ImageBitmap;
use svgpaint_image::{ImageConfig, ImageManager};
use svgpaint_net::{FetchConfig, Fetcher};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::SvgError;

/// Load state of a resource handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Complete,
    /// Settled with the logged error message.
    Failed(String),
}

impl LoadState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, LoadState::Pending)
    }
}

/// Kind of resource a handle tracks, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Document,
    Font,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Image => "image",
            ResourceKind::Document => "document",
            ResourceKind::Font => "font",
        })
    }
}

/// Tracks one outstanding load.
///
/// The load runs when the completion future is first polled. It settles exactly once,
/// on success or failure; failures are logged and never propagated.
#[derive(Clone)]
pub struct ResourceHandle {
    href: String,
    kind: ResourceKind,
    state: watch::Receiver<LoadState>,
    completion: Shared<LocalBoxFuture<'static, ()>>,
}

impl ResourceHandle {
    pub fn spawn<F>(href: impl Into<String>, kind: ResourceKind, load: F) -> Self
    where
        F: Future<Output = Result<(), SvgError>> + 'static,
    {
        let href = href.into();
        let (tx, rx) = watch::channel(LoadState::Pending);

        let task_href = href.clone();
        let completion = async move {
            let state = match load.await {
                Ok(()) => {
                    debug!(href = %task_href, %kind, "Resource loaded");
                    LoadState::Complete
                }
                Err(e) => {
                    error!(href = %task_href, %kind, error = %e, "Resource failed to load");
                    LoadState::Failed(e.to_string())
                }
            };
            tx.send_replace(state);
        }
        .boxed_local()
        .shared();

        Self {
            href,
            kind,
            state: rx,
            completion,
        }
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// True once the load settled, whatever the outcome.
    pub fn is_loaded(&self) -> bool {
        self.state.borrow().is_settled()
    }

    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    /// A future resolving when the load settles. Polling it drives the load.
    pub fn completion(&self) -> Shared<LocalBoxFuture<'static, ()>> {
        self.completion.clone()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("href", &self.href)
            .field("kind", &self.kind)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Fetches document text and creates drawable images.
pub trait ResourceLoader {
    /// Fetch a resource as text.
    fn fetch_text(&self, href: &str) -> LocalBoxFuture<'static, Result<String, SvgError>>;

    /// Fetch and decode a raster image.
    fn create_image(
        &self,
        href: &str,
        anonymous_cross_origin: bool,
    ) -> LocalBoxFuture<'static, Result<ImageBitmap, SvgError>>;
}

/// Loader backed by the network fetcher and the image manager.
pub struct DefaultResourceLoader {
    fetcher: Rc<Fetcher>,
    images: Rc<ImageManager>,
}

impl DefaultResourceLoader {
    pub fn new(fetch: FetchConfig, images: ImageConfig) -> Result<Self, SvgError> {
        let fetcher = Fetcher::new(fetch)?;
        Ok(Self {
            images: Rc::new(ImageManager::with_fetcher(fetcher.clone(), images)),
            fetcher: Rc::new(fetcher),
        })
    }

    pub fn images(&self) -> &ImageManager {
        &self.images
    }
}

impl ResourceLoader for DefaultResourceLoader {
    fn fetch_text(&self, href: &str) -> LocalBoxFuture<'static, Result<String, SvgError>> {
        let fetcher = Rc::clone(&self.fetcher);
        let href = href.to_string();
        async move { Ok(fetcher.fetch_text(&href).await?) }.boxed_local()
    }

    fn create_image(
        &self,
        href: &str,
        anonymous_cross_origin: bool,
    ) -> LocalBoxFuture<'static, Result<ImageBitmap, SvgError>> {
        let images = Rc::clone(&self.images);
        let href = href.to_string();
        async move {
            // The fetcher never sends credentials, so every request is anonymous.
            debug!(href = %href, anonymous_cross_origin, "Creating image");
            let image = images.load(&href).await?;
            Ok(image.bitmap)
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_settles_on_success() {
        let handle = ResourceHandle::spawn("a.png", ResourceKind::Image, async { Ok(()) });
        assert!(!handle.is_loaded());
        assert_eq!(handle.state(), LoadState::Pending);

        handle.completion().await;
        assert!(handle.is_loaded());
        assert_eq!(handle.state(), LoadState::Complete);
    }

    #[tokio::test]
    async fn test_handle_settles_on_failure() {
        let handle = ResourceHandle::spawn("b.png", ResourceKind::Image, async {
            Err(SvgError::Resource("gone".into()))
        });
        let clone = handle.clone();
        futures::join!(handle.completion(), clone.completion());
        assert!(handle.is_loaded());
        assert!(matches!(handle.state(), LoadState::Failed(msg) if msg.contains("gone")));
    }

    #[tokio::test]
    async fn test_default_loader_reads_data_urls() {
        let loader = DefaultResourceLoader::new(FetchConfig::default(), ImageConfig::default())
            .unwrap();
        let text = loader.fetch_text("data:,%3Csvg%2F%3E").await.unwrap();
        assert_eq!(text, "<svg/>");

        let err = loader.create_image("data:text/plain,nope", true).await;
        assert!(matches!(err, Err(SvgError::Image(_))));
    }
}

//! Raster assets referenced by card templates.
//!
//! Assets are best effort: a logo that fails to download or a QR payload
//! that does not encode leaves its area blank, it never fails the card.

use std::future::Future;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, Luma};
use qrcode::QrCode;
use tracing::{debug, warn};

use super::svg::{DEFAULT_MARK_SVG, render_svg};
use crate::consts::DEFAULT_ASSET_TIMEOUT_MS;
use crate::error::AssetError;
use crate::template::{AssetRef, CardTemplate};

/// Pixel size the built-in mark is rendered at.
const DEFAULT_MARK_PX: u32 = 256;

/// Pixels per QR module before the rasterizer scales the code.
const QR_MODULE_PX: u32 = 8;

// ============================================================================
// AssetSource
// ============================================================================

/// Resolves [`AssetRef`]s to images.
pub trait AssetSource {
    fn load(&self, asset: &AssetRef) -> impl Future<Output = Result<DynamicImage, AssetError>> + Send;
}

/// Loads URLs over HTTP, reads files from disk, decodes `data:` URIs,
/// encodes QR codes locally and renders the built-in mark.
#[derive(Debug, Clone, Default)]
pub struct StandardAssetSource {
    http: reqwest::Client,
}

impl StandardAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured HTTP client (proxies, headers, TLS roots).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl AssetSource for StandardAssetSource {
    async fn load(&self, asset: &AssetRef) -> Result<DynamicImage, AssetError> {
        match asset {
            AssetRef::Url(url) => {
                let bytes = self
                    .http
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;
                Ok(image::load_from_memory(&bytes)?)
            }
            AssetRef::File(path) => {
                let bytes = tokio::fs::read(path).await?;
                Ok(image::load_from_memory(&bytes)?)
            }
            AssetRef::Embedded(uri) => {
                let bytes = decode_data_uri(uri)?;
                Ok(image::load_from_memory(&bytes)?)
            }
            AssetRef::Qr(payload) => encode_qr(payload),
            AssetRef::DefaultMark => render_svg(DEFAULT_MARK_SVG, DEFAULT_MARK_PX)
                .map(DynamicImage::ImageRgba8)
                .ok_or(AssetError::DefaultMark),
        }
    }
}

/// Extracts the payload of a base64 `data:` URI. The media type is not
/// checked; the image decoder sniffs the format.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let rest = uri.strip_prefix("data:").ok_or(AssetError::DataUri)?;
    let (meta, payload) = rest.split_once(',').ok_or(AssetError::DataUri)?;
    if !meta.split(';').any(|param| param.eq_ignore_ascii_case("base64")) {
        return Err(AssetError::DataUri);
    }
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(BASE64.decode(payload)?)
}

/// Encodes `payload` as a black-on-white QR code with its quiet zone.
pub fn encode_qr(payload: &str) -> Result<DynamicImage, AssetError> {
    let code = QrCode::new(payload.as_bytes())?;
    let image = code
        .render::<Luma<u8>>()
        .module_dimensions(QR_MODULE_PX, QR_MODULE_PX)
        .build();
    Ok(DynamicImage::ImageLuma8(image))
}

// ============================================================================
// AssetLoader
// ============================================================================

/// Outcome of loading one asset.
#[derive(Debug)]
pub enum LoadedAsset {
    Ready(DynamicImage),
    Missing(AssetError),
}

impl LoadedAsset {
    pub fn image(&self) -> Option<&DynamicImage> {
        match self {
            Self::Ready(image) => Some(image),
            Self::Missing(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// A template whose assets have settled, one way or another.
#[derive(Debug)]
pub struct ReadyTemplate {
    pub template: CardTemplate,
    pub logo: LoadedAsset,
    pub qr: LoadedAsset,
}

impl ReadyTemplate {
    /// Wraps a template whose assets are already known.
    pub fn new(template: CardTemplate, logo: LoadedAsset, qr: LoadedAsset) -> Self {
        Self { template, logo, qr }
    }

    /// Number of assets that could not be loaded.
    pub fn missing(&self) -> usize {
        [&self.logo, &self.qr].iter().filter(|a| !a.is_ready()).count()
    }
}

/// Waits for a template's assets, giving each at most `timeout`.
#[derive(Debug)]
pub struct AssetLoader<'s, S> {
    source: &'s S,
    timeout: Duration,
}

impl<'s, S: AssetSource> AssetLoader<'s, S> {
    pub fn new(source: &'s S, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub fn with_default_timeout(source: &'s S) -> Self {
        Self::new(source, Duration::from_millis(DEFAULT_ASSET_TIMEOUT_MS))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Loads the logo and QR code concurrently.
    ///
    /// Always completes within roughly one `timeout`; assets that have not
    /// arrived by then are reported as [`LoadedAsset::Missing`].
    #[tracing::instrument(skip_all, fields(record = %template.record_id))]
    pub async fn await_ready(&self, template: CardTemplate) -> ReadyTemplate {
        let (logo, qr) = tokio::join!(
            self.load_one(&template.header.logo),
            self.load_one(&template.qr.asset)
        );
        let ready = ReadyTemplate::new(template, logo, qr);
        debug!(missing = ready.missing(), "assets settled");
        ready
    }

    async fn load_one(&self, asset: &AssetRef) -> LoadedAsset {
        match tokio::time::timeout(self.timeout, self.source.load(asset)).await {
            Ok(Ok(image)) => LoadedAsset::Ready(image),
            Ok(Err(err)) => {
                warn!(%asset, error = %err, "asset failed to load, leaving it blank");
                LoadedAsset::Missing(err)
            }
            Err(_) => {
                let ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(%asset, timeout_ms = ms, "asset timed out, leaving it blank");
                LoadedAsset::Missing(AssetError::Timeout(ms))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

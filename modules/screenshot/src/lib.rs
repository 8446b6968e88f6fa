//! Screenshot capture with an isolated headless browser per call, plus the
//! perceptual hash derived from the captured image.
//!
//! Each capture launches its own browser process so a wedged page cannot
//! interfere with concurrent captures; dropping the browser kills it on
//! every exit path. HTTPS is attempted first, falling back to HTTP.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions};
use image_hasher::{HashAlg, HasherConfig};
use std::time::Duration;
use tracing::debug;

/// Capture `host`'s landing page and return it as base64-encoded PNG.
/// Navigation timeout, refused connections, or a missing browser binary all
/// yield `None`.
pub async fn capture(host: &str, deadline: Duration) -> Option<String> {
    let host_owned = host.to_string();
    let captured = tokio::task::spawn_blocking(move || capture_sync(&host_owned, deadline))
        .await
        .ok()?;
    match captured {
        Ok(png) => Some(BASE64.encode(png)),
        Err(e) => {
            debug!(host, error = %e, "screenshot capture got no page");
            None
        }
    }
}

/// Synchronous capture (runs in a blocking thread; headless_chrome is sync).
fn capture_sync(host: &str, deadline: Duration) -> Result<Vec<u8>> {
    let browser = Browser::new(
        LaunchOptions::default_builder()
            .headless(true)
            .idle_browser_timeout(deadline)
            .build()
            .map_err(|e| anyhow::anyhow!("browser launch options error: {}", e))?,
    )
    .context("failed to launch Chrome/Chromium")?;

    let tab = browser.new_tab().context("failed to create tab")?;
    tab.set_default_timeout(deadline);

    let mut last_err = None;
    for scheme in ["https", "http"] {
        let url = format!("{}://{}", scheme, host);
        let navigated = tab
            .navigate_to(&url)
            .and_then(|t| t.wait_until_navigated());
        match navigated {
            Ok(tab) => {
                return tab
                    .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                    .context("screenshot capture failed");
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "no scheme answered for {}: {}",
        host,
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Perceptual hash of a base64-encoded screenshot: DCT-mean hash of the
/// decoded image, rendered base64. `None` iff the input is absent or the
/// bytes do not decode as an image — never a partial hash.
pub fn perceptual_hash(screenshot_b64: &str) -> Option<String> {
    let bytes = BASE64.decode(screenshot_b64).ok()?;
    let img = image::load_from_memory(&bytes).ok()?;
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .preproc_dct()
        .to_hasher();
    Some(hasher.hash_image(&img).to_base64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;

    fn png_b64(image: RgbImage) -> String {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        BASE64.encode(png)
    }

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
    }

    #[test]
    fn hash_is_deterministic_for_the_same_image() {
        let shot = png_b64(gradient(64, 48));
        let a = perceptual_hash(&shot).unwrap();
        let b = perceptual_hash(&shot).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn identical_pixels_hash_identically_across_encodings() {
        // same pixels encoded twice produce the same decoded image
        let a = png_b64(gradient(32, 32));
        let b = png_b64(gradient(32, 32));
        assert_eq!(perceptual_hash(&a), perceptual_hash(&b));
    }

    #[test]
    fn undecodable_bytes_yield_no_hash() {
        let not_an_image = BASE64.encode(b"definitely not a png");
        assert_eq!(perceptual_hash(&not_an_image), None);
    }

    #[test]
    fn invalid_base64_yields_no_hash() {
        assert_eq!(perceptual_hash("%%%not-base64%%%"), None);
    }
}

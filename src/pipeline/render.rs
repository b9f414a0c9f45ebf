//! PDF rasterisation for the vision backend.
//!
//! pdfium keeps thread-local state and is CPU-bound, so all work runs on the
//! blocking pool via `spawn_blocking`. Page size is capped by pixels on the
//! longest edge rather than DPI so that oversized pages stay bounded.

use crate::error::ReviewError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bind pdfium from `PDFIUM_LIB_PATH` if set, otherwise from the system
/// library search path.
pub fn bind_pdfium() -> Result<Pdfium, ReviewError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ReviewError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Render up to `max_pages` pages of an in-memory PDF.
///
/// Returns `(page_index_0based, image)` pairs in page order.
pub async fn render_document(
    name: &Path,
    bytes: Vec<u8>,
    max_pages: usize,
    max_pixels: u32,
) -> Result<Vec<(usize, DynamicImage)>, ReviewError> {
    let name = name.to_path_buf();
    tokio::task::spawn_blocking(move || render_blocking(&name, &bytes, max_pages, max_pixels))
        .await
        .map_err(|e| ReviewError::Internal(format!("Render task panicked: {e}")))?
}

fn render_blocking(
    name: &Path,
    bytes: &[u8],
    max_pages: usize,
    max_pixels: u32,
) -> Result<Vec<(usize, DynamicImage)>, ReviewError> {
    let pdfium = bind_pdfium()?;
    let document =
        pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| ReviewError::CorruptPdf {
                path: name.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

    let pages = document.pages();
    let total = pages.len() as usize;
    info!("{}: {} pages", name.display(), total);
    if total > max_pages {
        warn!(
            "{} has {} pages; only the first {} are sent",
            name.display(),
            total,
            max_pages
        );
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let count = total.min(max_pages);
    let mut results = Vec::with_capacity(count);
    for idx in 0..count {
        let failed = |e: PdfiumError| ReviewError::RasterisationFailed {
            page: idx + 1,
            detail: format!("{e:?}"),
        };
        let page = pages.get(idx as u16).map_err(failed)?;
        let image = page
            .render_with_config(&render_config)
            .map_err(failed)?
            .as_image();
        debug!(
            "Rendered page {} -> {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push((idx, image));
    }

    Ok(results)
}

//! Terminal output for the identity verification step.

use memo_core::SelfApp;
use memo_core::identity::UNIVERSAL_LINK_BASE;
use qrcode::{Color, EcLevel, QrCode};
use reqwest::Url;

/// Quiet zone around the code, in modules.
const QUIET_ZONE: usize = 4;

#[derive(thiserror::Error, Debug)]
pub enum QrError {
    #[error("Failed to encode app configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid universal link: {0}")]
    Url(String),

    #[error("Failed to generate QR code: {0}")]
    Qr(#[from] qrcode::types::QrError),
}

/// Universal link that opens the mobile app with `app`.
pub fn universal_link(app: &SelfApp) -> Result<Url, QrError> {
    let json = serde_json::to_string(app)?;
    Url::parse_with_params(UNIVERSAL_LINK_BASE, &[("selfApp", json)])
        .map_err(|e| QrError::Url(e.to_string()))
}

/// Render `data` as a QR code using half-block characters.
///
/// Each text row carries two module rows, so the code stays roughly square in
/// a terminal. `dark_theme` inverts the modules for light-on-dark terminals.
pub fn render_qr(data: &str, dark_theme: bool) -> Result<String, QrError> {
    let qr = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)?;
    Ok(render_halfblock(&qr, dark_theme))
}

fn render_halfblock(qr: &QrCode, dark_theme: bool) -> String {
    let colors = qr.to_colors();
    let width = qr.width();
    let total = width + 2 * QUIET_ZONE;

    // Quiet zone and anything past the last row count as light.
    let is_dark = |x: usize, y: usize| {
        if x < QUIET_ZONE || y < QUIET_ZONE || x >= QUIET_ZONE + width || y >= QUIET_ZONE + width {
            return false;
        }
        let idx = (y - QUIET_ZONE) * width + (x - QUIET_ZONE);
        colors.get(idx).is_some_and(|c| *c == Color::Dark)
    };

    let mut out = String::with_capacity(total * (total / 2 + 1) * 3);
    for y in (0..total).step_by(2) {
        for x in 0..total {
            // Printed glyphs show as foreground; on dark terminals that is light.
            let top = is_dark(x, y) != dark_theme;
            let bottom = if y + 1 < total {
                is_dark(x, y + 1) != dark_theme
            } else {
                dark_theme
            };
            out.push(match (top, bottom) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    out
}

use std::fs;
use std::path::Path;

use log::{info, warn};
use rusttype::Font;

use crate::{RenderError, StatusOr};

/// Serif faces first, then common sans fallbacks.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/System/Library/Fonts/Supplemental/Georgia.ttf",
    "/Library/Fonts/Georgia.ttf",
    "C:\\Windows\\Fonts\\georgia.ttf",
    "/usr/share/fonts/truetype/msttcorefonts/Georgia.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSerif-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
];

fn font_from_file(path: &Path) -> StatusOr<Font<'static>> {
    let data = fs::read(path)?;
    Font::try_from_vec(data)
        .ok_or_else(|| RenderError::FontError(format!("{} is not a TrueType font", path.display())))
}

/// Load the legend font.
///
/// An explicit path must load. Without one the usual system locations are
/// tried and `Ok(None)` is returned when none of them exists.
pub fn load_font(path: Option<&Path>) -> StatusOr<Option<Font<'static>>> {
    if let Some(path) = path {
        return font_from_file(path).map(Some);
    }

    for candidate in SYSTEM_FONT_CANDIDATES {
        let candidate = Path::new(candidate);
        if !candidate.exists() {
            continue;
        }
        match font_from_file(candidate) {
            Ok(font) => {
                info!("Using legend font {}", candidate.display());
                return Ok(Some(font));
            }
            Err(e) => warn!("Skipping font {}: {}", candidate.display(), e),
        }
    }

    warn!("No TrueType font found; legend labels will be omitted");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_path_must_exist() {
        let result = load_font(Some(Path::new("/definitely/not/here.ttf")));
        assert!(matches!(result, Err(RenderError::IoError(_))));
    }

    #[test]
    fn explicit_path_must_be_a_font() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a font").unwrap();
        let result = load_font(Some(file.path()));
        assert!(matches!(result, Err(RenderError::FontError(_))));
    }
}

//! Font faces shared by both render strategies.
//!
//! A `FontResource` is loaded once when the renderer is built. The raster
//! strategy hands its database to usvg, the table strategy embeds the raw
//! face bytes into the PDF, and both measure text with the same face so
//! wrapped lines match what ends up on the page.

use std::{path::Path, sync::Arc};

use resvg::usvg::fontdb::{self, Database, Family, Query, Weight};

use crate::render::{
    error::RenderError,
    fit::{ApproxMeasure, TextMeasure},
};

static APPROX: ApproxMeasure = ApproxMeasure;

/// Where to look for fonts
#[derive(Debug, Clone, Default)]
pub struct FontSettings {
    pub font_path: Option<std::path::PathBuf>,
    pub bold_font_path: Option<std::path::PathBuf>,
    pub system_fonts: bool,
}

/// One loaded face and its raw bytes
#[derive(Debug, Clone)]
pub struct FontFace {
    pub family: String,
    data: Arc<Vec<u8>>,
    index: u32,
    units_per_em: f32,
}

impl FontFace {
    pub fn from_data(family: String, data: Vec<u8>, index: u32) -> Result<Self, RenderError> {
        let units_per_em = ttf_parser::Face::parse(&data, index)
            .map_err(|e| RenderError::Font(format!("cannot parse {family}: {e}")))?
            .units_per_em() as f32;

        Ok(Self {
            family,
            data: Arc::new(data),
            index,
            units_per_em,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Face index inside a font collection, 0 for plain font files
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl TextMeasure for FontFace {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let Ok(face) = ttf_parser::Face::parse(&self.data, self.index) else {
            return APPROX.text_width(text, font_size);
        };

        let units: f32 = text
            .chars()
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map(f32::from)
                    // missing glyphs still take room once a fallback font draws them
                    .unwrap_or(self.units_per_em * 0.55)
            })
            .sum();

        units / self.units_per_em * font_size
    }
}

pub struct FontResource {
    db: Arc<Database>,
    regular: Option<FontFace>,
    bold: Option<FontFace>,
}

impl FontResource {
    pub fn load(settings: &FontSettings) -> Result<Self, RenderError> {
        let mut db = Database::new();

        let regular_id = match &settings.font_path {
            Some(path) => Some(load_file(&mut db, path)?),
            None => {
                if settings.system_fonts {
                    db.load_system_fonts();
                }
                let family = choose_family(
                    db.faces()
                        .filter_map(|face| face.families.first())
                        .map(|(name, _)| name.as_str()),
                );
                pick_face(&db, Weight::NORMAL, family.as_deref())
            }
        };

        let regular_family = regular_id.and_then(|id| face_family(&db, id));
        if let Some(family) = &regular_family {
            db.set_sans_serif_family(family.clone());
        }

        let bold_id = match &settings.bold_font_path {
            Some(path) => Some(load_file(&mut db, path)?),
            None => regular_family.as_deref().and_then(|family| {
                pick_face(&db, Weight::BOLD, Some(family)).filter(|id| {
                    Some(*id) != regular_id
                        && is_bold(&db, *id)
                        && face_family(&db, *id).as_deref() == Some(family)
                })
            }),
        };

        let regular = regular_id.and_then(|id| extract_face(&db, id));
        let bold = bold_id.and_then(|id| extract_face(&db, id));

        match (&regular, &bold) {
            (Some(regular), Some(bold)) => log::info!(
                "using font '{}' / '{}' bold ({} faces available)",
                regular.family,
                bold.family,
                db.len()
            ),
            (Some(regular), None) => log::warn!(
                "using font '{}' without a bold variant ({} faces available)",
                regular.family,
                db.len()
            ),
            (None, _) => log::warn!("no usable font found, falling back to built-in metrics"),
        }

        Ok(Self {
            db: Arc::new(db),
            regular,
            bold,
        })
    }

    /// No faces at all: approximate metrics, no text on rasterized boards
    pub fn empty() -> Self {
        Self {
            db: Arc::new(Database::new()),
            regular: None,
            bold: None,
        }
    }

    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    pub fn regular(&self) -> Option<&FontFace> {
        self.regular.as_ref()
    }

    /// Bold face, or the regular one when no bold variant was found
    pub fn bold(&self) -> Option<&FontFace> {
        self.bold.as_ref().or(self.regular.as_ref())
    }

    pub fn measure(&self, bold: bool) -> &dyn TextMeasure {
        let face = if bold { self.bold() } else { self.regular() };
        match face {
            Some(face) => face,
            None => &APPROX,
        }
    }

    /// Value for an svg `font-family` attribute
    pub fn svg_family(&self, bold: bool) -> String {
        let face = if bold { self.bold() } else { self.regular() };
        match face {
            Some(face) => format!("'{}', sans-serif", face.family.replace('\'', "")),
            None => "sans-serif".to_string(),
        }
    }

    /// Characters of `texts` the regular face has no glyph for, in first-seen order
    pub fn missing_glyphs<'t>(&self, texts: impl IntoIterator<Item = &'t str>) -> Vec<char> {
        let Some(face) = &self.regular else {
            return Vec::new();
        };
        let Ok(parsed) = ttf_parser::Face::parse(&face.data, face.index) else {
            return Vec::new();
        };

        let mut missing = Vec::new();
        for ch in texts.into_iter().flat_map(str::chars) {
            if !ch.is_whitespace() && parsed.glyph_index(ch).is_none() && !missing.contains(&ch) {
                missing.push(ch);
            }
        }
        missing
    }

    /// Logs once per job when track names need glyphs the font lacks
    pub fn warn_missing_glyphs<'t>(&self, texts: impl IntoIterator<Item = &'t str>) {
        let missing = self.missing_glyphs(texts);
        if let (Some(face), false) = (&self.regular, missing.is_empty()) {
            let sample: String = missing.iter().take(MISSING_SAMPLE).collect();
            log::warn!(
                "font '{}' has no glyphs for {} characters (e.g. '{sample}'), set render.font_path to a font covering them",
                face.family,
                missing.len()
            );
        }
    }
}

const MISSING_SAMPLE: usize = 12;

/// Broad-coverage sans families, best first
const PREFERRED_FAMILIES: &[&str] = &[
    "Noto Sans",
    "DejaVu Sans",
    "Liberation Sans",
    "Arial",
    "Helvetica",
    "Roboto",
    "Open Sans",
    "FreeSans",
];

/// Families never picked as body text
const UNSUITABLE_WORDS: &[&str] = &["Math", "Mono", "Symbol", "Emoji", "Serif", "Code", "Icons"];

/// Picks the family used for cell text out of what is installed
pub fn choose_family<'f>(available: impl IntoIterator<Item = &'f str>) -> Option<String> {
    let available: Vec<&str> = available.into_iter().collect();

    PREFERRED_FAMILIES
        .iter()
        .find(|preferred| available.iter().any(|f| f.eq_ignore_ascii_case(preferred)))
        .map(|f| f.to_string())
        .or_else(|| {
            available
                .iter()
                .find(|f| !UNSUITABLE_WORDS.iter().any(|w| f.contains(w)))
                .map(|f| f.to_string())
        })
}

fn load_file(db: &mut Database, path: &Path) -> Result<fontdb::ID, RenderError> {
    let before = db.len();
    db.load_font_file(path)
        .map_err(|e| RenderError::Font(format!("cannot load {}: {e}", path.display())))?;

    db.faces()
        .nth(before)
        .map(|face| face.id)
        .ok_or_else(|| RenderError::Font(format!("{} contains no font faces", path.display())))
}

fn pick_face(db: &Database, weight: Weight, family: Option<&str>) -> Option<fontdb::ID> {
    let families = match family {
        Some(name) => vec![Family::Name(name)],
        None => vec![Family::SansSerif],
    };
    let query = Query {
        families: &families,
        weight,
        ..Default::default()
    };

    db.query(&query).or_else(|| {
        // nothing suitable installed, any face beats no text
        db.faces()
            .find(|face| face.weight == weight)
            .or_else(|| db.faces().next())
            .map(|face| face.id)
    })
}

fn is_bold(db: &Database, id: fontdb::ID) -> bool {
    db.face(id)
        .is_some_and(|face| face.weight.0 >= Weight::SEMIBOLD.0)
}

fn face_family(db: &Database, id: fontdb::ID) -> Option<String> {
    db.face(id)
        .and_then(|face| face.families.first())
        .map(|(name, _)| name.clone())
}

fn extract_face(db: &Database, id: fontdb::ID) -> Option<FontFace> {
    let family = face_family(db, id).unwrap_or_else(|| "unknown".to_string());
    let (data, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;

    match FontFace::from_data(family, data, index) {
        Ok(face) => Some(face),
        Err(e) => {
            log::warn!("skipping font face: {e}");
            None
        }
    }
}

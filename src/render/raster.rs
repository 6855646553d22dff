//! Raster rendering: each board is laid out as an svg scene on an A4
//! canvas, rasterized with resvg and encoded as PNG. The combined document
//! puts two boards side by side on landscape pages.

use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use resvg::{tiny_skia, usvg};

use crate::{
    domain::board::{Board, BoardSize, Cell, Occupant},
    render::{
        BoardRenderer, CancelToken,
        archive::{entry_name, write_archive},
        artwork::{ArtworkLoader, ArtworkSource},
        error::RenderError,
        fit::fit_text,
        font::FontResource,
        table::cell_font_size,
    },
};

const A4_SHORT_MM: f32 = 210.0;
const A4_LONG_MM: f32 = 297.0;
const MM_PER_INCH: f32 = 25.4;

const SHEET_MARGIN_MM: f32 = 10.0;
const SHEET_GUTTER_MM: f32 = 10.0;
const BOARDS_PER_SHEET: usize = 2;

const MAX_CELL_LINES: usize = 3;

/// Pixel geometry of one board canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    pub dpi: f32,
    pub grid_x: f32,
    pub grid_y: f32,
    pub cell: f32,
    pub padding: f32,
    pub thumbnail: f32,
}

impl CanvasLayout {
    pub fn new(size: BoardSize, dpi: f32) -> Self {
        let width = (A4_SHORT_MM / MM_PER_INCH * dpi).round();
        let height = (A4_LONG_MM / MM_PER_INCH * dpi).round();
        let margin = width * 0.06;
        let title = width * 0.12;
        let cell = (width - 2.0 * margin) / size.get() as f32;

        Self {
            width: width as u32,
            height: height as u32,
            dpi,
            grid_x: margin,
            grid_y: margin + title,
            cell,
            padding: cell * 0.06,
            thumbnail: cell * 0.42,
        }
    }

    pub fn grid_size(&self, size: BoardSize) -> f32 {
        self.cell * size.get() as f32
    }

    /// Points to pixels at this canvas density
    pub fn px(&self, pt: f32) -> f32 {
        pt * self.dpi / 72.0
    }

    fn cell_origin(&self, cell: &Cell) -> (f32, f32) {
        (
            self.grid_x + cell.col as f32 * self.cell,
            self.grid_y + cell.row as f32 * self.cell,
        )
    }
}

pub struct RasterRenderer<'a> {
    fonts: &'a FontResource,
    artwork: &'a dyn ArtworkSource,
    cancel: &'a CancelToken,
    dpi: f32,
}

impl<'a> RasterRenderer<'a> {
    pub fn new(
        fonts: &'a FontResource,
        artwork: &'a dyn ArtworkSource,
        cancel: &'a CancelToken,
        dpi: f32,
    ) -> Self {
        Self {
            fonts,
            artwork,
            cancel,
            dpi,
        }
    }

    /// Draws the boards in order, handing each pixmap to `sink` before the next one is drawn
    fn rasterize_each<F>(
        &self,
        boards: &[Board],
        include_free_space: bool,
        mut sink: F,
    ) -> Result<(), RenderError>
    where
        F: FnMut(usize, tiny_skia::Pixmap) -> Result<(), RenderError>,
    {
        if boards.is_empty() {
            return Err(RenderError::NoBoards);
        }

        let mut loader = ArtworkLoader::new(self.artwork, self.cancel);
        for (i, board) in boards.iter().enumerate() {
            self.cancel.check()?;
            let svg = self.scene_svg(board, i + 1, boards.len(), include_free_space, &mut loader)?;
            let pixmap = self.rasterize(&svg, CanvasLayout::new(board.size, self.dpi))?;
            sink(i, pixmap)?;
        }
        Ok(())
    }

    fn rasterize(&self, svg: &str, layout: CanvasLayout) -> Result<tiny_skia::Pixmap, RenderError> {
        let mut options = usvg::Options::default();
        options.fontdb = self.fonts.database();

        let tree = usvg::Tree::from_str(svg, &options)?;
        let mut pixmap = tiny_skia::Pixmap::new(layout.width, layout.height).ok_or_else(|| {
            RenderError::Canvas(format!(
                "cannot allocate a {}x{} canvas",
                layout.width, layout.height
            ))
        })?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        Ok(pixmap)
    }

    /// The svg scene of one board
    pub fn scene_svg(
        &self,
        board: &Board,
        number: usize,
        total: usize,
        include_free_space: bool,
        artwork: &mut ArtworkLoader,
    ) -> Result<String, RenderError> {
        let layout = CanvasLayout::new(board.size, self.dpi);
        let grid = layout.grid_size(board.size);
        let (w, h) = (layout.width, layout.height);

        let mut svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##
        );
        svg.push_str(r##"<rect x="0" y="0" width="100%" height="100%" fill="#ffffff"/>"##);

        svg.push_str(&text_element(
            "BINGO",
            w as f32 / 2.0,
            layout.grid_y - layout.px(14.0),
            layout.px(36.0),
            &self.fonts.svg_family(true),
            true,
        ));

        for cell in board.cells() {
            let (x, y) = layout.cell_origin(cell);
            if cell.is_free_space() {
                svg.push_str(&format!(
                    r##"<rect x="{x:.1}" y="{y:.1}" width="{c:.1}" height="{c:.1}" fill="#f1f1f1"/>"##,
                    c = layout.cell
                ));
            }
            svg.push_str(&self.cell_svg(cell, &layout, board.size, artwork)?);
        }

        let stroke = layout.px(1.2);
        svg.push_str(&format!(
            r##"<g stroke="#111111" stroke-width="{stroke:.2}" fill="none">"##
        ));
        for i in 0..=board.size.get() {
            let offset = i as f32 * layout.cell;
            let (gx, gy) = (layout.grid_x, layout.grid_y);
            svg.push_str(&format!(
                r#"<line x1="{x:.1}" y1="{gy:.1}" x2="{x:.1}" y2="{y2:.1}"/><line x1="{gx:.1}" y1="{y:.1}" x2="{x2:.1}" y2="{y:.1}"/>"#,
                x = gx + offset,
                y2 = gy + grid,
                y = gy + offset,
                x2 = gx + grid,
            ));
        }
        svg.push_str("</g>");

        let mut caption = format!("Board {number} of {total} · {}", board.size);
        if board.size.free_space_applies(include_free_space) {
            caption.push_str(" · free centre");
        }
        svg.push_str(&text_element(
            &caption,
            w as f32 / 2.0,
            layout.grid_y + grid + layout.px(24.0),
            layout.px(10.0),
            &self.fonts.svg_family(false),
            false,
        ));

        svg.push_str("</svg>");
        Ok(svg)
    }

    fn cell_svg(
        &self,
        cell: &Cell,
        layout: &CanvasLayout,
        size: BoardSize,
        artwork: &mut ArtworkLoader,
    ) -> Result<String, RenderError> {
        let (x, y) = layout.cell_origin(cell);
        let center_x = x + layout.cell / 2.0;
        let inner = layout.cell - 2.0 * layout.padding;
        let base_size = layout.px(cell_font_size(size));

        let track = match &cell.occupant {
            Occupant::FreeSpace => {
                let fitted = fit_text(
                    "FREE",
                    inner,
                    inner,
                    1,
                    base_size * 2.0,
                    self.fonts.measure(true),
                );
                return Ok(text_block(
                    &fitted.lines,
                    fitted.font_size,
                    center_x,
                    y + layout.cell / 2.0,
                    &self.fonts.svg_family(true),
                    true,
                ));
            }
            Occupant::Track(track) => track,
        };

        let thumbnail = match &track.artwork_url {
            Some(url) => artwork.data_uri(url)?,
            None => None,
        };

        let mut out = String::new();
        let text_top = match thumbnail {
            Some(uri) => {
                let side = layout.thumbnail;
                let tx = center_x - side / 2.0;
                let ty = y + layout.padding;
                let clip_id = format!("art-{}-{}", cell.row, cell.col);
                out.push_str(&format!(
                    r#"<defs><clipPath id="{clip_id}"><rect x="{tx:.1}" y="{ty:.1}" width="{side:.1}" height="{side:.1}" rx="{r:.1}" ry="{r:.1}"/></clipPath></defs><image x="{tx:.1}" y="{ty:.1}" width="{side:.1}" height="{side:.1}" preserveAspectRatio="xMidYMid slice" clip-path="url(#{clip_id})" xlink:href="{uri}"/>"#,
                    r = side * 0.12,
                ));
                ty + side + layout.padding
            }
            None => y + layout.padding,
        };

        let box_h = y + layout.cell - layout.padding - text_top;
        let fitted = fit_text(
            track.display_name(),
            inner,
            box_h,
            MAX_CELL_LINES,
            base_size,
            self.fonts.measure(false),
        );
        out.push_str(&text_block(
            &fitted.lines,
            fitted.font_size,
            center_x,
            text_top + box_h / 2.0,
            &self.fonts.svg_family(false),
            false,
        ));
        Ok(out)
    }

    pub fn render_board_png(
        &self,
        board: &Board,
        include_free_space: bool,
    ) -> Result<Vec<u8>, RenderError> {
        let mut png = Vec::new();
        self.rasterize_each(std::slice::from_ref(board), include_free_space, |_, pixmap| {
            png = encode_png(&pixmap)?;
            Ok(())
        })?;
        Ok(png)
    }
}

impl BoardRenderer for RasterRenderer<'_> {
    /// Two boards per landscape page, each scaled to its half of the sheet
    fn render_single_document(
        &self,
        boards: &[Board],
        include_free_space: bool,
    ) -> Result<Vec<u8>, RenderError> {
        if boards.is_empty() {
            return Err(RenderError::NoBoards);
        }

        let (doc, first_page, first_layer) =
            PdfDocument::new("Bingo boards", Mm(A4_LONG_MM), Mm(A4_SHORT_MM), "Boards");
        let slot_w = (A4_LONG_MM - 2.0 * SHEET_MARGIN_MM - SHEET_GUTTER_MM) / 2.0;
        let slot_h = A4_SHORT_MM - 2.0 * SHEET_MARGIN_MM;

        let mut layer = doc.get_page(first_page).get_layer(first_layer);
        self.rasterize_each(boards, include_free_space, |i, pixmap| {
            let slot = i % BOARDS_PER_SHEET;
            if slot == 0 && i > 0 {
                let (page, new_layer) = doc.add_page(Mm(A4_LONG_MM), Mm(A4_SHORT_MM), "Boards");
                layer = doc.get_page(page).get_layer(new_layer);
            }

            let natural_w = pixmap.width() as f32 / self.dpi * MM_PER_INCH;
            let natural_h = pixmap.height() as f32 / self.dpi * MM_PER_INCH;
            let scale = (slot_w / natural_w).min(slot_h / natural_h);

            let slot_x = SHEET_MARGIN_MM + slot as f32 * (slot_w + SHEET_GUTTER_MM);
            let x = slot_x + (slot_w - natural_w * scale) / 2.0;
            let y = SHEET_MARGIN_MM + (slot_h - natural_h * scale) / 2.0;

            let image = to_rgb_image(&pixmap)?;
            drop(pixmap);
            Image::from_dynamic_image(&image).add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(x)),
                    translate_y: Some(Mm(y)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(self.dpi),
                    ..Default::default()
                },
            );
            Ok(())
        })?;

        doc.save_to_bytes().map_err(RenderError::pdf)
    }

    fn render_per_board_archive(
        &self,
        boards: &[Board],
        include_free_space: bool,
    ) -> Result<Vec<u8>, RenderError> {
        let mut entries = Vec::with_capacity(boards.len());
        self.rasterize_each(boards, include_free_space, |i, pixmap| {
            entries.push((entry_name(i, "png"), encode_png(&pixmap)?));
            Ok(())
        })?;

        write_archive(entries)
    }
}

fn encode_png(pixmap: &tiny_skia::Pixmap) -> Result<Vec<u8>, RenderError> {
    pixmap
        .encode_png()
        .map_err(|e| RenderError::Canvas(e.to_string()))
}

/// The canvas background is opaque, so dropping alpha loses nothing
fn to_rgb_image(pixmap: &tiny_skia::Pixmap) -> Result<image::DynamicImage, RenderError> {
    let rgb: Vec<u8> = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    image::RgbImage::from_raw(pixmap.width(), pixmap.height(), rgb)
        .map(image::DynamicImage::ImageRgb8)
        .ok_or_else(|| RenderError::Canvas("pixel buffer size mismatch".to_string()))
}

/// Lines centred on `center_x`, the block vertically centred on `center_y`
fn text_block(
    lines: &[String],
    font_size: f32,
    center_x: f32,
    center_y: f32,
    family: &str,
    bold: bool,
) -> String {
    let line_h = font_size * crate::render::fit::LINE_HEIGHT;
    let top = center_y - line_h * lines.len() as f32 / 2.0;

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let baseline = top + i as f32 * line_h + font_size * 0.9;
            text_element(line, center_x, baseline, font_size, family, bold)
        })
        .collect()
}

fn text_element(text: &str, x: f32, baseline: f32, size: f32, family: &str, bold: bool) -> String {
    format!(
        r##"<text x="{x:.1}" y="{baseline:.1}" font-family="{family}" font-size="{size:.1}" font-weight="{weight}" text-anchor="middle" fill="#111111">{text}</text>"##,
        family = escape_xml(family),
        weight = if bold { "bold" } else { "normal" },
        text = escape_xml(text),
    )
}

/// Control characters are not allowed in XML text and become spaces
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            c if c.is_control() => out.push(' '),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bingo::generator::{generate_board, generate_multiple_boards},
        domain::track::mock_pool,
        render::{
            archive::archive_entries,
            artwork::{NoArtwork, tests::StubArtwork},
            font::FontSettings,
        },
    };

    // low density keeps the canvases small
    const TEST_DPI: f32 = 30.0;

    fn size(n: u8) -> BoardSize {
        BoardSize::new(n).unwrap()
    }

    #[test]
    fn test_layout_is_a4_at_dpi() {
        let layout = CanvasLayout::new(size(5), 150.0);

        assert_eq!((layout.width, layout.height), (1240, 1754));
        assert!(layout.grid_x + layout.grid_size(size(5)) <= layout.width as f32);
        assert!(layout.grid_y + layout.grid_size(size(5)) < layout.height as f32);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"Rock & Roll <"Live"> 'Mix'"#),
            "Rock &amp; Roll &lt;&quot;Live&quot;&gt; &apos;Mix&apos;"
        );
        assert_eq!(escape_xml("a\u{0}b\u{1b}c\td"), "a b c d");
    }

    #[test]
    fn test_control_characters_in_names_still_render() -> anyhow::Result<()> {
        let mut pool = mock_pool(9);
        pool[0].name = "Bell\u{7}Song\u{0}".to_string();
        let board = generate_board(&pool, size(3), false)?;
        let fonts = FontResource::empty();
        let cancel = CancelToken::new();
        let renderer = RasterRenderer::new(&fonts, &NoArtwork, &cancel, TEST_DPI);

        let png = renderer.render_board_png(&board, false)?;

        assert!(png.starts_with(b"\x89PNG"));
        Ok(())
    }

    #[test]
    fn test_text_only_cells_have_visible_text() -> anyhow::Result<()> {
        let fonts = FontResource::load(&FontSettings {
            system_fonts: true,
            ..Default::default()
        })?;
        // without any installed font there are no glyphs to look for
        if fonts.regular().is_none() {
            return Ok(());
        }

        let mut pool = mock_pool(9);
        for track in &mut pool {
            track.artwork_url = Some("https://img/broken.png".to_string());
        }
        let board = generate_board(&pool, size(3), false)?;
        let cancel = CancelToken::new();
        let source = StubArtwork::default();
        let renderer = RasterRenderer::new(&fonts, &source, &cancel, 72.0);

        let img = image::load_from_memory(&renderer.render_board_png(&board, false)?)?.to_luma8();

        // inside the centre cell, clear of the grid lines
        let layout = CanvasLayout::new(size(3), 72.0);
        let (x, y) = layout.cell_origin(board.cell(1, 1)?);
        let inset = layout.padding + layout.px(2.0);
        let xs = (x + inset) as u32..(x + layout.cell - inset) as u32;
        let ys = (y + inset) as u32..(y + layout.cell - inset) as u32;
        let dark = ys
            .flat_map(|py| xs.clone().map(move |px| (px, py)))
            .filter(|&(px, py)| img.get_pixel(px, py).0[0] < 128)
            .count();

        assert!(dark > 0, "no text drawn in the centre cell");
        Ok(())
    }

    #[test]
    fn test_boards_are_handed_over_one_at_a_time() -> anyhow::Result<()> {
        let boards = generate_multiple_boards(&mock_pool(9), 3, size(3), false)?;
        let fonts = FontResource::empty();
        let cancel = CancelToken::new();
        let renderer = RasterRenderer::new(&fonts, &NoArtwork, &cancel, TEST_DPI);

        let mut seen = Vec::new();
        let result = renderer.rasterize_each(&boards, false, |i, _| {
            seen.push(i);
            cancel.cancel();
            Ok(())
        });

        // the first board reached the sink before the second was drawn
        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert_eq!(seen, vec![0]);
        Ok(())
    }

    #[test]
    fn test_scene_has_free_label_and_all_tracks() -> anyhow::Result<()> {
        let board = generate_board(&mock_pool(30), size(5), true)?;
        let fonts = FontResource::empty();
        let cancel = CancelToken::new();
        let renderer = RasterRenderer::new(&fonts, &NoArtwork, &cancel, TEST_DPI);
        let mut loader = ArtworkLoader::new(&NoArtwork, &cancel);

        let svg = renderer.scene_svg(&board, 1, 1, true, &mut loader)?;

        assert!(svg.contains(">FREE</text>"));
        assert!(svg.contains("free centre"));
        assert!(!svg.contains("<image"));
        // short names stay on one line at base size
        for track in board.tracks() {
            assert!(svg.contains(&track.name), "missing {}", track.name);
        }

        Ok(())
    }

    #[test]
    fn test_long_names_stop_at_three_lines() -> anyhow::Result<()> {
        let mut pool = mock_pool(9);
        for track in &mut pool {
            track.name = vec!["la"; 60].join(" ");
        }
        let board = generate_board(&pool, size(3), false)?;
        let fonts = FontResource::empty();
        let cancel = CancelToken::new();
        let renderer = RasterRenderer::new(&fonts, &NoArtwork, &cancel, TEST_DPI);
        let mut loader = ArtworkLoader::new(&NoArtwork, &cancel);

        let svg = renderer.scene_svg(&board, 1, 1, false, &mut loader)?;

        // one caption plus the cell lines
        let cell_lines = svg.matches(r#"font-weight="normal""#).count() - 1;
        assert!(cell_lines > 9, "names were not wrapped");
        assert!(cell_lines <= 9 * MAX_CELL_LINES);
        assert!(svg.contains('…'));

        Ok(())
    }

    #[test]
    fn test_broken_artwork_degrades_to_text() -> anyhow::Result<()> {
        let mut pool = mock_pool(9);
        for (i, track) in pool.iter_mut().enumerate() {
            track.artwork_url = Some(format!("https://img/{i}.png"));
        }
        pool[4].artwork_url = Some("https://img/broken.png".to_string());
        pool[4].name = "Broken Cover".to_string();
        let board = generate_board(&pool, size(3), false)?;

        let fonts = FontResource::empty();
        let cancel = CancelToken::new();
        let source = StubArtwork::default();
        let renderer = RasterRenderer::new(&fonts, &source, &cancel, TEST_DPI);

        let mut loader = ArtworkLoader::new(&source, &cancel);
        let svg = renderer.scene_svg(&board, 1, 1, false, &mut loader)?;
        assert_eq!(svg.matches("<image").count(), 8);
        assert!(svg.contains(">Broken</text>") || svg.contains(">Broken Cover</text>"));

        let png = renderer.render_board_png(&board, false)?;
        let img = image::load_from_memory(&png)?;
        let layout = CanvasLayout::new(size(3), TEST_DPI);
        assert_eq!((img.width(), img.height()), (layout.width, layout.height));

        Ok(())
    }

    #[test]
    fn test_archive_has_one_png_per_board_in_order() -> anyhow::Result<()> {
        let boards = generate_multiple_boards(&mock_pool(20), 3, size(4), false)?;
        let fonts = FontResource::empty();
        let cancel = CancelToken::new();
        let renderer = RasterRenderer::new(&fonts, &NoArtwork, &cancel, TEST_DPI);

        let zip = renderer.render_per_board_archive(&boards, false)?;
        let entries = archive_entries(&zip)?;

        let names: Vec<_> = entries.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["board_001.png", "board_002.png", "board_003.png"]);
        for (_, png) in &entries {
            assert!(png.starts_with(b"\x89PNG"));
        }

        Ok(())
    }

    #[test]
    fn test_document_puts_two_boards_per_page() -> anyhow::Result<()> {
        let fonts = FontResource::empty();
        let cancel = CancelToken::new();
        let renderer = RasterRenderer::new(&fonts, &NoArtwork, &cancel, TEST_DPI);

        for (count, pages) in [(1, 1), (2, 1), (3, 2)] {
            let boards = generate_multiple_boards(&mock_pool(9), count, size(3), false)?;
            let pdf = renderer.render_single_document(&boards, false)?;
            assert_eq!(lopdf::Document::load_mem(&pdf)?.get_pages().len(), pages);
        }

        Ok(())
    }

    #[test]
    fn test_cancel_before_render() {
        let boards = generate_multiple_boards(&mock_pool(9), 2, size(3), false).unwrap();
        let fonts = FontResource::empty();
        let cancel = CancelToken::new();
        cancel.cancel();
        let renderer = RasterRenderer::new(&fonts, &NoArtwork, &cancel, TEST_DPI);

        assert!(matches!(
            renderer.render_per_board_archive(&boards, false),
            Err(RenderError::Cancelled)
        ));
    }
}

//! Vector rendering: each board becomes one A4 page holding a table of
//! square cells.

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rgb,
};

use crate::{
    domain::board::{Board, BoardSize, Occupant},
    render::{
        BoardRenderer, CancelToken,
        archive::{entry_name, write_archive},
        error::RenderError,
        fit::{ApproxMeasure, TextMeasure, fit_text},
        font::FontResource,
    },
};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 15.0;
const GRID_TOP: f32 = PAGE_H - 45.0;
const CELL_PADDING: f32 = 2.5;
const TITLE_SIZE: f32 = 32.0;
const CAPTION_SIZE: f32 = 9.0;
const MAX_CELL_LINES: usize = 4;
const FREE_LABEL: &str = "FREE";

const PT_PER_MM: f32 = 72.0 / 25.4;

/// Cell text size in points; bigger cells get bigger text
pub fn cell_font_size(size: BoardSize) -> f32 {
    match size.get() {
        3 => 14.0,
        4 => 11.0,
        _ => 9.0,
    }
}

fn pt_to_mm(pt: f32) -> f32 {
    pt / PT_PER_MM
}

fn mm_to_pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

struct PdfFonts<'a> {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    regular_measure: &'a dyn TextMeasure,
    bold_measure: &'a dyn TextMeasure,
}

pub struct TableRenderer<'a> {
    fonts: &'a FontResource,
    cancel: &'a CancelToken,
}

impl<'a> TableRenderer<'a> {
    pub fn new(fonts: &'a FontResource, cancel: &'a CancelToken) -> Self {
        Self { fonts, cancel }
    }

    /// Embeds the loaded faces, or falls back to Helvetica which only covers latin text
    fn register_fonts(&self, doc: &PdfDocumentReference) -> Result<PdfFonts<'a>, RenderError> {
        let builtin = |font| doc.add_builtin_font(font).map_err(RenderError::pdf);

        let embedded_regular = self.fonts.regular().and_then(|face| {
            doc.add_external_font(face.data())
                .inspect_err(|e| log::warn!("cannot embed font '{}': {e:?}", face.family))
                .ok()
        });

        match embedded_regular {
            Some(regular) => {
                let bold = match self.fonts.bold() {
                    Some(face) => doc.add_external_font(face.data()).unwrap_or(regular.clone()),
                    None => regular.clone(),
                };
                Ok(PdfFonts {
                    regular,
                    bold,
                    regular_measure: self.fonts.measure(false),
                    bold_measure: self.fonts.measure(true),
                })
            }
            None => Ok(PdfFonts {
                regular: builtin(BuiltinFont::Helvetica)?,
                bold: builtin(BuiltinFont::HelveticaBold)?,
                regular_measure: &ApproxMeasure,
                bold_measure: &ApproxMeasure,
            }),
        }
    }

    /// `first_number` is the 1-based position of the first board in the whole set
    fn render_document(
        &self,
        boards: &[Board],
        first_number: usize,
        total: usize,
        include_free_space: bool,
    ) -> Result<Vec<u8>, RenderError> {
        if boards.is_empty() {
            return Err(RenderError::NoBoards);
        }

        let (doc, first_page, first_layer) =
            PdfDocument::new("Bingo boards", Mm(PAGE_W), Mm(PAGE_H), "Board");
        let fonts = self.register_fonts(&doc)?;

        for (i, board) in boards.iter().enumerate() {
            self.cancel.check()?;

            let layer = if i == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Board");
                doc.get_page(page).get_layer(layer)
            };

            draw_board(
                &layer,
                &fonts,
                board,
                first_number + i,
                total,
                include_free_space,
            );
        }

        doc.save_to_bytes().map_err(RenderError::pdf)
    }
}

impl BoardRenderer for TableRenderer<'_> {
    fn render_single_document(
        &self,
        boards: &[Board],
        include_free_space: bool,
    ) -> Result<Vec<u8>, RenderError> {
        self.render_document(boards, 1, boards.len(), include_free_space)
    }

    fn render_per_board_archive(
        &self,
        boards: &[Board],
        include_free_space: bool,
    ) -> Result<Vec<u8>, RenderError> {
        if boards.is_empty() {
            return Err(RenderError::NoBoards);
        }

        let entries = boards
            .iter()
            .enumerate()
            .map(|(i, board)| {
                let pdf = self.render_document(
                    std::slice::from_ref(board),
                    i + 1,
                    boards.len(),
                    include_free_space,
                )?;
                Ok((entry_name(i, "pdf"), pdf))
            })
            .collect::<Result<Vec<_>, RenderError>>()?;

        write_archive(entries)
    }
}

fn draw_board(
    layer: &PdfLayerReference,
    fonts: &PdfFonts,
    board: &Board,
    number: usize,
    total: usize,
    include_free_space: bool,
) {
    let n = board.size.get();
    let grid = PAGE_W - 2.0 * MARGIN;
    let cell = grid / n as f32;
    let grid_bottom = GRID_TOP - grid;

    centered_text(
        layer,
        "BINGO",
        TITLE_SIZE,
        &fonts.bold,
        fonts.bold_measure,
        PAGE_W / 2.0,
        GRID_TOP + 12.0,
    );

    layer.set_outline_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    layer.set_outline_thickness(1.0);
    for i in 0..=n {
        let offset = i as f32 * cell;
        stroke(layer, (MARGIN + offset, grid_bottom), (MARGIN + offset, GRID_TOP));
        stroke(
            layer,
            (MARGIN, GRID_TOP - offset),
            (MARGIN + grid, GRID_TOP - offset),
        );
    }

    let base_size = cell_font_size(board.size);
    let box_w = mm_to_pt(cell - 2.0 * CELL_PADDING);
    let box_h = mm_to_pt(cell - 2.0 * CELL_PADDING);

    for c in board.cells() {
        let center_x = MARGIN + (c.col as f32 + 0.5) * cell;
        let center_y = GRID_TOP - (c.row as f32 + 0.5) * cell;

        let (text, font, measure, size) = match &c.occupant {
            Occupant::FreeSpace => (FREE_LABEL, &fonts.bold, fonts.bold_measure, base_size * 1.6),
            Occupant::Track(track) => (
                track.display_name(),
                &fonts.regular,
                fonts.regular_measure,
                base_size,
            ),
        };

        let fitted = fit_text(text, box_w, box_h, MAX_CELL_LINES, size, measure);
        let line_h = pt_to_mm(fitted.line_height());
        let block_top = center_y + pt_to_mm(fitted.block_height()) / 2.0;
        // baseline sits roughly 0.8 em under the top of each line
        let ascent = pt_to_mm(fitted.font_size * 0.8);

        for (i, line) in fitted.lines.iter().enumerate() {
            let baseline = block_top - i as f32 * line_h - ascent;
            centered_text(
                layer,
                line,
                fitted.font_size,
                font,
                measure,
                center_x,
                baseline,
            );
        }
    }

    let mut caption = format!("Board {number} of {total} - {}", board.size);
    if board.size.free_space_applies(include_free_space) {
        caption.push_str(" - free centre");
    }
    centered_text(
        layer,
        &caption,
        CAPTION_SIZE,
        &fonts.regular,
        fonts.regular_measure,
        PAGE_W / 2.0,
        grid_bottom - 10.0,
    );
}

fn stroke(layer: &PdfLayerReference, from: (f32, f32), to: (f32, f32)) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(from.0), Mm(from.1)), false),
            (Point::new(Mm(to.0), Mm(to.1)), false),
        ],
        is_closed: false,
    });
}

fn centered_text(
    layer: &PdfLayerReference,
    text: &str,
    size: f32,
    font: &IndirectFontRef,
    measure: &dyn TextMeasure,
    center_x: f32,
    baseline: f32,
) {
    let width = pt_to_mm(measure.text_width(text, size));
    layer.use_text(text, size, Mm(center_x - width / 2.0), Mm(baseline), font);
}

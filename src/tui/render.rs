use std::borrow::Cow;

use super::state::ViewState;
use crate::carousel::color::Rgb;
use crate::carousel::gradient::{GradientFrame, BASE_COLOR};
use crate::carousel::stage::CarouselStage;
use crate::carousel::transform::CardTransform;
use crate::config::AuthorCard;
use crate::content::types::Article;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// Pixels covered by one terminal column / row.
pub const COL_PX: f64 = 10.0;
pub const ROW_PX: f64 = 20.0;

const PANEL_HEIGHT: u16 = 9;
/// Cards are shrunk to fit this share of the carousel area.
const CARD_FIT: f64 = 0.8;

/// Splits the screen into carousel, quote panel and footer.
pub fn split(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(PANEL_HEIGHT),
            Constraint::Length(1),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

/// Pixel layout of the carousel area, with cards scaled down to fit.
pub fn carousel_layout(area: Rect, card_width: f64, card_height: f64) -> crate::carousel::Layout {
    let viewport_width = area.width as f64 * COL_PX;
    let viewport_height = area.height as f64 * ROW_PX;
    let fit = (viewport_height * CARD_FIT / card_height)
        .min(viewport_width * CARD_FIT / card_width)
        .min(1.0)
        .max(0.1);
    crate::carousel::Layout {
        card_width: card_width * fit,
        card_height: card_height * fit,
        viewport_width,
        viewport_height,
    }
}

/// Viewport pixel position of the centre of a cell.
pub fn cell_to_px(area: Rect, column: u16, row: u16) -> (f64, f64) {
    let x = (column.saturating_sub(area.x)) as f64 * COL_PX + COL_PX / 2.0;
    let y = (row.saturating_sub(area.y)) as f64 * ROW_PX + ROW_PX / 2.0;
    (x, y)
}

/// Screen cells covered by a projected card, clipped to `area`.
pub fn card_rect(t: &CardTransform, layout: &crate::carousel::Layout, area: Rect) -> Option<Rect> {
    let w = layout.card_width * t.scale * t.rotate_y_deg.to_radians().cos();
    let h = layout.card_height * t.scale;
    let cx = layout.viewport_width / 2.0 + t.screen_x;
    let cy = layout.viewport_height / 2.0;

    let left = area.x as i32 + ((cx - w / 2.0) / COL_PX).round() as i32;
    let top = area.y as i32 + ((cy - h / 2.0) / ROW_PX).round() as i32;
    let right = left + ((w / COL_PX).round() as i32).max(1);
    let bottom = top + ((h / ROW_PX).round() as i32).max(1);

    let left = left.max(area.x as i32);
    let top = top.max(area.y as i32);
    let right = right.min(area.right() as i32);
    let bottom = bottom.min(area.bottom() as i32);
    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect::new(
        left as u16,
        top as u16,
        (right - left) as u16,
        (bottom - top) as u16,
    ))
}

fn to_color(c: Rgb) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

fn mix(a: Rgb, b: Rgb, t: f64) -> Rgb {
    let ch = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    Rgb::new(ch(a.r, b.r), ch(a.g, b.g), ch(a.b, b.b))
}

fn text_on(bg: Rgb) -> Color {
    let luma = 0.299 * bg.r as f64 + 0.587 * bg.g as f64 + 0.114 * bg.b as f64;
    if luma > 150.0 {
        Color::Black
    } else {
        Color::White
    }
}

pub fn draw(
    f: &mut Frame,
    state: &ViewState,
    stage: &CarouselStage,
    gradient: Option<&GradientFrame>,
    reveal: Option<&[usize]>,
) {
    let [carousel_area, panel_area, footer_area] = split(f.area());

    paint_background(f.buffer_mut(), carousel_area, gradient);
    draw_cards(f, stage, carousel_area, reveal);
    draw_panel(f, state, panel_area);
    draw_footer(f, state, footer_area);

    if state.show_article {
        if let Some(article) = &state.content.article {
            draw_article(f, article, state.article_scroll, centered(f.area(), 80, 80));
        }
    }
    if let Some(author) = &state.selected_author {
        draw_author(f, author, centered(f.area(), 60, 60));
    }
}

fn paint_background(buf: &mut Buffer, area: Rect, gradient: Option<&GradientFrame>) {
    for row in area.top()..area.bottom() {
        for column in area.left()..area.right() {
            let color = match gradient {
                Some(frame) => {
                    let (x, y) = cell_to_px(area, column, row);
                    frame.sample(x, y)
                }
                None => BASE_COLOR,
            };
            if let Some(cell) = buf.cell_mut((column, row)) {
                cell.set_symbol(" ");
                cell.set_bg(to_color(color));
            }
        }
    }
}

fn draw_cards(f: &mut Frame, stage: &CarouselStage, area: Rect, reveal: Option<&[usize]>) {
    let carousel = stage.carousel();
    let Some(layout) = carousel.layout() else {
        return;
    };
    let active = carousel.active_index();

    let mut order: Vec<(usize, &CardTransform)> = carousel
        .transforms()
        .iter()
        .enumerate()
        .filter(|(_, t)| t.visible)
        .filter(|(i, _)| reveal.map_or(true, |shown| shown.contains(i)))
        .collect();
    order.sort_by_key(|(_, t)| t.z_index);

    for (index, t) in order {
        let Some(rect) = card_rect(t, &layout, area) else {
            continue;
        };
        let palette = stage.palette(index).unwrap_or(crate::carousel::color::fallback_palette(index));
        // blurred cards wash out toward the base colour
        let haze = (t.blur / 2.0 * 0.45).clamp(0.0, 0.45);
        let fill = mix(palette.primary, BASE_COLOR, haze);
        let edge = mix(palette.secondary, BASE_COLOR, haze);

        let is_active = active == Some(index);
        let mut border_style = Style::default().fg(to_color(edge)).bg(to_color(fill));
        if is_active {
            border_style = border_style.add_modifier(Modifier::BOLD);
        }
        let mut text_style = Style::default().fg(text_on(fill)).bg(to_color(fill));
        if t.blur > 0.0 {
            text_style = text_style.add_modifier(Modifier::DIM);
        }

        let author = stage.author(index);
        let name = author.map(|a| a.name.as_str()).unwrap_or("");
        let title_width = rect.width.saturating_sub(2) as usize;

        let mut lines = Vec::new();
        if let Some(a) = author {
            if let Some(domain) = &a.domain {
                lines.push(Line::from(domain.clone()));
            }
            let span = match (&a.birth, &a.death) {
                (Some(b), Some(d)) => Some(format!("{} - {}", b, d)),
                (Some(b), None) => Some(format!("b. {}", b)),
                _ => None,
            };
            if let Some(span) = span {
                lines.push(Line::from(span));
            }
        }
        if stage.image_broken(index) {
            lines.push(Line::from(Span::styled(
                "no portrait",
                Style::default().add_modifier(Modifier::ITALIC),
            )));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(truncate_with_ellipsis(name, title_width).into_owned())
            .title_alignment(Alignment::Center)
            .style(text_style);

        f.render_widget(Clear, rect);
        f.render_widget(
            Paragraph::new(lines)
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            rect,
        );
    }
}

fn draw_panel(f: &mut Frame, state: &ViewState, area: Rect) {
    let content = &state.content;
    let width = area.width.saturating_sub(4) as usize;
    let mut lines: Vec<Line> = Vec::new();

    match &content.quote {
        Some(daily) => {
            lines.push(Line::from(Span::styled(
                format!("\"{}\"", daily.quote.text),
                Style::default().add_modifier(Modifier::ITALIC),
            )));
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  - {}", daily.quote.author),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  [{}]", daily.quote.category_or_default()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
        }
        None if content.is_loading => {
            lines.push(Line::from(Span::styled(
                "Loading today's quote...",
                Style::default().fg(Color::DarkGray),
            )));
        }
        None => {}
    }

    if let Some(err) = &content.error {
        lines.push(Line::from(Span::styled(
            truncate_with_ellipsis(err, width).into_owned(),
            Style::default().fg(Color::Red),
        )));
    }

    lines.push(Line::from(""));
    if content.is_generating {
        lines.push(Line::from(Span::styled(
            "Writing today's article...",
            Style::default().fg(Color::Yellow),
        )));
    } else if let Some(article) = &content.article {
        lines.push(Line::from(Span::styled(
            truncate_with_ellipsis(&article.title, width).into_owned(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(truncate_with_ellipsis(&article.excerpt, width).into_owned()));
        let source = content.article_source.map(|s| s.as_str()).unwrap_or("");
        lines.push(Line::from(Span::styled(
            format!("{} read · {} · press a to open", article.read_time, source),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let title = format!(" Quote of the Day · {} ", content.current_date.format("%B %-d, %Y"));
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(f: &mut Frame, state: &ViewState, area: Rect) {
    let help = " ←/→ browse · drag/scroll spin · click card · a article · q quit ";
    let mut spans = vec![Span::styled(help, Style::default().fg(Color::DarkGray))];
    if let Some(last) = state.logs.back() {
        let color = match last.level.as_str() {
            "ERROR" => Color::Red,
            "WARN" => Color::Yellow,
            _ => Color::DarkGray,
        };
        let room = (area.width as usize).saturating_sub(help.chars().count() + 12);
        spans.push(Span::styled(
            format!(" {} {}", last.time, truncate_with_ellipsis(&last.message, room)),
            Style::default().fg(color),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn article_lines(article: &Article) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![
        Line::from(Span::styled(article.title.clone(), bold)),
        Line::from(Span::styled(
            format!("{} · {} · {}", article.author, article.category, article.read_time),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("\"{}\"", article.quote_text),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        Line::from(""),
        Line::from(article.content.intro.clone()),
        Line::from(""),
        Line::from(Span::styled("Context", bold)),
        Line::from(article.content.context.clone()),
        Line::from(""),
        Line::from(Span::styled("Key ideas", bold)),
    ];
    for (i, point) in article.content.points.iter().enumerate() {
        lines.push(Line::from(format!("{}. {}", i + 1, point)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Try this", bold)));
    lines.push(Line::from(article.content.exercise.clone()));
    lines.push(Line::from(""));
    lines.push(Line::from(article.content.conclusion.clone()));
    lines
}

fn draw_article(f: &mut Frame, article: &Article, scroll: u16, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Article (↑/↓ scroll, Esc close) ");
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(article_lines(article))
            .block(block)
            .wrap(Wrap { trim: true })
            .scroll((scroll, 0)),
        area,
    );
}

fn draw_author(f: &mut Frame, author: &AuthorCard, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    let fields = [
        ("Born", &author.birth),
        ("Died", &author.death),
        ("Nationality", &author.nationality),
        ("Domain", &author.domain),
        ("Known for", &author.known_for),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<12}", name), label),
                Span::raw(value.clone()),
            ]));
        }
    }
    if let Some(bio) = &author.bio {
        lines.push(Line::from(""));
        lines.push(Line::from(bio.clone()));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", author.name))
        .title_bottom(" Esc close ");
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let w = (area.width as u32 * percent_x as u32 / 100) as u16;
    let h = (area.height as u32 * percent_y as u32 / 100) as u16;
    Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - h) / 2,
        w,
        h,
    )
}

fn truncate_with_ellipsis(s: &str, max_width: usize) -> Cow<'_, str> {
    let char_count = s.chars().count();
    if char_count <= max_width {
        Cow::Borrowed(s)
    } else if max_width <= 3 {
        Cow::Owned(".".repeat(max_width))
    } else {
        let end = s
            .char_indices()
            .nth(max_width - 3)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        Cow::Owned(format!("{}...", &s[..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carousel::transform::{project, Projection};
    use crate::config::CarouselConfig;

    fn area() -> Rect {
        Rect::new(0, 0, 120, 40)
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate_with_ellipsis("hello world", 8), "hello...");
        assert_eq!(truncate_with_ellipsis("hello", 5), "hello");
        assert_eq!(truncate_with_ellipsis("hello", 2), "..");
    }

    #[test]
    fn test_layout_fits_cards_to_area() {
        let l = carousel_layout(area(), 350.0, 450.0);
        assert_eq!(l.viewport_width, 1200.0);
        assert_eq!(l.viewport_height, 800.0);
        // 800 * 0.8 = 640 px available, card fits unscaled
        assert_eq!(l.card_height, 450.0);

        let small = carousel_layout(Rect::new(0, 0, 60, 10), 350.0, 450.0);
        assert!((small.card_height - 160.0).abs() < 1e-9);
        assert!((small.card_width / small.card_height - 350.0 / 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_centre_card_rect_is_centred() {
        let l = carousel_layout(area(), 350.0, 450.0);
        let p = Projection::from(&CarouselConfig::default());
        let t = project(0.0, l.viewport_width / 2.0, &p);
        let r = card_rect(&t, &l, area()).unwrap();
        let mid = r.x as f64 + r.width as f64 / 2.0;
        assert!((mid - 60.0).abs() <= 1.0, "rect {:?}", r);
        assert!(r.height >= 20);
    }

    #[test]
    fn test_offscreen_card_has_no_rect() {
        let l = carousel_layout(area(), 350.0, 450.0);
        let p = Projection::from(&CarouselConfig::default());
        let t = project(2000.0, l.viewport_width / 2.0, &p);
        assert!(card_rect(&t, &l, area()).is_none());
    }

    #[test]
    fn test_cell_to_px_uses_cell_centre() {
        let a = Rect::new(2, 1, 10, 10);
        assert_eq!(cell_to_px(a, 2, 1), (5.0, 10.0));
        assert_eq!(cell_to_px(a, 4, 3), (25.0, 50.0));
    }

    #[test]
    fn test_text_contrast() {
        assert_eq!(text_on(Rgb::new(250, 250, 250)), Color::Black);
        assert_eq!(text_on(Rgb::new(20, 20, 80)), Color::White);
    }
}

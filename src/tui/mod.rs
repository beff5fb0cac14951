pub mod render;
pub mod state;

use crate::carousel::gradient::GradientFrame;
use crate::carousel::stage::CarouselStage;
use crate::carousel::Direction;
use crate::content::ContentState;
use anyhow::Result;
use crossterm::{
    event::{
        DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
        EventStream, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use futures_util::StreamExt;
use ratatui::prelude::*;
use state::ViewState;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::watch;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// Delay between cards appearing during the entry animation.
const ENTRY_STAGGER_MS: f64 = 90.0;
/// Pixel delta fed to the physics per wheel notch.
const WHEEL_NOTCH_PX: f64 = 100.0;

/// Card size in unscaled pixels; the viewer shrinks cards to fit the terminal.
#[derive(Debug, Clone, Copy)]
pub struct CardSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Run the viewer until the user quits. Reads content from `content_rx`.
pub async fn run_viewer(
    stage: &mut CarouselStage,
    card: CardSize,
    content_rx: watch::Receiver<ContentState>,
) -> Result<()> {
    enable_raw_mode()?;
    stdout()
        .execute(EnterAlternateScreen)?
        .execute(EnableMouseCapture)?
        .execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = viewer_loop(&mut terminal, stage, card, content_rx).await;

    stage.dispose();
    disable_raw_mode()?;
    stdout()
        .execute(DisableFocusChange)?
        .execute(DisableMouseCapture)?
        .execute(LeaveAlternateScreen)?;

    result
}

struct Viewer {
    started: Instant,
    card: CardSize,
    carousel_area: Rect,
    entry: Option<(f64, Vec<usize>)>,
    gradient: Option<GradientFrame>,
}

impl Viewer {
    fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn layout(&self) -> crate::carousel::Layout {
        render::carousel_layout(self.carousel_area, self.card.width, self.card.height)
    }

    /// Cards revealed so far while entering, or `None` once the entry is over.
    fn reveal(&self, now_ms: f64) -> Option<&[usize]> {
        let (started, cards) = self.entry.as_ref()?;
        let shown = (((now_ms - started) / ENTRY_STAGGER_MS) as usize + 1).min(cards.len());
        Some(&cards[..shown])
    }

    fn advance_entry(&mut self, stage: &mut CarouselStage, now_ms: f64) {
        let Some((started, cards)) = &self.entry else {
            return;
        };
        if now_ms - started >= ENTRY_STAGGER_MS * cards.len() as f64 {
            self.entry = None;
            stage.carousel_mut().finish_entry();
        }
    }
}

async fn viewer_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    stage: &mut CarouselStage,
    card: CardSize,
    mut content_rx: watch::Receiver<ContentState>,
) -> Result<()> {
    let size = terminal.size()?;
    let [carousel_area, _, _] = render::split(Rect::new(0, 0, size.width, size.height));
    let mut viewer = Viewer {
        started: Instant::now(),
        card,
        carousel_area,
        entry: None,
        gradient: None,
    };

    stage.init(viewer.layout(), viewer.now_ms()).await;
    viewer.entry = Some((viewer.now_ms(), stage.carousel().entry_cards()));

    let mut state = ViewState::new(content_rx.borrow_and_update().clone());
    let mut events = EventStream::new();
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut content_open = true;

    loop {
        let mut dirty = false;
        tokio::select! {
            _ = frames.tick() => {
                let now = viewer.now_ms();
                viewer.advance_entry(stage, now);
                let moving = !stage.carousel().is_at_rest() || viewer.entry.is_some();
                stage.tick(now);
                let l = viewer.layout();
                if let Some(frame) = stage.background_frame(now, l.viewport_width, l.viewport_height) {
                    viewer.gradient = Some(frame);
                    dirty = true;
                }
                dirty |= moving;
            }
            changed = content_rx.changed(), if content_open => {
                if changed.is_err() {
                    content_open = false;
                } else {
                    state.update_content(content_rx.borrow_and_update().clone());
                    dirty = true;
                }
            }
            event = events.next() => {
                match event {
                    Some(Ok(event)) => {
                        if handle_event(event, &mut viewer, stage, &mut state) == Flow::Quit {
                            return Ok(());
                        }
                        dirty = true;
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }
        }

        if dirty {
            let now = viewer.now_ms();
            let reveal = viewer.reveal(now);
            terminal.draw(|f| render::draw(f, &state, &*stage, viewer.gradient.as_ref(), reveal))?;
        }
    }
}

fn handle_event(
    event: Event,
    viewer: &mut Viewer,
    stage: &mut CarouselStage,
    state: &mut ViewState,
) -> Flow {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            match key.code {
                KeyCode::Char('q') => return Flow::Quit,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Flow::Quit
                }
                KeyCode::Esc => {
                    state.close_overlay();
                }
                KeyCode::Char('a') => state.toggle_article(),
                KeyCode::Up if state.show_article => state.scroll_article(-1),
                KeyCode::Down if state.show_article => state.scroll_article(1),
                KeyCode::Left | KeyCode::Char('h') => {
                    stage.navigate(Direction::Prev);
                }
                KeyCode::Right | KeyCode::Char('l') => {
                    stage.navigate(Direction::Next);
                }
                _ => {}
            }
        }
        Event::Mouse(mouse) => handle_mouse(mouse, viewer, stage, state),
        Event::FocusLost => {
            tracing::debug!("viewer hidden, pausing frame loops");
            stage.set_visible(false);
        }
        Event::FocusGained => {
            stage.set_visible(true);
        }
        Event::Resize(width, height) => {
            let [carousel_area, _, _] = render::split(Rect::new(0, 0, width, height));
            viewer.carousel_area = carousel_area;
            let layout = viewer.layout();
            stage.carousel_mut().resize(layout);
        }
        _ => {}
    }
    Flow::Continue
}

fn handle_mouse(
    mouse: MouseEvent,
    viewer: &mut Viewer,
    stage: &mut CarouselStage,
    state: &mut ViewState,
) {
    let area = viewer.carousel_area;
    let (x, y) = render::cell_to_px(area, mouse.column, mouse.row);
    let now = viewer.now_ms();
    let carousel = stage.carousel_mut();

    match mouse.kind {
        MouseEventKind::ScrollDown => carousel.wheel(0.0, WHEEL_NOTCH_PX),
        MouseEventKind::ScrollUp => carousel.wheel(0.0, -WHEEL_NOTCH_PX),
        MouseEventKind::ScrollRight => carousel.wheel(WHEEL_NOTCH_PX, 0.0),
        MouseEventKind::ScrollLeft => carousel.wheel(-WHEEL_NOTCH_PX, 0.0),
        MouseEventKind::Down(MouseButton::Left) => {
            let inside = mouse.row >= area.top() && mouse.row < area.bottom();
            if inside && state.selected_author.is_none() {
                carousel.pointer_down(x, now);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => carousel.pointer_move(x, now),
        MouseEventKind::Up(MouseButton::Left) => {
            if let Some(author) = stage.pointer_up(x, y).cloned() {
                state.open_author(author);
            }
        }
        _ => {}
    }
}

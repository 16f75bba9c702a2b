use tuirealm::Frame;
use tuirealm::ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};

use crate::drag::ContainerLayout;
use crate::input::CELL_HEIGHT_PX;
use crate::notification::NoticeLevel;
use crate::ordering::ColumnMap;
use crate::types::Task;

use super::pane::{Pane, PaneAdapter, is_visible, px_to_cells};
use super::state::{AppState, ViewMode};

const HELP_HINT: &str = "n: new  e: rename  d: delete  Space: lift/drop  arrows: move  v: view  [/]: range  r: reload  q: quit";

/// Screen regions shared by both views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenAreas {
    pub header: Rect,
    pub board: Rect,
    /// Day cells with the unscheduled tray along the bottom.
    pub timeline: Rect,
    pub footer: Rect,
}

impl ScreenAreas {
    pub fn new(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        Self {
            header: chunks[0],
            board: chunks[1],
            timeline: chunks[1],
            footer: chunks[2],
        }
    }
}

pub fn render(frame: &mut Frame<'_>, state: &mut AppState, model: &ColumnMap) {
    let areas = ScreenAreas::new(frame.area());
    state.relayout(areas.board, areas.timeline, model);

    render_header(frame, areas.header, state, model);
    match state.mode {
        ViewMode::Board => render_pane(frame, areas.board, &state.board, model),
        ViewMode::Timeline => {
            // The tray goes first so a card dragged out of it floats above it.
            render_unscheduled(frame, state, model);
            render_pane(frame, areas.timeline, &state.timeline, model);
        }
    }
    render_footer(frame, areas.footer, state);
}

fn render_header(frame: &mut Frame<'_>, area: Rect, state: &AppState, model: &ColumnMap) {
    let header = Block::default()
        .borders(Borders::TOP | Borders::LEFT | Borders::RIGHT)
        .title(" taskboard ")
        .title_alignment(Alignment::Left);

    let info = match state.mode {
        ViewMode::Board => format!(" {} tasks - board ", model.total()),
        ViewMode::Timeline => {
            let adapter = state.timeline.adapter();
            format!(
                " {} tasks - timeline {} to {} ",
                model.total(),
                adapter.first_day.format("%d %b"),
                adapter.last_day().format("%d %b")
            )
        }
    };
    let header_right = Block::default()
        .title(info)
        .title_alignment(Alignment::Right);

    frame.render_widget(header, area);
    frame.render_widget(header_right, area);
}

fn render_footer(frame: &mut Frame<'_>, area: Rect, state: &AppState) {
    let line = if let Some(prompt) = &state.prompt {
        match prompt.input() {
            Some(input) => Line::styled(
                format!(" {}: {input}_ ", prompt.label()),
                Style::default().fg(Color::Yellow),
            ),
            None => Line::styled(
                format!(" {} ", prompt.label()),
                Style::default().fg(Color::Red),
            ),
        }
    } else if let Some(notice) = &state.notice {
        let color = match notice.level {
            NoticeLevel::Error => Color::Red,
            NoticeLevel::Info => Color::Green,
        };
        Line::styled(format!(" {} ", notice.message), Style::default().fg(color))
    } else if let Some(announcement) = &state.announcement {
        Line::from(format!(" {announcement} "))
    } else {
        Line::from(format!(" {HELP_HINT} "))
    };

    let footer = Block::default()
        .borders(Borders::BOTTOM | Borders::LEFT | Borders::RIGHT)
        .title(line)
        .title_alignment(Alignment::Center);
    frame.render_widget(footer, area);
}

fn render_pane<A: PaneAdapter>(
    frame: &mut Frame<'_>,
    area: Rect,
    pane: &Pane<A>,
    model: &ColumnMap,
) {
    if pane.layout.containers.is_empty() {
        let needed = (pane.adapter().containers().len() as u16)
            .saturating_mul(pane.adapter().min_container_width());
        let msg = Paragraph::new(format!(
            "Terminal too narrow. Increase width to at least {needed} cells."
        ))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .title(" Resize Needed "),
        );
        frame.render_widget(msg, area);
        return;
    }

    let focused_container = pane
        .focused
        .and_then(|task_id| pane.adapter().position_of(model, task_id))
        .map(|(container, _)| container);

    for container in &pane.layout.containers {
        let Some(chunk) = px_to_cells(container.bounds, area) else {
            continue;
        };
        let is_focused = focused_container == Some(container.id);
        let is_candidate = pane.controller.candidate_container() == Some(&container.id);

        let border_type = if is_focused {
            BorderType::Double
        } else {
            BorderType::Plain
        };
        let border_style = if is_candidate {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let title = format!(
            " {} ({}) ",
            pane.adapter().describe(&container.id),
            container.items.len()
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(border_type)
            .border_style(border_style)
            .title(title)
            .title_alignment(Alignment::Center);
        frame.render_widget(block, chunk);

        for item in &container.items {
            if !is_visible(item.bounds, container.viewport) {
                continue;
            }
            let (Some(task), Some(rect)) =
                (model.task(item.task_id), px_to_cells(item.bounds, area))
            else {
                continue;
            };
            let card = CardState {
                focused: pane.focused == Some(task.id),
                dragged: pane.controller.dragged_task() == Some(task.id),
                lifted: pane.controller.lifted_task() == Some(task.id),
            };
            render_card(frame, rect, task, card, pane.adapter().card_shows_column());
        }

        if container.items.is_empty()
            && pane.controller.placeholder().is_none()
            && let Some(inner) = px_to_cells(container.viewport, area)
        {
            frame.render_widget(
                Paragraph::new("No tasks")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::DarkGray)),
                inner,
            );
        }

        render_placeholder(frame, area, pane, container);
    }

    if let (Some(proxy), Some(task)) = (
        pane.controller.proxy(),
        pane.controller
            .dragged_task()
            .and_then(|task_id| model.task(task_id)),
    ) && let Some(rect) = px_to_cells(proxy.bounds, frame.area())
    {
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(vec![
                Line::from(format!(" {}", task.title)),
                Line::from(format!("   {}", task.column_id.label())),
            ])
            .style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            rect,
        );
    }
}

#[derive(Debug, Clone, Copy)]
struct CardState {
    focused: bool,
    dragged: bool,
    lifted: bool,
}

fn render_card(
    frame: &mut Frame<'_>,
    area: Rect,
    task: &Task,
    card: CardState,
    show_column: bool,
) {
    let prefix = if card.lifted {
        "⇅"
    } else if card.focused {
        "▸"
    } else {
        " "
    };
    let mut style = Style::default().bg(if card.focused {
        Color::DarkGray
    } else {
        Color::Reset
    });
    if card.dragged {
        style = style.fg(Color::DarkGray);
    }
    if card.lifted {
        style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
    }

    let line1 = Line::from(vec![
        Span::styled(prefix, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::raw(task.title.as_str()),
    ]);
    let line2 = Line::from(vec![
        Span::raw("   "),
        Span::styled(
            card_details(task, show_column),
            Style::default().fg(Color::Gray),
        ),
    ]);
    frame.render_widget(Paragraph::new(vec![line1, line2]).style(style), area);

    if area.width > 2 && !card.dragged {
        let control = Rect::new(area.right() - 1, area.y, 1, 1);
        frame.render_widget(
            Paragraph::new("×").style(Style::default().fg(Color::Red)),
            control,
        );
    }
}

fn card_details(task: &Task, show_column: bool) -> String {
    let mut parts = Vec::new();
    if show_column {
        parts.push(task.column_id.label().to_string());
    }
    if let Some(context) = task.context {
        parts.push(context.as_str().to_string());
    }
    match (task.start_date, task.due_date) {
        (Some(start), Some(due)) => {
            parts.push(format!("{} → {}", start.format("%d/%m"), due.format("%d/%m")))
        }
        (None, Some(due)) => parts.push(format!("due {}", due.format("%d/%m"))),
        (Some(start), None) => parts.push(format!("from {}", start.format("%d/%m"))),
        (None, None) => {}
    }
    parts.join(" · ")
}

/// One-row marker in the gap where the dragged card would land.
fn render_placeholder<A: PaneAdapter>(
    frame: &mut Frame<'_>,
    area: Rect,
    pane: &Pane<A>,
    container: &ContainerLayout<A::Container>,
) {
    let Some(placeholder) = pane.controller.placeholder() else {
        return;
    };
    if placeholder.container != container.id {
        return;
    }

    let dragged = pane.controller.dragged_task();
    let others: Vec<_> = container
        .items
        .iter()
        .filter(|item| Some(item.task_id) != dragged)
        .collect();
    let top = match others.get(placeholder.index) {
        Some(item) => item.bounds.y - CELL_HEIGHT_PX,
        None => others
            .last()
            .map(|item| item.bounds.bottom())
            .unwrap_or(container.viewport.y),
    };
    // The row above the first card is the container border.
    if top < container.viewport.y - CELL_HEIGHT_PX || top >= container.viewport.bottom() {
        return;
    }

    let marker = crate::geometry::Rect::new(
        container.viewport.x,
        top,
        container.viewport.width,
        CELL_HEIGHT_PX,
    );
    if let Some(rect) = px_to_cells(marker, area) {
        frame.render_widget(
            Paragraph::new("┄┄ drop here ┄┄")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Yellow)),
            rect,
        );
    }
}

fn render_unscheduled(frame: &mut Frame<'_>, state: &AppState, model: &ColumnMap) {
    let pane = &state.timeline;
    let area = pane.source_area();
    if area.height == 0 {
        return;
    }
    let total = pane.adapter().unscheduled(model).len();
    let shown = pane.layout.sources.len();
    let title = if shown < total {
        format!(" Unscheduled ({total}, {} more) - drag onto a day ", total - shown)
    } else {
        format!(" Unscheduled ({total}) - drag onto a day ")
    };
    frame.render_widget(Block::default().borders(Borders::ALL).title(title), area);

    let dragged = pane.controller.dragged_task();
    for item in &pane.layout.sources {
        let (Some(task), Some(rect)) = (model.task(item.task_id), px_to_cells(item.bounds, area))
        else {
            continue;
        };
        let style = if dragged == Some(task.id) {
            Style::default().fg(Color::DarkGray)
        } else if pane.focused == Some(task.id) {
            Style::default().fg(Color::Gray).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Gray)
        };
        frame.render_widget(Paragraph::new(format!("▪ {}", task.title)).style(style), rect);
    }
}

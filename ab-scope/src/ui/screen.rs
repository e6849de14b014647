use std::{collections::VecDeque, fmt::Write};

use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

use crate::{
    model::agg::SecondAggregate,
    ui::markup::Markup,
};

/// Seconds kept for the scrolling table; the visible part depends on height.
const HISTORY_CAPACITY: usize = 120;
/// Narrowest aggregate column that still fits the table.
const MIN_BLOCK_WIDTH: usize = 40;
const TITLE: &str = " ab-scope ";
const SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("terminal is {width} columns wide, at least {required} are needed")]
    TooNarrow { width: usize, required: usize },
    #[error("formatting failed")]
    Format(#[from] std::fmt::Error),
}

/// One panel of dashboard text contributed by a plugin.
pub trait InfoWidget {
    /// Lower values render first.
    fn priority(&self) -> i32;

    /// Renders the panel. It must fit `screen.right_panel_width()` columns.
    fn render(&self, screen: &Screen) -> String;

    /// Called with every aggregate the screen receives.
    fn on_second(&mut self, _aggregate: &SecondAggregate) {}
}

/// Anything that accepts info widgets.
pub trait Dashboard {
    fn add_info_widget(&mut self, widget: Box<dyn InfoWidget>);
}

/// Composes the console frame: banner, a table of recent seconds on the left,
/// widget panels on the right and a summary of the latest second below.
pub struct Screen {
    markup: Markup,
    info_panel_width: usize,
    width: usize,
    height: usize,
    show_aggregates: bool,
    history: VecDeque<SecondAggregate>,
    widgets: Vec<Box<dyn InfoWidget>>,
}

impl Screen {
    pub fn new(info_panel_width: usize, markup: Markup) -> Self {
        Self {
            markup,
            info_panel_width,
            width: 80,
            height: 24,
            show_aggregates: true,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            widgets: Vec::new(),
        }
    }

    pub fn markup(&self) -> &Markup {
        &self.markup
    }

    pub fn set_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    /// Without an aggregator there is nothing for the table; widgets get the
    /// whole width.
    pub fn hide_aggregates(&mut self) {
        self.show_aggregates = false;
    }

    pub fn right_panel_width(&self) -> usize {
        if self.show_aggregates {
            self.info_panel_width
        } else {
            self.width
        }
    }

    pub fn add_second_data(&mut self, aggregate: &SecondAggregate) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(aggregate.clone());
        for widget in &mut self.widgets {
            widget.on_second(aggregate);
        }
    }

    pub fn add_info_widget(&mut self, widget: Box<dyn InfoWidget>) {
        self.widgets.push(widget);
        // stable: equal priorities keep registration order
        self.widgets.sort_by_key(|w| w.priority());
    }

    pub fn render_screen(&self) -> Result<String, RenderError> {
        let m = &self.markup;
        let right_width = self.right_panel_width();
        let left_width = if self.show_aggregates {
            let required = right_width + SEPARATOR.len() + MIN_BLOCK_WIDTH;
            if self.width < required {
                return Err(RenderError::TooNarrow {
                    width: self.width,
                    required,
                });
            }
            self.width - right_width - SEPARATOR.len()
        } else {
            0
        };

        let mut out = String::new();
        write!(out, "{}{}{}", m.bg_green, banner(self.width), m.reset)?;
        out.push_str(m.new_line);

        let right = self.widget_lines();
        let left = if self.show_aggregates {
            let rows = self.height.saturating_sub(6).max(1);
            self.aggregate_lines(left_width, rows)?
        } else {
            Vec::new()
        };

        let body_rows = left.len().max(right.len());
        for i in 0..body_rows {
            let right_line = right.get(i).map(String::as_str).unwrap_or("");
            if self.show_aggregates {
                let left_line = left.get(i).map(String::as_str).unwrap_or("");
                out.push_str(&pad(left_line, left_width));
                out.push_str(SEPARATOR);
            }
            out.push_str(right_line);
            out.push_str(m.new_line);
        }

        if self.show_aggregates {
            out.push_str(m.new_line);
            self.write_last_second(&mut out)?;
        }
        Ok(out)
    }

    fn widget_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (i, widget) in self.widgets.iter().enumerate() {
            if i > 0 {
                lines.push(String::new());
            }
            lines.extend(widget.render(self).lines().map(str::to_string));
        }
        lines
    }

    fn aggregate_lines(&self, width: usize, rows: usize) -> Result<Vec<String>, RenderError> {
        let m = &self.markup;
        let mut lines = Vec::with_capacity(rows + 1);

        let header = format!(
            "{:<8} {:>6} {:>5} {:>8} {:>6} {:>6} {:>6}",
            "Time", "RPS", "Thr", "Avg RT", "50%", "95%", "100%"
        );
        lines.push(format!("{}{}{}", m.white, truncate(&header, width), m.reset));

        if self.history.is_empty() {
            lines.push(truncate("Waiting for data...", width));
            return Ok(lines);
        }

        let skip = self.history.len().saturating_sub(rows);
        for agg in self.history.iter().skip(skip) {
            let o = &agg.overall;
            let mut row = String::new();
            write!(
                row,
                "{:<8} {:>6} {:>5} {:>8.1} {:>6} {:>6} {:>6}",
                clock(agg.time),
                o.rps,
                o.active_threads,
                o.avg_response_time,
                quantile_cell(agg, 50),
                quantile_cell(agg, 95),
                quantile_cell(agg, 100),
            )?;
            lines.push(format!("{}{}{}", m.cyan, truncate(&row, width), m.reset));
        }
        Ok(lines)
    }

    fn write_last_second(&self, out: &mut String) -> Result<(), RenderError> {
        let m = &self.markup;
        let Some(last) = self.history.back() else {
            write!(out, "{}Last second: no data yet{}", m.yellow, m.reset)?;
            out.push_str(m.new_line);
            return Ok(());
        };

        let o = &last.overall;
        write!(
            out,
            "{}Last second {}:{} {} req, planned {}, threads {}",
            m.yellow,
            clock(last.time),
            m.reset,
            o.rps,
            o.planned_requests,
            o.active_threads
        )?;
        out.push_str(m.new_line);
        write!(
            out,
            "  avg {:.1}  connect {:.1}  latency {:.1}  receive {:.1}  min {}  max {}",
            o.avg_response_time,
            o.avg_connect_time,
            o.avg_latency,
            o.avg_receive_time,
            o.min_response_time,
            o.max_response_time
        )?;
        out.push_str(m.new_line);
        Ok(())
    }
}

impl Dashboard for Screen {
    fn add_info_widget(&mut self, widget: Box<dyn InfoWidget>) {
        Screen::add_info_widget(self, widget);
    }
}

fn banner(width: usize) -> String {
    let fill = width.saturating_sub(TITLE.len());
    let left = fill / 2;
    format!("{}{}{}", "~".repeat(left), TITLE, "~".repeat(fill - left))
}

fn clock(unix_second: i64) -> String {
    let format = format_description!("[hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp(unix_second)
        .ok()
        .and_then(|t| t.format(&format).ok())
        .unwrap_or_else(|| unix_second.to_string())
}

fn quantile_cell(agg: &SecondAggregate, level: u8) -> String {
    agg.overall
        .quantile(level)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Pads to `width` visible columns; decoration does not count.
fn pad(text: &str, width: usize) -> String {
    let visible = Markup::visible_width(text);
    format!("{text}{}", " ".repeat(width.saturating_sub(visible)))
}

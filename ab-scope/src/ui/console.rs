use std::io::{self, Write};

use crossterm::{QueueableCommand, style::Print, terminal};
use tracing::{debug, info, warn};

use crate::{
    agg::ResultListener,
    model::{agg::SecondAggregate, config::ConsoleOptions},
    ui::{
        markup::Markup,
        mirror::ConsoleMirror,
        screen::{Dashboard, InfoWidget, RenderError, Screen},
    },
};

/// Returned by [`ConsoleDriver::tick`]; the console never ends a test.
pub const NOT_FINISHED: i32 = -1;

const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Draws the dashboard once per poll cycle.
pub struct ConsoleDriver {
    short_only: bool,
    markup: Markup,
    screen: Screen,
    follow_terminal_size: bool,
    out: Box<dyn Write>,
    mirror: Option<Box<dyn ConsoleMirror>>,
    render_error: Option<RenderError>,
    /// Whether the previous tick failed to render.
    failing: bool,
}

impl ConsoleDriver {
    /// Console writing to stdout; colors only when stdout is a terminal.
    pub fn new(options: &ConsoleOptions, is_tty: bool) -> Self {
        Self::with_output(options, is_tty, Box::new(io::stdout()))
    }

    pub fn with_output(options: &ConsoleOptions, is_tty: bool, out: Box<dyn Write>) -> Self {
        let markup = Markup::for_terminal(is_tty, options.disable_all_colors)
            .without(&options.disable_colors);
        Self {
            short_only: options.short_only,
            markup,
            screen: Screen::new(options.info_panel_width, markup),
            follow_terminal_size: is_tty,
            out,
            mirror: None,
            render_error: None,
            failing: false,
        }
    }

    pub fn set_mirror(&mut self, mirror: Box<dyn ConsoleMirror>) {
        self.mirror = Some(mirror);
    }

    /// Fixes the frame size instead of following the terminal.
    pub fn set_size(&mut self, width: usize, height: usize) {
        self.follow_terminal_size = false;
        self.screen.set_size(width, height);
    }

    /// Called when no aggregator feeds this console.
    pub fn without_aggregates(&mut self) {
        debug!("No aggregator for console");
        self.screen.hide_aggregates();
    }

    pub fn markup(&self) -> &Markup {
        &self.markup
    }

    /// The error of the most recent failed render, kept for inspection.
    pub fn last_render_error(&self) -> Option<&RenderError> {
        self.render_error.as_ref()
    }

    pub fn tick(&mut self) -> i32 {
        if self.short_only && self.mirror.is_none() {
            return NOT_FINISHED;
        }

        if self.follow_terminal_size {
            let (w, h) = terminal::size().unwrap_or(FALLBACK_SIZE);
            self.screen.set_size(usize::from(w), usize::from(h));
        }

        let frame = match self.screen.render_screen() {
            Ok(frame) => {
                if self.failing {
                    info!("Console renders again");
                    self.failing = false;
                }
                frame
            }
            Err(e) => {
                self.record_render_error(e);
                String::new()
            }
        };
        if frame.is_empty() {
            return NOT_FINISHED;
        }

        if !self.short_only
            && let Err(e) = self.write_frame(&frame)
        {
            warn!("writing console frame failed: {e}");
        }

        if let Some(mirror) = self.mirror.as_mut()
            && let Err(e) = mirror.send_console(&Markup::strip(&frame))
        {
            warn!("console mirror failed: {e}");
        }

        NOT_FINISHED
    }

    /// Keeps the error and logs it unless the previous tick failed the same
    /// way. Returns whether it was logged.
    fn record_render_error(&mut self, e: RenderError) -> bool {
        let repeated = self.failing && self.render_error.as_ref() == Some(&e);
        if !repeated {
            warn!("Exception inside render: {e}");
        }
        self.render_error = Some(e);
        self.failing = true;
        !repeated
    }

    fn write_frame(&mut self, frame: &str) -> io::Result<()> {
        self.out
            .queue(Print(self.markup.clear))?
            .queue(Print(frame))?
            .queue(Print(self.markup.total_reset))?;
        self.out.flush()
    }
}

impl ResultListener for ConsoleDriver {
    fn on_second(&mut self, aggregate: &SecondAggregate) {
        if self.short_only {
            let o = &aggregate.overall;
            info!(
                "Time: {}\tExpected RPS: {}\tActual RPS: {}\tActive Threads: {}\tAvg RT: {:.1}",
                aggregate.time, o.planned_requests, o.rps, o.active_threads, o.avg_response_time
            );
        } else {
            self.screen.add_second_data(aggregate);
        }
    }
}

impl Dashboard for ConsoleDriver {
    fn add_info_widget(&mut self, widget: Box<dyn InfoWidget>) {
        self.screen.add_info_widget(widget);
    }
}

use crate::{
    model::{agg::SecondAggregate, config::AbOptions},
    ui::screen::{InfoWidget, Screen},
};

const TITLE: &str = " Apache Benchmark Test ";

/// Right-panel block describing the running ab test.
pub struct AbInfoWidget {
    url: String,
    concurrency: u32,
    requests: u32,
    active_threads: u32,
}

impl AbInfoWidget {
    pub fn new(options: &AbOptions) -> Self {
        Self {
            url: options.url.clone(),
            concurrency: options.concurrency,
            requests: options.requests,
            active_threads: 0,
        }
    }
}

impl InfoWidget for AbInfoWidget {
    fn priority(&self) -> i32 {
        0
    }

    fn on_second(&mut self, aggregate: &SecondAggregate) {
        self.active_threads = aggregate.overall.active_threads;
    }

    fn render(&self, screen: &Screen) -> String {
        let m = screen.markup();
        let space = screen
            .right_panel_width()
            .saturating_sub(TITLE.len() + 1);
        let tildes = "~".repeat(space / 2);

        let mut out = format!("{}{tildes}{TITLE} {tildes}{}\n", m.bg_brown, m.reset);
        out.push_str(&format!("           URL: {}\n", self.url));
        out.push_str(&format!("   Concurrency: {}\n", self.concurrency));
        out.push_str(&format!("Total Requests: {}\n", self.requests));
        out.push_str(&format!("Active Threads: {}", self.active_threads));
        out
    }
}

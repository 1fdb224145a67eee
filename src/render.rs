use std::fmt::Write;

use chrono::{Datelike, NaiveDate};

use crate::grid;
use crate::models::{ActivityMap, Severity};

const BACKGROUND: &str = "#323437";
const LABEL_COLOR: &str = "#646669";
const LEFT_PADDING: u32 = 32;
const TOP_PADDING: u32 = 24;
const EDGE_PADDING: u32 = 12;
const LABEL_X: u32 = 6;
const LEGEND_LABEL_WIDTH: u32 = 30;
const DAYS_PER_WEEK: u32 = 7;
const ROW_LABELS: [(u32, &str); 3] = [(1, "Mon"), (3, "Wed"), (5, "Fri")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub weeks: u32,
    pub cell_size: u32,
    pub gap: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            weeks: 52,
            cell_size: 12,
            gap: 3,
        }
    }
}

impl Layout {
    fn step(&self) -> u32 {
        self.cell_size + self.gap
    }

    fn grid_width(&self) -> u32 {
        self.weeks * self.step() - self.gap
    }

    fn grid_height(&self) -> u32 {
        DAYS_PER_WEEK * self.step() - self.gap
    }

    fn legend_width(&self) -> u32 {
        2 * LEGEND_LABEL_WIDTH + Severity::ALL.len() as u32 * self.step()
    }

    fn legend_top(&self) -> u32 {
        TOP_PADDING + self.grid_height() + self.gap * 2 + 4
    }

    pub fn width(&self) -> u32 {
        LEFT_PADDING + self.grid_width().max(self.legend_width()) + EDGE_PADDING
    }

    pub fn height(&self) -> u32 {
        self.legend_top() + self.cell_size + EDGE_PADDING
    }

    pub fn cell_origin(&self, week: u32, day: u32) -> (u32, u32) {
        (
            LEFT_PADDING + week * self.step(),
            TOP_PADDING + day * self.step(),
        )
    }
}

pub fn render_heatmap(activity: &ActivityMap, today: NaiveDate, layout: &Layout) -> String {
    let layout = Layout {
        weeks: layout.weeks.max(1),
        cell_size: layout.cell_size.max(1),
        gap: layout.gap,
    };
    let width = layout.width();
    let height = layout.height();
    let start = grid::start_date(today, layout.weeks);
    let window_total: u64 = grid::visible_cells(today, layout.weeks)
        .map(|(_, _, date)| u64::from(activity.get(date)))
        .sum();
    let summary = format!("{window_total} tests in the last {} weeks", layout.weeks);

    let mut output = String::new();
    let _ = writeln!(
        output,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" role="img" aria-label="{summary}" font-family="sans-serif" font-size="9">"#
    );
    let _ = writeln!(output, "<title>{summary}</title>");
    let _ = writeln!(
        output,
        r#"<rect width="{width}" height="{height}" fill="{BACKGROUND}" rx="8"/>"#
    );

    write_month_labels(&mut output, start, &layout);
    write_row_labels(&mut output, &layout);

    for (week, day, date) in grid::visible_cells(today, layout.weeks) {
        let count = activity.get(date);
        let severity = grid::severity_for(count);
        let (x, y) = layout.cell_origin(week, day);
        let _ = writeln!(
            output,
            r#"<rect x="{x}" y="{y}" width="{size}" height="{size}" rx="2" fill="{fill}" data-date="{date}" data-count="{count}" data-level="{level}"><title>{date}: {count} {noun}</title></rect>"#,
            size = layout.cell_size,
            fill = severity.color(),
            date = date.format("%Y-%m-%d"),
            level = severity.level(),
            noun = if count == 1 { "test" } else { "tests" },
        );
    }

    write_legend(&mut output, &layout);
    let _ = writeln!(output, "</svg>");
    output
}

fn write_month_labels(output: &mut String, start: NaiveDate, layout: &Layout) {
    let month_of = |week: u32| grid::cell_date(start, week, 0).month();
    let mut previous_month = None;
    for week in 0..layout.weeks {
        let week_start = grid::cell_date(start, week, 0);
        let month = week_start.month();
        if previous_month == Some(month) {
            continue;
        }
        previous_month = Some(month);
        // a one-week sliver of the first month would collide with the next label
        if week == 0 && layout.weeks > 1 && month_of(1) != month {
            continue;
        }
        let (x, _) = layout.cell_origin(week, 0);
        let _ = writeln!(
            output,
            r#"<text x="{x}" y="{y}" fill="{LABEL_COLOR}">{label}</text>"#,
            y = TOP_PADDING - 8,
            label = week_start.format("%b"),
        );
    }
}

fn write_row_labels(output: &mut String, layout: &Layout) {
    for (day, label) in ROW_LABELS {
        let (_, y) = layout.cell_origin(0, day);
        let _ = writeln!(
            output,
            r#"<text x="{LABEL_X}" y="{baseline}" fill="{LABEL_COLOR}">{label}</text>"#,
            baseline = y + layout.cell_size - 2,
        );
    }
}

fn write_legend(output: &mut String, layout: &Layout) {
    let top = layout.legend_top();
    let baseline = top + layout.cell_size - 2;
    let _ = writeln!(
        output,
        r#"<text x="{LEFT_PADDING}" y="{baseline}" fill="{LABEL_COLOR}">Less</text>"#
    );
    let mut x = LEFT_PADDING + LEGEND_LABEL_WIDTH;
    for severity in Severity::ALL {
        let _ = writeln!(
            output,
            r#"<rect x="{x}" y="{top}" width="{size}" height="{size}" rx="2" fill="{fill}"/>"#,
            size = layout.cell_size,
            fill = severity.color(),
        );
        x += layout.step();
    }
    let _ = writeln!(
        output,
        r#"<text x="{x}" y="{baseline}" fill="{LABEL_COLOR}">More</text>"#,
        x = x + 4,
    );
}

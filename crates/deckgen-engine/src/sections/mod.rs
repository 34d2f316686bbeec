//! Section composers. Each turns one resolved source into zero or more
//! slides under a fixed pagination discipline; a section with nothing to say
//! emits no slides at all.

mod chart;
mod table;
mod text;

pub use chart::ChartSection;
pub use table::RankingTableSection;
pub use text::TextSection;

/// Styled lines per text slide; the last slide may be partially filled.
pub const TEXT_LINES_PER_SLIDE: usize = 15;

/// Data rows per ranking-table slide; the header row repeats on every slide.
pub const TABLE_ROWS_PER_SLIDE: usize = 10;

/// Labels and values per chart series are capped to keep charts legible.
pub const MAX_CHART_ENTRIES: usize = 12;

/// Header row of the top/bottom-five ranking table.
pub const RANKING_TITLES: [&str; 11] = [
    "数据名",
    "第1名",
    "第2名",
    "第3名",
    "第4名",
    "第5名",
    "倒数第5",
    "倒数第4",
    "倒数第3",
    "倒数第2",
    "倒数第1",
];

/// Abbreviate long category labels: anything over six characters becomes its
/// first five characters plus its last one.
pub fn shorten_label(label: &str) -> String {
    let chars: Vec<char> = label.chars().collect();
    if chars.len() <= 6 {
        return label.to_string();
    }
    let mut short: String = chars[..5].iter().collect();
    short.push(chars[chars.len() - 1]);
    short
}

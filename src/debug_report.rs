use patterncore::MatchingMetrics;
use patterncore::model::MatchResult;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_run(words: &[&str], results: &[MatchResult], metrics: MatchingMetrics, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Scanning: \"{}\"", words.join(" ")), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Events ━━━", ansi::GRAY));
    print_events(words, &palette);

    println!("\n{}", palette.paint("━━━ Results ━━━", ansi::GRAY));
    if results.is_empty() {
        println!("{}", palette.dim("  No patterns matched"));
        println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        println!("  • The word order/spacing didn't satisfy the range window");
        println!("  • A structural delimiter between words broke the rule");
        println!("\n{}", palette.dim("  Tip: Set PATTERNCORE_DEBUG=1 for installation/firing traces"));
    } else {
        print_results(words, results, &palette);
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Events: {}  │  Results: {}",
        palette.paint(format!("{:?}", metrics.total), ansi::GREEN),
        palette.paint(metrics.events_processed.to_string(), ansi::CYAN),
        palette.paint(metrics.results_produced.to_string(), ansi::CYAN),
    );
    println!(
        "  {}",
        palette.dim(format!(
            "programs installed: {}  alt-key installs: {}  signals fired: {}  open rules: {}",
            metrics.runtime.programs_installed,
            metrics.runtime.alt_key_programs_installed,
            metrics.runtime.signals_fired,
            metrics.runtime.open_patterns,
        )),
    );
    println!();
}

fn print_events(words: &[&str], palette: &ansi::Palette) {
    for (i, word) in words.iter().enumerate() {
        println!("  {} {}", palette.paint(format!("[{}]", i + 1), ansi::GRAY), palette.paint(*word, ansi::BLUE));
    }
}

fn print_results(words: &[&str], results: &[MatchResult], palette: &ansi::Palette) {
    for (idx, result) in results.iter().enumerate() {
        let span = words.get(result.start_ordpos as usize - 1..result.end_ordpos as usize).unwrap_or(&[]).join(" ");
        println!(
            "  {} {} {} {}",
            palette.paint(format!("[{}]", idx), ansi::GRAY),
            palette.bold(palette.paint(span, ansi::GREEN)),
            palette.dim("│"),
            palette.paint(format!("ordpos {}..{}", result.start_ordpos, result.end_ordpos), ansi::YELLOW),
        );
    }
}

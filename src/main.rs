mod debug_report;

use std::io::{self, IsTerminal, Read};

use patterncore::model::{EventData, EventId};
use patterncore::{Compiler, MatchEngine, OptimizeOptions, Operator, PatternCatalogue, SymbolTable};

const DEFAULT_RANGE_SLACK: u32 = 0;

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    match run(&config) {
        Ok(()) => {}
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn run(config: &CliConfig) -> patterncore::Result<()> {
    let words: Vec<&str> = config.input.split_whitespace().collect();
    let mut terms = SymbolTable::new();
    for word in &words {
        terms.get_or_create(word);
    }
    for word in &config.pattern {
        terms.get_or_create(word);
    }

    let op = config.op;
    let pattern = config.pattern.clone();
    let range = config.range.unwrap_or(op_default_range(op, pattern.len() as u32));

    let catalogue = PatternCatalogue::build(&OptimizeOptions::default(), |c: &mut Compiler| {
        for word in &pattern {
            c.push_term(terms.get(word).expect("interned above"));
        }
        c.push_expression(op, pattern.len(), range, 0)?;
        c.define_pattern(1, true)?;
        Ok(())
    })?;

    let mut engine = MatchEngine::new(&catalogue);
    let mut origpos = 0u32;
    for (i, word) in words.iter().enumerate() {
        let ordpos = i as u32 + 1;
        engine.set_current_pos(ordpos)?;
        let token_id = terms.get(word).expect("interned above");
        let data = EventData::at(0, origpos, word.len() as u32, ordpos);
        engine.feed(EventId::term(token_id), data)?;
        origpos += word.len() as u32 + 1;
    }

    let results: Vec<_> = engine.results().to_vec();
    debug_report::print_run(&words, &results, engine.metrics(), config.color);
    Ok(())
}

fn op_default_range(op: Operator, argc: u32) -> u32 {
    match op {
        Operator::Sequence | Operator::SequenceImm | Operator::Within => argc.saturating_sub(1) + DEFAULT_RANGE_SLACK,
        Operator::SequenceStruct | Operator::WithinStruct => argc.saturating_sub(2) + DEFAULT_RANGE_SLACK,
        Operator::Any | Operator::And => DEFAULT_RANGE_SLACK,
    }
}

struct CliConfig {
    input: String,
    pattern: Vec<String>,
    op: Operator,
    range: Option<u32>,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<String> = None;
    let mut pattern: Option<Vec<String>> = None;
    let mut op = Operator::Sequence;
    let mut range: Option<u32> = None;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1).peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("patterncore {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--sequence" => {
                let value = args.next().ok_or_else(|| "error: --sequence expects a comma-separated word list".to_string())?;
                op = Operator::Sequence;
                pattern = Some(value.split(',').map(str::to_string).collect());
            }
            "--within" => {
                let value = args.next().ok_or_else(|| "error: --within expects a comma-separated word list".to_string())?;
                op = Operator::Within;
                pattern = Some(value.split(',').map(str::to_string).collect());
            }
            "--range" => {
                let value = args.next().ok_or_else(|| "error: --range expects a value".to_string())?;
                range = Some(value.parse::<u32>().map_err(|_| format!("error: invalid --range '{value}'"))?);
            }
            "--input" | "-i" => {
                let value = args.next().ok_or_else(|| "error: --input expects a value".to_string())?;
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(value);
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    if input.is_some() {
                        return Err("error: input provided multiple times".to_string());
                    }
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(rest);
                break;
            }
        }
    }

    let input = match input {
        Some(value) => value,
        None => read_stdin_input()?,
    };

    if input.trim().is_empty() {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    }

    let pattern = pattern.ok_or_else(|| format!("error: one of --sequence or --within is required\n\n{}", help_text()))?;
    if pattern.len() < 2 {
        return Err("error: a pattern needs at least two words".to_string());
    }

    Ok(CliConfig { input, pattern, op, range, color })
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "patterncore {version}

Token-pattern matching engine CLI: tokenizes the input on whitespace and
matches one ad-hoc pattern built from --sequence/--within against it.

Usage:
  patterncore --sequence <w1,w2,...> [OPTIONS] [--] <input...>
  patterncore --within <w1,w2,...> [OPTIONS] --input <text>

Options:
  --sequence <w1,w2,...>   Match an ordered sequence of words.
  --within <w1,w2,...>     Match an unordered proximity window of words.
  --range <n>              Ordinal-position window, default: minimum for the operator.
  -i, --input <text>       Input text to scan. If omitted, reads remaining args
                            or stdin when no args are provided.
  --color                  Force ANSI color output.
  --no-color               Disable ANSI color output.
  -h, --help               Show this help message.
  -V, --version            Print version information.

Exit codes:
  0  Success.
  1  Internal error.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}

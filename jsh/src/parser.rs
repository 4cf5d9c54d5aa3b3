use jsh_types::{JshError, JshResult};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use tracing::debug;

#[derive(Parser)]
#[grammar = "shell.pest"]
pub struct ShellParser;

/// Upper bound on argument tokens per command, the command name excluded.
pub const MAX_ARGS: usize = 32;

/// One command of a pipeline. `argv[0]` is always `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub argv: Vec<String>,
}

impl Command {
    pub fn cmdline(&self) -> String {
        self.argv.join(" ")
    }
}

/// A fully parsed input line: one or more piped commands, optional
/// input/output redirection, and a background flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub background: bool,
}

/// Parses one input line. Returns `Ok(None)` for an empty line.
pub fn parse(line: &str) -> JshResult<Option<Pipeline>> {
    let mut pairs = ShellParser::parse(Rule::line, line)
        .map_err(|e| JshError::Parse(e.to_string()))?;

    let pair = match pairs.next() {
        Some(pair) if pair.as_rule() == Rule::pipeline => pair,
        _ => return Ok(None), // EOI only
    };

    let mut pipeline = Pipeline::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::simple_command => {
                let command = parse_simple_command(&mut pipeline, inner)?;
                pipeline.commands.push(command);
            }
            Rule::background => pipeline.background = true,
            _ => unreachable!("unexpected rule {:?}", inner.as_rule()),
        }
    }

    debug!(
        "parsed pipeline: {} command(s) input:{:?} output:{:?} background:{}",
        pipeline.commands.len(),
        pipeline.input,
        pipeline.output,
        pipeline.background
    );
    Ok(Some(pipeline))
}

fn parse_simple_command(pipeline: &mut Pipeline, pair: Pair<Rule>) -> JshResult<Command> {
    let mut argv: Vec<String> = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::token => {
                if argv.len() > MAX_ARGS {
                    return Err(JshError::Parse(format!(
                        "too many arguments (max {MAX_ARGS})"
                    )));
                }
                argv.push(token_string(inner));
            }
            Rule::redirect_in => {
                pipeline.input = Some(redirect_target(inner));
            }
            Rule::redirect_out => {
                pipeline.output = Some(redirect_target(inner));
            }
            _ => unreachable!("unexpected rule {:?}", inner.as_rule()),
        }
    }

    if argv.is_empty() {
        return Err(JshError::Parse("missing command".to_string()));
    }
    let name = argv[0].clone();
    Ok(Command { name, argv })
}

fn redirect_target(pair: Pair<Rule>) -> String {
    let token = pair.into_inner().next().expect("redirect carries a token");
    token_string(token)
}

fn token_string(pair: Pair<Rule>) -> String {
    let inner = pair.into_inner().next().expect("token carries a word");
    match inner.as_rule() {
        Rule::s_quoted | Rule::d_quoted => inner
            .into_inner()
            .next()
            .map(|quoted| quoted.as_str().to_string())
            .unwrap_or_default(),
        _ => inner.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(line: &str) -> Pipeline {
        parse(line).expect("parse failed").expect("empty pipeline")
    }

    #[test]
    fn empty_line_parses_to_none() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("   \t ").unwrap().is_none());
    }

    #[test]
    fn single_command_with_args() {
        let p = parse_one("sleep 5");
        assert_eq!(p.commands.len(), 1);
        assert_eq!(p.commands[0].name, "sleep");
        assert_eq!(p.commands[0].argv, vec!["sleep", "5"]);
        assert!(!p.background);
        assert!(p.input.is_none());
        assert!(p.output.is_none());
    }

    #[test]
    fn pipeline_keeps_command_order() {
        let p = parse_one("cat /etc/passwd | sort -r | wc -l");
        let names: Vec<_> = p.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["cat", "sort", "wc"]);
        assert_eq!(p.commands[1].argv, vec!["sort", "-r"]);
    }

    #[test]
    fn background_flag_only_at_end() {
        let p = parse_one("sleep 100 &");
        assert!(p.background);
        assert_eq!(p.commands[0].argv, vec!["sleep", "100"]);

        assert!(parse("sleep & 100").is_err());
    }

    #[test]
    fn redirections_attach_to_the_pipeline() {
        let p = parse_one("cat < in.txt | wc -l > out.txt");
        assert_eq!(p.input.as_deref(), Some("in.txt"));
        assert_eq!(p.output.as_deref(), Some("out.txt"));
        assert_eq!(p.commands.len(), 2);
        // redirect tokens never leak into argv
        assert_eq!(p.commands[0].argv, vec!["cat"]);
        assert_eq!(p.commands[1].argv, vec!["wc", "-l"]);
    }

    #[test]
    fn redirection_before_args_is_accepted() {
        let p = parse_one("tee > output.txt < input.txt");
        assert_eq!(p.input.as_deref(), Some("input.txt"));
        assert_eq!(p.output.as_deref(), Some("output.txt"));
        assert_eq!(p.commands[0].argv, vec!["tee"]);
    }

    #[test]
    fn quoted_words_keep_spaces_and_specials() {
        let p = parse_one("echo 'hello world' \"a|b\"");
        assert_eq!(p.commands[0].argv, vec!["echo", "hello world", "a|b"]);
    }

    #[test]
    fn missing_command_around_pipe_is_an_error() {
        assert!(parse("| wc").is_err());
        assert!(parse("ls |").is_err());
        assert!(parse("< in.txt").is_err());
    }

    #[test]
    fn argument_vector_is_bounded() {
        let mut line = String::from("echo");
        for i in 0..MAX_ARGS {
            line.push_str(&format!(" a{i}"));
        }
        assert!(parse(&line).is_ok());

        line.push_str(" one-too-many");
        let err = parse(&line).unwrap_err();
        assert!(err.to_string().contains("too many arguments"));
    }
}

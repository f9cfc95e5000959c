use std::process::ExitCode;

use anyhow::{bail, Context};
use camino::Utf8PathBuf;
use clap::Parser;
use rez_eval::Evaluator;
use rez_lexer::{
    token::{Token, TokenKind},
    Lexer, TokenStream,
};
use rez_preprocessor::{Options, Preprocessor};
use tracing::{debug, error, metadata::LevelFilter};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
pub struct Args {
    /// The Rez source file to parse.
    input: Utf8PathBuf,

    /// Directory searched for quoted #includes, before the system path.
    /// May be given multiple times; directories are searched in order.
    #[clap(short = 'i', long = "include")]
    include: Vec<Utf8PathBuf>,

    /// Directory searched for every #include.
    #[clap(short = 's', long = "sys-include")]
    sys_include: Vec<Utf8PathBuf>,

    /// Predefine a macro, as NAME or NAME=TOKENS. A bare NAME defines it
    /// to 1.
    #[clap(short = 'd', long = "define")]
    define: Vec<String>,

    /// DeRez mode: the predefined `derez` macro becomes 1 and `rez` 0.
    #[clap(long)]
    derez: bool,
}

fn parse_define(definition: &str) -> anyhow::Result<(String, Vec<Token>)> {
    let (name, value) = definition.split_once('=').unwrap_or((definition, "1"));
    if name.is_empty() {
        bail!("-d needs a macro name, got {definition:?}");
    }
    let mut lexer = Lexer::new("<command line>", value);
    let mut replacement = Vec::new();
    loop {
        let token = lexer
            .next_token()
            .map_err(|error| anyhow::anyhow!("in -d {definition:?}: {error}"))?;
        match token.kind {
            TokenKind::EndOfFile => break,
            TokenKind::Newline => continue,
            _ => replacement.push(token),
        }
    }
    Ok((name.to_owned(), replacement))
}

pub fn fallible_main(args: Args) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("cannot read source file {}", args.input))?;

    let mut macros = Vec::new();
    for definition in &args.define {
        macros.push(parse_define(definition)?);
    }

    debug!("building pipeline");
    let lexer = Lexer::new(args.input.as_str(), &source);
    let options = Options {
        macros,
        derez: args.derez,
        include_path: args.include.clone(),
        sys_include_path: args.sys_include.clone(),
    };
    let preprocessor = Preprocessor::new(lexer, Evaluator::default(), options)
        .with_print_sink(Box::new(|text| eprintln!("{text}")));

    debug!("parsing {}", args.input);
    let mut parser = rez_syntax::Parser::new(preprocessor);
    let file = parser
        .parse_file()
        .map_err(|error| anyhow::anyhow!("{error}"))?;

    println!("{file:#?}");
    Ok(())
}


fn main() -> ExitCode {
    let subscriber = tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        );
    tracing::subscriber::set_global_default(subscriber)
        .expect("cannot set default tracing subscriber");

    let args = Args::parse();

    match fallible_main(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

//! Command-line tool converting the XFA form data of a PDF to JSON, XML, YAML
//! or CSV.

use clap::{ArgAction, Parser};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use xfaconvert::{
    ConverterConfig, CredentialProvider, NoPassword, OutputFormat, PayloadSignature, Result,
    StaticPassword, XfaDocument,
};

#[derive(Parser, Debug)]
#[command(name = "xfaconvert")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PDF file containing an XFA form
    pdf: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "json", value_parser = ["json", "xml", "yaml", "csv"])]
    format: String,

    /// Write to this file instead of stdout
    #[arg(short, long, conflicts_with = "save")]
    output: Option<PathBuf>,

    /// Write next to the input as <PDF>.<format>
    #[arg(short, long, action = ArgAction::SetTrue)]
    save: bool,

    /// Password for encrypted documents
    #[arg(short, long, env = "XFA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Prompt for the password on stdin when the document is encrypted
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "password")]
    ask_password: bool,

    /// Also accept streams starting with "\n<xfa" (older producers)
    #[arg(long, action = ArgAction::SetTrue)]
    prefix_signature: bool,

    /// Separator joining nested keys in CSV headers
    #[arg(long, default_value = "_")]
    separator: String,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&args) {
        eprintln!("xfaconvert: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let format: OutputFormat = args.format.parse()?;

    let signature = if args.prefix_signature {
        PayloadSignature::AnyOf(vec![
            PayloadSignature::datasets(),
            PayloadSignature::xfa_prefix(),
        ])
    } else {
        PayloadSignature::datasets()
    };

    let config = ConverterConfig {
        signature,
        flatten_separator: args.separator.clone(),
        ..Default::default()
    };

    let credentials: Box<dyn CredentialProvider> = match (&args.password, args.ask_password) {
        (Some(password), _) => Box::new(StaticPassword(password.clone())),
        (None, true) => Box::new(prompt_password),
        (None, false) => Box::new(NoPassword),
    };

    let form = XfaDocument::open(&args.pdf, config, credentials.as_ref())?;

    if args.save {
        let written = form.save(format)?;
        eprintln!("Saved {}", written.display());
    } else if let Some(path) = &args.output {
        form.save_to(path, format)?;
        eprintln!("Saved {}", path.display());
    } else {
        let text = form.convert_to(format)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{text}")?;
    }

    Ok(())
}

fn prompt_password() -> Option<String> {
    eprint!("Enter password to decrypt the PDF: ");
    io::stderr().flush().ok()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    Some(line.trim_end_matches(['\r', '\n']).to_string())
}

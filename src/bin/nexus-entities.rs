use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use nexus_entities::{EntitiesConfig, Entity, EntityError, Expr, PathMode, Prop, Update};

/// Stand-in entity for expressions typed on the command line.
struct AnyEntity;
impl Entity for AnyEntity {
    fn collection_name() -> &'static str {
        "cli"
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Full,
    Name,
    Filtered,
    All,
    First,
    Elements,
}

#[derive(Parser, Debug)]
#[command(name = "nexus-entities", version, about = "Resolve entity property expressions into document field paths", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). If omitted, defaults and NEXUS_ENTITIES_* env vars are used.")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Print the field path of an expression such as 'x => x.ReviewList[0].Rating'")]
    Resolve {
        expr: String,
        #[arg(long, value_enum, default_value = "full")]
        mode: Mode,
        #[arg(long, help = "Array filter index for --mode elements (0 = a, 1 = b, ...)")]
        index: Option<usize>,
    },
    #[command(name = "update-doc", about = "Print an update document built from EXPR=JSON assignments")]
    UpdateDoc {
        #[arg(long = "set", value_name = "EXPR=JSON")]
        set: Vec<String>,
        #[arg(long = "inc", value_name = "EXPR=JSON")]
        inc: Vec<String>,
        #[arg(long = "unset", value_name = "EXPR")]
        unset: Vec<String>,
        #[arg(long, value_enum, default_value = "full")]
        mode: Mode,
    },
}

/// Modes that render a whole field path; `name` and `elements` do not.
fn path_mode(mode: Mode) -> Result<PathMode, EntityError> {
    match mode {
        Mode::Full => Ok(PathMode::Full),
        Mode::Filtered => Ok(PathMode::Filtered),
        Mode::All => Ok(PathMode::All),
        Mode::First => Ok(PathMode::First),
        Mode::Name | Mode::Elements => {
            Err(EntityError::Config(format!("--mode {mode:?} does not produce an update path").to_lowercase()))
        }
    }
}

fn resolve(expr: &str, mode: Mode, index: Option<usize>) -> Result<String, EntityError> {
    let e = Expr::<AnyEntity>::parse(expr)?;
    match (mode, index) {
        (Mode::Elements, Some(i)) => Prop::elements_at(i, &e),
        (Mode::Elements, None) => Prop::elements(&e),
        (_, Some(_)) => Err(EntityError::Config("--index is only valid with --mode elements".into())),
        (Mode::Name, None) => Prop::property(&e),
        (m, None) => Prop::resolve(&e, path_mode(m)?),
    }
}

fn json_to_bson(json: &str) -> Result<bson::Bson, EntityError> {
    let val: serde_json::Value =
        serde_json::from_str(json).map_err(|e| EntityError::Config(format!("invalid JSON value {json:?}: {e}")))?;
    let mut obj = serde_json::Map::new();
    obj.insert("v".to_string(), val);
    let mut doc = bson::Document::try_from(obj).map_err(|e| EntityError::Config(e.to_string()))?;
    doc.remove("v").ok_or_else(|| EntityError::Config(format!("invalid JSON value {json:?}")))
}

fn split_assignment(s: &str) -> Result<(&str, &str), EntityError> {
    s.split_once('=')
        .ok_or_else(|| EntityError::Config(format!("expected EXPR=JSON, got {s:?}")))
}

fn update_doc(set: &[String], inc: &[String], unset: &[String], mode: Mode) -> Result<String, EntityError> {
    let pm = path_mode(mode)?;
    let mut upd = Update::<AnyEntity>::new();
    for s in set {
        let (expr, json) = split_assignment(s)?;
        upd = upd.modify(&Expr::parse(expr)?, pm, json_to_bson(json)?)?;
    }
    for s in inc {
        let (expr, json) = split_assignment(s)?;
        upd = upd.inc(Prop::resolve(&Expr::<AnyEntity>::parse(expr)?, pm)?, json_to_bson(json)?);
    }
    for s in unset {
        upd = upd.unset(Prop::resolve(&Expr::<AnyEntity>::parse(s)?, pm)?);
    }
    let doc = upd.to_document()?;
    serde_json::to_string_pretty(&doc).map_err(|e| EntityError::Config(e.to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(p) => EntitiesConfig::load(p),
        None => Ok(EntitiesConfig::default()),
    };
    let cfg = match cfg {
        Ok(c) => c.apply_env(),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    // only write log files when a destination was configured
    if cfg.logging.dir.is_some()
        && let Err(e) = cfg.init_logging()
    {
        eprintln!("warning: logging disabled: {e}");
    }

    let out = match cli.command {
        Commands::Resolve { expr, mode, index } => resolve(&expr, mode, index),
        Commands::UpdateDoc { set, inc, unset, mode } => update_doc(&set, &inc, &unset, mode),
    };
    match out {
        Ok(s) => {
            println!("{s}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum, ValueHint};
use strum::Display;

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, ValueEnum, Default)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Pretty,
    /// JSON document
    Json,
}

#[derive(Args, Debug, Clone, Default)]
#[command(next_help_heading = "Output Options")]
pub struct OutputArgs {
    /// Output format
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Write output to this file instead of stdout
    #[arg(long, short, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

impl OutputArgs {
    pub fn get_writer(&self) -> Result<Box<dyn Write>> {
        match &self.output {
            Some(path) => {
                let f = File::create(path)
                    .with_context(|| format!("Failed to create output file {}", path.display()))?;
                Ok(Box::new(BufWriter::new(f)))
            }
            None => Ok(Box::new(BufWriter::new(io::stdout()))),
        }
    }
}

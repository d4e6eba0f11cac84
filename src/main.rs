// Copyright 2024 Felix Engl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;
use muninn::history::{archive_info, compile, CompileOptions, Journal, JournalConfig, JournalLayout};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "muninn", version, about = "Seals and inspects fetch history journals.")]
struct MuninnArgs {
    #[command(subcommand)]
    command: MuninnCommand,
}

#[derive(Subcommand)]
enum MuninnCommand {
    /// Seals an open journal into its compressed artifact.
    Compile {
        /// The path of the open journal.
        journal: Utf8PathBuf,
        /// The journal uses the directory layout.
        #[arg(long)]
        directory: bool,
        /// Where to put the artifact. Defaults to the journal path with
        /// the compression suffix appended.
        #[arg(long)]
        output: Option<Utf8PathBuf>,
        /// Json stored next to the pages, e.g. '{"run":3}'.
        #[arg(long)]
        custom_data: Option<String>,
        /// Keep the open journal around after sealing.
        #[arg(long)]
        keep: bool,
    },
    /// Prints key figures of a compiled artifact.
    Info {
        /// The path of the compiled artifact.
        artifact: Utf8PathBuf,
    },
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{l}{I} - {d} - {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("out", Box::new(console)))
        .logger(Logger::builder().build("muninn", LevelFilter::Info))
        .build(Root::builder().appender("out").build(LevelFilter::Warn))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn run(args: MuninnArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        MuninnCommand::Compile {
            journal,
            directory,
            output,
            custom_data,
            keep,
        } => {
            let layout = if directory {
                JournalLayout::Directory
            } else {
                JournalLayout::SingleFile
            };
            let custom_data = custom_data
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?;
            let journal = Journal::open(&JournalConfig {
                path: journal,
                layout,
            });
            let artifact = compile(
                journal,
                CompileOptions {
                    output,
                    custom_data,
                    keep_sources: keep,
                },
            )?;
            println!("Compiled into {artifact}");
        }
        MuninnCommand::Info { artifact } => {
            let info = archive_info(&artifact)?;
            println!("Artifact:          {artifact}");
            println!("Compressed size:   {} bytes", info.compressed_size);
            println!("Uncompressed size: {} bytes", info.uncompressed_size);
            println!("Files:             {}", info.file_count);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = MuninnArgs::parse();
    if let Err(error) = init_logging() {
        eprintln!("Failed to initialise logging: {error}");
        return ExitCode::FAILURE;
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

// FILE: src/cli/mod.rs

mod config;
mod handlers;

use crate::error::{CompilerError, Result};
use crate::events::{BuildEvent, EventSink};
use crate::Settings;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Instant;

pub struct EnhancedCli {
    config: config::ConfigFile,
    start_time: Instant,
}

impl Default for EnhancedCli {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancedCli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        self.setup_logging(matches.get_count("verbose"))?;

        match matches.subcommand() {
            Some(("compile", sub_matches)) => handlers::handle_compile_command(self, sub_matches),
            Some(("watch", sub_matches)) => handlers::handle_watch_command(self, sub_matches),
            Some(("roster", sub_matches)) => handlers::handle_roster_command(self, sub_matches),
            Some(("theme", sub_matches)) => handlers::handle_theme_command(self, sub_matches),
            Some(("import-icons", sub_matches)) => handlers::handle_import_icons_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    fn generation_args(command: Command) -> Command {
        command
            .arg(Arg::new("indent").long("indent").value_name("N").value_parser(clap::value_parser!(usize)).help("Spaces per indentation level"))
            .arg(Arg::new("tabs").long("tabs").help("Indent with tabs").action(ArgAction::SetTrue))
            .arg(Arg::new("double-quotes").long("double-quotes").help("Quote strings with double quotes").action(ArgAction::SetTrue))
            .arg(Arg::new("add-import").long("add-import").help("Emit the React import line").action(ArgAction::SetTrue))
            .arg(Arg::new("translate").long("translate").help("Wrap literal text in the translation helper").action(ArgAction::SetTrue))
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .author("Scenec Development Team")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.toml or .json)")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(Self::generation_args(
                Command::new("compile")
                    .about("Compile every component of a document snapshot")
                    .arg(Arg::new("input").help("Document snapshot (JSON)").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("DIR").help("Output directory"))
                    .arg(Arg::new("skip-cache").long("skip-cache").help("Recompute every component").action(ArgAction::SetTrue))
                    .arg(Arg::new("persist").long("persist").help("Save the document with its cache entries").action(ArgAction::SetTrue))
                    .arg(Arg::new("stats").long("stats").help("Show detailed compilation statistics").action(ArgAction::SetTrue))
                    .arg(Arg::new("events").long("events").help("Print build events as JSON lines").action(ArgAction::SetTrue)),
            ))
            .subcommand(Self::generation_args(
                Command::new("watch")
                    .about("Compile, then recompile changed components when the snapshot changes")
                    .arg(Arg::new("input").help("Document snapshot (JSON)").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("DIR").help("Output directory"))
                    .arg(Arg::new("events").long("events").help("Print build events as JSON lines").action(ArgAction::SetTrue)),
            ))
            .subcommand(
                Command::new("roster")
                    .about("List the components that would be compiled")
                    .arg(Arg::new("input").help("Document snapshot (JSON)").required(true).index(1))
                    .arg(Arg::new("json").long("json").help("Print the roster as JSON").action(ArgAction::SetTrue)),
            )
            .subcommand(Self::generation_args(
                Command::new("theme")
                    .about("Generate the theme module")
                    .arg(Arg::new("input").help("Document snapshot (JSON)").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Write to FILE instead of stdout")),
            ))
            .subcommand(
                Command::new("import-icons")
                    .about("Replace the icons page with components built from SVG files")
                    .arg(Arg::new("input").help("Document snapshot (JSON)").required(true).index(1))
                    .arg(Arg::new("set").short('s').long("set").value_name("PREFIX").required(true).help("Icon set prefix, e.g. ph"))
                    .arg(Arg::new("dir").short('d').long("dir").value_name("SVG_DIR").required(true).help("Directory searched recursively for .svg files"))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Save the document to FILE instead of in place")),
            )
    }

    fn setup_logging(&self, verbose_count: u8) -> Result<()> {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .try_init()
            .map_err(|e| CompilerError::InvalidFormat {
                message: format!("Logger already initialised: {}", e),
            })
    }

    /// Defaults, then the config file, then command-line flags.
    pub fn build_settings(&self, matches: &ArgMatches) -> Result<Settings> {
        let mut settings = Settings::default();
        self.config.apply(&mut settings)?;

        let has = |id: &str| matches.try_contains_id(id).unwrap_or(false);
        if has("indent") {
            if let Some(indent) = matches.get_one::<usize>("indent") {
                settings.writer.indent_number_of_spaces = *indent;
            }
        }
        if has("tabs") && matches.get_flag("tabs") {
            settings.writer.use_tabs = true;
        }
        if has("double-quotes") && matches.get_flag("double-quotes") {
            settings.writer.use_single_quote = false;
        }
        if has("add-import") && matches.get_flag("add-import") {
            settings.react.add_import = true;
        }
        if has("translate") && matches.get_flag("translate") {
            settings.react.add_translate = true;
        }
        Ok(settings)
    }

    pub fn output_directory(&self, matches: &ArgMatches) -> String {
        matches
            .get_one::<String>("output")
            .cloned()
            .or_else(|| self.config.output_directory.clone())
            .unwrap_or_else(|| "generated".to_string())
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }
}

/// Prints build events, either as progress lines or as JSON lines.
pub struct ConsoleSink {
    json: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: BuildEvent) {
        if self.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => log::error!("Could not serialize {} event: {}", event.kind(), e),
            }
            return;
        }
        match &event {
            BuildEvent::ComponentBuild { pass, state, bundle } => {
                println!("   [{}] {} ({}/{})", pass, bundle.name, state.loaded, state.total);
            }
            BuildEvent::ThemeUpdate { current_theme_name, .. } => {
                log::debug!("Theme updated ({:?})", current_theme_name);
            }
            BuildEvent::Notify { message } => println!("ℹ️  {}", message),
        }
    }
}

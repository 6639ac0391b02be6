// FILE: src/cli/handlers.rs
use super::{ConsoleSink, EnhancedCli};
use crate::events::{BuildEvent, EventSink};
use crate::scene::{Document, SceneGraph};
use crate::utils::is_icon_name;
use crate::{compile_document, generate_theme, write_bundle, write_project, CompilationStats, CompilerError, Orchestrator, Result};

use clap::ArgMatches;
use indexmap::IndexMap;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::{Duration, Instant};

fn required<'m>(matches: &'m ArgMatches, id: &str) -> Result<&'m String> {
    matches.get_one::<String>(id).ok_or_else(|| CompilerError::InvalidFormat {
        message: format!("Missing required argument '{}'", id),
    })
}

// --- COMPILE ---
pub fn handle_compile_command(cli: &EnhancedCli, matches: &ArgMatches) -> Result<()> {
    let input_path = required(matches, "input")?;
    let out_dir = PathBuf::from(cli.output_directory(matches));
    let settings = cli.build_settings(matches)?;
    let json_events = matches.get_flag("events");

    if !json_events {
        println!("🔨 Compiling {} -> {}", input_path, out_dir.display());
    }

    let compile_start = Instant::now();
    let mut document = Document::load(input_path)?;
    let mut sink = ConsoleSink::new(json_events);
    let output = compile_document(&mut document, &settings, matches.get_flag("skip-cache"), &mut sink)?;

    let mut stats = output.stats();
    stats.files_written = write_project(&out_dir, &output)?;
    stats.compile_time_ms = compile_start.elapsed().as_millis() as u64;

    if matches.get_flag("persist") {
        document.save(input_path)?;
        log::info!("Saved cache entries back to {}", input_path);
    }

    if json_events {
        return Ok(());
    }

    if stats.failed > 0 {
        println!("⚠️  {} of {} components failed, see the log for details", stats.failed, stats.components);
    } else {
        println!("✅ Compilation successful!");
    }
    println!("   Components: {}", stats.components);
    println!("   Files: {}", stats.files_written);
    println!("   Time: {}ms", stats.compile_time_ms);

    if matches.get_flag("stats") {
        print_detailed_stats(&stats);
    }
    Ok(())
}

// --- WATCH ---

/// Mirrors build events into the output directory as they arrive.
struct ProjectWriter {
    out_dir: PathBuf,
    console: ConsoleSink,
    index: String,
    theme: String,
}

impl ProjectWriter {
    fn write(&self, name: &str, contents: &str) {
        let path = self.out_dir.join(name);
        if let Err(e) = fs::write(&path, contents) {
            log::error!("Could not write {}: {}", path.display(), e);
        }
    }
}

impl EventSink for ProjectWriter {
    fn emit(&mut self, event: BuildEvent) {
        match &event {
            BuildEvent::ComponentBuild { state, bundle, .. } => {
                if let Err(e) = write_bundle(&self.out_dir, bundle) {
                    log::error!("Could not write {}: {}", bundle.name, e);
                }
                if state.index != self.index {
                    self.index = state.index.clone();
                    self.write("index.ts", &self.index);
                }
            }
            BuildEvent::ThemeUpdate { code, .. } => {
                if *code == self.theme {
                    return;
                }
                self.theme = code.clone();
                self.write("theme.ts", &self.theme);
            }
            BuildEvent::Notify { .. } => {}
        }
        self.console.emit(event);
    }
}

fn watcher_error(context: &str, e: notify::Error) -> CompilerError {
    CompilerError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{}: {}", context, e),
    ))
}

fn touches(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == file_name)
}

/// Fixed-rate theme refresh, independent of how often the watcher wakes up.
struct ThemeTick {
    interval: Duration,
    last: Instant,
}

impl ThemeTick {
    fn new(interval: Duration, now: Instant) -> Self {
        Self { interval, last: now }
    }

    fn remaining(&self, now: Instant) -> Duration {
        self.interval.saturating_sub(now.saturating_duration_since(self.last))
    }

    fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) < self.interval {
            return false;
        }
        self.last = now;
        true
    }
}

fn reload_and_dispatch(input: &Path, current: &mut Document, orchestrator: &mut Orchestrator, sink: &mut dyn EventSink) {
    let mut next = match Document::load(input) {
        Ok(next) => next,
        Err(e) => {
            eprintln!("❌ Could not reload {}: {}", input.display(), e);
            return;
        }
    };
    next.adopt_plugin_data(current);
    let changes = Document::diff(current, &next);
    *current = next;
    if changes.is_empty() {
        return;
    }
    log::debug!("{} change records", changes.len());
    if let Some(summary) = orchestrator.handle_document_change(current, &changes, sink) {
        println!(
            "🔄 Pass {}: {} recompiled, {} failed",
            summary.pass, summary.compiled, summary.failed
        );
    }
}

pub fn handle_watch_command(cli: &EnhancedCli, matches: &ArgMatches) -> Result<()> {
    let input_path = required(matches, "input")?;
    let input = Path::new(input_path);
    let out_dir = PathBuf::from(cli.output_directory(matches));
    let settings = cli.build_settings(matches)?;
    fs::create_dir_all(&out_dir)?;

    let mut current = Document::load(input)?;
    let mut orchestrator = Orchestrator::new(settings.clone());
    let mut sink = ProjectWriter {
        out_dir,
        console: ConsoleSink::new(matches.get_flag("events")),
        index: String::new(),
        theme: String::new(),
    };
    orchestrator.load_components(&mut current, &mut sink);
    orchestrator.refresh_theme(&current, &mut sink);

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if let Err(e) = tx.send(event) {
                    eprintln!("Watch error: {}", e);
                }
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| watcher_error("Failed to create file watcher", e))?;

    // Editors often replace the file, so watch its directory.
    let watch_dir = match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|e| watcher_error("Failed to watch file", e))?;
    println!("👀 Watching {} for changes...", input_path);

    let mut tick = ThemeTick::new(Duration::from_millis(settings.theme_interval_ms.max(1)), Instant::now());
    loop {
        match rx.recv_timeout(tick.remaining(Instant::now())) {
            Ok(event) => {
                if touches(&event, input.file_name()) {
                    reload_and_dispatch(input, &mut current, &mut orchestrator, &mut sink);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                eprintln!("Watch error: event channel closed");
                break;
            }
        }
        // Checked after every wake-up so a busy directory cannot starve the theme.
        if tick.due(Instant::now()) {
            orchestrator.refresh_theme(&current, &mut sink);
        }
    }

    Ok(())
}

// --- ROSTER ---
pub fn handle_roster_command(cli: &EnhancedCli, matches: &ArgMatches) -> Result<()> {
    let input_path = required(matches, "input")?;
    let document = Document::load(input_path)?;
    let orchestrator = Orchestrator::new(cli.build_settings(matches)?);
    let components = orchestrator.discover(&document);
    let roster = orchestrator.roster(&document, &components);

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&roster)?);
        return Ok(());
    }

    println!("📋 {} components in {}", roster.len(), input_path);
    for entry in &roster {
        println!("   {:<24} {:<16} {}", entry.name, entry.page, entry.path);
    }
    Ok(())
}

// --- THEME ---
pub fn handle_theme_command(cli: &EnhancedCli, matches: &ArgMatches) -> Result<()> {
    let input_path = required(matches, "input")?;
    let document = Document::load(input_path)?;
    let theme = generate_theme(&document, &cli.build_settings(matches)?);

    if let Some(output_file) = matches.get_one::<String>("output") {
        fs::write(output_file, &theme.code)?;
        println!("✅ Theme saved to {} ({} modes)", output_file, theme.modes.len());
    } else {
        print!("{}", theme.code);
    }
    Ok(())
}

// --- IMPORT ICONS ---

/// Lower-case, dash-separated icon name from a file stem.
fn icon_name(stem: &str) -> String {
    let name: String = stem
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    name.trim_matches('-').to_string()
}

fn collect_svgs(dir_path: &str) -> Result<IndexMap<String, String>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir_path) {
        let entry = entry.map_err(|e| {
            CompilerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        if entry.file_type().is_file() && entry.path().extension().map_or(false, |ext| ext == "svg") {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut icons = IndexMap::new();
    for path in files {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let name = icon_name(stem);
        if name.is_empty() {
            log::warn!("Skipping {}: no usable icon name", path.display());
            continue;
        }
        icons.insert(name, fs::read_to_string(&path)?);
    }
    Ok(icons)
}

pub fn handle_import_icons_command(cli: &EnhancedCli, matches: &ArgMatches) -> Result<()> {
    let input_path = required(matches, "input")?;
    let set = required(matches, "set")?;
    let dir = required(matches, "dir")?;
    if !is_icon_name(&format!("{}:icon", set)) {
        return Err(CompilerError::InvalidFormat {
            message: format!("Invalid icon set prefix '{}'", set),
        });
    }

    let icons = collect_svgs(dir)?;
    println!("🎨 Importing {} icons from {} as '{}'", icons.len(), dir, set);

    let mut document = Document::load(input_path)?;
    let mut orchestrator = Orchestrator::new(cli.build_settings(matches)?);
    let count = orchestrator.import_icons(&mut document, set, &icons, &mut ConsoleSink::new(false))?;

    let output_path = matches.get_one::<String>("output").unwrap_or(input_path);
    document.save(output_path)?;
    let pages = document.pages().len();
    println!("✅ Imported {} icons, saved {} ({} pages)", count, output_path, pages);
    Ok(())
}

fn print_detailed_stats(stats: &CompilationStats) {
    println!("\n📊 Detailed Compilation Statistics:");
    println!("   Passes: {}", stats.passes);
    println!("   Compiled (last pass): {}", stats.compiled);
    println!("   Served from cache: {}", stats.cached);
    println!("   Failed: {}", stats.failed);
    println!("   Assets: {}", stats.asset_count);
    println!("   Icons used: {}", stats.icons_used);
    println!("\n   Cache:");
    println!("     Memory hits: {}", stats.cache.memory_hits);
    println!("     Durable hits: {}", stats.cache.durable_hits);
    println!("     Misses: {}", stats.cache.misses);
    if stats.cache.decode_failures > 0 {
        println!("     Decode failures: {}", stats.cache.decode_failures);
    }
    println!("     Writes: {}", stats.cache.writes);
}

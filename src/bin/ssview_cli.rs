use serde::Serialize;
use ssview::{
    about,
    annotator::annotate,
    config::WidgetConfig,
    palette::legend_svg,
    prober::probe_availability,
    protocol::{AnnotationSummary, LoadStatus, RenderingType, WidgetView},
    resolver::{EntityRef, ImageResolver},
    service::HttpImageService,
    svg_doc::SvgDocument,
    widget::{Container, Download, mount},
};
use std::{env, fs, path::Path};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

const LOG_ENV: &str = "SSVIEW_LOG";

#[derive(Serialize)]
struct AnnotateSummary {
    input: String,
    output: Option<String>,
    removed_title: bool,
    #[serde(flatten)]
    counts: AnnotationSummary,
}

/// Keeps the last rendered view; surfaces and downloads are reported on stderr.
#[derive(Default)]
struct CliContainer {
    last: Option<WidgetView>,
}

impl Container for CliContainer {
    fn render(&mut self, view: &WidgetView) {
        self.last = Some(view.clone());
    }

    fn open_surface(&mut self, url: &Url) {
        eprintln!("Open: {url}");
    }

    fn save_download(&mut self, download: &Download) {
        info!(filename = %download.filename, mime = %download.mime, "download prepared");
    }
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  ssview_cli --version\n  \
  ssview_cli [--config PATH] probe ENTITY\n  \
  ssview_cli [--config PATH] load ENTITY [--type TYPE]\n  \
  ssview_cli [--config PATH] download ENTITY TYPE OUTPUT\n  \
  ssview_cli annotate INPUT.svg [OUTPUT.svg]\n  \
  ssview_cli legend OUTPUT.svg\n\n  \
  Types: {}\n  \
  Logging: set {LOG_ENV}=debug",
        RenderingType::ALL
            .iter()
            .map(|t| t.slug())
            .collect::<Vec<_>>()
            .join(", ")
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Could not serialize JSON output: {e}"))?;
    println!("{text}");
    Ok(())
}

fn parse_global_config_arg(args: &[String]) -> (Option<String>, usize) {
    if args.len() >= 3 && args[1] == "--config" {
        return (Some(args[2].clone()), 3);
    }
    (None, 1)
}

fn load_config(path: Option<&str>, entity: &str) -> Result<WidgetConfig, String> {
    let mut config = match path {
        Some(path) => WidgetConfig::load_from_path(Path::new(path)).map_err(|e| e.to_string())?,
        None => WidgetConfig::new(entity),
    };
    config.entity = entity.to_string();
    config = config.with_env_overrides().map_err(|e| e.to_string())?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn parse_type(value: &str) -> Result<RenderingType, String> {
    value.parse().map_err(|e| format!("{e}"))
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Could not start async runtime: {e}"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        return Err("Missing command".to_string());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }

    let (config_path, cmd_idx) = parse_global_config_arg(&args);
    if args.len() <= cmd_idx {
        usage();
        return Err("Missing command".to_string());
    }

    let command = &args[cmd_idx];

    match command.as_str() {
        "probe" => {
            if args.len() <= cmd_idx + 1 {
                usage();
                return Err("probe requires: ENTITY".to_string());
            }
            let config = load_config(config_path.as_deref(), &args[cmd_idx + 1])?;
            let entity = EntityRef::new(&config.entity).map_err(|e| e.to_string())?;
            let resolver = ImageResolver::new(config.base_url.clone());
            let service = HttpImageService::new();
            let reports = runtime()?.block_on(probe_availability(
                &service,
                &resolver,
                &entity,
                &config.candidates,
            ));
            print_json(&reports)
        }
        "load" => {
            if args.len() <= cmd_idx + 1 {
                usage();
                return Err("load requires: ENTITY [--type TYPE]".to_string());
            }
            let entity = &args[cmd_idx + 1];
            let requested = match args.get(cmd_idx + 2).map(String::as_str) {
                Some("--type") => {
                    let value = args
                        .get(cmd_idx + 3)
                        .ok_or_else(|| "--type requires a value".to_string())?;
                    Some(parse_type(value)?)
                }
                Some(other) => return Err(format!("Unexpected argument '{other}'")),
                None => None,
            };
            let config = load_config(config_path.as_deref(), entity)?;
            let mut widget = mount(CliContainer::default(), config, HttpImageService::new())
                .map_err(|e| e.to_string())?;
            runtime()?.block_on(async {
                widget.initialize().await;
                if let Some(rendering) = requested {
                    widget.switch_type(rendering).await;
                }
            });
            let view = widget
                .container()
                .last
                .clone()
                .unwrap_or_else(|| widget.view());
            print_json(&view)
        }
        "download" => {
            if args.len() <= cmd_idx + 3 {
                usage();
                return Err("download requires: ENTITY TYPE OUTPUT".to_string());
            }
            let rendering = parse_type(&args[cmd_idx + 2])?;
            let output = &args[cmd_idx + 3];
            let mut config = load_config(config_path.as_deref(), &args[cmd_idx + 1])?;
            config.candidates = vec![rendering];
            config.show_comparison = false;
            let mut widget = mount(CliContainer::default(), config, HttpImageService::new())
                .map_err(|e| e.to_string())?;
            let status = runtime()?.block_on(widget.initialize());
            if status == LoadStatus::Error {
                let message = widget.view().message.unwrap_or_default();
                return Err(message);
            }
            let download = widget
                .download()
                .ok_or_else(|| format!("Nothing to download for '{rendering}'"))?;
            fs::write(output, &download.bytes)
                .map_err(|e| format!("Could not write '{output}': {e}"))?;
            println!(
                "Wrote {} ({}, {} bytes) to '{output}'",
                download.filename,
                download.mime,
                download.bytes.len()
            );
            if status == LoadStatus::Unavailable {
                eprintln!("Note: '{rendering}' is not available, saved the placeholder image");
            }
            Ok(())
        }
        "annotate" => {
            if args.len() <= cmd_idx + 1 {
                usage();
                return Err("annotate requires: INPUT.svg [OUTPUT.svg]".to_string());
            }
            let input = &args[cmd_idx + 1];
            let output = args.get(cmd_idx + 2);
            let markup = fs::read_to_string(input)
                .map_err(|e| format!("Could not read SVG input '{input}': {e}"))?;
            let mut doc = SvgDocument::parse(&markup)
                .map_err(|e| format!("Could not parse SVG input '{input}': {e}"))?;
            let result = annotate(&mut doc);
            if let Some(output) = output {
                let svg = doc.to_svg_string().map_err(|e| e.to_string())?;
                fs::write(output, svg)
                    .map_err(|e| format!("Could not write SVG output '{output}': {e}"))?;
            }
            print_json(&AnnotateSummary {
                input: input.clone(),
                output: output.cloned(),
                removed_title: result.removed_title,
                counts: result.summary,
            })
        }
        "legend" => {
            if args.len() <= cmd_idx + 1 {
                usage();
                return Err("legend requires: OUTPUT.svg".to_string());
            }
            let output = &args[cmd_idx + 1];
            fs::write(output, legend_svg())
                .map_err(|e| format!("Could not write SVG output '{output}': {e}"))?;
            println!("Wrote legend to '{output}'");
            Ok(())
        }
        other => {
            usage();
            Err(format!("Unknown command '{other}'"))
        }
    }
}

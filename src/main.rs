use annotator::cli::Args;
use annotator::config::{self, AppSettings, PathConfig};
use annotator::core::event_bus::{Event, EventBus, downcast_event};
use annotator::entities::NormRect;
use annotator::entities::annotation_events::{
    AnnotationAddedEvent, AnnotationDeletedEvent, AnnotationsReloadedEvent, PersistenceFailedEvent,
    SelectionChangedEvent,
};
use annotator::media;
use annotator::store::JsonStore;
use annotator::widgets::viewport::{self, Annotator, LoadedImage, ToolMode};

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

/// Main application state
struct AnnotatorApp {
    annotator: Annotator,
    event_bus: EventBus,
    settings: AppSettings,
    settings_path: PathBuf,
    images: Vec<PathBuf>,
    current: usize,
    texture: Option<egui::TextureHandle>,
    /// Current image must be (re)loaded next frame
    load_pending: bool,
    /// Class id given to newly drawn boxes; `None` cancels draws
    active_class: Option<u32>,
    error_msg: Option<String>,
    status: String,
}

impl AnnotatorApp {
    fn new(
        annotator: Annotator,
        event_bus: EventBus,
        settings: AppSettings,
        settings_path: PathBuf,
        images: Vec<PathBuf>,
        active_class: Option<u32>,
    ) -> Self {
        Self {
            annotator,
            event_bus,
            settings,
            settings_path,
            images,
            current: 0,
            texture: None,
            load_pending: true,
            active_class,
            error_msg: None,
            status: String::new(),
        }
    }

    fn load_current(&mut self, ctx: &egui::Context) {
        self.load_pending = false;
        self.texture = None;

        let Some(path) = self.images.get(self.current).cloned() else {
            let _ = self.annotator.set_image(None);
            return;
        };

        let img = match media::load_image(&path) {
            Ok(img) => img,
            Err(e) => {
                error!("{:#}", e);
                self.error_msg = Some(format!("{:#}", e));
                let _ = self.annotator.set_image(None);
                return;
            }
        };

        let size = egui::vec2(img.size[0] as f32, img.size[1] as f32);
        self.texture = Some(ctx.load_texture(path.display().to_string(), img, egui::TextureOptions::LINEAR));
        self.error_msg = None;

        let loaded = self
            .annotator
            .set_image(Some(LoadedImage::new(&path, size)))
            .and_then(|_| self.annotator.load_annotations());
        if let Err(e) = loaded {
            self.error_msg = Some(e.to_string());
        }
    }

    fn step_image(&mut self, delta: isize) {
        if self.images.is_empty() {
            return;
        }
        let len = self.images.len() as isize;
        let next = (self.current as isize + delta).rem_euclid(len) as usize;
        if next != self.current {
            self.current = next;
            self.load_pending = true;
        }
    }

    fn handle_hotkeys(&mut self, ctx: &egui::Context) {
        let (tool, step, class) = ctx.input(|i| {
            let tool = ToolMode::ALL
                .iter()
                .copied()
                .find(|t| hotkey(*t).is_some_and(|k| i.key_pressed(k)));
            let step = if i.key_pressed(egui::Key::ArrowRight) || i.key_pressed(egui::Key::PageDown) {
                1
            } else if i.key_pressed(egui::Key::ArrowLeft) || i.key_pressed(egui::Key::PageUp) {
                -1
            } else {
                0
            };
            let class = DIGIT_KEYS
                .iter()
                .position(|k| i.key_pressed(*k))
                .map(|n| n as u32);
            (tool, step, class)
        });

        if let Some(tool) = tool {
            self.annotator.set_tool(tool);
        }
        if step != 0 {
            self.step_image(step);
        }
        if let Some(class) = class {
            info!("Active class: {}", class);
            self.active_class = Some(class);
        }
    }

    /// Drain deferred events: status text and error label.
    fn process_events(&mut self) {
        for event in self.event_bus.poll() {
            if let Some(e) = downcast_event::<PersistenceFailedEvent>(&event) {
                self.error_msg = Some(e.message.clone());
            } else if let Some(e) = downcast_event::<AnnotationAddedEvent>(&event) {
                self.error_msg = None;
                self.status = format!("Added {}", e.annotation.summary());
            } else if let Some(e) = downcast_event::<AnnotationDeletedEvent>(&event) {
                self.error_msg = None;
                self.status = match e.id {
                    Some(id) => format!("Deleted #{}", id),
                    None => "Deleted unsaved box".to_string(),
                };
            } else if let Some(e) = downcast_event::<SelectionChangedEvent>(&event) {
                self.status = match &e.annotation {
                    Some(ann) => {
                        let [cx, cy, w, h] = ann.rect.to_xywh();
                        format!(
                            "{} | xywh {:.4} {:.4} {:.4} {:.4}",
                            ann.summary(),
                            cx,
                            cy,
                            w,
                            h
                        )
                    }
                    None => String::new(),
                };
            } else if let Some(e) = downcast_event::<AnnotationsReloadedEvent>(&event) {
                self.status = format!("{} annotations", e.count);
            } else {
                debug!("Unhandled event: {}", (*event).type_name());
            }
        }
    }

    fn render_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let name = self
                    .images
                    .get(self.current)
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "no images".to_string());
                ui.label(format!("[{}/{}] {}", self.current + 1, self.images.len().max(1), name));
                ui.separator();
                ui.label(format!(
                    "{} ({})",
                    self.annotator.tool().display_name(),
                    self.annotator.tool().hotkey()
                ));
                ui.separator();
                match self.active_class {
                    Some(class) => ui.label(format!("class {}", class)),
                    None => ui.label("class - (press 0-9)"),
                };
                ui.separator();
                ui.label(&self.status);
                if let Some(err) = &self.error_msg {
                    ui.separator();
                    ui.colored_label(egui::Color32::RED, err);
                }
            });
        });
    }
}

const DIGIT_KEYS: [egui::Key; 10] = [
    egui::Key::Num0,
    egui::Key::Num1,
    egui::Key::Num2,
    egui::Key::Num3,
    egui::Key::Num4,
    egui::Key::Num5,
    egui::Key::Num6,
    egui::Key::Num7,
    egui::Key::Num8,
    egui::Key::Num9,
];

fn hotkey(tool: ToolMode) -> Option<egui::Key> {
    match tool.hotkey() {
        "Esc" => Some(egui::Key::Escape),
        "B" => Some(egui::Key::B),
        "Q" => Some(egui::Key::Q),
        _ => None,
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.load_pending {
            self.load_current(ctx);
        }
        self.handle_hotkeys(ctx);

        self.render_status_bar(ctx);

        let active = self.active_class;
        let mut cancelled = false;
        let mut prompt = |rect: &NormRect| {
            let class = prompt_class(active, rect);
            cancelled |= class.is_none();
            class
        };
        let font_size = self.settings.label_font_size;
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let errors = viewport::render(ui, &mut self.annotator, self.texture.as_ref(), &mut prompt, font_size);
                for e in errors {
                    warn!("Viewport: {}", e);
                }
            });

        self.process_events();
        if cancelled {
            self.status = "Box discarded: pick a class with 0-9 first".to_string();
        }
    }

    fn save(&mut self, _storage: &mut dyn eframe::Storage) {
        self.settings.default_class_id = self.active_class;
        self.settings.set_tool_mode(self.annotator.tool());
        if let Err(e) = self.settings.save(&self.settings_path) {
            warn!("Failed to save settings: {:#}", e);
        }
    }
}

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| path_config.data_file(config::LOG_FILE));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("egui", log::LevelFilter::Info)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // RUST_LOG wins over -v when set
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
            .filter_module("egui", log::LevelFilter::Info)
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Class for a finished draw: the active class, or cancel when none is picked.
fn prompt_class(active: Option<u32>, rect: &NormRect) -> Option<u32> {
    if active.is_none() {
        info!("No class picked, discarding box {:?}", rect);
    }
    active
}

/// Store keys are absolute paths so the same image matches across launches.
fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = path_config.ensure_dirs() {
        eprintln!("Warning: {:#}", e);
    }
    init_logging(&args, &path_config)?;

    info!("Annotator starting...");
    debug!("Command-line args: {:?}", args);

    let settings_path = path_config.config_file(config::SETTINGS_FILE);
    let settings = AppSettings::load(&settings_path);
    info!("Config path: {}", settings_path.display());

    let store_path = args.store.clone().unwrap_or_else(|| settings.store_path(&path_config));
    let store = JsonStore::open(&store_path)
        .with_context(|| format!("Failed to open annotation store {}", store_path.display()))?;
    info!("Store path: {}", store.path().display());

    let images: Vec<PathBuf> = media::collect_images(&args.paths)?
        .into_iter()
        .map(|p| canonical(&p))
        .collect();
    if images.is_empty() {
        warn!("No images given; pass a folder or png/jpg files");
    } else {
        info!("{} images", images.len());
    }

    let event_bus = EventBus::new();
    let mut annotator = Annotator::new(Box::new(store), event_bus.emitter(), settings.annotator_options());
    annotator.set_tool(settings.tool_mode());
    let active_class = args.class_id.or(settings.default_class_id);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("Annotator v{}", env!("CARGO_PKG_VERSION")))
            .with_inner_size([1280.0, 800.0])
            .with_resizable(true),
        ..Default::default()
    };

    let app = AnnotatorApp::new(annotator, event_bus, settings, settings_path, images, active_class);
    eframe::run_native("Annotator", native_options, Box::new(move |_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow::anyhow!("eframe: {}", e))?;

    info!("Application exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotator::store::MemoryStore;
    use annotator::widgets::viewport::{AnnotatorOptions, InputEvent};

    fn draw_with(active: Option<u32>) -> Annotator {
        let bus = EventBus::new();
        let mut a = Annotator::new(Box::new(MemoryStore::new()), bus.emitter(), AnnotatorOptions::default());
        a.set_widget_size(egui::vec2(1000.0, 500.0));
        a.set_image(Some(LoadedImage::new("/data/a.png", egui::vec2(1000.0, 500.0))))
            .unwrap();
        a.set_tool(ToolMode::Draw);

        let mut prompt = |rect: &NormRect| prompt_class(active, rect);
        for event in [
            InputEvent::PointerDown(egui::pos2(100.0, 100.0)),
            InputEvent::PointerMove(egui::pos2(300.0, 200.0)),
            InputEvent::PointerUp(egui::pos2(300.0, 200.0)),
        ] {
            a.handle_input(event, &mut prompt).unwrap();
        }
        a
    }

    #[test]
    fn test_draw_without_class_is_discarded() {
        let a = draw_with(None);
        assert!(a.annotations().is_empty());
        assert!(a.state().is_idle());
        assert_eq!(a.image_id(), None);
    }

    #[test]
    fn test_draw_uses_active_class() {
        let a = draw_with(Some(2));
        assert_eq!(a.annotations().len(), 1);
        assert_eq!(a.annotations()[0].class_id, 2);
    }
}

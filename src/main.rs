mod app;
mod gallery;
mod images;
mod launch;
mod masonry;
mod renderer;
mod settings;
mod viewport;

use clap::Parser;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = launch::Cli::parse();
    let settings = settings::load_settings(cli.config.as_deref());
    if cli.print_settings {
        match settings::render_settings_toml(&settings) {
            Ok(text) => print!("{text}"),
            Err(err) => log::error!("{err:#}"),
        }
        return Ok(());
    }

    let (sources, initial_status) = match launch::launch_request_from_cli(&cli) {
        Ok(request) => match request.resolve_sources() {
            Ok(sources) => (sources, None),
            Err(err) => {
                log::error!("{err:#}");
                (Vec::new(), Some(format!("Could not open images: {err:#}")))
            }
        },
        Err(err) => {
            log::error!("{err}");
            (Vec::new(), Some(format!("Launch URL/args error: {err}")))
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title(app::APP_TITLE)
            .with_inner_size([1000.0, 760.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        app::APP_TITLE,
        native_options,
        Box::new(move |_cc| {
            Ok(Box::new(app::GalleryApp::new(
                settings,
                sources,
                initial_status,
            )))
        }),
    )
}
